//! Cycle-accurate MOS 6502 CPU interpreter for the famicore NES emulator.
//!
//! Implements all 256 opcodes (documented and undocumented), the twelve
//! addressing modes with exact cycle costs and page-cross penalties, and the
//! reset/NMI/IRQ/BRK interrupt sequences.
//!
//! # Architecture
//!
//! The CPU talks to memory through the [`Bus`] trait. Every bus call is one
//! CPU cycle: the interpreter issues the exact per-cycle access pattern of
//! the hardware (dummy reads on indexed page crossings, the
//! read/write-back/write sequence of modify instructions, phantom stack
//! accesses), so a bus implementation can interleave the rest of the
//! machine under each access (three PPU dots per call on NTSC), and the
//! cycle counter matches the published tables by construction.
//!
//! # Example
//!
//! ```no_run
//! use famicore_cpu::{Bus, Cpu};
//!
//! struct FlatBus {
//!     memory: [u8; 0x10000],
//! }
//!
//! impl Bus for FlatBus {
//!     fn read(&mut self, addr: u16) -> u8 {
//!         self.memory[addr as usize]
//!     }
//!     fn write(&mut self, addr: u16, value: u8) {
//!         self.memory[addr as usize] = value;
//!     }
//! }
//!
//! let mut bus = FlatBus { memory: [0; 0x10000] };
//! let mut cpu = Cpu::new();
//! cpu.reset(&mut bus);
//! cpu.step(&mut bus);
//! ```

mod addressing;
mod cpu;
mod instructions;
mod opcodes;
mod status;
pub mod trace;

pub use addressing::AddrMode;
pub use cpu::{Bus, Cpu, CpuSnapshot};
pub use opcodes::{OpcodeInfo, OPCODE_TABLE};
pub use status::Status;

/// Interrupt vector addresses.
pub mod vectors {
    /// NMI vector.
    pub const NMI: u16 = 0xFFFA;
    /// Reset vector.
    pub const RESET: u16 = 0xFFFC;
    /// IRQ/BRK vector.
    pub const IRQ: u16 = 0xFFFE;
}
