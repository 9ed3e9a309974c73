//! 6502 CPU core.
//!
//! Execution is cycle-accurate at memory-access granularity: every cycle of
//! every instruction corresponds to exactly one [`Bus`] access (dummy reads
//! and dummy writes included), so the cycle counter reproduces the published
//! timing tables without correction terms, and the bus can interleave the
//! rest of the machine under each access.

use crate::addressing::AddrMode;
use crate::opcodes::OPCODE_TABLE;
use crate::status::Status;
use crate::vectors;

/// Memory interface presented to the CPU.
///
/// One call equals one CPU cycle of bus time. Implementations are expected
/// to advance the rest of the machine (three PPU dots per call on NTSC)
/// before or after servicing the access; the CPU itself only counts cycles.
pub trait Bus {
    /// Read one byte. Consumes one CPU cycle.
    fn read(&mut self, addr: u16) -> u8;

    /// Write one byte. Consumes one CPU cycle.
    fn write(&mut self, addr: u16, value: u8);
}

/// How an instruction touches its operand memory cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    /// Read-only: page-cross penalty applies on indexed modes.
    Read,
    /// Write-only: the indexed dummy read always happens.
    Write,
    /// Read-modify-write: dummy read plus the dummy write-back.
    Modify,
}

/// Serializable CPU state for save states.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CpuSnapshot {
    /// Accumulator.
    pub a: u8,
    /// X index register.
    pub x: u8,
    /// Y index register.
    pub y: u8,
    /// Stack pointer.
    pub sp: u8,
    /// Program counter.
    pub pc: u16,
    /// Packed status register.
    pub status: u8,
    /// Total cycles executed.
    pub cycles: u64,
    /// Latched NMI edge.
    pub nmi_pending: bool,
    /// IRQ line level.
    pub irq_line: bool,
    /// I flag sampled at the previous instruction boundary.
    pub prev_irq_inhibit: bool,
    /// CPU halted by a JAM opcode.
    pub jammed: bool,
}

/// The NES 6502 (no BCD arithmetic, decimal flag latches only).
#[derive(Debug)]
pub struct Cpu {
    /// Accumulator register.
    pub a: u8,
    /// X index register.
    pub x: u8,
    /// Y index register.
    pub y: u8,
    /// Stack pointer; the stack lives at 0x0100 + SP.
    pub sp: u8,
    /// Program counter. Always points at the byte about to be fetched.
    pub pc: u16,
    /// Status register.
    pub status: Status,
    /// Total cycles since reset. Increments once per bus access.
    pub cycles: u64,
    /// CPU halted by a JAM opcode.
    pub jammed: bool,

    nmi_pending: bool,
    irq_line: bool,
    /// I flag value sampled one instruction back. IRQ recognition uses this
    /// to model the one-instruction latency of CLI/SEI/PLP.
    prev_irq_inhibit: bool,
    /// BRK just completed; skip the NMI check for one instruction so the
    /// handler's first instruction runs.
    suppress_nmi_once: bool,
    /// A DMA transfer ran immediately before the current instruction.
    /// The unstable store opcodes drop their high-byte mask in that case.
    dma_preceded: bool,
    dma_flag: bool,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// Create a CPU in power-on state. Call [`Cpu::reset`] before stepping.
    #[must_use]
    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFD,
            pc: 0,
            status: Status::POWER_ON,
            cycles: 0,
            jammed: false,
            nmi_pending: false,
            irq_line: false,
            prev_irq_inhibit: true,
            suppress_nmi_once: false,
            dma_preceded: false,
            dma_flag: false,
        }
    }

    /// Run the reset sequence: S forced to 0xFD, I set, PC loaded from the
    /// reset vector. Consumes seven cycles of bus traffic like the hardware
    /// (two fetch slots, three suppressed stack pushes, two vector reads).
    pub fn reset(&mut self, bus: &mut impl Bus) {
        self.jammed = false;
        self.nmi_pending = false;
        self.irq_line = false;
        self.prev_irq_inhibit = true;
        self.suppress_nmi_once = false;
        self.dma_flag = false;
        self.status.insert(Status::I | Status::U);

        self.read(bus, self.pc);
        self.read(bus, self.pc);
        // The push cycles happen with the write line disabled.
        self.sp = 0x00;
        for _ in 0..3 {
            self.read(bus, 0x0100 | u16::from(self.sp));
            self.sp = self.sp.wrapping_sub(1);
        }
        let lo = self.read(bus, vectors::RESET);
        let hi = self.read(bus, vectors::RESET.wrapping_add(1));
        self.pc = u16::from_le_bytes([lo, hi]);
    }

    /// Latch an NMI edge. Recognized at the next instruction boundary.
    pub fn trigger_nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Drive the IRQ line level. Sampled at each instruction boundary and
    /// masked by the I flag.
    pub fn set_irq(&mut self, level: bool) {
        self.irq_line = level;
    }

    /// Tell the CPU a DMA transfer just finished. The next instruction's
    /// unstable store opcodes observe the bus conflict.
    pub fn notify_dma(&mut self) {
        self.dma_flag = true;
    }

    /// Execute one instruction (or service one pending interrupt) and
    /// return the cycles consumed.
    pub fn step(&mut self, bus: &mut impl Bus) -> u8 {
        let start = self.cycles;

        if self.jammed {
            // A jammed CPU only burns cycles; keep the bus ticking.
            self.read(bus, self.pc);
            return (self.cycles - start) as u8;
        }

        let current_inhibit = self.status.contains(Status::I);

        if self.nmi_pending && !self.suppress_nmi_once {
            self.nmi_pending = false;
            self.prev_irq_inhibit = true;
            self.service_interrupt(bus, vectors::NMI);
            return (self.cycles - start) as u8;
        }
        self.suppress_nmi_once = false;

        if self.irq_line && !self.prev_irq_inhibit {
            self.prev_irq_inhibit = true;
            self.service_interrupt(bus, vectors::IRQ);
            return (self.cycles - start) as u8;
        }
        self.prev_irq_inhibit = current_inhibit;

        self.dma_preceded = self.dma_flag;
        self.dma_flag = false;

        let opcode = self.read(bus, self.pc);
        self.pc = self.pc.wrapping_add(1);
        self.execute(bus, opcode);

        (self.cycles - start) as u8
    }

    // ------------------------------------------------------------------
    // Per-cycle bus access
    // ------------------------------------------------------------------

    #[inline]
    fn read(&mut self, bus: &mut impl Bus, addr: u16) -> u8 {
        self.cycles += 1;
        bus.read(addr)
    }

    #[inline]
    fn write(&mut self, bus: &mut impl Bus, addr: u16, value: u8) {
        self.cycles += 1;
        bus.write(addr, value);
    }

    #[inline]
    fn push(&mut self, bus: &mut impl Bus, value: u8) {
        self.write(bus, 0x0100 | u16::from(self.sp), value);
        self.sp = self.sp.wrapping_sub(1);
    }

    #[inline]
    fn pull(&mut self, bus: &mut impl Bus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        self.read(bus, 0x0100 | u16::from(self.sp))
    }

    // ------------------------------------------------------------------
    // Interrupt sequencing
    // ------------------------------------------------------------------

    /// Seven-cycle NMI/IRQ entry: two dummy fetch slots, PC and status
    /// pushed (B clear, U set), I set, PC loaded from the vector.
    fn service_interrupt(&mut self, bus: &mut impl Bus, vector: u16) {
        self.read(bus, self.pc);
        self.read(bus, self.pc);
        self.push(bus, (self.pc >> 8) as u8);
        self.push(bus, (self.pc & 0xFF) as u8);
        self.push(bus, self.status.to_stack_byte(false));
        self.status.insert(Status::I);
        let lo = self.read(bus, vector);
        let hi = self.read(bus, vector.wrapping_add(1));
        self.pc = u16::from_le_bytes([lo, hi]);
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    fn execute(&mut self, bus: &mut impl Bus, opcode: u8) {
        match opcode {
            // Control flow
            0x00 => self.brk(bus),
            0x20 => self.jsr(bus),
            0x4C => self.jmp_absolute(bus),
            0x6C => self.jmp_indirect(bus),
            0x40 => self.rti(bus),
            0x60 => self.rts(bus),
            0x10 | 0x30 | 0x50 | 0x70 | 0x90 | 0xB0 | 0xD0 | 0xF0 => self.branch(bus, opcode),

            // Stack
            0x48 => {
                self.read(bus, self.pc);
                self.push(bus, self.a);
            }
            0x08 => {
                self.read(bus, self.pc);
                let byte = self.status.to_stack_byte(true);
                self.push(bus, byte);
            }
            0x68 => {
                self.read(bus, self.pc);
                self.read(bus, 0x0100 | u16::from(self.sp));
                self.a = self.pull(bus);
                self.status.set_zn(self.a);
            }
            0x28 => {
                self.read(bus, self.pc);
                self.read(bus, 0x0100 | u16::from(self.sp));
                let byte = self.pull(bus);
                self.status = Status::from_stack_byte(byte);
            }

            // Accumulator shifts
            0x0A | 0x4A | 0x2A | 0x6A => {
                self.read(bus, self.pc);
                self.a = self.shift_op(opcode, self.a);
            }

            // JAM: freeze the CPU
            0x02 | 0x12 | 0x22 | 0x32 | 0x42 | 0x52 | 0x62 | 0x72 | 0x92 | 0xB2 | 0xD2 | 0xF2 => {
                log::warn!("CPU jammed by opcode {opcode:#04X} at {:#06X}", self.pc.wrapping_sub(1));
                self.jammed = true;
                self.read(bus, self.pc);
            }

            // Unstable stores: base-high AND rule, DMA bus conflict aside
            0x9C => self.unstable_store(bus, AddrMode::AbsoluteX, UnstableReg::Y),
            0x9E => self.unstable_store(bus, AddrMode::AbsoluteY, UnstableReg::X),
            0x9F => self.unstable_store(bus, AddrMode::AbsoluteY, UnstableReg::Ax),
            0x93 => self.unstable_store(bus, AddrMode::IndirectY, UnstableReg::Ax),
            0x9B => {
                self.unstable_store(bus, AddrMode::AbsoluteY, UnstableReg::Ax);
                self.sp = self.a & self.x;
            }

            // Implied register operations
            0xAA | 0xA8 | 0x8A | 0x98 | 0xBA | 0x9A | 0xE8 | 0xC8 | 0xCA | 0x88 | 0x18 | 0x38
            | 0x58 | 0x78 | 0xB8 | 0xD8 | 0xF8 | 0xEA | 0x1A | 0x3A | 0x5A | 0x7A | 0xDA
            | 0xFA => {
                self.read(bus, self.pc);
                self.implied_op(opcode);
            }

            // Everything else resolves an operand address
            _ => self.memory_op(bus, opcode),
        }
    }

    /// Execute an instruction whose operand lives in memory (or is an
    /// immediate byte).
    fn memory_op(&mut self, bus: &mut impl Bus, opcode: u8) {
        let info = &OPCODE_TABLE[opcode as usize];
        let access = Self::access_kind(info.mnemonic);
        let addr = self.resolve_operand(bus, info.mode, access);

        match access {
            Access::Read => {
                let value = self.read(bus, addr);
                self.execute_read(opcode, value);
            }
            Access::Write => {
                let value = self.store_value(opcode);
                self.write(bus, addr, value);
            }
            Access::Modify => {
                let value = self.read(bus, addr);
                self.write(bus, addr, value); // dummy write-back
                let result = self.execute_modify(opcode, value);
                self.write(bus, addr, result);
            }
        }
    }

    fn access_kind(mnemonic: &str) -> Access {
        match mnemonic {
            "STA" | "STX" | "STY" | "SAX" => Access::Write,
            "ASL" | "LSR" | "ROL" | "ROR" | "INC" | "DEC" | "SLO" | "RLA" | "SRE" | "RRA"
            | "DCP" | "ISC" => Access::Modify,
            _ => Access::Read,
        }
    }

    // ------------------------------------------------------------------
    // Operand resolution (exact bus traffic per mode)
    // ------------------------------------------------------------------

    /// Resolve the operand address, issuing every documented fetch and
    /// dummy access along the way.
    fn resolve_operand(&mut self, bus: &mut impl Bus, mode: AddrMode, access: Access) -> u16 {
        match mode {
            AddrMode::Immediate => {
                let addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
                addr
            }
            AddrMode::ZeroPage => {
                let operand = self.read(bus, self.pc);
                self.pc = self.pc.wrapping_add(1);
                u16::from(operand)
            }
            AddrMode::ZeroPageX | AddrMode::ZeroPageY => {
                let operand = self.read(bus, self.pc);
                self.pc = self.pc.wrapping_add(1);
                self.read(bus, u16::from(operand));
                let index = if mode == AddrMode::ZeroPageX {
                    self.x
                } else {
                    self.y
                };
                u16::from(operand.wrapping_add(index))
            }
            AddrMode::Absolute => {
                let lo = self.read(bus, self.pc);
                self.pc = self.pc.wrapping_add(1);
                let hi = self.read(bus, self.pc);
                self.pc = self.pc.wrapping_add(1);
                u16::from_le_bytes([lo, hi])
            }
            AddrMode::AbsoluteX | AddrMode::AbsoluteY => {
                let lo = self.read(bus, self.pc);
                self.pc = self.pc.wrapping_add(1);
                let hi = self.read(bus, self.pc);
                self.pc = self.pc.wrapping_add(1);
                let base = u16::from_le_bytes([lo, hi]);
                let index = if mode == AddrMode::AbsoluteX {
                    self.x
                } else {
                    self.y
                };
                self.indexed_tail(bus, base, index, access)
            }
            AddrMode::IndirectX => {
                let operand = self.read(bus, self.pc);
                self.pc = self.pc.wrapping_add(1);
                self.read(bus, u16::from(operand));
                let ptr = operand.wrapping_add(self.x);
                let lo = self.read(bus, u16::from(ptr));
                let hi = self.read(bus, u16::from(ptr.wrapping_add(1)));
                u16::from_le_bytes([lo, hi])
            }
            AddrMode::IndirectY => {
                let operand = self.read(bus, self.pc);
                self.pc = self.pc.wrapping_add(1);
                let lo = self.read(bus, u16::from(operand));
                let hi = self.read(bus, u16::from(operand.wrapping_add(1)));
                let base = u16::from_le_bytes([lo, hi]);
                self.indexed_tail(bus, base, self.y, access)
            }
            // Implied/Accumulator/Relative/Indirect never reach here.
            AddrMode::Implied
            | AddrMode::Accumulator
            | AddrMode::Relative
            | AddrMode::Indirect => self.pc,
        }
    }

    /// Shared indexed-mode tail: page-cross detection and the dummy read
    /// at the pre-fix address. Reads skip the dummy when no page is
    /// crossed; writes and RMW instructions always pay it.
    fn indexed_tail(&mut self, bus: &mut impl Bus, base: u16, index: u8, access: Access) -> u16 {
        let effective = base.wrapping_add(u16::from(index));
        let crossed = (base ^ effective) & 0xFF00 != 0;
        if crossed || access != Access::Read {
            self.read(bus, (base & 0xFF00) | (effective & 0x00FF));
        }
        effective
    }

    // ------------------------------------------------------------------
    // Control flow
    // ------------------------------------------------------------------

    fn branch(&mut self, bus: &mut impl Bus, opcode: u8) {
        let offset = self.read(bus, self.pc) as i8;
        self.pc = self.pc.wrapping_add(1);

        let taken = match opcode {
            0x10 => !self.status.contains(Status::N),
            0x30 => self.status.contains(Status::N),
            0x50 => !self.status.contains(Status::V),
            0x70 => self.status.contains(Status::V),
            0x90 => !self.status.contains(Status::C),
            0xB0 => self.status.contains(Status::C),
            0xD0 => !self.status.contains(Status::Z),
            _ => self.status.contains(Status::Z),
        };
        if !taken {
            return;
        }

        self.read(bus, self.pc);
        let old_pc = self.pc;
        self.pc = self.pc.wrapping_add(offset as u16);
        if (old_pc ^ self.pc) & 0xFF00 != 0 {
            // Page-fix cycle reads from the stale high byte.
            self.read(bus, (self.pc & 0x00FF) | (old_pc & 0xFF00));
        }
    }

    fn jmp_absolute(&mut self, bus: &mut impl Bus) {
        let lo = self.read(bus, self.pc);
        self.pc = self.pc.wrapping_add(1);
        let hi = self.read(bus, self.pc);
        self.pc = u16::from_le_bytes([lo, hi]);
    }

    /// JMP (ind) with the hardware page-wrap bug: a pointer at 0xXXFF takes
    /// its high byte from 0xXX00.
    fn jmp_indirect(&mut self, bus: &mut impl Bus) {
        let lo = self.read(bus, self.pc);
        self.pc = self.pc.wrapping_add(1);
        let hi = self.read(bus, self.pc);
        let ptr = u16::from_le_bytes([lo, hi]);
        let target_lo = self.read(bus, ptr);
        let wrapped = (ptr & 0xFF00) | u16::from((ptr as u8).wrapping_add(1));
        let target_hi = self.read(bus, wrapped);
        self.pc = u16::from_le_bytes([target_lo, target_hi]);
    }

    fn jsr(&mut self, bus: &mut impl Bus) {
        let lo = self.read(bus, self.pc);
        self.pc = self.pc.wrapping_add(1);
        self.read(bus, 0x0100 | u16::from(self.sp));
        // PC currently addresses the operand high byte: return address - 1.
        self.push(bus, (self.pc >> 8) as u8);
        self.push(bus, (self.pc & 0xFF) as u8);
        let hi = self.read(bus, self.pc);
        self.pc = u16::from_le_bytes([lo, hi]);
    }

    fn rts(&mut self, bus: &mut impl Bus) {
        self.read(bus, self.pc);
        self.read(bus, 0x0100 | u16::from(self.sp));
        let lo = self.pull(bus);
        let hi = self.pull(bus);
        self.pc = u16::from_le_bytes([lo, hi]);
        self.read(bus, self.pc);
        self.pc = self.pc.wrapping_add(1);
    }

    fn rti(&mut self, bus: &mut impl Bus) {
        self.read(bus, self.pc);
        self.read(bus, 0x0100 | u16::from(self.sp));
        let byte = self.pull(bus);
        self.status = Status::from_stack_byte(byte);
        let lo = self.pull(bus);
        let hi = self.pull(bus);
        self.pc = u16::from_le_bytes([lo, hi]);
        // Unlike CLI/SEI/PLP, the I flag restored by RTI takes effect
        // without the one-instruction delay.
        self.prev_irq_inhibit = self.status.contains(Status::I);
    }

    /// BRK: two-byte opcode (padding byte is skipped), pushes PC+2 and
    /// P with B=1, sets I, vectors through 0xFFFE/F. A pending NMI hijacks
    /// the vector, but B stays 1 in the pushed status.
    fn brk(&mut self, bus: &mut impl Bus) {
        self.read(bus, self.pc);
        self.pc = self.pc.wrapping_add(1);
        self.push(bus, (self.pc >> 8) as u8);
        self.push(bus, (self.pc & 0xFF) as u8);

        let hijacked = self.nmi_pending;
        if hijacked {
            self.nmi_pending = false;
        }
        self.push(bus, self.status.to_stack_byte(true));
        self.status.insert(Status::I);
        self.suppress_nmi_once = true;

        let vector = if hijacked { vectors::NMI } else { vectors::IRQ };
        let lo = self.read(bus, vector);
        let hi = self.read(bus, vector.wrapping_add(1));
        self.pc = u16::from_le_bytes([lo, hi]);
    }

    // ------------------------------------------------------------------
    // Unstable stores (SHY/SHX/SHA/TAS)
    // ------------------------------------------------------------------

    fn unstable_store(&mut self, bus: &mut impl Bus, mode: AddrMode, reg: UnstableReg) {
        let (base, index) = match mode {
            AddrMode::AbsoluteX | AddrMode::AbsoluteY => {
                let lo = self.read(bus, self.pc);
                self.pc = self.pc.wrapping_add(1);
                let hi = self.read(bus, self.pc);
                self.pc = self.pc.wrapping_add(1);
                let index = if mode == AddrMode::AbsoluteX {
                    self.x
                } else {
                    self.y
                };
                (u16::from_le_bytes([lo, hi]), index)
            }
            _ => {
                // (zp),Y pointer fetch
                let operand = self.read(bus, self.pc);
                self.pc = self.pc.wrapping_add(1);
                let lo = self.read(bus, u16::from(operand));
                let hi = self.read(bus, u16::from(operand.wrapping_add(1)));
                (u16::from_le_bytes([lo, hi]), self.y)
            }
        };

        let effective = base.wrapping_add(u16::from(index));
        let crossed = (base ^ effective) & 0xFF00 != 0;
        self.read(bus, (base & 0xFF00) | (effective & 0x00FF));

        let value = match reg {
            UnstableReg::X => self.x,
            UnstableReg::Y => self.y,
            UnstableReg::Ax => self.a & self.x,
        };
        let stored = if self.dma_preceded {
            // Bus conflict: the AND with the address high byte is lost.
            value
        } else {
            value & ((base >> 8) as u8).wrapping_add(1)
        };
        // A crossed page corrupts the target high byte with the same AND.
        let addr_hi = if crossed {
            (effective >> 8) as u8 & value
        } else {
            (effective >> 8) as u8
        };
        let addr = u16::from(addr_hi) << 8 | (effective & 0x00FF);
        self.write(bus, addr, stored);
    }

    // ------------------------------------------------------------------
    // Save states
    // ------------------------------------------------------------------

    /// Capture the complete register and interrupt state.
    #[must_use]
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            a: self.a,
            x: self.x,
            y: self.y,
            sp: self.sp,
            pc: self.pc,
            status: self.status.bits(),
            cycles: self.cycles,
            nmi_pending: self.nmi_pending,
            irq_line: self.irq_line,
            prev_irq_inhibit: self.prev_irq_inhibit,
            jammed: self.jammed,
        }
    }

    /// Restore state captured by [`Cpu::snapshot`].
    pub fn restore(&mut self, snapshot: &CpuSnapshot) {
        self.a = snapshot.a;
        self.x = snapshot.x;
        self.y = snapshot.y;
        self.sp = snapshot.sp;
        self.pc = snapshot.pc;
        self.status = Status::from_bits_truncate(snapshot.status) | Status::U;
        self.cycles = snapshot.cycles;
        self.nmi_pending = snapshot.nmi_pending;
        self.irq_line = snapshot.irq_line;
        self.prev_irq_inhibit = snapshot.prev_irq_inhibit;
        self.jammed = snapshot.jammed;
        self.suppress_nmi_once = false;
        self.dma_flag = false;
        self.dma_preceded = false;
    }
}

/// Which register an unstable store drives onto the bus.
#[derive(Debug, Clone, Copy)]
enum UnstableReg {
    X,
    Y,
    Ax,
}
