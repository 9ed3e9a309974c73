//! Execution trace formatting in the golden-log format.
//!
//! Produces lines shaped like the reference nestest log:
//!
//! ```text
//! C000  4C F5 C5  JMP $C5F5                       A:00 X:00 Y:00 P:24 SP:FD PPU:  0, 21 CYC:7
//! ```
//!
//! Memory is inspected through a caller-supplied `peek` closure so tracing
//! never disturbs PPU registers or mapper state.

use std::fmt::Write;

use crate::addressing::AddrMode;
use crate::cpu::Cpu;
use crate::opcodes::OPCODE_TABLE;

/// Format the instruction at the current PC together with the register,
/// PPU-position, and cycle columns. Call before stepping the instruction.
pub fn trace_line(
    cpu: &Cpu,
    mut peek: impl FnMut(u16) -> u8,
    scanline: i16,
    dot: u16,
) -> String {
    let pc = cpu.pc;
    let opcode = peek(pc);
    let info = &OPCODE_TABLE[opcode as usize];
    let operand_len = info.mode.operand_len();

    let mut raw = format!("{opcode:02X}");
    for i in 0..operand_len {
        let byte = peek(pc.wrapping_add(1 + i));
        let _ = write!(raw, " {byte:02X}");
    }

    let disasm = disassemble(cpu, &mut peek, opcode);

    // Unofficial opcodes carry a '*' that steals one column from the raw
    // byte field so the register block stays aligned.
    let (bytes_width, prefix): (usize, &str) = if info.unofficial { (9, "*") } else { (10, "") };

    format!(
        "{pc:04X}  {raw:<bytes_width$}{prefix}{disasm:<32}A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X} PPU:{scanline:>3},{dot:>3} CYC:{}",
        cpu.a,
        cpu.x,
        cpu.y,
        cpu.status.bits(),
        cpu.sp,
        cpu.cycles,
    )
}

/// Disassemble the instruction at PC, annotating memory operands with the
/// effective address and current cell value the way the golden logs do.
fn disassemble(cpu: &Cpu, peek: &mut impl FnMut(u16) -> u8, opcode: u8) -> String {
    let info = &OPCODE_TABLE[opcode as usize];
    let mnemonic = info.mnemonic;
    let pc = cpu.pc;
    let b1 = peek(pc.wrapping_add(1));
    let b2 = peek(pc.wrapping_add(2));
    let operand16 = u16::from_le_bytes([b1, b2]);

    // JMP/JSR print bare addresses; data instructions append "= value".
    let is_jump = matches!(mnemonic, "JMP" | "JSR");

    match info.mode {
        AddrMode::Implied => mnemonic.to_string(),
        AddrMode::Accumulator => format!("{mnemonic} A"),
        AddrMode::Immediate => format!("{mnemonic} #${b1:02X}"),
        AddrMode::ZeroPage => {
            let value = peek(u16::from(b1));
            format!("{mnemonic} ${b1:02X} = {value:02X}")
        }
        AddrMode::ZeroPageX => {
            let addr = b1.wrapping_add(cpu.x);
            let value = peek(u16::from(addr));
            format!("{mnemonic} ${b1:02X},X @ {addr:02X} = {value:02X}")
        }
        AddrMode::ZeroPageY => {
            let addr = b1.wrapping_add(cpu.y);
            let value = peek(u16::from(addr));
            format!("{mnemonic} ${b1:02X},Y @ {addr:02X} = {value:02X}")
        }
        AddrMode::Absolute => {
            if is_jump {
                format!("{mnemonic} ${operand16:04X}")
            } else {
                let value = peek(operand16);
                format!("{mnemonic} ${operand16:04X} = {value:02X}")
            }
        }
        AddrMode::AbsoluteX => {
            let addr = operand16.wrapping_add(u16::from(cpu.x));
            let value = peek(addr);
            format!("{mnemonic} ${operand16:04X},X @ {addr:04X} = {value:02X}")
        }
        AddrMode::AbsoluteY => {
            let addr = operand16.wrapping_add(u16::from(cpu.y));
            let value = peek(addr);
            format!("{mnemonic} ${operand16:04X},Y @ {addr:04X} = {value:02X}")
        }
        AddrMode::Indirect => {
            // Resolve with the page-wrap bug so the log matches execution.
            let lo = peek(operand16);
            let wrapped = (operand16 & 0xFF00) | u16::from((operand16 as u8).wrapping_add(1));
            let hi = peek(wrapped);
            let target = u16::from_le_bytes([lo, hi]);
            format!("{mnemonic} (${operand16:04X}) = {target:04X}")
        }
        AddrMode::IndirectX => {
            let ptr = b1.wrapping_add(cpu.x);
            let lo = peek(u16::from(ptr));
            let hi = peek(u16::from(ptr.wrapping_add(1)));
            let addr = u16::from_le_bytes([lo, hi]);
            let value = peek(addr);
            format!("{mnemonic} (${b1:02X},X) @ {ptr:02X} = {addr:04X} = {value:02X}")
        }
        AddrMode::IndirectY => {
            let lo = peek(u16::from(b1));
            let hi = peek(u16::from(b1.wrapping_add(1)));
            let base = u16::from_le_bytes([lo, hi]);
            let addr = base.wrapping_add(u16::from(cpu.y));
            let value = peek(addr);
            format!("{mnemonic} (${b1:02X}),Y = {base:04X} @ {addr:04X} = {value:02X}")
        }
        AddrMode::Relative => {
            let target = pc.wrapping_add(2).wrapping_add(b1 as i8 as u16);
            format!("{mnemonic} ${target:04X}")
        }
    }
}
