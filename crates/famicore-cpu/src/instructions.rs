//! Instruction semantics.
//!
//! The bus traffic of every instruction lives in [`crate::cpu`]; this module
//! holds the pure register/flag arithmetic, grouped by memory contract:
//! read operations, write operations (value selection), read-modify-write
//! operations, and the implied register transfers.

use crate::cpu::Cpu;
use crate::status::Status;

impl Cpu {
    /// Read-contract instructions: the operand byte has been fetched.
    pub(crate) fn execute_read(&mut self, opcode: u8, value: u8) {
        match opcode {
            // LDA
            0xA9 | 0xA5 | 0xB5 | 0xAD | 0xBD | 0xB9 | 0xA1 | 0xB1 => {
                self.a = value;
                self.status.set_zn(self.a);
            }
            // LDX
            0xA2 | 0xA6 | 0xB6 | 0xAE | 0xBE => {
                self.x = value;
                self.status.set_zn(self.x);
            }
            // LDY
            0xA0 | 0xA4 | 0xB4 | 0xAC | 0xBC => {
                self.y = value;
                self.status.set_zn(self.y);
            }
            // ADC
            0x69 | 0x65 | 0x75 | 0x6D | 0x7D | 0x79 | 0x61 | 0x71 => self.adc(value),
            // SBC (0xEB is the unofficial duplicate)
            0xE9 | 0xE5 | 0xF5 | 0xED | 0xFD | 0xF9 | 0xE1 | 0xF1 | 0xEB => self.adc(!value),
            // AND
            0x29 | 0x25 | 0x35 | 0x2D | 0x3D | 0x39 | 0x21 | 0x31 => {
                self.a &= value;
                self.status.set_zn(self.a);
            }
            // ORA
            0x09 | 0x05 | 0x15 | 0x0D | 0x1D | 0x19 | 0x01 | 0x11 => {
                self.a |= value;
                self.status.set_zn(self.a);
            }
            // EOR
            0x49 | 0x45 | 0x55 | 0x4D | 0x5D | 0x59 | 0x41 | 0x51 => {
                self.a ^= value;
                self.status.set_zn(self.a);
            }
            // CMP / CPX / CPY
            0xC9 | 0xC5 | 0xD5 | 0xCD | 0xDD | 0xD9 | 0xC1 | 0xD1 => self.compare(self.a, value),
            0xE0 | 0xE4 | 0xEC => self.compare(self.x, value),
            0xC0 | 0xC4 | 0xCC => self.compare(self.y, value),
            // BIT
            0x24 | 0x2C => {
                self.status.set(Status::Z, self.a & value == 0);
                self.status.set(Status::V, value & 0x40 != 0);
                self.status.set(Status::N, value & 0x80 != 0);
            }
            // LAX: load A and X together
            0xA7 | 0xB7 | 0xAF | 0xBF | 0xA3 | 0xB3 => {
                self.a = value;
                self.x = value;
                self.status.set_zn(value);
            }
            // LAS: value AND SP into A, X, SP
            0xBB => {
                let result = value & self.sp;
                self.a = result;
                self.x = result;
                self.sp = result;
                self.status.set_zn(result);
            }
            // ANC: AND, then copy N into C
            0x0B | 0x2B => {
                self.a &= value;
                self.status.set_zn(self.a);
                self.status.set(Status::C, self.a & 0x80 != 0);
            }
            // ALR: AND then LSR A
            0x4B => {
                self.a &= value;
                self.status.set(Status::C, self.a & 0x01 != 0);
                self.a >>= 1;
                self.status.set_zn(self.a);
            }
            // ARR: AND then ROR A, with C/V from bits 6/5 of the result
            0x6B => {
                self.a &= value;
                let carry_in = u8::from(self.status.contains(Status::C));
                self.a = (self.a >> 1) | (carry_in << 7);
                self.status.set_zn(self.a);
                self.status.set(Status::C, self.a & 0x40 != 0);
                self.status
                    .set(Status::V, ((self.a >> 6) ^ (self.a >> 5)) & 1 != 0);
            }
            // ANE: (A | 0xEE) & X & operand
            0x8B => {
                self.a = (self.a | 0xEE) & self.x & value;
                self.status.set_zn(self.a);
            }
            // LXA: (A | 0xEE) & operand into A and X
            0xAB => {
                self.a = (self.a | 0xEE) & value;
                self.x = self.a;
                self.status.set_zn(self.a);
            }
            // SBX: X = (A & X) - operand, carry like a compare
            0xCB => {
                let left = self.a & self.x;
                self.status.set(Status::C, left >= value);
                self.x = left.wrapping_sub(value);
                self.status.set_zn(self.x);
            }
            // Multi-byte NOPs: fetch and discard
            0x80 | 0x82 | 0x89 | 0xC2 | 0xE2 | 0x04 | 0x44 | 0x64 | 0x14 | 0x34 | 0x54 | 0x74
            | 0xD4 | 0xF4 | 0x0C | 0x1C | 0x3C | 0x5C | 0x7C | 0xDC | 0xFC => {}
            _ => {}
        }
    }

    /// Write-contract instructions: which byte goes on the bus.
    pub(crate) fn store_value(&self, opcode: u8) -> u8 {
        match opcode {
            // STA
            0x85 | 0x95 | 0x8D | 0x9D | 0x99 | 0x81 | 0x91 => self.a,
            // STX
            0x86 | 0x96 | 0x8E => self.x,
            // STY
            0x84 | 0x94 | 0x8C => self.y,
            // SAX
            0x87 | 0x97 | 0x8F | 0x83 => self.a & self.x,
            _ => 0,
        }
    }

    /// Read-modify-write instructions: transform the fetched byte, return
    /// the byte to write back. Combined opcodes also touch A and the flags.
    pub(crate) fn execute_modify(&mut self, opcode: u8, value: u8) -> u8 {
        match opcode {
            // ASL / LSR / ROL / ROR share the accumulator shift logic
            0x06 | 0x16 | 0x0E | 0x1E => self.shift_op(0x0A, value),
            0x46 | 0x56 | 0x4E | 0x5E => self.shift_op(0x4A, value),
            0x26 | 0x36 | 0x2E | 0x3E => self.shift_op(0x2A, value),
            0x66 | 0x76 | 0x6E | 0x7E => self.shift_op(0x6A, value),
            // INC / DEC
            0xE6 | 0xF6 | 0xEE | 0xFE => {
                let result = value.wrapping_add(1);
                self.status.set_zn(result);
                result
            }
            0xC6 | 0xD6 | 0xCE | 0xDE => {
                let result = value.wrapping_sub(1);
                self.status.set_zn(result);
                result
            }
            // SLO: ASL memory, ORA result
            0x07 | 0x17 | 0x0F | 0x1F | 0x1B | 0x03 | 0x13 => {
                self.status.set(Status::C, value & 0x80 != 0);
                let result = value << 1;
                self.a |= result;
                self.status.set_zn(self.a);
                result
            }
            // RLA: ROL memory, AND result
            0x27 | 0x37 | 0x2F | 0x3F | 0x3B | 0x23 | 0x33 => {
                let carry_in = u8::from(self.status.contains(Status::C));
                self.status.set(Status::C, value & 0x80 != 0);
                let result = (value << 1) | carry_in;
                self.a &= result;
                self.status.set_zn(self.a);
                result
            }
            // SRE: LSR memory, EOR result
            0x47 | 0x57 | 0x4F | 0x5F | 0x5B | 0x43 | 0x53 => {
                self.status.set(Status::C, value & 0x01 != 0);
                let result = value >> 1;
                self.a ^= result;
                self.status.set_zn(self.a);
                result
            }
            // RRA: ROR memory, ADC result
            0x67 | 0x77 | 0x6F | 0x7F | 0x7B | 0x63 | 0x73 => {
                let carry_in = u8::from(self.status.contains(Status::C));
                self.status.set(Status::C, value & 0x01 != 0);
                let result = (value >> 1) | (carry_in << 7);
                self.adc(result);
                result
            }
            // DCP: DEC memory, CMP result
            0xC7 | 0xD7 | 0xCF | 0xDF | 0xDB | 0xC3 | 0xD3 => {
                let result = value.wrapping_sub(1);
                self.compare(self.a, result);
                result
            }
            // ISC: INC memory, SBC result
            0xE7 | 0xF7 | 0xEF | 0xFF | 0xFB | 0xE3 | 0xF3 => {
                let result = value.wrapping_add(1);
                self.adc(!result);
                result
            }
            _ => value,
        }
    }

    /// ASL/LSR/ROL/ROR on a byte, keyed by the accumulator-form opcode.
    pub(crate) fn shift_op(&mut self, opcode: u8, value: u8) -> u8 {
        let carry_in = u8::from(self.status.contains(Status::C));
        let (result, carry_out) = match opcode {
            0x0A => (value << 1, value & 0x80 != 0),
            0x4A => (value >> 1, value & 0x01 != 0),
            0x2A => ((value << 1) | carry_in, value & 0x80 != 0),
            _ => ((value >> 1) | (carry_in << 7), value & 0x01 != 0),
        };
        self.status.set(Status::C, carry_out);
        self.status.set_zn(result);
        result
    }

    /// Implied register operations (transfers, index steps, flag ops, NOP).
    pub(crate) fn implied_op(&mut self, opcode: u8) {
        match opcode {
            0xAA => {
                self.x = self.a;
                self.status.set_zn(self.x);
            }
            0xA8 => {
                self.y = self.a;
                self.status.set_zn(self.y);
            }
            0x8A => {
                self.a = self.x;
                self.status.set_zn(self.a);
            }
            0x98 => {
                self.a = self.y;
                self.status.set_zn(self.a);
            }
            0xBA => {
                self.x = self.sp;
                self.status.set_zn(self.x);
            }
            // TXS does not touch the flags.
            0x9A => self.sp = self.x,
            0xE8 => {
                self.x = self.x.wrapping_add(1);
                self.status.set_zn(self.x);
            }
            0xC8 => {
                self.y = self.y.wrapping_add(1);
                self.status.set_zn(self.y);
            }
            0xCA => {
                self.x = self.x.wrapping_sub(1);
                self.status.set_zn(self.x);
            }
            0x88 => {
                self.y = self.y.wrapping_sub(1);
                self.status.set_zn(self.y);
            }
            0x18 => self.status.remove(Status::C),
            0x38 => self.status.insert(Status::C),
            0x58 => self.status.remove(Status::I),
            0x78 => self.status.insert(Status::I),
            0xB8 => self.status.remove(Status::V),
            0xD8 => self.status.remove(Status::D),
            0xF8 => self.status.insert(Status::D),
            // NOP, official and the implied unofficial slots
            _ => {}
        }
    }

    /// Full-width add with carry; SBC and ISC feed the inverted operand.
    pub(crate) fn adc(&mut self, value: u8) {
        let carry_in = u16::from(self.status.contains(Status::C));
        let sum = u16::from(self.a) + u16::from(value) + carry_in;
        let result = sum as u8;
        self.status.set(Status::C, sum > 0xFF);
        self.status
            .set(Status::V, (!(self.a ^ value) & (self.a ^ result)) & 0x80 != 0);
        self.a = result;
        self.status.set_zn(result);
    }

    /// CMP/CPX/CPY: Z on equality, C on unsigned >=, N from the difference.
    pub(crate) fn compare(&mut self, register: u8, value: u8) {
        self.status.set(Status::C, register >= value);
        self.status.set_zn(register.wrapping_sub(value));
    }
}
