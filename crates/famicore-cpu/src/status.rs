//! CPU status register (P) flags.
//!
//! ```text
//! 7  6  5  4  3  2  1  0
//! N  V  U  B  D  I  Z  C
//! │  │  │  │  │  │  │  └─ Carry
//! │  │  │  │  │  │  └──── Zero
//! │  │  │  │  │  └─────── Interrupt Disable
//! │  │  │  │  └────────── Decimal (no BCD on this CPU, flag still latches)
//! │  │  │  └───────────── Break (1 when pushed by PHP/BRK, 0 by IRQ/NMI)
//! │  │  └──────────────── Unused (reads as 1 whenever P reaches the stack)
//! │  └─────────────────── Overflow
//! └────────────────────── Negative
//! ```

use bitflags::bitflags;

bitflags! {
    /// CPU status register flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Status: u8 {
        /// Carry flag.
        const C = 1 << 0;
        /// Zero flag.
        const Z = 1 << 1;
        /// Interrupt disable flag. Masks IRQ; NMI is unaffected.
        const I = 1 << 2;
        /// Decimal mode flag. The NES CPU has no BCD unit but the bit latches.
        const D = 1 << 3;
        /// Break flag. Only meaningful in the pushed copy of P.
        const B = 1 << 4;
        /// Unused bit. Always 1 in any byte view of P.
        const U = 1 << 5;
        /// Signed overflow flag.
        const V = 1 << 6;
        /// Negative flag (bit 7 of the last result).
        const N = 1 << 7;
    }
}

impl Status {
    /// Power-on value: I and U set.
    pub const POWER_ON: Self = Self::I.union(Self::U);

    /// Update Z and N from a result byte.
    #[inline]
    pub fn set_zn(&mut self, value: u8) {
        self.set(Self::Z, value == 0);
        self.set(Self::N, value & 0x80 != 0);
    }

    /// Byte value as pushed to the stack. U is forced on; B reflects
    /// whether the push came from software (PHP/BRK) or an interrupt.
    #[inline]
    #[must_use]
    pub const fn to_stack_byte(self, software: bool) -> u8 {
        let mut value = self.bits() | Self::U.bits();
        if software {
            value |= Self::B.bits();
        }
        value
    }

    /// Rebuild P from a byte pulled off the stack. B is discarded, U forced.
    #[inline]
    #[must_use]
    pub fn from_stack_byte(value: u8) -> Self {
        Self::from_bits_truncate((value & !Self::B.bits()) | Self::U.bits())
    }
}
