//! CPU-visible register bit fields: PPUCTRL, PPUMASK, PPUSTATUS.
//!
//! Backed by plain bytes through bitflags; no layout games. The scroll
//! half of PPUCTRL/PPUSCROLL/PPUADDR lives in [`crate::scroll`].

use bitflags::bitflags;

bitflags! {
    /// PPUCTRL (0x2000, write).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Ctrl: u8 {
        /// Nametable select, low bit.
        const NAMETABLE_LO = 1 << 0;
        /// Nametable select, high bit.
        const NAMETABLE_HI = 1 << 1;
        /// VRAM address increment: 0 adds 1, 1 adds 32.
        const INCREMENT_32 = 1 << 2;
        /// Sprite pattern table for 8x8 sprites.
        const SPRITE_TABLE = 1 << 3;
        /// Background pattern table.
        const BACKGROUND_TABLE = 1 << 4;
        /// Sprite height: 0 is 8x8, 1 is 8x16.
        const TALL_SPRITES = 1 << 5;
        /// EXT pin direction (unused on a stock console).
        const MASTER_SLAVE = 1 << 6;
        /// Generate NMI at VBlank start.
        const NMI_ENABLE = 1 << 7;
    }
}

impl Ctrl {
    /// VRAM address step applied by PPUDATA accesses.
    #[inline]
    #[must_use]
    pub fn vram_increment(self) -> u16 {
        if self.contains(Self::INCREMENT_32) {
            32
        } else {
            1
        }
    }

    /// Pattern-table base for 8x8 sprites.
    #[inline]
    #[must_use]
    pub fn sprite_table_base(self) -> u16 {
        if self.contains(Self::SPRITE_TABLE) {
            0x1000
        } else {
            0x0000
        }
    }

    /// Pattern-table base for background tiles.
    #[inline]
    #[must_use]
    pub fn background_table_base(self) -> u16 {
        if self.contains(Self::BACKGROUND_TABLE) {
            0x1000
        } else {
            0x0000
        }
    }

    /// Sprite height in scanlines (8 or 16).
    #[inline]
    #[must_use]
    pub fn sprite_height(self) -> u8 {
        if self.contains(Self::TALL_SPRITES) {
            16
        } else {
            8
        }
    }

    /// NMI generation enabled.
    #[inline]
    #[must_use]
    pub fn nmi_enabled(self) -> bool {
        self.contains(Self::NMI_ENABLE)
    }
}

bitflags! {
    /// PPUMASK (0x2001, write).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Mask: u8 {
        /// Grayscale: palette output masked with 0x30.
        const GRAYSCALE = 1 << 0;
        /// Show background in the left 8 pixels.
        const BACKGROUND_LEFT = 1 << 1;
        /// Show sprites in the left 8 pixels.
        const SPRITES_LEFT = 1 << 2;
        /// Background rendering enabled.
        const SHOW_BACKGROUND = 1 << 3;
        /// Sprite rendering enabled.
        const SHOW_SPRITES = 1 << 4;
        /// Red emphasis.
        const EMPHASIZE_RED = 1 << 5;
        /// Green emphasis.
        const EMPHASIZE_GREEN = 1 << 6;
        /// Blue emphasis.
        const EMPHASIZE_BLUE = 1 << 7;
    }
}

impl Mask {
    /// Either background or sprite rendering is on.
    #[inline]
    #[must_use]
    pub fn rendering_enabled(self) -> bool {
        self.intersects(Self::SHOW_BACKGROUND | Self::SHOW_SPRITES)
    }

    /// Background pixels allowed at screen column `x`.
    #[inline]
    #[must_use]
    pub fn background_at(self, x: u16) -> bool {
        self.contains(Self::SHOW_BACKGROUND) && (x >= 8 || self.contains(Self::BACKGROUND_LEFT))
    }

    /// Sprite pixels allowed at screen column `x`.
    #[inline]
    #[must_use]
    pub fn sprites_at(self, x: u16) -> bool {
        self.contains(Self::SHOW_SPRITES) && (x >= 8 || self.contains(Self::SPRITES_LEFT))
    }
}

bitflags! {
    /// PPUSTATUS (0x2002, read). Bits 0-4 float on the register bus.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Status: u8 {
        /// More than eight sprites matched a scanline.
        const SPRITE_OVERFLOW = 1 << 5;
        /// Sprite 0 opaque pixel overlapped an opaque background pixel.
        const SPRITE_ZERO_HIT = 1 << 6;
        /// Currently in vertical blank.
        const VBLANK = 1 << 7;
    }
}
