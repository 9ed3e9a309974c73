//! On-chip video memories: 2 KiB of nametable RAM and the 32-byte palette.
//!
//! The 4 KiB logical nametable window (0x2000-0x2FFF) folds into the 2 KiB
//! of on-chip RAM according to the cartridge's mirroring mode; four-screen
//! boards supply the upper half themselves.

/// Nametable mirroring, as reported by the cartridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mirroring {
    /// 0x2000/0x2400 share, 0x2800/0x2C00 share.
    #[default]
    Horizontal,
    /// 0x2000/0x2800 share, 0x2400/0x2C00 share.
    Vertical,
    /// Everything maps to the first 1 KiB.
    SingleScreenLower,
    /// Everything maps to the second 1 KiB.
    SingleScreenUpper,
    /// Four unique tables; upper 2 KiB lives on the cartridge.
    FourScreen,
}

/// Where a nametable access lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NametableTarget {
    /// Offset into the on-chip 2 KiB.
    Internal(usize),
    /// Offset into cartridge-provided VRAM (four-screen upper half).
    Cartridge(u16),
}

/// Fold a 0x2000-0x3EFF address into physical nametable storage.
#[must_use]
pub fn resolve_nametable(mirroring: Mirroring, addr: u16) -> NametableTarget {
    let addr = (addr & 0x0FFF) as usize;
    match mirroring {
        Mirroring::Vertical => NametableTarget::Internal(addr & 0x07FF),
        Mirroring::Horizontal => {
            let table = (addr >> 11) & 1;
            NametableTarget::Internal(table * 0x400 + (addr & 0x03FF))
        }
        Mirroring::SingleScreenLower => NametableTarget::Internal(addr & 0x03FF),
        Mirroring::SingleScreenUpper => NametableTarget::Internal(0x400 + (addr & 0x03FF)),
        Mirroring::FourScreen => {
            if addr < 0x800 {
                NametableTarget::Internal(addr)
            } else {
                NametableTarget::Cartridge((addr - 0x800) as u16)
            }
        }
    }
}

/// On-chip memories.
#[derive(Debug, Clone)]
pub struct Vram {
    nametables: [u8; 2048],
    palette: [u8; 32],
}

impl Default for Vram {
    fn default() -> Self {
        Self::new()
    }
}

impl Vram {
    /// Zeroed memories.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nametables: [0; 2048],
            palette: [0; 32],
        }
    }

    /// Read on-chip nametable RAM.
    #[inline]
    #[must_use]
    pub fn read_nametable(&self, offset: usize) -> u8 {
        self.nametables[offset & 0x07FF]
    }

    /// Write on-chip nametable RAM.
    #[inline]
    pub fn write_nametable(&mut self, offset: usize, value: u8) {
        self.nametables[offset & 0x07FF] = value;
    }

    /// Palette cell index with the sprite-backdrop mirroring applied:
    /// 0x10/0x14/0x18/0x1C alias 0x00/0x04/0x08/0x0C.
    fn palette_index(addr: u16) -> usize {
        let index = (addr & 0x1F) as usize;
        if index >= 0x10 && index & 0x03 == 0 {
            index - 0x10
        } else {
            index
        }
    }

    /// Read palette RAM (6-bit values).
    #[inline]
    #[must_use]
    pub fn read_palette(&self, addr: u16) -> u8 {
        self.palette[Self::palette_index(addr)] & 0x3F
    }

    /// Write palette RAM.
    #[inline]
    pub fn write_palette(&mut self, addr: u16, value: u8) {
        self.palette[Self::palette_index(addr)] = value & 0x3F;
    }

    /// Raw nametable bytes (snapshots).
    #[must_use]
    pub fn nametable_bytes(&self) -> &[u8] {
        &self.nametables
    }

    /// Raw palette bytes (snapshots).
    #[must_use]
    pub fn palette_bytes(&self) -> &[u8] {
        &self.palette
    }

    /// Load raw memories (snapshot restore).
    pub fn load(&mut self, nametables: &[u8], palette: &[u8]) {
        let len = nametables.len().min(self.nametables.len());
        self.nametables[..len].copy_from_slice(&nametables[..len]);
        let len = palette.len().min(self.palette.len());
        self.palette[..len].copy_from_slice(&palette[..len]);
    }

    /// Clear both memories.
    pub fn reset(&mut self) {
        self.nametables.fill(0);
        self.palette.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn vertical_mirroring_pairs() {
        let a = resolve_nametable(Mirroring::Vertical, 0x2000);
        let b = resolve_nametable(Mirroring::Vertical, 0x2800);
        assert_eq!(a, b);
        let c = resolve_nametable(Mirroring::Vertical, 0x2400);
        let d = resolve_nametable(Mirroring::Vertical, 0x2C00);
        assert_eq!(c, d);
        assert_ne!(a, c);
    }

    #[test]
    fn horizontal_mirroring_pairs() {
        let a = resolve_nametable(Mirroring::Horizontal, 0x2000);
        let b = resolve_nametable(Mirroring::Horizontal, 0x2400);
        assert_eq!(a, b);
        let c = resolve_nametable(Mirroring::Horizontal, 0x2800);
        let d = resolve_nametable(Mirroring::Horizontal, 0x2C00);
        assert_eq!(c, d);
        assert_ne!(a, c);
    }

    #[test]
    fn single_screen_folds_everything() {
        for base in [0x2000u16, 0x2400, 0x2800, 0x2C00] {
            assert_eq!(
                resolve_nametable(Mirroring::SingleScreenLower, base + 0x123),
                NametableTarget::Internal(0x123)
            );
            assert_eq!(
                resolve_nametable(Mirroring::SingleScreenUpper, base + 0x123),
                NametableTarget::Internal(0x523)
            );
        }
    }

    #[test]
    fn four_screen_splits_between_chip_and_cart() {
        assert_eq!(
            resolve_nametable(Mirroring::FourScreen, 0x2123),
            NametableTarget::Internal(0x123)
        );
        assert_eq!(
            resolve_nametable(Mirroring::FourScreen, 0x2923),
            NametableTarget::Cartridge(0x123)
        );
    }

    #[test]
    fn palette_backdrop_mirrors() {
        let mut vram = Vram::new();
        vram.write_palette(0x3F10, 0x2A);
        assert_eq!(vram.read_palette(0x3F00), 0x2A);
        vram.write_palette(0x3F04, 0x15);
        assert_eq!(vram.read_palette(0x3F14), 0x15);
        // Non-multiple-of-four sprite entries do not alias.
        vram.write_palette(0x3F11, 0x01);
        assert_ne!(vram.read_palette(0x3F01), 0x01);
    }

    #[test]
    fn palette_values_are_six_bit() {
        let mut vram = Vram::new();
        vram.write_palette(0x3F00, 0xFF);
        assert_eq!(vram.read_palette(0x3F00), 0x3F);
    }

    proptest! {
        /// Two addresses resolve identically iff they name the same
        /// logical nametable cell under the mode.
        #[test]
        fn mirroring_equivalence_classes(addr1 in 0x2000u16..0x3000, addr2 in 0x2000u16..0x3000) {
            for mode in [
                Mirroring::Horizontal,
                Mirroring::Vertical,
                Mirroring::SingleScreenLower,
                Mirroring::SingleScreenUpper,
            ] {
                let same_cell = (addr1 & 0x03FF) == (addr2 & 0x03FF);
                let logical = |addr: u16| -> u16 {
                    let table = (addr >> 10) & 3;
                    match mode {
                        Mirroring::Horizontal => table >> 1,
                        Mirroring::Vertical => table & 1,
                        _ => 0,
                    }
                };
                let expect_equal = same_cell && logical(addr1) == logical(addr2);
                let got_equal =
                    resolve_nametable(mode, addr1) == resolve_nametable(mode, addr2);
                prop_assert_eq!(expect_equal, got_equal);
            }
        }
    }
}
