//! Sprite evaluation and the eight per-scanline sprite output units.
//!
//! Evaluation scans primary OAM during dots 65-256 of each visible line,
//! collecting up to eight sprites whose rows intersect the line. The ninth
//! match sets the overflow flag; past eight, the hardware keeps scanning
//! but mistakenly advances the byte offset along with the sprite index, so
//! the "Y" it tests walks a diagonal through OAM. That bug is reproduced
//! here.
//!
//! Output units hold each captured sprite's pattern shifters, attribute
//! latch, and X down-counter; a unit starts emitting when its counter
//! reaches zero and falls silent once its eight pixels have shifted out.

use crate::oam::{Oam, SecondaryOam};

/// Pattern-table address of one row of a sprite.
///
/// 8x16 sprites take their table from tile bit 0 and span two adjacent
/// tile indices; vertical flip mirrors across the full sprite height.
#[must_use]
pub fn sprite_pattern_addr(tile: u8, row: u8, tall: bool, table_base: u16, flip_v: bool) -> u16 {
    if tall {
        let row = if flip_v { 15 - (row & 15) } else { row & 15 };
        let table = u16::from(tile & 0x01) << 12;
        let index = u16::from(tile & 0xFE) + u16::from(row >= 8);
        table + index * 16 + u16::from(row & 7)
    } else {
        let row = if flip_v { 7 - (row & 7) } else { row & 7 };
        table_base + u16::from(tile) * 16 + u16::from(row)
    }
}

/// Scanline sprite evaluator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpriteEvaluator {
    index: u8,
    bug_offset: u8,
    done: bool,
    sprite_zero: bool,
    overflow: bool,
}

impl SpriteEvaluator {
    /// Start a fresh scan.
    pub fn begin(&mut self) {
        self.index = 0;
        self.bug_offset = 0;
        self.done = false;
        self.sprite_zero = false;
        self.overflow = false;
    }

    /// Examine one primary-OAM entry. Called once per dot in the
    /// evaluation window; the scan finishes early once all 64 sprites
    /// have been considered.
    pub fn step(&mut self, oam: &Oam, scanline: i16, height: u8, secondary: &mut SecondaryOam) {
        if self.done {
            return;
        }
        if self.index >= 64 {
            self.done = true;
            return;
        }

        if secondary.count() < 8 {
            let sprite = oam.sprite(self.index as usize);
            let row = scanline - i16::from(sprite.y);
            if (0..i16::from(height)).contains(&row) {
                if self.index == 0 {
                    self.sprite_zero = true;
                }
                secondary.push(sprite);
            }
            self.index += 1;
        } else {
            // Overflow scan: the byte offset increments alongside the
            // sprite index, so the tested "Y" drifts through tile,
            // attribute, and X bytes.
            let offset = self.index as usize * 4 + self.bug_offset as usize;
            let y = oam.bytes()[offset & 0xFF];
            let row = scanline - i16::from(y);
            if (0..i16::from(height)).contains(&row) {
                self.overflow = true;
                self.done = true;
            } else {
                self.index += 1;
                self.bug_offset = (self.bug_offset + 1) & 0x03;
            }
        }
    }

    /// Sprite 0 was captured for the coming line.
    #[inline]
    #[must_use]
    pub const fn sprite_zero_in_range(&self) -> bool {
        self.sprite_zero
    }

    /// More than eight sprites matched.
    #[inline]
    #[must_use]
    pub const fn overflow(&self) -> bool {
        self.overflow
    }
}

/// One sprite output unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct SpriteUnit {
    pattern_lo: u8,
    pattern_hi: u8,
    attributes: u8,
    x: u8,
}

/// The eight sprite output units for the current scanline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpriteUnits {
    units: [SpriteUnit; 8],
    count: u8,
    sprite_zero_present: bool,
}

impl SpriteUnits {
    /// Adopt the sprites captured in secondary OAM. Pattern bytes arrive
    /// later through [`SpriteUnits::load_pattern`] as the fetches run.
    pub fn load_line(&mut self, secondary: &SecondaryOam, sprite_zero_in_range: bool) {
        self.count = secondary.count();
        self.sprite_zero_present = sprite_zero_in_range;
        for (slot, unit) in self.units.iter_mut().enumerate() {
            if let Some(sprite) = secondary.get(slot) {
                unit.attributes = sprite.attributes;
                unit.x = sprite.x;
            } else {
                *unit = SpriteUnit::default();
            }
            unit.pattern_lo = 0;
            unit.pattern_hi = 0;
        }
    }

    /// Install fetched pattern bytes; horizontal flip reverses them here
    /// so the shifters always emit left-to-right.
    pub fn load_pattern(&mut self, slot: usize, mut lo: u8, mut hi: u8) {
        if slot >= self.count as usize {
            return;
        }
        if self.units[slot].attributes & 0x40 != 0 {
            lo = lo.reverse_bits();
            hi = hi.reverse_bits();
        }
        self.units[slot].pattern_lo = lo;
        self.units[slot].pattern_hi = hi;
    }

    /// Advance one dot: idle units count down, active units shift.
    pub fn tick(&mut self) {
        for unit in &mut self.units[..self.count as usize] {
            if unit.x > 0 {
                unit.x -= 1;
            } else {
                unit.pattern_lo <<= 1;
                unit.pattern_hi <<= 1;
            }
        }
    }

    /// Highest-priority opaque sprite pixel at the current column:
    /// (pixel, palette, behind-background, is-sprite-zero).
    #[must_use]
    pub fn sample(&self) -> Option<(u8, u8, bool, bool)> {
        for (slot, unit) in self.units[..self.count as usize].iter().enumerate() {
            if unit.x > 0 {
                continue;
            }
            let pixel =
                u8::from(unit.pattern_lo & 0x80 != 0) | (u8::from(unit.pattern_hi & 0x80 != 0) << 1);
            if pixel == 0 {
                continue;
            }
            let palette = (unit.attributes & 0x03) + 4;
            let behind = unit.attributes & 0x20 != 0;
            let is_zero = slot == 0 && self.sprite_zero_present;
            return Some((pixel, palette, behind, is_zero));
        }
        None
    }

    /// Drop all sprites (pre-render line; line 0 renders none).
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
