//! Dot and scanline bookkeeping.
//!
//! NTSC geometry: 341 dots per scanline, scanlines -1 (pre-render) through
//! 260. VBlank spans lines 241-260. Odd frames drop dot 339 of the
//! pre-render line while rendering is enabled, so a frame is 89342 dots
//! even and 89341 odd.

/// Pre-render scanline number.
pub const PRE_RENDER_LINE: i16 = -1;
/// First VBlank scanline.
pub const VBLANK_LINE: i16 = 241;
/// Last scanline of a frame.
pub const LAST_LINE: i16 = 260;
/// Dots per scanline.
pub const DOTS_PER_LINE: u16 = 341;

/// Frame position counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timing {
    dot: u16,
    scanline: i16,
    frame: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self::new()
    }
}

impl Timing {
    /// Power-on position: scanline 0, dot 0, frame 0. The pre-render line
    /// closes each frame, so the first frame is one line short.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dot: 0,
            scanline: 0,
            frame: 0,
        }
    }

    /// Current dot (0-340).
    #[inline]
    #[must_use]
    pub const fn dot(&self) -> u16 {
        self.dot
    }

    /// Current scanline (-1 to 260).
    #[inline]
    #[must_use]
    pub const fn scanline(&self) -> i16 {
        self.scanline
    }

    /// Frames completed since power-on.
    #[inline]
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// True on odd frames.
    #[inline]
    #[must_use]
    pub const fn odd_frame(&self) -> bool {
        self.frame & 1 == 1
    }

    /// Visible or pre-render line, where the fetch pipeline runs.
    #[inline]
    #[must_use]
    pub const fn on_render_line(&self) -> bool {
        self.scanline < 240
    }

    /// Step one dot. Returns true when a new frame begins.
    pub fn advance(&mut self, rendering_enabled: bool) -> bool {
        self.dot += 1;

        // Odd-frame skip: dot 339 of the pre-render line vanishes.
        if self.scanline == PRE_RENDER_LINE
            && self.dot == 339
            && self.odd_frame()
            && rendering_enabled
        {
            self.dot = 340;
        }

        if self.dot == DOTS_PER_LINE {
            self.dot = 0;
            self.scanline += 1;
            if self.scanline > LAST_LINE {
                self.scanline = PRE_RENDER_LINE;
                self.frame = self.frame.wrapping_add(1);
                return true;
            }
        }
        false
    }

    /// Force a position (snapshot restore).
    pub fn set(&mut self, dot: u16, scanline: i16, frame: u64) {
        self.dot = dot.min(340);
        self.scanline = scanline.clamp(PRE_RENDER_LINE, LAST_LINE);
        self.frame = frame;
    }
}
