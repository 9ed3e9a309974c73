//! The picture processor: register protocol, the per-dot rendering
//! pipeline, and frame assembly.
//!
//! One [`Ppu::tick`] call advances one dot. The caller (the system bus)
//! invokes it three times per CPU cycle and supplies a [`crate::PpuBus`]
//! for pattern-table, mirroring, and mapper-notification access.

use crate::background::Background;
use crate::oam::{Oam, SecondaryOam};
use crate::palette::MasterPalette;
use crate::registers::{Ctrl, Mask, Status};
use crate::scroll::Scroll;
use crate::sprites::{sprite_pattern_addr, SpriteEvaluator, SpriteUnits};
use crate::timing::{Timing, PRE_RENDER_LINE, VBLANK_LINE};
use crate::vram::{resolve_nametable, NametableTarget, Vram};
use crate::PpuBus;

/// Output width in pixels.
pub const FRAME_WIDTH: usize = 256;
/// Output height in pixels.
pub const FRAME_HEIGHT: usize = 240;

/// Register writes are dropped this many dots after reset (29658 CPU
/// cycles) while the chip warms up.
const WARMUP_DOTS: u32 = 29_658 * 3;

/// Serializable PPU state for save states.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PpuSnapshot {
    /// PPUCTRL byte.
    pub ctrl: u8,
    /// PPUMASK byte.
    pub mask: u8,
    /// PPUSTATUS flag bits.
    pub status: u8,
    /// OAMADDR register.
    pub oam_addr: u8,
    /// Register-bus open-bus latch.
    pub open_bus: u8,
    /// PPUDATA read buffer.
    pub read_buffer: u8,
    /// Scroll register file (v, t, fine x, toggle).
    pub scroll: Scroll,
    /// Dot/scanline/frame position.
    pub timing: Timing,
    /// Remaining warm-up dots.
    pub warmup_dots: u32,
    /// VBlank suppression latch (status-read race).
    pub suppress_vblank: bool,
    /// Undelivered NMI request.
    pub nmi_request: bool,
    /// Nametable RAM contents.
    pub nametables: Vec<u8>,
    /// Palette RAM contents.
    pub palette: Vec<u8>,
    /// Primary OAM contents.
    pub oam: Vec<u8>,
    /// Background pipeline latches and shifters.
    pub background: Background,
    /// Sprite output units.
    pub sprites: SpriteUnits,
    /// Secondary OAM.
    pub secondary_oam: SecondaryOam,
    /// Sprite evaluator progress.
    pub evaluator: SpriteEvaluator,
    /// Frame buffer contents (partially drawn frames resume mid-line).
    pub frame: Vec<u32>,
}

/// The 2C02 picture processor.
pub struct Ppu {
    ctrl: Ctrl,
    mask: Mask,
    status: Status,
    scroll: Scroll,
    timing: Timing,
    vram: Vram,
    oam: Oam,
    secondary_oam: SecondaryOam,
    evaluator: SpriteEvaluator,
    background: Background,
    sprites: SpriteUnits,

    read_buffer: u8,
    open_bus: u8,
    warmup_dots: u32,
    suppress_vblank: bool,
    nmi_request: bool,
    frame_ready: bool,

    master_palette: MasterPalette,
    frame: Vec<u32>,
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new(MasterPalette::default())
    }
}

impl Ppu {
    /// Build a PPU rendering through the given master palette.
    #[must_use]
    pub fn new(master_palette: MasterPalette) -> Self {
        Self {
            ctrl: Ctrl::empty(),
            mask: Mask::empty(),
            status: Status::empty(),
            scroll: Scroll::new(),
            timing: Timing::new(),
            vram: Vram::new(),
            oam: Oam::new(),
            secondary_oam: SecondaryOam::new(),
            evaluator: SpriteEvaluator::default(),
            background: Background::new(),
            sprites: SpriteUnits::default(),
            read_buffer: 0,
            open_bus: 0,
            warmup_dots: WARMUP_DOTS,
            suppress_vblank: false,
            nmi_request: false,
            frame_ready: false,
            master_palette,
            frame: vec![0; FRAME_WIDTH * FRAME_HEIGHT],
        }
    }

    /// Swap in a different master palette.
    pub fn set_master_palette(&mut self, master_palette: MasterPalette) {
        self.master_palette = master_palette;
    }

    /// Return all registers and counters to their reset state. Memories
    /// survive, as on the hardware.
    pub fn reset(&mut self) {
        self.ctrl = Ctrl::empty();
        self.mask = Mask::empty();
        self.status = Status::empty();
        self.scroll = Scroll::new();
        self.timing = Timing::new();
        self.secondary_oam.clear();
        self.evaluator.begin();
        self.background.clear();
        self.sprites.clear();
        self.read_buffer = 0;
        self.open_bus = 0;
        self.warmup_dots = WARMUP_DOTS;
        self.suppress_vblank = false;
        self.nmi_request = false;
        self.frame_ready = false;
    }

    // ------------------------------------------------------------------
    // CPU-facing registers
    // ------------------------------------------------------------------

    /// Read a CPU-visible register (0x2000-0x2007, pre-masked by the bus).
    pub fn read_register(&mut self, addr: u16, bus: &mut impl PpuBus) -> u8 {
        match addr & 0x07 {
            // PPUSTATUS: flags in the top bits, open bus below.
            2 => {
                let value = (self.status.bits() & 0xE0) | (self.open_bus & 0x1F);

                // Race: a read landing on the VBlank-set dot keeps the
                // flag (and the NMI) from appearing this frame; a read
                // just after cancels only the NMI.
                if self.timing.scanline() == VBLANK_LINE {
                    match self.timing.dot() {
                        0 | 1 => {
                            log::trace!("PPUSTATUS read raced the VBlank set dot; frame loses flag and NMI");
                            self.suppress_vblank = true;
                            self.nmi_request = false;
                        }
                        2 | 3 => self.nmi_request = false,
                        _ => {}
                    }
                }

                self.status.remove(Status::VBLANK);
                self.scroll.clear_toggle();
                self.open_bus = value;
                value
            }
            // OAMDATA: reads mid-render see the 0xFF initialization bus.
            4 => {
                let value = if self.rendering_actively() {
                    0xFF
                } else {
                    self.oam.read()
                };
                self.open_bus = value;
                value
            }
            // PPUDATA: buffered, except the palette which answers at once.
            7 => {
                let addr = self.scroll.bus_addr();
                let value = if addr >= 0x3F00 {
                    // Buffer still refills from the nametable underneath.
                    self.read_buffer = self.nametable_read(bus, addr);
                    (self.vram.read_palette(addr)) | (self.open_bus & 0xC0)
                } else {
                    let buffered = self.read_buffer;
                    self.read_buffer = self.memory_read(bus, addr);
                    buffered
                };
                self.scroll.step(self.ctrl.vram_increment());
                self.open_bus = value;
                value
            }
            // Everything else is write-only: open bus.
            _ => self.open_bus,
        }
    }

    /// Write a CPU-visible register.
    pub fn write_register(&mut self, addr: u16, value: u8, bus: &mut impl PpuBus) {
        self.open_bus = value;
        let warming_up = self.warmup_dots > 0;

        match addr & 0x07 {
            0 => {
                if warming_up {
                    return;
                }
                let was_enabled = self.ctrl.nmi_enabled();
                self.ctrl = Ctrl::from_bits_truncate(value);
                self.scroll.write_ctrl(value);
                if self.ctrl.nmi_enabled() {
                    // Turning NMI on inside VBlank fires one immediately.
                    if !was_enabled && self.status.contains(Status::VBLANK) {
                        self.nmi_request = true;
                    }
                } else {
                    self.nmi_request = false;
                }
            }
            1 => {
                if !warming_up {
                    self.mask = Mask::from_bits_truncate(value);
                }
            }
            2 => {} // PPUSTATUS is read-only
            3 => self.oam.set_addr(value),
            4 => {
                // Dropped while rendering; the hardware corrupts instead,
                // which nothing depends on.
                if !self.rendering_actively() {
                    self.oam.write(value);
                }
            }
            5 => {
                if !warming_up {
                    self.scroll.write_scroll(value);
                }
            }
            6 => {
                if !warming_up {
                    self.scroll.write_addr(value);
                }
            }
            _ => {
                let addr = self.scroll.bus_addr();
                if addr >= 0x3F00 {
                    self.vram.write_palette(addr, value);
                } else {
                    self.memory_write(bus, addr, value);
                }
                self.scroll.step(self.ctrl.vram_increment());
            }
        }
    }

    /// OAM store during DMA; `offset` counts from the current OAMADDR.
    pub fn write_oam_dma(&mut self, offset: u8, value: u8) {
        self.oam.dma_write(offset, value);
    }

    /// Rendering enabled and inside the frame's active portion.
    fn rendering_actively(&self) -> bool {
        self.mask.rendering_enabled() && self.timing.on_render_line()
    }

    // ------------------------------------------------------------------
    // VRAM routing
    // ------------------------------------------------------------------

    fn nametable_read(&mut self, bus: &mut impl PpuBus, addr: u16) -> u8 {
        match resolve_nametable(bus.mirroring(), addr) {
            NametableTarget::Internal(offset) => self.vram.read_nametable(offset),
            NametableTarget::Cartridge(offset) => bus.read_ext_nametable(offset),
        }
    }

    fn nametable_write(&mut self, bus: &mut impl PpuBus, addr: u16, value: u8) {
        match resolve_nametable(bus.mirroring(), addr) {
            NametableTarget::Internal(offset) => self.vram.write_nametable(offset, value),
            NametableTarget::Cartridge(offset) => bus.write_ext_nametable(offset, value),
        }
    }

    fn memory_read(&mut self, bus: &mut impl PpuBus, addr: u16) -> u8 {
        match addr & 0x3FFF {
            0x0000..=0x1FFF => bus.read_chr(addr & 0x1FFF),
            _ => self.nametable_read(bus, addr),
        }
    }

    fn memory_write(&mut self, bus: &mut impl PpuBus, addr: u16, value: u8) {
        match addr & 0x3FFF {
            0x0000..=0x1FFF => bus.write_chr(addr & 0x1FFF, value),
            _ => self.nametable_write(bus, addr, value),
        }
    }

    // ------------------------------------------------------------------
    // Dot pipeline
    // ------------------------------------------------------------------

    /// Advance one dot.
    pub fn tick(&mut self, bus: &mut impl PpuBus) {
        if self.warmup_dots > 0 {
            self.warmup_dots -= 1;
        }

        let dot = self.timing.dot();
        let scanline = self.timing.scanline();
        let rendering = self.mask.rendering_enabled();

        if scanline == VBLANK_LINE && dot == 1 {
            self.frame_ready = true;
            if self.suppress_vblank {
                self.suppress_vblank = false;
            } else {
                self.status.insert(Status::VBLANK);
                if self.ctrl.nmi_enabled() {
                    self.nmi_request = true;
                }
            }
        }

        if scanline == PRE_RENDER_LINE && dot == 1 {
            self.status
                .remove(Status::VBLANK | Status::SPRITE_ZERO_HIT | Status::SPRITE_OVERFLOW);
            self.suppress_vblank = false;
        }

        if self.timing.on_render_line() {
            if rendering {
                self.render_dot(bus, scanline, dot);
            }
            if scanline >= 0 && (1..=256).contains(&dot) {
                self.emit_pixel(scanline as usize, dot);
                if rendering {
                    self.sprites.tick();
                }
            }
        }

        self.timing.advance(rendering);
    }

    /// All per-dot pipeline work on visible and pre-render lines.
    fn render_dot(&mut self, bus: &mut impl PpuBus, scanline: i16, dot: u16) {
        let fetch_window = (1..=256).contains(&dot) || (321..=336).contains(&dot);

        if (2..=257).contains(&dot) || (322..=337).contains(&dot) {
            self.background.shift();
        }
        if ((9..=257).contains(&dot) && dot % 8 == 1) || dot == 329 || dot == 337 {
            self.background.reload();
        }

        if fetch_window {
            match dot % 8 {
                1 => {
                    let addr = self.scroll.tile_addr();
                    self.background.tile_index = self.nametable_read(bus, addr);
                }
                3 => {
                    let addr = self.scroll.attribute_addr();
                    let byte = self.nametable_read(bus, addr);
                    self.background
                        .latch_attribute(byte, self.scroll.coarse_x(), self.scroll.coarse_y());
                }
                5 => {
                    let addr = self.background_pattern_addr();
                    let byte = bus.read_chr(addr);
                    self.background.latch_pattern_low(byte);
                }
                7 => {
                    let addr = self.background_pattern_addr() + 8;
                    let byte = bus.read_chr(addr);
                    self.background.latch_pattern_high(byte);
                }
                0 => {
                    self.scroll.increment_coarse_x();
                    if dot == 256 {
                        self.scroll.increment_fine_y();
                    }
                }
                _ => {}
            }
        }

        // Spurious nametable fetches closing out the line.
        if dot == 338 || dot == 340 {
            let addr = self.scroll.tile_addr();
            let _ = self.nametable_read(bus, addr);
        }

        if dot == 257 {
            self.scroll.copy_horizontal();
            if scanline >= 0 {
                let zero = self.evaluator.sprite_zero_in_range();
                self.sprites.load_line(&self.secondary_oam, zero);
            } else {
                // Nothing was evaluated on the pre-render line, so line 0
                // starts without sprites.
                self.sprites.clear();
            }
        }

        if scanline == PRE_RENDER_LINE && (280..=304).contains(&dot) {
            self.scroll.copy_vertical();
        }

        if (257..=320).contains(&dot) {
            // OAMADDR is pinned to zero throughout the sprite fetches.
            self.oam.set_addr(0);

            if scanline >= 0 && (dot - 257) % 8 == 7 {
                let slot = ((dot - 257) / 8) as usize;
                if let Some(sprite) = self.secondary_oam.get(slot) {
                    let row = (scanline - i16::from(sprite.y)).clamp(0, 15) as u8;
                    let addr = sprite_pattern_addr(
                        sprite.tile,
                        row,
                        self.ctrl.sprite_height() == 16,
                        self.ctrl.sprite_table_base(),
                        sprite.flip_vertical(),
                    );
                    let lo = bus.read_chr(addr);
                    let hi = bus.read_chr(addr + 8);
                    self.sprites.load_pattern(slot, lo, hi);
                }
            }
        }

        if scanline >= 0 {
            if dot == 1 {
                self.secondary_oam.clear();
                self.evaluator.begin();
            }
            if (65..=256).contains(&dot) {
                self.evaluator.step(
                    &self.oam,
                    scanline,
                    self.ctrl.sprite_height(),
                    &mut self.secondary_oam,
                );
                if self.evaluator.overflow() {
                    self.status.insert(Status::SPRITE_OVERFLOW);
                }
            }
        }

        // Mapper scanline counter, in place of true A12 edge tracking.
        if dot == 260 && self.mask.contains(Mask::SHOW_BACKGROUND) {
            bus.count_scanline();
        }
    }

    fn background_pattern_addr(&self) -> u16 {
        self.ctrl.background_table_base()
            + u16::from(self.background.tile_index) * 16
            + u16::from(self.scroll.fine_y())
    }

    /// Multiplex background and sprite pixels into the frame buffer.
    fn emit_pixel(&mut self, y: usize, dot: u16) {
        let x = dot - 1;

        let (bg_pixel, bg_palette) = if self.mask.background_at(x) {
            self.background.sample(self.scroll.fine_x())
        } else {
            (0, 0)
        };
        let sprite = if self.mask.sprites_at(x) {
            self.sprites.sample()
        } else {
            None
        };

        let palette_addr = match (bg_pixel, sprite) {
            (0, None) => 0x3F00,
            (0, Some((pixel, palette, _, _))) => {
                0x3F00 + (u16::from(palette) << 2) + u16::from(pixel)
            }
            (_, None) => 0x3F00 + (u16::from(bg_palette) << 2) + u16::from(bg_pixel),
            (_, Some((pixel, palette, behind, is_zero))) => {
                if is_zero && x != 255 {
                    self.status.insert(Status::SPRITE_ZERO_HIT);
                }
                if behind {
                    0x3F00 + (u16::from(bg_palette) << 2) + u16::from(bg_pixel)
                } else {
                    0x3F00 + (u16::from(palette) << 2) + u16::from(pixel)
                }
            }
        };

        let mut color = self.vram.read_palette(palette_addr);
        if self.mask.contains(Mask::GRAYSCALE) {
            color &= 0x30;
        }
        self.frame[y * FRAME_WIDTH + x as usize] = self.master_palette.rgba(color);
    }

    // ------------------------------------------------------------------
    // Host-facing state
    // ------------------------------------------------------------------

    /// Take the pending NMI request, if any.
    pub fn take_nmi(&mut self) -> bool {
        std::mem::take(&mut self.nmi_request)
    }

    /// Take the frame-ready flag raised at VBlank start.
    pub fn take_frame_ready(&mut self) -> bool {
        std::mem::take(&mut self.frame_ready)
    }

    /// The 256x240 RGBA frame buffer.
    #[must_use]
    pub fn frame_buffer(&self) -> &[u32] {
        &self.frame
    }

    /// Current dot (0-340).
    #[must_use]
    pub fn dot(&self) -> u16 {
        self.timing.dot()
    }

    /// Current scanline (-1 to 260).
    #[must_use]
    pub fn scanline(&self) -> i16 {
        self.timing.scanline()
    }

    /// Frames completed since power-on.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.timing.frame()
    }

    // ------------------------------------------------------------------
    // Save states
    // ------------------------------------------------------------------

    /// Capture the architectural and pipeline state.
    #[must_use]
    pub fn snapshot(&self) -> PpuSnapshot {
        PpuSnapshot {
            ctrl: self.ctrl.bits(),
            mask: self.mask.bits(),
            status: self.status.bits(),
            oam_addr: self.oam.addr(),
            open_bus: self.open_bus,
            read_buffer: self.read_buffer,
            scroll: self.scroll,
            timing: self.timing,
            warmup_dots: self.warmup_dots,
            suppress_vblank: self.suppress_vblank,
            nmi_request: self.nmi_request,
            nametables: self.vram.nametable_bytes().to_vec(),
            palette: self.vram.palette_bytes().to_vec(),
            oam: self.oam.bytes().to_vec(),
            background: self.background,
            sprites: self.sprites,
            secondary_oam: self.secondary_oam,
            evaluator: self.evaluator,
            frame: self.frame.clone(),
        }
    }

    /// Restore state captured by [`Ppu::snapshot`].
    pub fn restore(&mut self, snapshot: &PpuSnapshot) {
        self.ctrl = Ctrl::from_bits_truncate(snapshot.ctrl);
        self.mask = Mask::from_bits_truncate(snapshot.mask);
        self.status = Status::from_bits_truncate(snapshot.status);
        self.open_bus = snapshot.open_bus;
        self.read_buffer = snapshot.read_buffer;
        self.scroll = snapshot.scroll;
        self.timing = snapshot.timing;
        self.warmup_dots = snapshot.warmup_dots;
        self.suppress_vblank = snapshot.suppress_vblank;
        self.nmi_request = snapshot.nmi_request;
        self.vram.load(&snapshot.nametables, &snapshot.palette);
        self.oam.load(&snapshot.oam, snapshot.oam_addr);
        self.background = snapshot.background;
        self.sprites = snapshot.sprites;
        self.secondary_oam = snapshot.secondary_oam;
        self.evaluator = snapshot.evaluator;
        let len = snapshot.frame.len().min(self.frame.len());
        self.frame[..len].copy_from_slice(&snapshot.frame[..len]);
        self.frame_ready = false;
    }
}
