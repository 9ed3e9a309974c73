//! The console: CPU plus system bus, driven one clock at a time.

use famicore_cpu::{trace, Cpu};
use famicore_mappers::{create_mapper, Rom, RomError};
use famicore_ppu::MasterPalette;

use crate::audio::AudioPort;
use crate::bus::SystemBus;
use crate::save_state::{SaveState, SaveStateError};

/// NTSC timing constants.
pub mod timing {
    /// Master clock frequency.
    pub const MASTER_CLOCK: u32 = 21_477_272;
    /// CPU clock frequency (master / 12).
    pub const CPU_CLOCK: u32 = MASTER_CLOCK / 12;
    /// PPU dot clock frequency (master / 4).
    pub const DOT_CLOCK: u32 = MASTER_CLOCK / 4;
    /// CPU cycles per frame, rounded.
    pub const CPU_CYCLES_PER_FRAME: u32 = 29_780;
}

/// Errors surfaced while building or driving a console.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    /// The ROM could not be parsed or uses an unsupported mapper.
    #[error(transparent)]
    Rom(#[from] RomError),
}

/// A complete NES core: 6502, picture processor, cartridge, input.
pub struct Console {
    cpu: Cpu,
    bus: SystemBus,
    rom_hash: u64,
    frame_hook: Option<Box<dyn FnMut(&[u32]) + Send>>,
    frame_crossed: bool,
}

impl Console {
    /// Build a console from a raw iNES file.
    ///
    /// # Errors
    ///
    /// [`ConsoleError::Rom`] when the file is malformed or the mapper is
    /// unsupported.
    pub fn new(rom_data: &[u8]) -> Result<Self, ConsoleError> {
        let rom = Rom::load(rom_data)?;
        Self::from_rom(&rom)
    }

    /// Build a console from an already-parsed ROM.
    ///
    /// # Errors
    ///
    /// [`ConsoleError::Rom`] for unsupported mappers.
    pub fn from_rom(rom: &Rom) -> Result<Self, ConsoleError> {
        let mapper = create_mapper(rom)?;
        let mut console = Self {
            cpu: Cpu::new(),
            bus: SystemBus::new(mapper),
            rom_hash: rom.hash,
            frame_hook: None,
            frame_crossed: false,
        };
        console.cpu.reset(&mut console.bus);
        Ok(console)
    }

    /// Reset every component to its documented power state and rerun the
    /// CPU reset sequence.
    pub fn reset(&mut self) {
        self.bus.reset();
        self.cpu.reset(&mut self.bus);
    }

    /// One clock: a single DMA cycle while a transfer is draining,
    /// otherwise one full CPU instruction. Interrupt lines settle
    /// afterwards, so an NMI raised mid-instruction lands exactly at the
    /// next fetch boundary. Returns CPU cycles consumed.
    pub fn clock(&mut self) -> u32 {
        let start = self.bus.cycles();

        if self.bus.dma_active() {
            self.bus.dma_step();
            if !self.bus.dma_active() {
                self.cpu.notify_dma();
            }
        } else {
            self.cpu.step(&mut self.bus);
        }

        if self.bus.ppu.take_nmi() {
            self.cpu.trigger_nmi();
        }
        self.cpu.set_irq(self.bus.mapper.irq_pending());

        self.frame_crossed = self.bus.ppu.take_frame_ready();
        if self.frame_crossed {
            if let Some(hook) = &mut self.frame_hook {
                hook(self.bus.ppu.frame_buffer());
            }
        }

        (self.bus.cycles() - start) as u32
    }

    /// The previous [`Console::clock`] call crossed a VBlank start.
    #[must_use]
    pub fn frame_completed(&self) -> bool {
        self.frame_crossed
    }

    /// Run until the next VBlank start. Returns CPU cycles consumed.
    pub fn step_frame(&mut self) -> u64 {
        let start = self.bus.cycles();
        loop {
            self.clock();
            if self.frame_crossed {
                break;
            }
        }
        self.bus.cycles() - start
    }

    /// Install the frame callback invoked at each VBlank start with the
    /// 256x240 RGBA buffer.
    pub fn set_frame_hook(&mut self, hook: impl FnMut(&[u32]) + Send + 'static) {
        self.frame_hook = Some(Box::new(hook));
    }

    /// Install the external audio collaborator.
    pub fn set_audio_port(&mut self, audio: Box<dyn AudioPort>) {
        self.bus.set_audio_port(audio);
    }

    /// Swap the master palette used for frame output.
    pub fn set_palette(&mut self, palette: MasterPalette) {
        self.bus.ppu.set_master_palette(palette);
    }

    /// Feed a controller port its per-frame button byte.
    pub fn set_controller(&mut self, port: usize, buttons: u8) {
        self.bus.controller_mut(port).set_buttons(buttons);
    }

    /// Current frame buffer (256x240 RGBA).
    #[must_use]
    pub fn frame_buffer(&self) -> &[u32] {
        self.bus.ppu.frame_buffer()
    }

    /// FNV-1a hash of the loaded ROM file.
    #[must_use]
    pub fn rom_hash(&self) -> u64 {
        self.rom_hash
    }

    /// The CPU, for inspection.
    #[must_use]
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// The CPU, mutable (test harnesses force PC here).
    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    /// The bus, for inspection.
    #[must_use]
    pub fn bus(&self) -> &SystemBus {
        &self.bus
    }

    /// The bus, mutable.
    pub fn bus_mut(&mut self) -> &mut SystemBus {
        &mut self.bus
    }

    /// Battery-backed PRG-RAM contents, if the board has any.
    #[must_use]
    pub fn battery_ram(&self) -> Option<&[u8]> {
        if self.bus.mapper.has_battery() {
            self.bus.mapper.prg_ram()
        } else {
            None
        }
    }

    /// Load battery-backed PRG-RAM from a host save file.
    pub fn load_battery_ram(&mut self, data: &[u8]) {
        self.bus.mapper.load_prg_ram(data);
    }

    /// Golden-log trace line for the instruction at the current PC.
    #[must_use]
    pub fn trace_line(&self) -> String {
        let bus = &self.bus;
        trace::trace_line(
            &self.cpu,
            |addr| bus.peek(addr),
            bus.ppu.scanline(),
            bus.ppu.dot(),
        )
    }

    /// Capture a complete save state.
    #[must_use]
    pub fn save_state(&self) -> SaveState {
        SaveState::capture(self)
    }

    /// Restore a save state. Refuses hash, version, or mapper mismatches,
    /// leaving the running state untouched.
    ///
    /// # Errors
    ///
    /// [`SaveStateError`] describing the mismatch.
    pub fn load_state(&mut self, state: &SaveState) -> Result<(), SaveStateError> {
        state.apply(self)
    }

    pub(crate) fn state_parts(&self) -> (&Cpu, &SystemBus, u64) {
        (&self.cpu, &self.bus, self.rom_hash)
    }

    pub(crate) fn state_parts_mut(&mut self) -> (&mut Cpu, &mut SystemBus, u64) {
        (&mut self.cpu, &mut self.bus, self.rom_hash)
    }
}
