//! The system bus: address decoding, clock interleaving, and OAM DMA.
//!
//! CPU memory map:
//!
//! ```text
//! 0x0000-0x1FFF  internal RAM, mirrored every 0x800
//! 0x2000-0x3FFF  PPU registers, mirrored every 8
//! 0x4000-0x4013  APU registers (external collaborator)
//! 0x4014         OAM DMA trigger (write only)
//! 0x4015         APU status
//! 0x4016-0x4017  controller ports (reads); 0x4017 write is APU
//! 0x4020-0xFFFF  cartridge (PRG-RAM, PRG-ROM, mapper registers)
//! ```
//!
//! Every [`famicore_cpu::Bus`] access is one CPU cycle: the access is
//! serviced first (reads latch current PPU state, writes apply), then the
//! PPU advances three dots. Unmapped reads float to 0xFF.

use famicore_cpu::Bus;
use famicore_mappers::{Mapper, Mirroring as CartMirroring};
use famicore_ppu::{Mirroring, Ppu, PpuBus};

use crate::audio::AudioPort;
use crate::input::ControllerPort;

/// Translate the cartridge-level mirroring enum into the PPU's.
fn mirroring_for_ppu(mirroring: CartMirroring) -> Mirroring {
    match mirroring {
        CartMirroring::Horizontal => Mirroring::Horizontal,
        CartMirroring::Vertical => Mirroring::Vertical,
        CartMirroring::SingleScreenLower => Mirroring::SingleScreenLower,
        CartMirroring::SingleScreenUpper => Mirroring::SingleScreenUpper,
        CartMirroring::FourScreen => Mirroring::FourScreen,
    }
}

/// PPU-side memory adapter: pattern tables and mirroring from the mapper,
/// four-screen VRAM from the bus, scanline counts into the mapper.
struct PpuMemory<'a> {
    mapper: &'a mut dyn Mapper,
    ext_nametables: &'a mut [u8; 2048],
}

impl PpuBus for PpuMemory<'_> {
    fn read_chr(&mut self, addr: u16) -> u8 {
        self.mapper.read_chr(addr)
    }

    fn write_chr(&mut self, addr: u16, value: u8) {
        self.mapper.write_chr(addr, value);
    }

    fn mirroring(&self) -> Mirroring {
        mirroring_for_ppu(self.mapper.mirroring())
    }

    fn count_scanline(&mut self) {
        self.mapper.count_scanline();
    }

    fn read_ext_nametable(&mut self, offset: u16) -> u8 {
        self.ext_nametables[(offset & 0x07FF) as usize]
    }

    fn write_ext_nametable(&mut self, offset: u16, value: u8) {
        self.ext_nametables[(offset & 0x07FF) as usize] = value;
    }
}

/// OAM DMA progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
enum DmaPhase {
    /// The halt cycle that stops the CPU.
    Halt,
    /// Extra alignment cycle for transfers started on an odd CPU cycle.
    Align,
    /// Fetch the next byte from CPU memory.
    Read,
    /// Store the fetched byte into OAM.
    Write,
}

/// OAM DMA state machine.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct DmaState {
    page: u8,
    offset: u16,
    latch: u8,
    phase: DmaPhase,
    needs_align: bool,
}

/// The system bus owning every peripheral the CPU talks to.
pub struct SystemBus {
    ram: [u8; 2048],
    /// The picture processor.
    pub ppu: Ppu,
    /// The cartridge mapper.
    pub mapper: Box<dyn Mapper>,
    controllers: [ControllerPort; 2],
    audio: Option<Box<dyn AudioPort>>,
    ext_nametables: [u8; 2048],
    dma: Option<DmaState>,
    cycles: u64,
}

impl SystemBus {
    /// Build a bus around a cartridge mapper.
    #[must_use]
    pub fn new(mapper: Box<dyn Mapper>) -> Self {
        Self {
            ram: [0; 2048],
            ppu: Ppu::default(),
            mapper,
            controllers: [ControllerPort::default(); 2],
            audio: None,
            ext_nametables: [0; 2048],
            dma: None,
            cycles: 0,
        }
    }

    /// Install the external audio collaborator.
    pub fn set_audio_port(&mut self, audio: Box<dyn AudioPort>) {
        self.audio = Some(audio);
    }

    /// Controller port access.
    pub fn controller_mut(&mut self, port: usize) -> &mut ControllerPort {
        &mut self.controllers[port & 1]
    }

    /// Controller port access (shared).
    #[must_use]
    pub fn controller(&self, port: usize) -> &ControllerPort {
        &self.controllers[port & 1]
    }

    /// CPU cycles ticked through this bus since power-on.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// A DMA transfer is stealing the CPU.
    #[must_use]
    pub fn dma_active(&self) -> bool {
        self.dma.is_some()
    }

    /// Reset peripherals and counters. Cartridge memories survive.
    pub fn reset(&mut self) {
        self.ram.fill(0);
        self.ppu.reset();
        self.mapper.reset();
        self.controllers = [ControllerPort::default(); 2];
        self.dma = None;
        self.cycles = 0;
    }

    /// Advance the machine by one CPU cycle: three PPU dots, the mapper's
    /// IRQ line settles, and the audio collaborator gets clocked.
    pub(crate) fn tick(&mut self) {
        self.cycles += 1;

        let mut memory = PpuMemory {
            mapper: &mut *self.mapper,
            ext_nametables: &mut self.ext_nametables,
        };
        for _ in 0..3 {
            self.ppu.tick(&mut memory);
        }

        if let Some(mut audio) = self.audio.take() {
            audio.clock();
            if let Some(addr) = audio.dmc_fetch_addr() {
                let value = self.read_raw(addr);
                audio.dmc_supply(value);
            }
            self.audio = Some(audio);
        }
    }

    /// Raw CPU-memory read with no side effects beyond the mapper's
    /// banked view. Used by DMA and DMC fetches.
    fn read_raw(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
            0x4020..=0xFFFF => self.mapper.read_prg(addr),
            _ => 0xFF,
        }
    }

    /// Run one CPU cycle of the OAM DMA state machine.
    pub fn dma_step(&mut self) {
        let Some(mut dma) = self.dma.take() else {
            return;
        };
        match dma.phase {
            DmaPhase::Halt => {
                dma.phase = if dma.needs_align {
                    DmaPhase::Align
                } else {
                    DmaPhase::Read
                };
            }
            DmaPhase::Align => dma.phase = DmaPhase::Read,
            DmaPhase::Read => {
                let addr = (u16::from(dma.page) << 8) | dma.offset;
                dma.latch = self.read_raw(addr);
                dma.phase = DmaPhase::Write;
            }
            DmaPhase::Write => {
                self.ppu.write_oam_dma(dma.offset as u8, dma.latch);
                dma.offset += 1;
                dma.phase = DmaPhase::Read;
            }
        }
        self.tick();

        if !(dma.phase == DmaPhase::Read && dma.offset == 256) {
            self.dma = Some(dma);
        }
    }

    /// DMA snapshot (save states).
    #[must_use]
    pub(crate) fn dma_state(&self) -> Option<DmaState> {
        self.dma
    }

    pub(crate) fn set_dma_state(&mut self, dma: Option<DmaState>) {
        self.dma = dma;
    }

    /// RAM contents (save states).
    #[must_use]
    pub(crate) fn ram_bytes(&self) -> &[u8] {
        &self.ram
    }

    pub(crate) fn load_ram(&mut self, bytes: &[u8]) {
        let len = bytes.len().min(self.ram.len());
        self.ram[..len].copy_from_slice(&bytes[..len]);
    }

    /// Four-screen VRAM contents (save states).
    #[must_use]
    pub(crate) fn ext_nametable_bytes(&self) -> &[u8] {
        &self.ext_nametables
    }

    pub(crate) fn load_ext_nametables(&mut self, bytes: &[u8]) {
        let len = bytes.len().min(self.ext_nametables.len());
        self.ext_nametables[..len].copy_from_slice(&bytes[..len]);
    }

    pub(crate) fn set_cycles(&mut self, cycles: u64) {
        self.cycles = cycles;
    }

    /// Inspect memory without side effects (debugger and trace support).
    /// PPU registers cannot be peeked safely and float to 0xFF.
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
            0x4020..=0xFFFF => self.mapper.read_prg(addr),
            _ => 0xFF,
        }
    }

    fn read_inner(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
            0x2000..=0x3FFF => {
                let mut memory = PpuMemory {
                    mapper: &mut *self.mapper,
                    ext_nametables: &mut self.ext_nametables,
                };
                self.ppu.read_register(addr & 0x2007, &mut memory)
            }
            0x4015 => {
                if let Some(audio) = &mut self.audio {
                    audio.read_status()
                } else {
                    0xFF
                }
            }
            0x4016 => self.controllers[0].read_bit(),
            0x4017 => self.controllers[1].read_bit(),
            0x4000..=0x401F => {
                // Write-only and test-mode registers float.
                log::trace!("open-bus read at {addr:#06X}");
                0xFF
            }
            0x4020..=0xFFFF => self.mapper.read_prg(addr),
        }
    }

    fn write_inner(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize] = value,
            0x2000..=0x3FFF => {
                let mut memory = PpuMemory {
                    mapper: &mut *self.mapper,
                    ext_nametables: &mut self.ext_nametables,
                };
                self.ppu.write_register(addr & 0x2007, value, &mut memory);
            }
            0x4014 => {
                self.dma = Some(DmaState {
                    page: value,
                    offset: 0,
                    latch: 0,
                    phase: DmaPhase::Halt,
                    needs_align: self.cycles & 1 == 1,
                });
            }
            0x4016 => {
                self.controllers[0].write_strobe(value);
                self.controllers[1].write_strobe(value);
            }
            0x4000..=0x4013 | 0x4015 | 0x4017 => {
                if let Some(audio) = &mut self.audio {
                    audio.write_register(addr, value);
                }
            }
            0x4018..=0x401F => {
                log::trace!("dropped write to unmapped {addr:#06X}");
            }
            0x4020..=0xFFFF => self.mapper.write_prg(addr, value),
        }
    }
}

impl Bus for SystemBus {
    fn read(&mut self, addr: u16) -> u8 {
        let value = self.read_inner(addr);
        self.tick();
        value
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.write_inner(addr, value);
        self.tick();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use famicore_mappers::{create_mapper, Rom, RomHeader};

    fn test_bus() -> SystemBus {
        let rom = Rom {
            header: RomHeader {
                prg_rom_size: 32 * 1024,
                chr_rom_size: 8 * 1024,
                mapper_number: 0,
                submapper: 0,
                mirroring: CartMirroring::Vertical,
                has_battery: false,
                has_trainer: false,
                console_type: 0,
                nes2: false,
                prg_ram_size: 8 * 1024,
                chr_ram_size: 0,
            },
            trainer: None,
            prg_rom: vec![0xEA; 32 * 1024],
            chr_rom: vec![0; 8 * 1024],
            hash: 0,
        };
        SystemBus::new(create_mapper(&rom).unwrap())
    }

    #[test]
    fn ram_mirrors_every_two_kib() {
        let mut bus = test_bus();
        bus.write(0x0000, 0x42);
        assert_eq!(bus.read(0x0800), 0x42);
        assert_eq!(bus.read(0x1000), 0x42);
        assert_eq!(bus.read(0x1800), 0x42);

        bus.write(0x1234, 0xAB);
        assert_eq!(bus.read(0x0234), 0xAB);
    }

    #[test]
    fn each_access_advances_three_dots() {
        let mut bus = test_bus();
        let dots_before = u32::from(bus.ppu.dot());
        bus.read(0x0000);
        bus.read(0x0000);
        assert_eq!(u32::from(bus.ppu.dot()), dots_before + 6);
        assert_eq!(bus.cycles(), 2);
    }

    #[test]
    fn ppu_registers_mirror_every_eight() {
        let mut bus = test_bus();
        // OAMADDR/OAMDATA through a distant mirror.
        bus.write(0x3FF3, 0x05);
        bus.write(0x3FF4, 0x66);
        bus.write(0x2003, 0x05);
        assert_eq!(bus.read(0x2004), 0x66);
    }

    #[test]
    fn unmapped_reads_float_high() {
        let mut bus = test_bus();
        assert_eq!(bus.read(0x4014), 0xFF);
        assert_eq!(bus.read(0x4009), 0xFF);
        assert_eq!(bus.read(0x4018), 0xFF);
    }

    #[test]
    fn controller_latch_round_trip() {
        let mut bus = test_bus();
        bus.controller_mut(0).set_buttons(0b1010_1010);
        bus.write(0x4016, 1);
        bus.write(0x4016, 0);
        let bits: Vec<u8> = (0..8).map(|_| bus.read(0x4016) & 1).collect();
        assert_eq!(bits, vec![1, 0, 1, 0, 1, 0, 1, 0]);
    }

    #[test]
    fn dma_takes_513_cycles_from_even_start() {
        let mut bus = test_bus();
        assert_eq!(bus.cycles() & 1, 0);
        bus.write(0x4014, 0x02); // lands on even cycle 0
        let start = bus.cycles();
        let mut steps = 0;
        while bus.dma_active() {
            bus.dma_step();
            steps += 1;
        }
        assert_eq!(steps, 513);
        assert_eq!(bus.cycles() - start, 513);
    }

    #[test]
    fn dma_takes_514_cycles_from_odd_start() {
        let mut bus = test_bus();
        bus.read(0x0000); // cycle count now odd
        assert_eq!(bus.cycles() & 1, 1);
        bus.write(0x4014, 0x02);
        let mut steps = 0;
        while bus.dma_active() {
            bus.dma_step();
            steps += 1;
        }
        assert_eq!(steps, 514);
    }

    #[test]
    fn dma_copies_a_page_into_oam() {
        let mut bus = test_bus();
        for i in 0..256u16 {
            bus.write(0x0200 + i, i as u8);
        }
        bus.write(0x2003, 0x00); // OAMADDR = 0
        bus.write(0x4014, 0x02);
        while bus.dma_active() {
            bus.dma_step();
        }
        bus.write(0x2003, 0x10);
        // Byte 0x10 of the page; attribute bytes are masked in OAM.
        assert_eq!(bus.read(0x2004), 0x10);
        bus.write(0x2003, 0x12);
        assert_eq!(bus.read(0x2004), 0x12 & 0xE3);
    }

    #[test]
    fn dma_honors_oam_addr_offset() {
        let mut bus = test_bus();
        bus.write(0x0200, 0x77);
        bus.write(0x2003, 0x80); // start mid-OAM
        bus.write(0x4014, 0x02);
        while bus.dma_active() {
            bus.dma_step();
        }
        bus.write(0x2003, 0x80);
        assert_eq!(bus.read(0x2004), 0x77);
    }

    #[test]
    fn cartridge_space_reaches_the_mapper() {
        let mut bus = test_bus();
        assert_eq!(bus.read(0x8000), 0xEA);
        bus.write(0x6000, 0x12);
        assert_eq!(bus.read(0x6000), 0x12);
    }

    #[test]
    fn peek_has_no_side_effects() {
        let mut bus = test_bus();
        bus.write(0x0100, 0x42);
        let cycles = bus.cycles();
        assert_eq!(bus.peek(0x0100), 0x42);
        assert_eq!(bus.peek(0x0900), 0x42);
        assert_eq!(bus.cycles(), cycles);
    }
}
