//! MMC3 (mapper 4).
//!
//! Eight bank registers (R0–R7) programmed through an even/odd register
//! pair at 0x8000/0x8001: the even write picks the target register and the
//! PRG/CHR layout flags, the odd write sets its value. R0/R1 are 2 KiB CHR
//! banks, R2–R5 are 1 KiB CHR banks (window assignment flips with CHR
//! inversion), R6/R7 are switchable 8 KiB PRG banks.
//!
//! The IRQ unit is a scanline down-counter clocked by the PPU once per
//! rendered line (dot 260). Writes: 0xC000 latch, 0xC001 clear + reload,
//! 0xE000 disable + acknowledge, 0xE001 enable.

use crate::mapper::{Mapper, MapperRegisters, MapperSnapshot, Mirroring};
use crate::rom::Rom;

/// Mapper 4 board.
#[derive(Debug, Clone)]
pub struct Mmc3 {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    prg_ram: Vec<u8>,
    /// PRG bank count in 8 KiB units.
    prg_banks: usize,
    /// CHR bank count in 1 KiB units.
    chr_banks: usize,
    has_battery: bool,
    four_screen: bool,

    bank_select: u8,
    prg_mode: bool,
    chr_inversion: bool,
    registers: [u8; 8],
    horizontal_mirroring: bool,

    irq_latch: u8,
    irq_counter: u8,
    irq_reload: bool,
    irq_enabled: bool,
    irq_pending: bool,
}

impl Mmc3 {
    /// Build from a parsed ROM.
    #[must_use]
    pub fn new(rom: &Rom) -> Self {
        let chr_is_ram = rom.chr_rom.is_empty();
        let chr = if chr_is_ram {
            vec![0; rom.header.chr_ram_size.max(8 * 1024)]
        } else {
            rom.chr_rom.clone()
        };
        Self {
            prg_rom: rom.prg_rom.clone(),
            chr_banks: (chr.len() / 1024).max(1),
            chr,
            chr_is_ram,
            prg_ram: vec![0; 8 * 1024],
            prg_banks: (rom.prg_rom.len() / (8 * 1024)).max(1),
            has_battery: rom.header.has_battery,
            four_screen: rom.header.mirroring == Mirroring::FourScreen,
            bank_select: 0,
            prg_mode: false,
            chr_inversion: false,
            registers: [0, 2, 4, 5, 6, 7, 0, 1],
            horizontal_mirroring: rom.header.mirroring == Mirroring::Horizontal,
            irq_latch: 0,
            irq_counter: 0,
            irq_reload: false,
            irq_enabled: false,
            irq_pending: false,
        }
    }

    fn prg_offset(&self, addr: u16) -> usize {
        let second_last = self.prg_banks.saturating_sub(2);
        let bank = match addr {
            0x8000..=0x9FFF => {
                if self.prg_mode {
                    second_last
                } else {
                    (self.registers[6] & 0x3F) as usize
                }
            }
            0xA000..=0xBFFF => (self.registers[7] & 0x3F) as usize,
            0xC000..=0xDFFF => {
                if self.prg_mode {
                    (self.registers[6] & 0x3F) as usize
                } else {
                    second_last
                }
            }
            _ => self.prg_banks - 1,
        };
        (bank % self.prg_banks) * 8 * 1024 + (addr & 0x1FFF) as usize
    }

    fn chr_offset(&self, addr: u16) -> usize {
        let addr = (addr & 0x1FFF) as usize;
        // With inversion clear, the 2 KiB banks cover 0x0000-0x0FFF and the
        // 1 KiB banks cover 0x1000-0x1FFF; inversion swaps the halves.
        let half = addr >> 12;
        let wide_half = usize::from(self.chr_inversion);
        let bank = if half == wide_half {
            // 2 KiB windows from R0/R1, low selector bit ignored.
            let slot = (addr & 0x0FFF) >> 11;
            (self.registers[slot] & 0xFE) as usize + ((addr >> 10) & 1)
        } else {
            // 1 KiB windows from R2-R5.
            let slot = (addr & 0x0FFF) >> 10;
            self.registers[2 + slot] as usize
        };
        (bank % self.chr_banks) * 1024 + (addr & 0x03FF)
    }

    /// One scanline clock: reload on zero or pending reload, else count
    /// down; assert the IRQ line when the counter reaches zero while
    /// enabled.
    fn clock_irq(&mut self) {
        if self.irq_counter == 0 || self.irq_reload {
            self.irq_counter = self.irq_latch;
            self.irq_reload = false;
        } else {
            self.irq_counter -= 1;
        }
        if self.irq_counter == 0 && self.irq_enabled {
            self.irq_pending = true;
        }
    }
}

impl Mapper for Mmc3 {
    fn read_prg(&self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => self.prg_ram[(addr - 0x6000) as usize],
            0x8000..=0xFFFF => {
                let offset = self.prg_offset(addr);
                self.prg_rom.get(offset).copied().unwrap_or(0xFF)
            }
            _ => 0xFF,
        }
    }

    fn write_prg(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF => self.prg_ram[(addr - 0x6000) as usize] = value,
            0x8000..=0x9FFF => {
                if addr & 1 == 0 {
                    self.bank_select = value & 0x07;
                    self.prg_mode = value & 0x40 != 0;
                    self.chr_inversion = value & 0x80 != 0;
                } else {
                    self.registers[self.bank_select as usize] = value;
                }
            }
            0xA000..=0xBFFF => {
                if addr & 1 == 0 {
                    // Ignored on four-screen boards, which hard-wire VRAM.
                    self.horizontal_mirroring = value & 1 != 0;
                }
                // Odd writes are PRG-RAM protect; not modeled beyond accepting them.
            }
            0xC000..=0xDFFF => {
                if addr & 1 == 0 {
                    self.irq_latch = value;
                } else {
                    self.irq_counter = 0;
                    self.irq_reload = true;
                }
            }
            0xE000..=0xFFFF => {
                if addr & 1 == 0 {
                    self.irq_enabled = false;
                    self.irq_pending = false;
                } else {
                    self.irq_enabled = true;
                }
            }
            _ => {}
        }
    }

    fn read_chr(&self, addr: u16) -> u8 {
        let offset = self.chr_offset(addr);
        self.chr.get(offset).copied().unwrap_or(0xFF)
    }

    fn write_chr(&mut self, addr: u16, value: u8) {
        if self.chr_is_ram {
            let offset = self.chr_offset(addr);
            if let Some(byte) = self.chr.get_mut(offset) {
                *byte = value;
            }
        }
    }

    fn mirroring(&self) -> Mirroring {
        if self.four_screen {
            Mirroring::FourScreen
        } else if self.horizontal_mirroring {
            Mirroring::Horizontal
        } else {
            Mirroring::Vertical
        }
    }

    fn irq_pending(&self) -> bool {
        self.irq_pending
    }

    fn irq_acknowledge(&mut self) {
        self.irq_pending = false;
    }

    fn count_scanline(&mut self) {
        self.clock_irq();
    }

    fn reset(&mut self) {
        self.bank_select = 0;
        self.prg_mode = false;
        self.chr_inversion = false;
        self.registers = [0, 2, 4, 5, 6, 7, 0, 1];
        self.irq_latch = 0;
        self.irq_counter = 0;
        self.irq_reload = false;
        self.irq_enabled = false;
        self.irq_pending = false;
    }

    fn mapper_number(&self) -> u16 {
        4
    }

    fn mapper_name(&self) -> &'static str {
        "MMC3"
    }

    fn has_battery(&self) -> bool {
        self.has_battery
    }

    fn prg_ram(&self) -> Option<&[u8]> {
        Some(&self.prg_ram)
    }

    fn load_prg_ram(&mut self, data: &[u8]) {
        let len = data.len().min(self.prg_ram.len());
        self.prg_ram[..len].copy_from_slice(&data[..len]);
    }

    fn snapshot(&self) -> MapperSnapshot {
        MapperSnapshot {
            mapper_number: 4,
            prg_ram: Some(self.prg_ram.clone()),
            chr_ram: self.chr_is_ram.then(|| self.chr.clone()),
            registers: MapperRegisters::Mmc3 {
                bank_select: self.bank_select,
                prg_mode: self.prg_mode,
                chr_inversion: self.chr_inversion,
                registers: self.registers,
                horizontal_mirroring: self.horizontal_mirroring,
                irq_latch: self.irq_latch,
                irq_counter: self.irq_counter,
                irq_reload: self.irq_reload,
                irq_enabled: self.irq_enabled,
                irq_pending: self.irq_pending,
            },
        }
    }

    fn restore(&mut self, snapshot: &MapperSnapshot) -> bool {
        let MapperRegisters::Mmc3 {
            bank_select,
            prg_mode,
            chr_inversion,
            registers,
            horizontal_mirroring,
            irq_latch,
            irq_counter,
            irq_reload,
            irq_enabled,
            irq_pending,
        } = snapshot.registers
        else {
            return false;
        };
        self.bank_select = bank_select;
        self.prg_mode = prg_mode;
        self.chr_inversion = chr_inversion;
        self.registers = registers;
        self.horizontal_mirroring = horizontal_mirroring;
        self.irq_latch = irq_latch;
        self.irq_counter = irq_counter;
        self.irq_reload = irq_reload;
        self.irq_enabled = irq_enabled;
        self.irq_pending = irq_pending;
        if let Some(prg_ram) = &snapshot.prg_ram {
            self.load_prg_ram(prg_ram);
        }
        if self.chr_is_ram {
            if let Some(chr_ram) = &snapshot.chr_ram {
                let len = chr_ram.len().min(self.chr.len());
                self.chr[..len].copy_from_slice(&chr_ram[..len]);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom::RomHeader;

    fn test_rom(prg_banks_8k: u8, chr_banks_1k: u8) -> Rom {
        let prg_size = prg_banks_8k as usize * 8 * 1024;
        let chr_size = chr_banks_1k as usize * 1024;
        let mut prg_rom = vec![0; prg_size];
        for (i, byte) in prg_rom.iter_mut().enumerate() {
            *byte = (i / (8 * 1024)) as u8;
        }
        let mut chr_rom = vec![0; chr_size];
        for (i, byte) in chr_rom.iter_mut().enumerate() {
            *byte = (i / 1024) as u8;
        }
        Rom {
            header: RomHeader {
                prg_rom_size: prg_size,
                chr_rom_size: chr_size,
                mapper_number: 4,
                submapper: 0,
                mirroring: Mirroring::Vertical,
                has_battery: true,
                has_trainer: false,
                console_type: 0,
                nes2: false,
                prg_ram_size: 8 * 1024,
                chr_ram_size: 0,
            },
            trainer: None,
            prg_rom,
            chr_rom,
            hash: 0,
        }
    }

    #[test]
    fn power_on_prg_layout() {
        let mapper = Mmc3::new(&test_rom(32, 32));
        assert_eq!(mapper.read_prg(0x8000), 0);
        assert_eq!(mapper.read_prg(0xA000), 1);
        assert_eq!(mapper.read_prg(0xC000), 30);
        assert_eq!(mapper.read_prg(0xE000), 31);
    }

    #[test]
    fn prg_bank_switch_via_r6() {
        let mut mapper = Mmc3::new(&test_rom(32, 32));
        mapper.write_prg(0x8000, 6);
        mapper.write_prg(0x8001, 5);
        assert_eq!(mapper.read_prg(0x8000), 5);
    }

    #[test]
    fn prg_mode_swaps_windows() {
        let mut mapper = Mmc3::new(&test_rom(32, 32));
        mapper.write_prg(0x8000, 6);
        mapper.write_prg(0x8001, 5);
        mapper.write_prg(0x8000, 0x46); // PRG mode 1, target still R6
        assert_eq!(mapper.read_prg(0x8000), 30);
        assert_eq!(mapper.read_prg(0xC000), 5);
    }

    #[test]
    fn chr_layout_without_inversion() {
        let mut mapper = Mmc3::new(&test_rom(32, 32));
        mapper.write_prg(0x8000, 0); // R0: 2 KiB at 0x0000
        mapper.write_prg(0x8001, 9); // low bit ignored -> bank 8
        mapper.write_prg(0x8000, 2); // R2: 1 KiB at 0x1000
        mapper.write_prg(0x8001, 20);
        assert_eq!(mapper.read_chr(0x0000), 8);
        assert_eq!(mapper.read_chr(0x0400), 9);
        assert_eq!(mapper.read_chr(0x1000), 20);
    }

    #[test]
    fn chr_inversion_swaps_halves() {
        let mut mapper = Mmc3::new(&test_rom(32, 32));
        mapper.write_prg(0x8000, 0x80); // inversion on, target R0
        mapper.write_prg(0x8001, 8);
        // R0's 2 KiB window now sits at 0x1000.
        assert_eq!(mapper.read_chr(0x1000), 8);
        assert_eq!(mapper.read_chr(0x1400), 9);
        // 1 KiB windows moved down; R2 still holds its power-on value 4.
        assert_eq!(mapper.read_chr(0x0000), 4);
    }

    #[test]
    fn mirroring_control() {
        let mut mapper = Mmc3::new(&test_rom(32, 32));
        assert_eq!(mapper.mirroring(), Mirroring::Vertical);
        mapper.write_prg(0xA000, 0x01);
        assert_eq!(mapper.mirroring(), Mirroring::Horizontal);
        mapper.write_prg(0xA000, 0x00);
        assert_eq!(mapper.mirroring(), Mirroring::Vertical);
    }

    #[test]
    fn irq_counts_scanlines() {
        let mut mapper = Mmc3::new(&test_rom(32, 32));
        mapper.write_prg(0xC000, 3); // latch
        mapper.write_prg(0xC001, 0); // reload
        mapper.write_prg(0xE001, 0); // enable

        for _ in 0..3 {
            mapper.count_scanline();
            assert!(!mapper.irq_pending());
        }
        mapper.count_scanline();
        assert!(mapper.irq_pending());

        mapper.irq_acknowledge();
        assert!(!mapper.irq_pending());
    }

    #[test]
    fn irq_disable_acknowledges() {
        let mut mapper = Mmc3::new(&test_rom(32, 32));
        mapper.write_prg(0xC000, 1);
        mapper.write_prg(0xC001, 0);
        mapper.write_prg(0xE001, 0);
        mapper.count_scanline();
        mapper.count_scanline();
        assert!(mapper.irq_pending());
        mapper.write_prg(0xE000, 0);
        assert!(!mapper.irq_pending());
    }

    #[test]
    fn snapshot_round_trip() {
        let mut mapper = Mmc3::new(&test_rom(32, 32));
        mapper.write_prg(0x8000, 6);
        mapper.write_prg(0x8001, 5);
        mapper.write_prg(0xC000, 8);
        mapper.write_prg(0xE001, 0);
        mapper.write_prg(0x6000, 0x42);
        let snapshot = mapper.snapshot();

        let mut fresh = Mmc3::new(&test_rom(32, 32));
        assert!(fresh.restore(&snapshot));
        assert_eq!(fresh.read_prg(0x8000), 5);
        assert_eq!(fresh.read_prg(0x6000), 0x42);
        assert!(!fresh.irq_pending());
    }
}
