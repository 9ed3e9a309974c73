//! UxROM (mapper 2).
//!
//! Any write into 0x8000–0xFFFF selects the 16 KiB PRG bank visible at
//! 0x8000; the bank at 0xC000 is hard-wired to the last one. CHR is a fixed
//! 8 KiB, almost always RAM on these boards.

use crate::mapper::{Mapper, MapperRegisters, MapperSnapshot, Mirroring};
use crate::rom::Rom;

/// Mapper 2 board.
#[derive(Debug, Clone)]
pub struct Uxrom {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    prg_banks: usize,
    prg_bank: u8,
    mirroring: Mirroring,
}

impl Uxrom {
    /// Build from a parsed ROM.
    #[must_use]
    pub fn new(rom: &Rom) -> Self {
        let chr_is_ram = rom.chr_rom.is_empty();
        Self {
            prg_rom: rom.prg_rom.clone(),
            chr: if chr_is_ram {
                vec![0; rom.header.chr_ram_size.max(8 * 1024)]
            } else {
                rom.chr_rom.clone()
            },
            chr_is_ram,
            prg_banks: (rom.prg_rom.len() / (16 * 1024)).max(1),
            prg_bank: 0,
            mirroring: rom.header.mirroring,
        }
    }
}

impl Mapper for Uxrom {
    fn read_prg(&self, addr: u16) -> u8 {
        let offset = match addr {
            0x8000..=0xBFFF => {
                (self.prg_bank as usize % self.prg_banks) * 16 * 1024 + (addr as usize - 0x8000)
            }
            0xC000..=0xFFFF => {
                (self.prg_banks - 1) * 16 * 1024 + (addr as usize - 0xC000)
            }
            _ => return 0xFF,
        };
        self.prg_rom.get(offset).copied().unwrap_or(0xFF)
    }

    fn write_prg(&mut self, addr: u16, value: u8) {
        if addr >= 0x8000 {
            self.prg_bank = value;
        }
    }

    fn read_chr(&self, addr: u16) -> u8 {
        self.chr.get((addr & 0x1FFF) as usize).copied().unwrap_or(0xFF)
    }

    fn write_chr(&mut self, addr: u16, value: u8) {
        if self.chr_is_ram {
            if let Some(byte) = self.chr.get_mut((addr & 0x1FFF) as usize) {
                *byte = value;
            }
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn reset(&mut self) {
        self.prg_bank = 0;
    }

    fn mapper_number(&self) -> u16 {
        2
    }

    fn mapper_name(&self) -> &'static str {
        "UxROM"
    }

    fn snapshot(&self) -> MapperSnapshot {
        MapperSnapshot {
            mapper_number: 2,
            prg_ram: None,
            chr_ram: self.chr_is_ram.then(|| self.chr.clone()),
            registers: MapperRegisters::Uxrom {
                prg_bank: self.prg_bank,
            },
        }
    }

    fn restore(&mut self, snapshot: &MapperSnapshot) -> bool {
        let MapperRegisters::Uxrom { prg_bank } = snapshot.registers else {
            return false;
        };
        self.prg_bank = prg_bank;
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

    fn test_rom(prg_banks: u8) -> Rom {
        let prg_size = prg_banks as usize * 16 * 1024;
        let mut prg_rom = vec![0; prg_size];
        for (i, byte) in prg_rom.iter_mut().enumerate() {
            *byte = (i / (16 * 1024)) as u8;
        }
        Rom {
            header: RomHeader {
                prg_rom_size: prg_size,
                chr_rom_size: 0,
                mapper_number: 2,
                submapper: 0,
                mirroring: Mirroring::Vertical,
                has_battery: false,
                has_trainer: false,
                console_type: 0,
                nes2: false,
                prg_ram_size: 0,
                chr_ram_size: 8 * 1024,
            },
            trainer: None,
            prg_rom,
            chr_rom: Vec::new(),
            hash: 0,
        }
    }

    #[test]
    fn low_window_switches() {
        let mut mapper = Uxrom::new(&test_rom(8));
        assert_eq!(mapper.read_prg(0x8000), 0);
        mapper.write_prg(0x8000, 3);
        assert_eq!(mapper.read_prg(0x8000), 3);
        mapper.write_prg(0xFFFF, 5);
        assert_eq!(mapper.read_prg(0x8000), 5);
    }

    #[test]
    fn high_window_is_fixed_to_last_bank() {
        let mut mapper = Uxrom::new(&test_rom(8));
        assert_eq!(mapper.read_prg(0xC000), 7);
        mapper.write_prg(0x8000, 3);
        assert_eq!(mapper.read_prg(0xC000), 7);
    }

    #[test]
    fn bank_select_wraps_to_bank_count() {
        let mut mapper = Uxrom::new(&test_rom(4));
        mapper.write_prg(0x8000, 6);
        assert_eq!(mapper.read_prg(0x8000), 2);
    }

    #[test]
    fn chr_ram_is_writable() {
        let mut mapper = Uxrom::new(&test_rom(2));
        mapper.write_chr(0x0123, 0x42);
        assert_eq!(mapper.read_chr(0x0123), 0x42);
    }
}
