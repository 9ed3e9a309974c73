//! NROM (mapper 0).
//!
//! No banking at all: 16 KiB PRG boards mirror the single bank at 0xC000,
//! 32 KiB boards map flat. CHR is a fixed 8 KiB (ROM or RAM). Mirroring is
//! whatever the header says.

use crate::mapper::{Mapper, MapperRegisters, MapperSnapshot, Mirroring};
use crate::rom::Rom;

/// Mapper 0 board.
#[derive(Debug, Clone)]
pub struct Nrom {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    prg_ram: Vec<u8>,
    mirroring: Mirroring,
    has_battery: bool,
}

impl Nrom {
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
            prg_ram: vec![0; 8 * 1024],
            mirroring: rom.header.mirroring,
            has_battery: rom.header.has_battery,
        }
    }

    fn prg_offset(&self, addr: u16) -> usize {
        // 16 KiB boards appear twice in the 32 KiB window.
        (addr as usize - 0x8000) % self.prg_rom.len()
    }
}

impl Mapper for Nrom {
    fn read_prg(&self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => self.prg_ram[(addr - 0x6000) as usize],
            0x8000..=0xFFFF => self.prg_rom[self.prg_offset(addr)],
            _ => 0xFF,
        }
    }

    fn write_prg(&mut self, addr: u16, value: u8) {
        if let 0x6000..=0x7FFF = addr {
            self.prg_ram[(addr - 0x6000) as usize] = value;
        }
        // No bank-select registers on this board.
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

    fn mapper_number(&self) -> u16 {
        0
    }

    fn mapper_name(&self) -> &'static str {
        "NROM"
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
            mapper_number: 0,
            prg_ram: Some(self.prg_ram.clone()),
            chr_ram: self.chr_is_ram.then(|| self.chr.clone()),
            registers: MapperRegisters::Nrom,
        }
    }

    fn restore(&mut self, snapshot: &MapperSnapshot) -> bool {
        if snapshot.mapper_number != 0 {
            return false;
        }
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

    fn test_rom(prg_banks: u8) -> Rom {
        let prg_size = prg_banks as usize * 16 * 1024;
        let mut prg_rom = vec![0; prg_size];
        for (i, byte) in prg_rom.iter_mut().enumerate() {
            *byte = (i / (16 * 1024)) as u8;
        }
        prg_rom[0] = 0xAA;
        Rom {
            header: RomHeader {
                prg_rom_size: prg_size,
                chr_rom_size: 8 * 1024,
                mapper_number: 0,
                submapper: 0,
                mirroring: Mirroring::Vertical,
                has_battery: false,
                has_trainer: false,
                console_type: 0,
                nes2: false,
                prg_ram_size: 8 * 1024,
                chr_ram_size: 0,
            },
            trainer: None,
            prg_rom,
            chr_rom: vec![0x5A; 8 * 1024],
            hash: 0,
        }
    }

    #[test]
    fn sixteen_kib_board_mirrors_at_c000() {
        let mapper = Nrom::new(&test_rom(1));
        assert_eq!(mapper.read_prg(0x8000), 0xAA);
        assert_eq!(mapper.read_prg(0xC000), 0xAA);
    }

    #[test]
    fn thirty_two_kib_board_maps_flat() {
        let mapper = Nrom::new(&test_rom(2));
        assert_eq!(mapper.read_prg(0x8000), 0xAA);
        assert_eq!(mapper.read_prg(0xC000), 0x01);
    }

    #[test]
    fn prg_writes_are_ignored() {
        let mut mapper = Nrom::new(&test_rom(1));
        mapper.write_prg(0x8000, 0x12);
        assert_eq!(mapper.read_prg(0x8000), 0xAA);
    }

    #[test]
    fn prg_ram_round_trip() {
        let mut mapper = Nrom::new(&test_rom(1));
        mapper.write_prg(0x6000, 0x77);
        assert_eq!(mapper.read_prg(0x6000), 0x77);
    }

    #[test]
    fn chr_rom_rejects_writes() {
        let mut mapper = Nrom::new(&test_rom(1));
        mapper.write_chr(0x0000, 0x12);
        assert_eq!(mapper.read_chr(0x0000), 0x5A);
    }

    #[test]
    fn snapshot_round_trip() {
        let mut mapper = Nrom::new(&test_rom(1));
        mapper.write_prg(0x6010, 0x99);
        let snapshot = mapper.snapshot();

        let mut fresh = Nrom::new(&test_rom(1));
        assert!(fresh.restore(&snapshot));
        assert_eq!(fresh.read_prg(0x6010), 0x99);
    }
}
