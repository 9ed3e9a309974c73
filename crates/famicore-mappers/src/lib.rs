//! Cartridge parsing and mapper implementations for famicore.
//!
//! Handles the iNES/NES 2.0 file format and the bank-switching boards the
//! core supports:
//!
//! | Mapper | Board | Notes |
//! |--------|-------|-------|
//! | 0 | NROM  | fixed mapping |
//! | 1 | MMC1  | serial-port banking, mirroring control |
//! | 2 | UxROM | 16 KiB PRG banking |
//! | 3 | CNROM | 8 KiB CHR banking |
//! | 4 | MMC3  | 8 KiB PRG / 1-2 KiB CHR banking, scanline IRQ |
//!
//! # Example
//!
//! ```no_run
//! use famicore_mappers::{create_mapper, Rom};
//!
//! let data = std::fs::read("game.nes").expect("read ROM");
//! let rom = Rom::load(&data).expect("parse ROM");
//! let mapper = create_mapper(&rom).expect("supported mapper");
//! let reset_lo = mapper.read_prg(0xFFFC);
//! ```

mod cnrom;
pub mod mapper;
mod mmc1;
mod mmc3;
mod nrom;
pub mod rom;
mod uxrom;

pub use cnrom::Cnrom;
pub use mapper::{Mapper, MapperRegisters, MapperSnapshot, Mirroring};
pub use mmc1::Mmc1;
pub use mmc3::Mmc3;
pub use nrom::Nrom;
pub use rom::{fnv1a_hash, Rom, RomError, RomHeader};
pub use uxrom::Uxrom;

/// Mapper numbers this crate implements.
pub const SUPPORTED_MAPPERS: &[u16] = &[0, 1, 2, 3, 4];

/// Build the mapper for a parsed ROM.
///
/// # Errors
///
/// [`RomError::UnsupportedMapper`] for mapper numbers outside
/// [`SUPPORTED_MAPPERS`].
pub fn create_mapper(rom: &Rom) -> Result<Box<dyn Mapper>, RomError> {
    match rom.header.mapper_number {
        0 => Ok(Box::new(Nrom::new(rom))),
        1 => Ok(Box::new(Mmc1::new(rom))),
        2 => Ok(Box::new(Uxrom::new(rom))),
        3 => Ok(Box::new(Cnrom::new(rom))),
        4 => Ok(Box::new(Mmc3::new(rom))),
        n => Err(RomError::UnsupportedMapper(n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with_mapper(mapper: u16) -> Rom {
        Rom {
            header: RomHeader {
                prg_rom_size: 32 * 1024,
                chr_rom_size: 8 * 1024,
                mapper_number: mapper,
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
            prg_rom: vec![0; 32 * 1024],
            chr_rom: vec![0; 8 * 1024],
            hash: 0,
        }
    }

    #[test]
    fn creates_each_supported_mapper() {
        for &number in SUPPORTED_MAPPERS {
            let mapper = create_mapper(&rom_with_mapper(number)).unwrap();
            assert_eq!(mapper.mapper_number(), number);
        }
    }

    #[test]
    fn rejects_unknown_mapper() {
        let result = create_mapper(&rom_with_mapper(66));
        assert!(matches!(result, Err(RomError::UnsupportedMapper(66))));
    }

    #[test]
    fn snapshots_reject_cross_mapper_restore() {
        let nrom_snapshot = create_mapper(&rom_with_mapper(0)).unwrap().snapshot();
        let mut mmc1 = create_mapper(&rom_with_mapper(1)).unwrap();
        assert!(!mmc1.restore(&nrom_snapshot));
    }
}
