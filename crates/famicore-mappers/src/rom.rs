//! iNES / NES 2.0 ROM file parsing.
//!
//! ```text
//! Byte 0-3:   Magic "NES" + MS-DOS EOF (4E 45 53 1A)
//! Byte 4:     PRG-ROM size in 16 KiB units (LSB in NES 2.0)
//! Byte 5:     CHR-ROM size in 8 KiB units (LSB in NES 2.0)
//! Byte 6:     Flags 6: mirroring, battery, trainer, four-screen, mapper low nibble
//! Byte 7:     Flags 7: console type, NES 2.0 marker, mapper high nibble
//! Byte 8:     Mapper MSB + submapper (NES 2.0) / PRG-RAM size (iNES)
//! Byte 9:     PRG/CHR size MSBs (NES 2.0)
//! Byte 10-11: PRG/CHR (NV)RAM size nibbles (NES 2.0)
//! ```
//!
//! Every loaded ROM also carries a 64-bit FNV-1a hash of the whole file,
//! which keys save states and battery files.

use crate::mapper::Mirroring;

/// Errors raised while parsing a ROM file.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RomError {
    /// File shorter than the 16-byte header.
    #[error("ROM file too small: expected at least 16 bytes, got {0}")]
    FileTooSmall(usize),

    /// Header magic is not `NES\x1A`.
    #[error("invalid iNES magic: expected [4E 45 53 1A], got {0:02X?}")]
    InvalidMagic([u8; 4]),

    /// PRG-ROM size field is zero.
    #[error("PRG-ROM size cannot be zero")]
    EmptyPrgRom,

    /// File is shorter than the header-declared layout.
    #[error("ROM file truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes the header promises.
        expected: usize,
        /// Bytes actually present.
        actual: usize,
    },

    /// Mapper number with no implementation in this crate.
    #[error("unsupported mapper {0}")]
    UnsupportedMapper(u16),
}

/// 64-bit FNV-1a over a byte slice.
#[must_use]
pub fn fnv1a_hash(data: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01B3;

    let mut hash = OFFSET_BASIS;
    for &byte in data {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Parsed 16-byte ROM header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomHeader {
    /// PRG-ROM size in bytes (multiple of 16 KiB).
    pub prg_rom_size: usize,
    /// CHR-ROM size in bytes (0 means the board carries CHR-RAM).
    pub chr_rom_size: usize,
    /// Mapper number (8-bit in iNES, 12-bit in NES 2.0).
    pub mapper_number: u16,
    /// Submapper (NES 2.0 only, else 0).
    pub submapper: u8,
    /// Header-declared nametable mirroring.
    pub mirroring: Mirroring,
    /// Battery-backed PRG-RAM present.
    pub has_battery: bool,
    /// 512-byte trainer precedes PRG-ROM.
    pub has_trainer: bool,
    /// Console type bits from flags 7 (0 = regular NES).
    pub console_type: u8,
    /// Header is NES 2.0.
    pub nes2: bool,
    /// PRG-RAM size in bytes.
    pub prg_ram_size: usize,
    /// CHR-RAM size in bytes (when `chr_rom_size` is 0).
    pub chr_ram_size: usize,
}

impl RomHeader {
    const MAGIC: [u8; 4] = [0x4E, 0x45, 0x53, 0x1A];

    /// Parse the first 16 bytes of a ROM file.
    ///
    /// # Errors
    ///
    /// [`RomError::FileTooSmall`], [`RomError::InvalidMagic`], or
    /// [`RomError::EmptyPrgRom`].
    pub fn parse(data: &[u8]) -> Result<Self, RomError> {
        if data.len() < 16 {
            return Err(RomError::FileTooSmall(data.len()));
        }
        let magic = [data[0], data[1], data[2], data[3]];
        if magic != Self::MAGIC {
            return Err(RomError::InvalidMagic(magic));
        }

        let nes2 = data[7] & 0x0C == 0x08;

        let (mapper_number, submapper) = if nes2 {
            let low = u16::from(data[6] >> 4);
            let mid = u16::from(data[7] & 0xF0);
            let high = u16::from(data[8] & 0x0F);
            (high << 8 | mid | low, data[8] >> 4)
        } else {
            (u16::from((data[7] & 0xF0) | (data[6] >> 4)), 0)
        };

        let (prg_rom_size, chr_rom_size) = if nes2 {
            (
                Self::nes2_size(data[4], data[9] & 0x0F, 16 * 1024),
                Self::nes2_size(data[5], data[9] >> 4, 8 * 1024),
            )
        } else {
            (data[4] as usize * 16 * 1024, data[5] as usize * 8 * 1024)
        };
        if prg_rom_size == 0 {
            return Err(RomError::EmptyPrgRom);
        }

        let mirroring = if data[6] & 0x08 != 0 {
            Mirroring::FourScreen
        } else if data[6] & 0x01 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };

        let (prg_ram_size, chr_ram_size) = if nes2 {
            (
                Self::nes2_ram_size(data[10] & 0x0F).max(Self::nes2_ram_size(data[10] >> 4)),
                Self::nes2_ram_size(data[11] & 0x0F).max(Self::nes2_ram_size(data[11] >> 4)),
            )
        } else {
            // iNES byte 8 counts 8 KiB units; zero historically means one.
            let prg_ram = if data[8] == 0 {
                8 * 1024
            } else {
                data[8] as usize * 8 * 1024
            };
            let chr_ram = if chr_rom_size == 0 { 8 * 1024 } else { 0 };
            (prg_ram, chr_ram)
        };

        Ok(Self {
            prg_rom_size,
            chr_rom_size,
            mapper_number,
            submapper,
            mirroring,
            has_battery: data[6] & 0x02 != 0,
            has_trainer: data[6] & 0x04 != 0,
            console_type: data[7] & 0x03,
            nes2,
            prg_ram_size,
            chr_ram_size,
        })
    }

    /// NES 2.0 ROM size: plain MSB:LSB units, or the exponent-multiplier
    /// form when the MSB nibble is 0xF.
    fn nes2_size(lsb: u8, msb: u8, unit: usize) -> usize {
        if msb == 0x0F {
            let exponent = u32::from(lsb >> 2);
            let multiplier = (lsb & 0x03) as usize * 2 + 1;
            multiplier * (1usize << exponent)
        } else {
            ((usize::from(msb) << 8) | usize::from(lsb)) * unit
        }
    }

    /// NES 2.0 RAM size nibble: 64 << n, with 0 meaning none.
    fn nes2_ram_size(field: u8) -> usize {
        if field == 0 {
            0
        } else {
            64 << field
        }
    }
}

/// A parsed ROM file: header, optional trainer, PRG and CHR images, and the
/// FNV-1a hash of the raw file.
#[derive(Debug, Clone)]
pub struct Rom {
    /// Parsed header.
    pub header: RomHeader,
    /// 512-byte trainer, if the header flags one. Retained but unmapped.
    pub trainer: Option<Vec<u8>>,
    /// PRG-ROM image.
    pub prg_rom: Vec<u8>,
    /// CHR-ROM image; empty when the board has CHR-RAM.
    pub chr_rom: Vec<u8>,
    /// FNV-1a hash of the complete file, the save-state key.
    pub hash: u64,
}

impl Rom {
    /// Parse a complete ROM file.
    ///
    /// # Errors
    ///
    /// Any [`RomError`] from header parsing, or [`RomError::Truncated`]
    /// when the file is shorter than the declared PRG/CHR layout.
    pub fn load(data: &[u8]) -> Result<Self, RomError> {
        let header = RomHeader::parse(data)?;
        let mut offset = 16;

        let trainer = if header.has_trainer {
            if data.len() < offset + 512 {
                return Err(RomError::Truncated {
                    expected: offset + 512,
                    actual: data.len(),
                });
            }
            let trainer = data[offset..offset + 512].to_vec();
            offset += 512;
            Some(trainer)
        } else {
            None
        };

        if data.len() < offset + header.prg_rom_size {
            return Err(RomError::Truncated {
                expected: offset + header.prg_rom_size,
                actual: data.len(),
            });
        }
        let prg_rom = data[offset..offset + header.prg_rom_size].to_vec();
        offset += header.prg_rom_size;

        let chr_rom = if header.chr_rom_size > 0 {
            if data.len() < offset + header.chr_rom_size {
                return Err(RomError::Truncated {
                    expected: offset + header.chr_rom_size,
                    actual: data.len(),
                });
            }
            data[offset..offset + header.chr_rom_size].to_vec()
        } else {
            Vec::new()
        };

        let hash = fnv1a_hash(data);
        log::info!(
            "loaded ROM: mapper {} ({} KiB PRG, {} KiB CHR{}), hash {hash:016x}",
            header.mapper_number,
            header.prg_rom_size / 1024,
            header.chr_rom_size / 1024,
            if header.chr_rom_size == 0 { " RAM" } else { "" },
        );

        Ok(Self {
            header,
            trainer,
            prg_rom,
            chr_rom,
            hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn header_bytes(prg: u8, chr: u8, mapper: u8, flags6_low: u8) -> Vec<u8> {
        let mut header = vec![0x4E, 0x45, 0x53, 0x1A];
        header.push(prg);
        header.push(chr);
        header.push((mapper << 4) | flags6_low);
        header.push(mapper & 0xF0);
        header.extend_from_slice(&[0; 8]);
        header
    }

    #[test]
    fn parses_plain_ines_header() {
        let header = RomHeader::parse(&header_bytes(2, 1, 0, 0)).unwrap();
        assert_eq!(header.prg_rom_size, 32 * 1024);
        assert_eq!(header.chr_rom_size, 8 * 1024);
        assert_eq!(header.mapper_number, 0);
        assert_eq!(header.mirroring, Mirroring::Horizontal);
        assert!(!header.nes2);
        assert_eq!(header.chr_ram_size, 0);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = header_bytes(1, 1, 0, 0);
        bytes[0] = 0x4D;
        assert!(matches!(
            RomHeader::parse(&bytes),
            Err(RomError::InvalidMagic(_))
        ));
    }

    #[test]
    fn rejects_short_file() {
        assert!(matches!(
            RomHeader::parse(&[0x4E, 0x45, 0x53]),
            Err(RomError::FileTooSmall(3))
        ));
    }

    #[test]
    fn rejects_zero_prg() {
        assert!(matches!(
            RomHeader::parse(&header_bytes(0, 1, 0, 0)),
            Err(RomError::EmptyPrgRom)
        ));
    }

    #[test]
    fn mapper_number_combines_nibbles() {
        let header = RomHeader::parse(&header_bytes(1, 1, 0x42, 0)).unwrap();
        assert_eq!(header.mapper_number, 0x42);
    }

    #[test]
    fn mirroring_bits() {
        let vertical = RomHeader::parse(&header_bytes(1, 1, 0, 0x01)).unwrap();
        assert_eq!(vertical.mirroring, Mirroring::Vertical);
        let four = RomHeader::parse(&header_bytes(1, 1, 0, 0x08)).unwrap();
        assert_eq!(four.mirroring, Mirroring::FourScreen);
    }

    #[test]
    fn battery_and_trainer_flags() {
        let header = RomHeader::parse(&header_bytes(1, 1, 0, 0x02 | 0x04)).unwrap();
        assert!(header.has_battery);
        assert!(header.has_trainer);
    }

    #[test]
    fn nes2_marker_and_wide_mapper() {
        let mut bytes = header_bytes(1, 1, 0, 0);
        bytes[7] = 0x08; // NES 2.0 marker
        bytes[8] = 0x21; // submapper 2, mapper bits 8-11 = 1
        let header = RomHeader::parse(&bytes).unwrap();
        assert!(header.nes2);
        assert_eq!(header.mapper_number, 0x100);
        assert_eq!(header.submapper, 2);
    }

    #[test]
    fn chr_ram_assumed_when_no_chr_rom() {
        let header = RomHeader::parse(&header_bytes(1, 0, 0, 0)).unwrap();
        assert_eq!(header.chr_rom_size, 0);
        assert_eq!(header.chr_ram_size, 8 * 1024);
    }

    #[test]
    fn load_splits_prg_and_chr() {
        let mut data = header_bytes(1, 1, 0, 0);
        data.extend(std::iter::repeat(0x42).take(16 * 1024));
        data.extend(std::iter::repeat(0x55).take(8 * 1024));
        let rom = Rom::load(&data).unwrap();
        assert_eq!(rom.prg_rom.len(), 16 * 1024);
        assert_eq!(rom.chr_rom.len(), 8 * 1024);
        assert_eq!(rom.prg_rom[0], 0x42);
        assert_eq!(rom.chr_rom[0], 0x55);
        assert_eq!(rom.hash, fnv1a_hash(&data));
    }

    #[test]
    fn load_skips_trainer() {
        let mut data = header_bytes(1, 0, 0, 0x04);
        data.extend(std::iter::repeat(0xAA).take(512));
        data.extend(std::iter::repeat(0x42).take(16 * 1024));
        let rom = Rom::load(&data).unwrap();
        assert_eq!(rom.trainer.as_ref().unwrap().len(), 512);
        assert_eq!(rom.prg_rom[0], 0x42);
    }

    #[test]
    fn load_rejects_truncated_prg() {
        let mut data = header_bytes(2, 1, 0, 0);
        data.extend(std::iter::repeat(0x42).take(1024));
        assert!(matches!(Rom::load(&data), Err(RomError::Truncated { .. })));
    }

    #[test]
    fn fnv1a_known_vectors() {
        // Standard FNV-1a test vectors.
        assert_eq!(fnv1a_hash(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a_hash(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a_hash(b"foobar"), 0x85dd_97c3_2ceb_10d2);
    }
}
