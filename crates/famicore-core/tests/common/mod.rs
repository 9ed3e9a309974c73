//! Shared ROM-image builders for the integration tests.
#![allow(dead_code)] // not every test binary uses every builder

/// Assemble a complete iNES file from PRG and CHR images.
#[must_use]
pub fn build_ines(mapper: u8, mirroring_vertical: bool, prg: &[u8], chr: &[u8]) -> Vec<u8> {
    assert_eq!(prg.len() % (16 * 1024), 0, "PRG must be 16 KiB units");
    assert_eq!(chr.len() % (8 * 1024), 0, "CHR must be 8 KiB units");

    let mut data = vec![0x4E, 0x45, 0x53, 0x1A];
    data.push((prg.len() / (16 * 1024)) as u8);
    data.push((chr.len() / (8 * 1024)) as u8);
    data.push((mapper << 4) | u8::from(mirroring_vertical));
    data.push(mapper & 0xF0);
    data.extend_from_slice(&[0; 8]);
    data.extend_from_slice(prg);
    data.extend_from_slice(chr);
    data
}

/// 16 KiB NROM image: `program` is placed at 0x8000 (mirrored at 0xC000),
/// with the given vectors.
#[must_use]
pub fn nrom_image(program: &[u8], reset: u16, nmi: u16, irq: u16) -> Vec<u8> {
    let mut prg = vec![0xEA; 16 * 1024];
    prg[..program.len()].copy_from_slice(program);
    prg[0x3FFA..0x3FFC].copy_from_slice(&nmi.to_le_bytes());
    prg[0x3FFC..0x3FFE].copy_from_slice(&reset.to_le_bytes());
    prg[0x3FFE..0x4000].copy_from_slice(&irq.to_le_bytes());
    build_ines(0, true, &prg, &vec![0; 8 * 1024])
}
