//! The `Mapper` trait and shared cartridge-side types.
//!
//! A mapper is the cartridge-resident state machine that decides which PRG
//! and CHR banks are visible, controls nametable mirroring, and may raise an
//! IRQ. The bus forwards every CPU access in 0x4020–0xFFFF and every PPU
//! pattern-table access here.

/// Nametable mirroring mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mirroring {
    /// Horizontal mirroring: $2000/$2400 share, $2800/$2C00 share.
    #[default]
    Horizontal,
    /// Vertical mirroring: $2000/$2800 share, $2400/$2C00 share.
    Vertical,
    /// Single-screen, low bank.
    SingleScreenLower,
    /// Single-screen, high bank.
    SingleScreenUpper,
    /// Four unique nametables; the upper pair lives on the cartridge.
    FourScreen,
}

/// Mapper-specific register file captured in a save state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MapperRegisters {
    /// Mapper 0 has no registers.
    Nrom,
    /// Mapper 1 serial port and bank selectors.
    Mmc1 {
        /// Serial shift register contents.
        shift: u8,
        /// Bits shifted in so far (0–4).
        shift_count: u8,
        /// Control register (mirroring, PRG mode, CHR mode).
        control: u8,
        /// CHR bank for the low 4 KiB window.
        chr_bank_0: u8,
        /// CHR bank for the high 4 KiB window.
        chr_bank_1: u8,
        /// PRG bank selector.
        prg_bank: u8,
    },
    /// Mapper 2 bank selector.
    Uxrom {
        /// Switchable low 16 KiB PRG bank.
        prg_bank: u8,
    },
    /// Mapper 3 bank selector.
    Cnrom {
        /// 8 KiB CHR bank.
        chr_bank: u8,
    },
    /// Mapper 4 bank selectors and IRQ unit.
    Mmc3 {
        /// Which of R0–R7 the next odd write targets.
        bank_select: u8,
        /// PRG banking mode bit.
        prg_mode: bool,
        /// CHR A12 inversion bit.
        chr_inversion: bool,
        /// R0–R7.
        registers: [u8; 8],
        /// Current mirroring (cartridge-controlled).
        horizontal_mirroring: bool,
        /// IRQ reload latch.
        irq_latch: u8,
        /// IRQ down-counter.
        irq_counter: u8,
        /// Reload requested.
        irq_reload: bool,
        /// IRQ generation enabled.
        irq_enabled: bool,
        /// IRQ line asserted.
        irq_pending: bool,
    },
}

/// Snapshot of everything a mapper must carry across a save state:
/// writable memories plus the register file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MapperSnapshot {
    /// iNES mapper number, used to reject mismatched snapshots.
    pub mapper_number: u16,
    /// PRG-RAM contents, when the board has any.
    pub prg_ram: Option<Vec<u8>>,
    /// CHR-RAM contents, when CHR is RAM.
    pub chr_ram: Option<Vec<u8>>,
    /// Register file.
    pub registers: MapperRegisters,
}

/// Cartridge mapper interface.
///
/// Reads never fail: a request the board cannot satisfy (no CHR for the
/// offset, disabled PRG-RAM) comes back as 0xFF, the open-bus value.
pub trait Mapper: Send {
    /// Read from CPU address space (0x4020–0xFFFF).
    fn read_prg(&self, addr: u16) -> u8;

    /// Write to CPU address space (0x4020–0xFFFF). Writes into
    /// 0x8000–0xFFFF drive the bank-select machinery.
    fn write_prg(&mut self, addr: u16, value: u8);

    /// Read from PPU pattern space (0x0000–0x1FFF).
    fn read_chr(&self, addr: u16) -> u8;

    /// Write to PPU pattern space. Only effective with CHR-RAM boards.
    fn write_chr(&mut self, addr: u16, value: u8);

    /// Current nametable mirroring.
    fn mirroring(&self) -> Mirroring;

    /// Level state of the mapper's IRQ line.
    fn irq_pending(&self) -> bool {
        false
    }

    /// Acknowledge the IRQ (drop the line).
    fn irq_acknowledge(&mut self) {}

    /// Scanline tick from the PPU (dot 260 of rendering lines). Mapper 4
    /// clocks its IRQ counter here.
    fn count_scanline(&mut self) {}

    /// Return to power-on register state. Memories are preserved.
    fn reset(&mut self) {}

    /// iNES mapper number.
    fn mapper_number(&self) -> u16;

    /// Human-readable board name.
    fn mapper_name(&self) -> &'static str;

    /// Whether PRG-RAM is battery-backed.
    fn has_battery(&self) -> bool {
        false
    }

    /// PRG-RAM contents for battery saves.
    fn prg_ram(&self) -> Option<&[u8]> {
        None
    }

    /// Load PRG-RAM contents from a battery save.
    fn load_prg_ram(&mut self, _data: &[u8]) {}

    /// Capture mapper state for a save state.
    fn snapshot(&self) -> MapperSnapshot;

    /// Restore state captured by [`Mapper::snapshot`]. Returns false (and
    /// changes nothing) when the snapshot belongs to a different mapper.
    fn restore(&mut self, snapshot: &MapperSnapshot) -> bool;
}
