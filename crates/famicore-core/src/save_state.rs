//! Save states: a complete, versioned snapshot of the machine keyed by
//! the ROM's FNV-1a hash.
//!
//! The byte stream is JSON of the [`SaveState`] structure. Loading checks
//! the format version and the ROM hash before touching anything, so a
//! rejected file leaves the running state exactly as it was.

use serde::{Deserialize, Serialize};

use famicore_cpu::CpuSnapshot;
use famicore_mappers::MapperSnapshot;
use famicore_ppu::PpuSnapshot;

use crate::bus::DmaState;
use crate::console::Console;
use crate::input::ControllerPort;

/// Save-state format version.
pub const SAVE_STATE_VERSION: u32 = 1;

/// Errors raised while decoding or applying a save state.
#[derive(Debug, thiserror::Error)]
pub enum SaveStateError {
    /// The byte stream is not a valid state file.
    #[error("malformed save state: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The file was written by an incompatible core version.
    #[error("save state version {found} unsupported (current {SAVE_STATE_VERSION})")]
    VersionMismatch {
        /// Version recorded in the file.
        found: u32,
    },

    /// The file belongs to a different ROM.
    #[error("save state is for ROM {expected:016x}, loaded ROM is {actual:016x}")]
    RomMismatch {
        /// Hash recorded in the file.
        expected: u64,
        /// Hash of the loaded ROM.
        actual: u64,
    },

    /// The mapper snapshot does not match the loaded board.
    #[error("save state mapper does not match the loaded cartridge")]
    MapperMismatch,
}

/// Everything needed to resume execution exactly where it stopped.
#[derive(Debug, Serialize, Deserialize)]
pub struct SaveState {
    version: u32,
    rom_hash: u64,
    cpu: CpuSnapshot,
    ppu: PpuSnapshot,
    mapper: MapperSnapshot,
    ram: Vec<u8>,
    ext_nametables: Vec<u8>,
    controllers: [ControllerPort; 2],
    dma: Option<DmaState>,
    bus_cycles: u64,
}

impl SaveState {
    /// Snapshot a running console.
    #[must_use]
    pub fn capture(console: &Console) -> Self {
        let (cpu, bus, rom_hash) = console.state_parts();
        Self {
            version: SAVE_STATE_VERSION,
            rom_hash,
            cpu: cpu.snapshot(),
            ppu: bus.ppu.snapshot(),
            mapper: bus.mapper.snapshot(),
            ram: bus.ram_bytes().to_vec(),
            ext_nametables: bus.ext_nametable_bytes().to_vec(),
            controllers: [*bus.controller(0), *bus.controller(1)],
            dma: bus.dma_state(),
            bus_cycles: bus.cycles(),
        }
    }

    /// Apply to a console running the same ROM.
    ///
    /// # Errors
    ///
    /// [`SaveStateError`] on version, hash, or mapper mismatch; the
    /// console is untouched in every error case.
    pub fn apply(&self, console: &mut Console) -> Result<(), SaveStateError> {
        if self.version != SAVE_STATE_VERSION {
            return Err(SaveStateError::VersionMismatch {
                found: self.version,
            });
        }
        let (cpu, bus, rom_hash) = console.state_parts_mut();
        if self.rom_hash != rom_hash {
            return Err(SaveStateError::RomMismatch {
                expected: self.rom_hash,
                actual: rom_hash,
            });
        }
        if !bus.mapper.restore(&self.mapper) {
            return Err(SaveStateError::MapperMismatch);
        }

        cpu.restore(&self.cpu);
        bus.ppu.restore(&self.ppu);
        bus.load_ram(&self.ram);
        bus.load_ext_nametables(&self.ext_nametables);
        *bus.controller_mut(0) = self.controllers[0];
        *bus.controller_mut(1) = self.controllers[1];
        bus.set_dma_state(self.dma);
        bus.set_cycles(self.bus_cycles);
        Ok(())
    }

    /// Serialize to the opaque byte stream.
    ///
    /// # Errors
    ///
    /// [`SaveStateError::Encoding`] if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SaveStateError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a byte stream produced by [`SaveState::to_bytes`].
    ///
    /// # Errors
    ///
    /// [`SaveStateError::Encoding`] for malformed data,
    /// [`SaveStateError::VersionMismatch`] for incompatible files.
    pub fn from_bytes(data: &[u8]) -> Result<Self, SaveStateError> {
        let state: Self = serde_json::from_slice(data)?;
        if state.version != SAVE_STATE_VERSION {
            return Err(SaveStateError::VersionMismatch {
                found: state.version,
            });
        }
        Ok(state)
    }

    /// ROM hash recorded in this state.
    #[must_use]
    pub fn rom_hash(&self) -> u64 {
        self.rom_hash
    }
}
