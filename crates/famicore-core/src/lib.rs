//! famicore-core: the integration layer tying CPU, PPU, cartridge, and
//! input together behind a single [`Console`].
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                      Console                          │
//! │  ┌─────────────────────────────────────────────────┐  │
//! │  │                   SystemBus                     │  │
//! │  │  ┌─────┐  ┌─────┐  ┌────────┐  ┌─────────────┐  │  │
//! │  │  │ RAM │  │ PPU │  │ Mapper │  │ Controllers │  │  │
//! │  │  │ 2KB │  │     │  │        │  │             │  │  │
//! │  │  └─────┘  └─────┘  └────────┘  └─────────────┘  │  │
//! │  └─────────────────────────────────────────────────┘  │
//! │                         ▲                             │
//! │                    ┌────┴────┐                        │
//! │                    │   CPU   │                        │
//! │                    └─────────┘                        │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! The bus owns every peripheral; the CPU borrows the bus per call, and
//! each bus access interleaves three PPU dots, so there are no stored
//! cross-references anywhere.
//!
//! # Usage
//!
//! ```no_run
//! use famicore_core::{input::buttons, Console};
//!
//! let rom = std::fs::read("game.nes").expect("read ROM");
//! let mut console = Console::new(&rom).expect("load ROM");
//!
//! console.set_frame_hook(|frame| {
//!     // 256x240 RGBA pixels, once per VBlank.
//!     let _ = frame.len();
//! });
//!
//! loop {
//!     console.set_controller(0, buttons::A | buttons::RIGHT);
//!     console.step_frame();
//! }
//! ```

pub mod audio;
mod bus;
mod console;
pub mod input;
mod save_state;

pub use audio::AudioPort;
pub use bus::SystemBus;
pub use console::{timing, Console, ConsoleError};
pub use input::ControllerPort;
pub use save_state::{SaveState, SaveStateError, SAVE_STATE_VERSION};

// Re-export the component crates' main types.
pub use famicore_cpu::{Cpu, Status};
pub use famicore_mappers::{create_mapper, Mapper, Mirroring, Rom, RomError, RomHeader};
pub use famicore_ppu::{MasterPalette, PaletteError, Ppu};

/// Screen geometry.
pub mod screen {
    /// Width in pixels.
    pub const WIDTH: usize = 256;
    /// Height in pixels.
    pub const HEIGHT: usize = 240;
    /// Pixels per frame.
    pub const PIXELS: usize = WIDTH * HEIGHT;
}
