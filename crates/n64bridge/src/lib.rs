pub mod args;
pub mod cartridge;
pub mod controller;
pub mod foreign;
pub mod injector;
pub mod input;
pub mod locator;
pub mod memory;
pub mod mmio;
pub mod savestate;

// Re-export commonly used types
pub use args::{Args, Command, Target, Width, open_target, parse_hex_or_dec};
pub use cartridge::{Cartridge, EmptySlot, RomCartridge};
pub use controller::{Buttons, ControllerState};
pub use foreign::{
    AttachError, ForeignProcess, ImageProcess, MemoryAccessError, MemoryRegion, ProcessMemory,
    Protection,
};
pub use injector::{ControllerInjector, InjectError};
pub use input::{DiscoveryConfig, InputLocator, MemorySnapshot, ShapeContract, diff_snapshots};
pub use locator::{
    AccessTier, DirectRam, DiscoveredAddress, DiscoveryError, DiscoveryMethod, LocatorConfig,
    RamLocator, RamView, SnapshotRam, translate,
};
pub use memory::AddressSpace;
pub use mmio::DeviceState;
pub use savestate::{MemoryState, SaveState, SaveStateError};
