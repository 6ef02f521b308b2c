//! Memory-mapped register blocks of the RCP.
//!
//! Each device gets a fixed-size block. Most blocks are plain latches; the
//! serial interface is the exception, because writing one of its address
//! registers starts a PIF transfer that has to complete before the write
//! returns.
//!
//! # Memory Map
//! - `0x04300000-0x04300010`: MIPS interface (MI)
//! - `0x04400000-0x04400038`: Video interface (VI)
//! - `0x04500000-0x04500018`: Audio interface (AI)
//! - `0x04600000-0x04600034`: Peripheral interface (PI)
//! - `0x04700000-0x04700020`: RDRAM interface (RI)
//! - `0x04800000-0x0480001C`: Serial interface (SI)

pub mod generic;
pub mod mi;
pub mod pif;
pub mod si;

use n64bridge_hw::mmio as hw_mmio;

pub use generic::RegisterBlock;
pub use mi::MipsInterface;
pub use si::{SerialInterface, Transfer};

/// Devices that own a register block on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    Vi,
    Ai,
    Pi,
    Ri,
    Si,
    Mi,
}

impl Device {
    /// Devices in dispatch order
    pub const ALL: [Device; 6] = [
        Device::Vi,
        Device::Ai,
        Device::Pi,
        Device::Ri,
        Device::Si,
        Device::Mi,
    ];

    pub fn base(self) -> u32 {
        match self {
            Device::Vi => hw_mmio::vi::BASE,
            Device::Ai => hw_mmio::ai::BASE,
            Device::Pi => hw_mmio::pi::BASE,
            Device::Ri => hw_mmio::ri::BASE,
            Device::Si => hw_mmio::si::BASE,
            Device::Mi => hw_mmio::mi::BASE,
        }
    }

    pub fn size(self) -> usize {
        match self {
            Device::Vi => hw_mmio::vi::SIZE,
            Device::Ai => hw_mmio::ai::SIZE,
            Device::Pi => hw_mmio::pi::SIZE,
            Device::Ri => hw_mmio::ri::SIZE,
            Device::Si => hw_mmio::si::SIZE,
            Device::Mi => hw_mmio::mi::SIZE,
        }
    }
}

/// Register state of every device on the bus
#[derive(Debug)]
pub struct DeviceState {
    pub vi: RegisterBlock,
    pub ai: RegisterBlock,
    pub pi: RegisterBlock,
    pub ri: RegisterBlock,
    pub si: SerialInterface,
    pub mi: MipsInterface,
}

impl DeviceState {
    #[expect(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            vi: RegisterBlock::new("VI", hw_mmio::vi::SIZE),
            ai: RegisterBlock::new("AI", hw_mmio::ai::SIZE),
            pi: RegisterBlock::new("PI", hw_mmio::pi::SIZE),
            ri: RegisterBlock::new("RI", hw_mmio::ri::SIZE),
            si: SerialInterface::new(),
            mi: MipsInterface::new(),
        }
    }
}
