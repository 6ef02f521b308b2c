//! # References
//! - <https://n64brew.dev/wiki/Audio_Interface>

/// AI register block base address
pub const BASE: u32 = 0x0450_0000;

/// AI register block size
pub const SIZE: usize = 0x18;

/// AI register offsets (relative to `BASE`)
pub mod registers {
    pub const DRAM_ADDR: u32 = 0x00;
    pub const LENGTH: u32 = 0x04;
    pub const CONTROL: u32 = 0x08;
    pub const STATUS: u32 = 0x0C;
    pub const DACRATE: u32 = 0x10;
    pub const BITRATE: u32 = 0x14;
}
