//! # References
//! - <https://n64brew.dev/wiki/RDRAM_Interface>

/// RI register block base address
pub const BASE: u32 = 0x0470_0000;

/// RI register block size
pub const SIZE: usize = 0x20;

/// RI register offsets (relative to `BASE`)
pub mod registers {
    pub const MODE: u32 = 0x00;
    pub const CONFIG: u32 = 0x04;
    pub const CURRENT_LOAD: u32 = 0x08;
    pub const SELECT: u32 = 0x0C;
    pub const REFRESH: u32 = 0x10;
    pub const LATENCY: u32 = 0x14;
    pub const ERROR: u32 = 0x18;
    pub const BANK_STATUS: u32 = 0x1C;
}
