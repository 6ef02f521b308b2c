//! # References
//! - <https://n64brew.dev/wiki/Video_Interface>

/// VI register block base address
pub const BASE: u32 = 0x0440_0000;

/// VI register block size (14 registers)
pub const SIZE: usize = 0x38;

/// VI register offsets (relative to `BASE`)
pub mod registers {
    pub const CTRL: u32 = 0x00;
    /// Framebuffer origin in RDRAM
    pub const ORIGIN: u32 = 0x04;
    pub const WIDTH: u32 = 0x08;
    pub const V_INTR: u32 = 0x0C;
    pub const V_CURRENT: u32 = 0x10;
    pub const BURST: u32 = 0x14;
    pub const V_SYNC: u32 = 0x18;
    pub const H_SYNC: u32 = 0x1C;
    pub const H_SYNC_LEAP: u32 = 0x20;
    pub const H_VIDEO: u32 = 0x24;
    pub const V_VIDEO: u32 = 0x28;
    pub const V_BURST: u32 = 0x2C;
    pub const X_SCALE: u32 = 0x30;
    pub const Y_SCALE: u32 = 0x34;
}
