//! # References
//! - <https://n64brew.dev/wiki/Peripheral_Interface>

/// PI register block base address
pub const BASE: u32 = 0x0460_0000;

/// PI register block size
pub const SIZE: usize = 0x34;

/// PI register offsets (relative to `BASE`)
pub mod registers {
    pub const DRAM_ADDR: u32 = 0x00;
    pub const CART_ADDR: u32 = 0x04;
    pub const RD_LEN: u32 = 0x08;
    pub const WR_LEN: u32 = 0x0C;
    pub const STATUS: u32 = 0x10;
    pub const BSD_DOM1_LAT: u32 = 0x14;
    pub const BSD_DOM1_PWD: u32 = 0x18;
    pub const BSD_DOM1_PGS: u32 = 0x1C;
    pub const BSD_DOM1_RLS: u32 = 0x20;
    pub const BSD_DOM2_LAT: u32 = 0x24;
    pub const BSD_DOM2_PWD: u32 = 0x28;
    pub const BSD_DOM2_PGS: u32 = 0x2C;
    pub const BSD_DOM2_RLS: u32 = 0x30;
}
