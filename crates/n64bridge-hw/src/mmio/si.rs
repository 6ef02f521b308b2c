//! # References
//! - <https://n64brew.dev/wiki/Serial_Interface>

/// SI register block base address
pub const BASE: u32 = 0x0480_0000;

/// SI register block size
pub const SIZE: usize = 0x1C;

/// SI register offsets (relative to `BASE`)
pub mod registers {
    /// RDRAM address used by the next PIF transfer
    pub const DRAM_ADDR: u32 = 0x00;
    /// Writing here copies PIF RAM into RDRAM (64 bytes)
    pub const PIF_AD_RD64B: u32 = 0x04;
    /// Writing here copies RDRAM into PIF RAM (64 bytes)
    pub const PIF_AD_WR64B: u32 = 0x10;
    /// Status; any write acknowledges the SI interrupt
    pub const STATUS: u32 = 0x18;
}

/// Number of bytes moved by one PIF transfer
pub const TRANSFER_SIZE: usize = 64;

/// Bits in `SI_STATUS`
pub mod status {
    pub const DMA_BUSY: u32 = 1 << 0;
    pub const IO_BUSY: u32 = 1 << 1;
    pub const DMA_ERROR: u32 = 1 << 3;
    pub const INTERRUPT: u32 = 1 << 12;
}
