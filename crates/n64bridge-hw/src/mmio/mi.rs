//! # References
//! - <https://n64brew.dev/wiki/MIPS_Interface>

/// MI register block base address
pub const BASE: u32 = 0x0430_0000;

/// MI register block size
pub const SIZE: usize = 0x10;

/// MI register offsets (relative to `BASE`)
pub mod registers {
    /// Init mode / misc control
    pub const MODE: u32 = 0x00;
    /// RCP version latch (read only)
    pub const VERSION: u32 = 0x04;
    /// Pending interrupts (read only)
    pub const INTERRUPT: u32 = 0x08;
    /// Interrupt mask
    pub const MASK: u32 = 0x0C;
}

/// Value reported by `MI_VERSION` on retail consoles (RCP 2.0)
pub const VERSION_VALUE: u32 = 0x0202_0102;

/// Interrupt bits in `MI_INTERRUPT`
pub mod interrupt {
    pub const SP: u32 = 1 << 0;
    pub const SI: u32 = 1 << 1;
    pub const AI: u32 = 1 << 2;
    pub const VI: u32 = 1 << 3;
    pub const PI: u32 = 1 << 4;
    pub const DP: u32 = 1 << 5;
}
