//! # References
//! - <https://n64brew.dev/wiki/Memory_map>

/// CPU virtual segments that are direct-mapped onto physical memory
///
/// Reference: <https://n64brew.dev/wiki/Memory_map#Virtual_Memory_Map>
pub mod segment {
    /// KSEG0: cached window onto physical memory
    pub const KSEG0_BASE: u32 = 0x8000_0000;
    /// KSEG1: uncached window onto physical memory
    pub const KSEG1_BASE: u32 = 0xA000_0000;
    /// End of KSEG1 (exclusive). KSSEG/KSEG3 start here and are TLB mapped.
    pub const KSEG1_END: u32 = 0xC000_0000;
    /// Bits kept when a direct-mapped virtual address is stripped to physical
    pub const PHYSICAL_MASK: u32 = 0x1FFF_FFFF;
}

/// RDRAM - main memory (8 MB with the Expansion Pak installed)
///
/// Reference: <https://n64brew.dev/wiki/RDRAM>
pub mod rdram {
    /// RDRAM base address
    pub const BASE: u32 = 0x0000_0000;
    /// RDRAM size (8 MB)
    pub const SIZE: usize = 8 * 1024 * 1024;
    /// RDRAM size without the Expansion Pak (4 MB)
    pub const BASE_SIZE: usize = 4 * 1024 * 1024;
    /// Mask applied to a physical address to get an offset into RDRAM
    pub const MASK: u32 = (SIZE as u32) - 1;
}

/// Cartridge address domains
///
/// Reference: <https://n64brew.dev/wiki/Peripheral_Interface#Domains>
pub mod cart {
    /// Domain 2, address 2: battery backed SRAM / FlashRAM
    pub mod save {
        /// Save RAM base address
        pub const BASE: u32 = 0x0800_0000;
        /// Save RAM window size (128 KB, large enough for FlashRAM)
        pub const SIZE: usize = 128 * 1024;
    }

    /// Domain 1, address 2: cartridge ROM
    pub mod rom {
        /// ROM base address
        pub const BASE: u32 = 0x1000_0000;
        /// End of the ROM window (exclusive)
        pub const END: u32 = 0x1FC0_0000;
    }
}

/// PIF boot ROM and PIF RAM (controller-transfer buffer)
///
/// Reference: <https://n64brew.dev/wiki/PIF-NUS>
pub mod pif {
    /// PIF boot ROM base address
    pub const ROM_BASE: u32 = 0x1FC0_0000;
    /// PIF boot ROM size (1984 bytes)
    pub const ROM_SIZE: usize = 0x7C0;
    /// PIF RAM base address
    pub const RAM_BASE: u32 = 0x1FC0_07C0;
    /// PIF RAM size (64 bytes)
    pub const RAM_SIZE: usize = 0x40;
}
