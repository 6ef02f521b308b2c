/// Display timing
pub mod display {
    /// Display refresh rate (NTSC)
    pub const REFRESH_RATE_HZ: u32 = 60;

    /// One display frame, rounded down to whole milliseconds
    pub const FRAME_INTERVAL_MS: u64 = 16;
}

/// Boot-time constants IPL3 leaves in low RDRAM
///
/// Every title that boots through the standard IPL3 has these words written
/// before the game's entry point runs, so they sit at a fixed offset from the
/// start of RDRAM.
///
/// Reference: <https://n64brew.dev/wiki/PIF-NUS#IPL3>
pub mod boot {
    /// `osTvType`: 0 = PAL, 1 = NTSC, 2 = MPAL
    pub const OS_TV_TYPE_OFFSET: usize = 0x300;
    /// Largest valid `osTvType`
    pub const OS_TV_TYPE_MAX: u32 = 2;
    /// `osRomBase`: uncached address of cartridge domain 1
    pub const OS_ROM_BASE_OFFSET: usize = 0x308;
    /// Value of `osRomBase` on every retail boot
    pub const OS_ROM_BASE_VALUE: u32 = 0xB000_0000;
    /// `osMemSize`: installed RDRAM in bytes
    pub const OS_MEM_SIZE_OFFSET: usize = 0x318;
    /// Values `osMemSize` may take (4 MB or 8 MB)
    pub const OS_MEM_SIZES: [u32; 2] = [0x0040_0000, 0x0080_0000];
    /// Bytes from the start of RDRAM that cover all of the words above
    pub const SIGNATURE_SPAN: usize = OS_MEM_SIZE_OFFSET + 4;
}

/// Host-side heuristics for locating emulator structures
pub mod host {
    /// Time between the two captures of a differential snapshot
    pub const DIFF_SNAPSHOT_INTERVAL_MS: u64 = 500;

    /// Region sizes considered for the controller structure scan
    pub const INPUT_REGION_MIN: u64 = 1024;
    pub const INPUT_REGION_MAX: u64 = 1024 * 1024;

    /// Region sizes typical of a plugin's writable data segment
    pub const MODULE_REGION_MIN: u64 = 4 * 1024;
    pub const MODULE_REGION_MAX: u64 = 256 * 1024;
}
