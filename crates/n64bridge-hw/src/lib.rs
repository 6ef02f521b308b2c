//! Hardware constants for the Nintendo 64.
//!
//! Everything in here is plain data: physical addresses, register offsets,
//! controller protocol bytes and timing values. No emulation logic lives in
//! this crate.

pub mod memory_map;
pub mod mmio;
pub mod pif;
pub mod specs;
