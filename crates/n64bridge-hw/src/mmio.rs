//! Memory-mapped register blocks of the RCP.
//!
//! # References
//! - <https://n64brew.dev/wiki/Memory_map#Physical_Memory_Map_accesses>

pub mod ai;
pub mod mi;
pub mod pi;
pub mod ri;
pub mod si;
pub mod vi;
