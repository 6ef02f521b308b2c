//! A synthetic foreign process made of plain byte buffers.

use super::{MemoryAccessError, MemoryRegion, ProcessMemory, Protection, RegionIter};
use std::io;
use std::path::Path;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

struct ImageRegion {
    base: u64,
    protection: Protection,
    name: Option<String>,
    bytes: Vec<u8>,
}

impl ImageRegion {
    fn span(&self, address: u64, length: usize) -> Option<std::ops::Range<usize>> {
        let start = usize::try_from(address.checked_sub(self.base)?).ok()?;
        let end = start.checked_add(length)?;
        (end <= self.bytes.len()).then_some(start..end)
    }

    fn describe(&self) -> MemoryRegion {
        MemoryRegion {
            base: self.base,
            size: self.bytes.len() as u64,
            protection: self.protection,
            name: self.name.clone(),
        }
    }
}

/// In-memory process image: a set of regions with contents.
///
/// Accesses must fall entirely inside one region and respect its protection.
#[derive(Default)]
pub struct ImageProcess {
    regions: RwLock<Vec<ImageRegion>>,
    exited: AtomicBool,
}

impl ImageProcess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(self, base: u64, protection: Protection, bytes: Vec<u8>) -> Self {
        self.push(base, protection, None, bytes);
        self
    }

    /// Add a region that reports a backing file name
    pub fn with_named_region(
        self,
        base: u64,
        protection: Protection,
        name: &str,
        bytes: Vec<u8>,
    ) -> Self {
        self.push(base, protection, Some(name.to_string()), bytes);
        self
    }

    /// Load a raw dump as one read/write region at `base`
    pub fn from_dump(path: &Path, base: u64) -> io::Result<Self> {
        let bytes = std::fs::read(path)?;
        debug!(
            "Loaded {} byte dump from {} at {:#x}",
            bytes.len(),
            path.display(),
            base
        );
        let name = path.display().to_string();
        Ok(Self::new().with_named_region(base, Protection::READ | Protection::WRITE, &name, bytes))
    }

    /// Change bytes regardless of protection, standing in for the target
    /// process writing its own memory.
    pub fn poke(&self, address: u64, bytes: &[u8]) -> Result<(), MemoryAccessError> {
        self.access(address, bytes.len(), Protection::empty(), |dst| {
            dst.copy_from_slice(bytes)
        })
    }

    /// Make every later access fail the way it does once a real target has
    /// exited
    pub fn exit(&self) {
        self.exited.store(true, Ordering::Relaxed);
    }

    fn push(&self, base: u64, protection: Protection, name: Option<String>, bytes: Vec<u8>) {
        if let Ok(mut regions) = self.regions.write() {
            regions.push(ImageRegion {
                base,
                protection,
                name,
                bytes,
            });
            regions.sort_by_key(|region| region.base);
        }
    }

    fn access(
        &self,
        address: u64,
        length: usize,
        required: Protection,
        f: impl FnOnce(&mut [u8]),
    ) -> Result<(), MemoryAccessError> {
        if self.exited.load(Ordering::Relaxed) {
            return Err(MemoryAccessError::Disconnected);
        }
        let unmapped = MemoryAccessError::Unmapped { address, length };
        let mut regions = self.regions.write().map_err(|_| unmapped.clone())?;
        let region = regions
            .iter_mut()
            .find(|region| {
                region.protection.contains(required) && region.span(address, length).is_some()
            })
            .ok_or(unmapped.clone())?;
        let span = region.span(address, length).ok_or(unmapped)?;
        f(&mut region.bytes[span]);
        Ok(())
    }
}

impl ProcessMemory for ImageProcess {
    fn read(&self, address: u64, buffer: &mut [u8]) -> Result<(), MemoryAccessError> {
        self.access(address, buffer.len(), Protection::READ, |src| {
            buffer.copy_from_slice(src)
        })
    }

    fn write(&self, address: u64, buffer: &[u8]) -> Result<(), MemoryAccessError> {
        self.access(
            address,
            buffer.len(),
            Protection::READ | Protection::WRITE,
            |dst| dst.copy_from_slice(buffer),
        )
    }

    fn regions(&self) -> Result<RegionIter, MemoryAccessError> {
        if self.exited.load(Ordering::Relaxed) {
            return Err(MemoryAccessError::Disconnected);
        }
        let regions = self
            .regions
            .read()
            .map_err(|_| MemoryAccessError::Disconnected)?;
        let described: Vec<_> = regions.iter().map(ImageRegion::describe).collect();
        Ok(Box::new(described.into_iter()))
    }
}
