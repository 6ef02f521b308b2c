//! Read and write the memory of another, independently running process.
//!
//! Nothing in here knows about the console. [`ForeignProcess`] is the handle the
//! rest of the crate passes around; the OS-specific work sits behind the
//! [`ProcessMemory`] trait, with one backend per platform plus [`ImageProcess`],
//! a synthetic process built from byte buffers or a memory dump.
//!
//! No call retries. A failed read may be a race with the target remapping its
//! memory or may mean the target exited; callers decide which.

#[cfg(target_os = "linux")]
mod procfs;
#[cfg(windows)]
mod win32;

mod image;

pub use image::ImageProcess;

use crate::locator::DiscoveredAddress;
use bitflags::bitflags;
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

bitflags! {
    /// Page protection of a foreign region
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Protection: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXECUTE = 1 << 2;
    }
}

/// A span of the foreign address space as reported by the OS. Not stable
/// across calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub base: u64,
    pub size: u64,
    pub protection: Protection,
    /// Backing file or mapping name, when the OS reports one
    pub name: Option<String>,
}

impl MemoryRegion {
    pub fn end(&self) -> u64 {
        self.base + self.size
    }

    pub fn contains(&self, address: u64) -> bool {
        (self.base..self.end()).contains(&address)
    }

    pub fn is_readable(&self) -> bool {
        self.protection.contains(Protection::READ)
    }

    pub fn is_writable(&self) -> bool {
        self.protection.contains(Protection::READ | Protection::WRITE)
    }
}

#[derive(Debug, Error)]
pub enum AttachError {
    #[error("permission denied attaching to process {pid}")]
    PermissionDenied { pid: u32 },
    #[error("process {pid} not found")]
    ProcessNotFound { pid: u32 },
    #[error("attaching to foreign processes is not supported on this platform")]
    Unsupported,
    #[error("failed to attach to process {pid}")]
    Os {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryAccessError {
    #[error("{length} bytes at {address:#x} are not mapped")]
    Unmapped { address: u64, length: usize },
    #[error("process handle is disconnected")]
    Disconnected,
}

/// Lazy sequence of regions, re-created on every enumeration
pub type RegionIter = Box<dyn Iterator<Item = MemoryRegion> + Send>;

/// OS access to one foreign process
pub trait ProcessMemory: Send + Sync {
    /// Fill `buffer` from `address`. Partial reads are errors.
    fn read(&self, address: u64, buffer: &mut [u8]) -> Result<(), MemoryAccessError>;

    /// Write all of `buffer` at `address`
    fn write(&self, address: u64, buffer: &[u8]) -> Result<(), MemoryAccessError>;

    /// Start a fresh enumeration of the process's regions
    fn regions(&self) -> Result<RegionIter, MemoryAccessError>;
}

impl<T: ProcessMemory + ?Sized> ProcessMemory for Arc<T> {
    fn read(&self, address: u64, buffer: &mut [u8]) -> Result<(), MemoryAccessError> {
        (**self).read(address, buffer)
    }

    fn write(&self, address: u64, buffer: &[u8]) -> Result<(), MemoryAccessError> {
        (**self).write(address, buffer)
    }

    fn regions(&self) -> Result<RegionIter, MemoryAccessError> {
        (**self).regions()
    }
}

#[cfg(target_os = "linux")]
fn open_backend(pid: u32) -> Result<Box<dyn ProcessMemory>, AttachError> {
    Ok(Box::new(procfs::ProcFs::open(pid)?))
}

#[cfg(windows)]
fn open_backend(pid: u32) -> Result<Box<dyn ProcessMemory>, AttachError> {
    Ok(Box::new(win32::Win32Process::open(pid)?))
}

#[cfg(not(any(target_os = "linux", windows)))]
fn open_backend(_pid: u32) -> Result<Box<dyn ProcessMemory>, AttachError> {
    Err(AttachError::Unsupported)
}

/// Addresses discovered through this handle. Cleared on disconnect.
#[derive(Debug, Default, Clone, Copy)]
struct DiscoveryCache {
    ram: Option<DiscoveredAddress>,
    input: Option<DiscoveredAddress>,
}

/// A live attachment to a foreign process.
///
/// Valid from [`ForeignProcess::connect`] until [`ForeignProcess::disconnect`]
/// or until the backend reports that the target exited; afterwards every
/// access fails with [`MemoryAccessError::Disconnected`].
pub struct ForeignProcess {
    pid: u32,
    backend: RwLock<Option<Box<dyn ProcessMemory>>>,
    cache: Mutex<DiscoveryCache>,
}

impl ForeignProcess {
    /// Attach to a running process. Usually needs debug or ptrace privilege.
    pub fn connect(pid: u32) -> Result<Self, AttachError> {
        debug!("Attaching to process {}", pid);

        let backend = open_backend(pid)?;
        info!("Attached to process {}", pid);
        Ok(Self::from_backend(pid, backend))
    }

    /// Wrap an existing backend, such as an [`ImageProcess`]
    pub fn from_backend(pid: u32, backend: Box<dyn ProcessMemory>) -> Self {
        Self {
            pid,
            backend: RwLock::new(Some(backend)),
            cache: Mutex::new(DiscoveryCache::default()),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn is_connected(&self) -> bool {
        self.backend.read().is_ok_and(|backend| backend.is_some())
    }

    fn with_backend<T>(
        &self,
        f: impl FnOnce(&dyn ProcessMemory) -> Result<T, MemoryAccessError>,
    ) -> Result<T, MemoryAccessError> {
        let result = {
            let backend = self
                .backend
                .read()
                .map_err(|_| MemoryAccessError::Disconnected)?;
            match backend.as_deref() {
                Some(backend) => f(backend),
                None => return Err(MemoryAccessError::Disconnected),
            }
        };
        if let Err(MemoryAccessError::Disconnected) = result {
            info!("Process {} exited", self.pid);
            self.disconnect();
        }
        result
    }

    pub fn read_bytes(&self, address: u64, length: usize) -> Result<Vec<u8>, MemoryAccessError> {
        let mut buffer = vec![0u8; length];
        self.read_into(address, &mut buffer)?;
        Ok(buffer)
    }

    pub fn read_into(&self, address: u64, buffer: &mut [u8]) -> Result<(), MemoryAccessError> {
        self.with_backend(|backend| backend.read(address, buffer))
    }

    pub fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<(), MemoryAccessError> {
        self.with_backend(|backend| backend.write(address, bytes))
    }

    /// Enumerate regions. Each call re-queries the OS.
    pub fn regions(&self) -> Result<RegionIter, MemoryAccessError> {
        self.with_backend(|backend| backend.regions())
    }

    /// Drop the attachment and forget discovered addresses. Safe to repeat.
    pub fn disconnect(&self) {
        match self.backend.write() {
            Ok(mut backend) => {
                if backend.take().is_some() {
                    info!("Detached from process {}", self.pid);
                }
            }
            Err(_) => warn!("Handle lock poisoned while detaching from {}", self.pid),
        }
        if let Ok(mut cache) = self.cache.lock() {
            *cache = DiscoveryCache::default();
        }
    }

    pub(crate) fn cached_ram(&self) -> Option<DiscoveredAddress> {
        self.cache.lock().ok().and_then(|cache| cache.ram)
    }

    pub(crate) fn cache_ram(&self, found: DiscoveredAddress) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.ram = Some(found);
        }
    }

    pub(crate) fn cached_input(&self) -> Option<DiscoveredAddress> {
        self.cache.lock().ok().and_then(|cache| cache.input)
    }

    pub(crate) fn cache_input(&self, found: DiscoveredAddress) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.input = Some(found);
        }
    }
}

impl Drop for ForeignProcess {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::DiscoveryMethod;

    fn sample() -> ForeignProcess {
        let image = ImageProcess::new()
            .with_region(0x1000, Protection::READ | Protection::WRITE, vec![0xAB; 0x100])
            .with_region(0x4000, Protection::READ, vec![0x11; 0x10]);
        ForeignProcess::from_backend(42, Box::new(image))
    }

    #[test]
    fn reads_and_writes_mapped_memory() {
        let process = sample();
        assert_eq!(process.read_bytes(0x1010, 2).unwrap(), vec![0xAB, 0xAB]);
        process.write_bytes(0x1010, &[1, 2, 3]).unwrap();
        assert_eq!(process.read_bytes(0x100F, 5).unwrap(), vec![0xAB, 1, 2, 3, 0xAB]);
    }

    #[test]
    fn unmapped_access_is_an_error_not_zeros() {
        let process = sample();
        assert_eq!(
            process.read_bytes(0x2000, 4),
            Err(MemoryAccessError::Unmapped {
                address: 0x2000,
                length: 4
            })
        );
        // Straddles the end of the region
        assert!(process.read_bytes(0x10FE, 4).is_err());
        // Read-only region
        assert!(process.write_bytes(0x4000, &[0]).is_err());
    }

    #[test]
    fn regions_are_restartable() {
        let process = sample();
        let first: Vec<_> = process.regions().unwrap().collect();
        let second: Vec<_> = process.regions().unwrap().collect();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert!(first[0].is_writable());
        assert!(!first[1].is_writable());
    }

    #[test]
    fn target_exit_disconnects_the_handle() {
        let image = ImageProcess::new().with_region(0x1000, Protection::READ, vec![0; 0x10]);
        let image = Arc::new(image);
        let process = ForeignProcess::from_backend(9, Box::new(Arc::clone(&image)));
        process.cache_input(DiscoveredAddress {
            base: 0x1000,
            method: DiscoveryMethod::ShapeScan,
        });
        assert!(process.read_bytes(0x2000, 1).is_err());
        assert!(process.is_connected());

        image.exit();
        assert_eq!(process.read_bytes(0x1000, 1), Err(MemoryAccessError::Disconnected));
        assert!(!process.is_connected());
        assert_eq!(process.cached_input(), None);
    }

    #[test]
    fn disconnect_invalidates_and_is_idempotent() {
        let process = sample();
        process.cache_ram(DiscoveredAddress {
            base: 0x1000,
            method: DiscoveryMethod::Heuristic,
        });
        process.disconnect();
        process.disconnect();

        assert!(!process.is_connected());
        assert_eq!(process.read_bytes(0x1000, 1), Err(MemoryAccessError::Disconnected));
        assert_eq!(process.write_bytes(0x1000, &[0]), Err(MemoryAccessError::Disconnected));
        assert!(matches!(process.regions(), Err(MemoryAccessError::Disconnected)));
        assert_eq!(process.cached_ram(), None);
    }
}
