//! Finding the console's RDRAM image inside a foreign emulator process, and
//! reading it once found.
//!
//! Two strategies run in order, first hit wins:
//!
//! 1. Signature scan. IPL3 leaves boot constants in low RDRAM; `osRomBase`
//!    (`0xB000_0000` at `0x308`) is the anchor and `osTvType` / `osMemSize`
//!    confirm the hit.
//! 2. Region size. The first writable region between 4 and 8 MiB.
//!
//! Neither strategy guesses. When both miss, the result is
//! [`DiscoveryError::NotFound`].

use crate::foreign::{ForeignProcess, MemoryAccessError, MemoryRegion};
use memchr::memmem::Finder;
use n64bridge_hw::memory_map::rdram;
use n64bridge_hw::specs::{boot, display};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no candidate satisfied the search")]
    NotFound,
    #[error("{0} is not supported")]
    Unsupported(&'static str),
    #[error(transparent)]
    Access(#[from] MemoryAccessError),
}

/// How an address was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryMethod {
    Signature,
    Heuristic,
    ShapeScan,
    Differential,
    ModuleScan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveredAddress {
    pub base: u64,
    pub method: DiscoveryMethod,
}

#[derive(Debug, Clone)]
pub struct LocatorConfig {
    pub ram_size_min: u64,
    pub ram_size_max: u64,
    /// Bytes read per foreign call while scanning
    pub chunk_size: usize,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            ram_size_min: rdram::BASE_SIZE as u64,
            ram_size_max: rdram::SIZE as u64,
            chunk_size: 1024 * 1024,
        }
    }
}

/// Map a console address onto the foreign RDRAM image at `base`
pub fn translate(base: u64, console_address: u32) -> u64 {
    base + (console_address & rdram::MASK) as u64
}

fn be32(bytes: &[u8], offset: usize) -> Option<u32> {
    let word = bytes.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([word[0], word[1], word[2], word[3]]))
}

/// Check the boot constants of a candidate header (`SIGNATURE_SPAN` bytes)
fn header_matches(header: &[u8]) -> bool {
    let rom_base = be32(header, boot::OS_ROM_BASE_OFFSET);
    let tv_type = be32(header, boot::OS_TV_TYPE_OFFSET);
    let mem_size = be32(header, boot::OS_MEM_SIZE_OFFSET);
    matches!(
        (rom_base, tv_type, mem_size),
        (Some(boot::OS_ROM_BASE_VALUE), Some(tv), Some(size))
            if tv <= boot::OS_TV_TYPE_MAX && boot::OS_MEM_SIZES.contains(&size)
    )
}

/// Search one region for the boot signature. Unreadable chunks are skipped.
pub fn signature_scan(
    process: &ForeignProcess,
    region: &MemoryRegion,
    chunk_size: usize,
) -> Option<u64> {
    let anchor = boot::OS_ROM_BASE_VALUE.to_be_bytes();
    let finder = Finder::new(&anchor);
    let overlap = boot::SIGNATURE_SPAN as u64;
    let chunk_size = chunk_size.max(boot::SIGNATURE_SPAN) as u64;
    let anchor_offset = boot::OS_ROM_BASE_OFFSET as u64;

    let mut chunk_start = region.base;
    while chunk_start < region.end() {
        let length = (chunk_size + overlap).min(region.end() - chunk_start);
        let chunk = match process.read_bytes(chunk_start, length as usize) {
            Ok(chunk) => chunk,
            Err(MemoryAccessError::Disconnected) => return None,
            Err(err) => {
                trace!("Skipping chunk at {:#x}: {}", chunk_start, err);
                chunk_start += chunk_size;
                continue;
            }
        };

        for position in finder.find_iter(&chunk) {
            // Hits in the overlap belong to the next chunk
            if position as u64 >= chunk_size {
                break;
            }
            let hit = chunk_start + position as u64;
            let Some(base) = hit.checked_sub(anchor_offset) else {
                continue;
            };
            if base < region.base || base % 4 != 0 || base + overlap > region.end() {
                continue;
            }

            let header = match base.checked_sub(chunk_start) {
                Some(offset) => chunk
                    .get(offset as usize..(offset + overlap) as usize)
                    .map(<[u8]>::to_vec),
                None => None,
            };
            let header = match header {
                Some(header) => header,
                None => match process.read_bytes(base, boot::SIGNATURE_SPAN) {
                    Ok(header) => header,
                    Err(_) => continue,
                },
            };
            if header_matches(&header) {
                return Some(base);
            }
        }

        chunk_start += chunk_size;
    }
    None
}

/// Finds RDRAM in a foreign process
pub struct RamLocator {
    config: LocatorConfig,
}

impl RamLocator {
    pub fn new(config: LocatorConfig) -> Self {
        Self { config }
    }

    /// Locate RDRAM, using the handle's cached base when there is one
    pub fn locate(&self, process: &ForeignProcess) -> Result<DiscoveredAddress, DiscoveryError> {
        if let Some(found) = process.cached_ram() {
            debug!("Using cached RDRAM base {:#x}", found.base);
            return Ok(found);
        }

        let found = match self.scan_signature(process)? {
            Some(base) => DiscoveredAddress {
                base,
                method: DiscoveryMethod::Signature,
            },
            None => match self.scan_region_size(process)? {
                Some(base) => DiscoveredAddress {
                    base,
                    method: DiscoveryMethod::Heuristic,
                },
                None => {
                    info!("RDRAM not found in process {}", process.pid());
                    return Err(DiscoveryError::NotFound);
                }
            },
        };

        info!(
            "RDRAM found at {:#x} in process {} ({:?})",
            found.base,
            process.pid(),
            found.method
        );
        process.cache_ram(found);
        Ok(found)
    }

    /// Strategy 1: boot-constant signature in any readable region
    pub fn scan_signature(&self, process: &ForeignProcess) -> Result<Option<u64>, DiscoveryError> {
        debug!("Scanning for boot signature");
        for region in process.regions()?.filter(MemoryRegion::is_readable) {
            if let Some(base) = signature_scan(process, &region, self.config.chunk_size) {
                return Ok(Some(base));
            }
            if !process.is_connected() {
                return Err(MemoryAccessError::Disconnected.into());
            }
        }
        Ok(None)
    }

    /// Strategy 2: first writable region of a plausible RDRAM size
    pub fn scan_region_size(
        &self,
        process: &ForeignProcess,
    ) -> Result<Option<u64>, DiscoveryError> {
        debug!(
            "Looking for a writable region of {:#x}..={:#x} bytes",
            self.config.ram_size_min, self.config.ram_size_max
        );
        let mut first_word = [0u8; 4];
        for region in process.regions()? {
            if !region.is_writable()
                || region.size < self.config.ram_size_min
                || region.size > self.config.ram_size_max
            {
                continue;
            }
            match process.read_into(region.base, &mut first_word) {
                Ok(()) => return Ok(Some(region.base)),
                Err(MemoryAccessError::Disconnected) => {
                    return Err(MemoryAccessError::Disconnected.into());
                }
                Err(err) => warn!("Skipping region at {:#x}: {}", region.base, err),
            }
        }
        Ok(None)
    }
}

/// Big-endian typed reads of console memory
pub trait RamView {
    /// Read `buffer.len()` bytes starting at a console address
    fn read_bytes(&self, address: u32, buffer: &mut [u8]) -> Result<(), MemoryAccessError>;

    fn read8(&self, address: u32) -> Result<u8, MemoryAccessError> {
        let mut bytes = [0u8; 1];
        self.read_bytes(address, &mut bytes)?;
        Ok(bytes[0])
    }

    fn read16(&self, address: u32) -> Result<u16, MemoryAccessError> {
        let mut bytes = [0u8; 2];
        self.read_bytes(address, &mut bytes)?;
        Ok(u16::from_be_bytes(bytes))
    }

    fn read32(&self, address: u32) -> Result<u32, MemoryAccessError> {
        let mut bytes = [0u8; 4];
        self.read_bytes(address, &mut bytes)?;
        Ok(u32::from_be_bytes(bytes))
    }

    fn read_f32(&self, address: u32) -> Result<f32, MemoryAccessError> {
        self.read32(address).map(f32::from_bits)
    }
}

/// Split a console range at the end of RDRAM, where the address mask wraps
fn rdram_spans(address: u32, length: usize) -> impl Iterator<Item = (usize, usize, usize)> {
    let mut offset = (address & rdram::MASK) as usize;
    let mut done = 0;
    std::iter::from_fn(move || {
        if done >= length {
            return None;
        }
        let take = (length - done).min(rdram::SIZE - offset);
        let span = (offset, done, take);
        done += take;
        offset = 0;
        Some(span)
    })
}

/// Tier a: every read goes straight to the foreign process
pub struct DirectRam {
    process: Arc<ForeignProcess>,
    base: u64,
}

impl DirectRam {
    pub fn new(process: Arc<ForeignProcess>, base: u64) -> Self {
        Self { process, base }
    }

    pub fn base(&self) -> u64 {
        self.base
    }
}

impl RamView for DirectRam {
    fn read_bytes(&self, address: u32, buffer: &mut [u8]) -> Result<(), MemoryAccessError> {
        for (offset, start, length) in rdram_spans(address, buffer.len()) {
            self.process
                .read_into(self.base + offset as u64, &mut buffer[start..start + length])?;
        }
        Ok(())
    }
}

/// Copy the whole RDRAM image, zero-filling chunks that fail to read
fn capture_image(process: &ForeignProcess, base: u64, chunk_size: usize) -> Arc<[u8]> {
    let mut image = vec![0u8; rdram::SIZE];
    for (index, chunk) in image.chunks_mut(chunk_size.max(1)).enumerate() {
        let address = base + (index * chunk_size.max(1)) as u64;
        if let Err(err) = process.read_into(address, chunk) {
            trace!("Snapshot chunk at {:#x} zero-filled: {}", address, err);
            chunk.fill(0);
        }
    }
    image.into()
}

/// Tier b: a background thread refreshes a full RDRAM copy on an interval.
///
/// Readers see whole snapshots only; the image is swapped, never edited.
pub struct SnapshotRam {
    image: Arc<RwLock<Arc<[u8]>>>,
    stop: Arc<AtomicBool>,
    refresher: Option<JoinHandle<()>>,
}

impl SnapshotRam {
    pub fn start(process: Arc<ForeignProcess>, base: u64, interval: Duration) -> Self {
        let chunk_size = 64 * 1024;
        let image = Arc::new(RwLock::new(capture_image(&process, base, chunk_size)));
        let stop = Arc::new(AtomicBool::new(false));

        let refresher = {
            let image = Arc::clone(&image);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                debug!("Snapshot refresher started ({:?})", interval);
                while !stop.load(Ordering::Relaxed) {
                    thread::sleep(interval);
                    if !process.is_connected() {
                        debug!("Process gone, snapshot refresher exiting");
                        break;
                    }
                    let fresh = capture_image(&process, base, chunk_size);
                    if !process.is_connected() {
                        debug!("Process exited during capture, keeping the last snapshot");
                        break;
                    }
                    match image.write() {
                        Ok(mut current) => *current = fresh,
                        Err(_) => break,
                    }
                }
            })
        };

        Self {
            image,
            stop,
            refresher: Some(refresher),
        }
    }

    /// The current snapshot
    pub fn image(&self) -> Arc<[u8]> {
        match self.image.read() {
            Ok(image) => Arc::clone(&image),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }
}

impl RamView for SnapshotRam {
    fn read_bytes(&self, address: u32, buffer: &mut [u8]) -> Result<(), MemoryAccessError> {
        let image = self.image();
        for (offset, start, length) in rdram_spans(address, buffer.len()) {
            buffer[start..start + length].copy_from_slice(&image[offset..offset + length]);
        }
        Ok(())
    }
}

impl Drop for SnapshotRam {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(refresher) = self.refresher.take() {
            let _ = refresher.join();
        }
    }
}

/// How console memory is read once RDRAM is located
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessTier {
    Direct,
    Snapshot { interval: Duration },
    /// Shared-memory fast path. Not available yet.
    SharedMemory,
}

impl AccessTier {
    /// Snapshot tier refreshed once per display frame
    pub fn per_frame() -> Self {
        AccessTier::Snapshot {
            interval: Duration::from_millis(display::FRAME_INTERVAL_MS),
        }
    }

    /// Build a view of RDRAM at `base` for this tier
    pub fn open(
        self,
        process: Arc<ForeignProcess>,
        base: u64,
    ) -> Result<Box<dyn RamView + Send + Sync>, DiscoveryError> {
        match self {
            AccessTier::Direct => Ok(Box::new(DirectRam::new(process, base))),
            AccessTier::Snapshot { interval } => {
                Ok(Box::new(SnapshotRam::start(process, base, interval)))
            }
            AccessTier::SharedMemory => {
                warn!("Shared-memory access is not supported");
                Err(DiscoveryError::Unsupported("shared-memory access"))
            }
        }
    }
}
