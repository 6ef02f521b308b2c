//! Finding the live controller-state structure inside a foreign emulator.
//!
//! Strategies, tried in order:
//!
//! 1. Shape scan of small writable regions.
//! 2. Differential snapshot: capture writable memory twice, some time apart,
//!    and look only at words that changed.
//! 3. Shape scan restricted to file-backed regions the size of a plugin's
//!    data segment.
//!
//! A wrong address means writes into unrelated memory, so every strategy
//! reports [`DiscoveryError::NotFound`] rather than its best guess.

use crate::foreign::{ForeignProcess, MemoryAccessError, MemoryRegion};
use crate::locator::{DiscoveredAddress, DiscoveryError, DiscoveryMethod};
use n64bridge_hw::pif::{ANALOG_LIMIT, STATE_REPLY_LEN, buttons};
use n64bridge_hw::specs::host;
use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Structural constraints a controller-state word must satisfy.
///
/// Bytes 0-1 are a big-endian button mask with no undefined bits set; bytes
/// 2 and 3 are signed axes within the analog limit. The mask is specific to
/// this console's controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeContract {
    pub button_mask: u16,
    pub analog_limit: u8,
}

impl Default for ShapeContract {
    fn default() -> Self {
        Self {
            button_mask: buttons::VALID_MASK,
            analog_limit: ANALOG_LIMIT as u8,
        }
    }
}

impl ShapeContract {
    pub fn matches(&self, bytes: &[u8; STATE_REPLY_LEN]) -> bool {
        let pressed = u16::from_be_bytes([bytes[0], bytes[1]]);
        let x = bytes[2] as i8;
        let y = bytes[3] as i8;
        pressed & !self.button_mask == 0
            && x.unsigned_abs() <= self.analog_limit
            && y.unsigned_abs() <= self.analog_limit
    }

    /// Matches and is not all zeros. Zeroed memory satisfies the contract
    /// everywhere, so static scans only accept a word showing some input.
    pub fn matches_live(&self, bytes: &[u8; STATE_REPLY_LEN]) -> bool {
        bytes != &[0; STATE_REPLY_LEN] && self.matches(bytes)
    }

    /// First aligned offset in `bytes` holding a live match
    pub fn find_in(&self, bytes: &[u8]) -> Option<usize> {
        bytes
            .chunks_exact(STATE_REPLY_LEN)
            .position(|word| {
                <&[u8; STATE_REPLY_LEN]>::try_from(word).is_ok_and(|word| self.matches_live(word))
            })
            .map(|index| index * STATE_REPLY_LEN)
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Wait between the two captures of a differential snapshot
    pub snapshot_interval: Duration,
    pub small_region_min: u64,
    pub small_region_max: u64,
    pub module_region_min: u64,
    pub module_region_max: u64,
    /// Larger writable regions are left out of differential captures
    pub differential_region_max: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: Duration::from_millis(host::DIFF_SNAPSHOT_INTERVAL_MS),
            small_region_min: host::INPUT_REGION_MIN,
            small_region_max: host::INPUT_REGION_MAX,
            module_region_min: host::MODULE_REGION_MIN,
            module_region_max: host::MODULE_REGION_MAX,
            differential_region_max: 64 * 1024 * 1024,
        }
    }
}

/// Copy of some writable regions at one point in time
#[derive(Debug, Clone)]
pub struct MemorySnapshot {
    pub taken_at: Instant,
    pub regions: BTreeMap<u64, Vec<u8>>,
}

impl MemorySnapshot {
    pub fn new(regions: BTreeMap<u64, Vec<u8>>) -> Self {
        Self {
            taken_at: Instant::now(),
            regions,
        }
    }
}

/// Shape-scan every region `select` accepts. Unreadable regions are skipped.
fn scan_regions(
    process: &ForeignProcess,
    contract: &ShapeContract,
    select: impl Fn(&MemoryRegion) -> bool,
) -> Result<Option<u64>, DiscoveryError> {
    for region in process.regions()?.filter(|region| select(region)) {
        let bytes = match process.read_bytes(region.base, region.size as usize) {
            Ok(bytes) => bytes,
            Err(MemoryAccessError::Disconnected) => {
                return Err(MemoryAccessError::Disconnected.into());
            }
            Err(err) => {
                trace!("Skipping region at {:#x}: {}", region.base, err);
                continue;
            }
        };
        if let Some(offset) = contract.find_in(&bytes) {
            return Ok(Some(region.base + offset as u64));
        }
    }
    Ok(None)
}

/// Strategy 1: small writable regions
pub fn scan_plausible_regions(
    process: &ForeignProcess,
    config: &DiscoveryConfig,
    contract: &ShapeContract,
) -> Result<Option<u64>, DiscoveryError> {
    debug!("Shape scan of small writable regions");
    scan_regions(process, contract, |region| {
        region.is_writable()
            && (config.small_region_min..=config.small_region_max).contains(&region.size)
    })
}

/// Capture every writable region up to `region_max` bytes
pub fn capture_writable(
    process: &ForeignProcess,
    region_max: u64,
) -> Result<MemorySnapshot, MemoryAccessError> {
    let mut regions = BTreeMap::new();
    for region in process.regions()? {
        if !region.is_writable() || region.size > region_max {
            continue;
        }
        match process.read_bytes(region.base, region.size as usize) {
            Ok(bytes) => {
                regions.insert(region.base, bytes);
            }
            Err(MemoryAccessError::Disconnected) => return Err(MemoryAccessError::Disconnected),
            Err(err) => trace!("Not capturing region at {:#x}: {}", region.base, err),
        }
    }
    Ok(MemorySnapshot::new(regions))
}

/// First aligned word that changed between two snapshots and satisfies the
/// contract after the change. Regions present in only one snapshot, or whose
/// size changed, are ignored.
pub fn diff_snapshots(
    before: &MemorySnapshot,
    after: &MemorySnapshot,
    contract: &ShapeContract,
) -> Option<u64> {
    for (base, now) in &after.regions {
        let Some(then) = before.regions.get(base) else {
            continue;
        };
        if then.len() != now.len() {
            continue;
        }
        let words = then
            .chunks_exact(STATE_REPLY_LEN)
            .zip(now.chunks_exact(STATE_REPLY_LEN));
        for (index, (old, new)) in words.enumerate() {
            if old == new {
                continue;
            }
            let Ok(new) = <&[u8; STATE_REPLY_LEN]>::try_from(new) else {
                continue;
            };
            if contract.matches(new) {
                return Some(base + (index * STATE_REPLY_LEN) as u64);
            }
        }
    }
    None
}

/// Strategy 2: diff two captures taken `snapshot_interval` apart. Blocks
/// for the whole interval.
pub fn scan_differential(
    process: &ForeignProcess,
    config: &DiscoveryConfig,
    contract: &ShapeContract,
) -> Result<Option<u64>, DiscoveryError> {
    debug!(
        "Differential scan, press and hold a button for the next {:?}",
        config.snapshot_interval
    );
    let before = capture_writable(process, config.differential_region_max)?;
    thread::sleep(config.snapshot_interval);
    let after = capture_writable(process, config.differential_region_max)?;
    debug!(
        "Diffing {} regions captured {:?} apart",
        after.regions.len(),
        after.taken_at.duration_since(before.taken_at)
    );
    Ok(diff_snapshots(&before, &after, contract))
}

/// Strategy 3: file-backed writable regions sized like a module data segment
pub fn scan_modules(
    process: &ForeignProcess,
    config: &DiscoveryConfig,
    contract: &ShapeContract,
) -> Result<Option<u64>, DiscoveryError> {
    debug!("Shape scan of module data segments");
    scan_regions(process, contract, |region| {
        region.is_writable()
            && region.name.is_some()
            && (config.module_region_min..=config.module_region_max).contains(&region.size)
    })
}

/// Finds the controller-state structure in a foreign process
pub struct InputLocator {
    config: DiscoveryConfig,
    contract: ShapeContract,
}

impl InputLocator {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self {
            config,
            contract: ShapeContract::default(),
        }
    }

    pub fn with_contract(config: DiscoveryConfig, contract: ShapeContract) -> Self {
        Self { config, contract }
    }

    /// Run the strategies in order. Uses the handle's cached address when
    /// there is one.
    pub fn locate(&self, process: &ForeignProcess) -> Result<DiscoveredAddress, DiscoveryError> {
        if let Some(found) = process.cached_input() {
            debug!("Using cached input base {:#x}", found.base);
            return Ok(found);
        }

        type Strategy = fn(
            &ForeignProcess,
            &DiscoveryConfig,
            &ShapeContract,
        ) -> Result<Option<u64>, DiscoveryError>;
        let strategies: [(DiscoveryMethod, Strategy); 3] = [
            (DiscoveryMethod::ShapeScan, scan_plausible_regions),
            (DiscoveryMethod::Differential, scan_differential),
            (DiscoveryMethod::ModuleScan, scan_modules),
        ];

        for (method, strategy) in strategies {
            if let Some(base) = strategy(process, &self.config, &self.contract)? {
                info!(
                    "Controller state found at {:#x} in process {} ({:?})",
                    base,
                    process.pid(),
                    method
                );
                let found = DiscoveredAddress { base, method };
                process.cache_input(found);
                return Ok(found);
            }
        }

        info!("Controller state not found in process {}", process.pid());
        Err(DiscoveryError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foreign::{ImageProcess, MemoryAccessError, ProcessMemory, Protection, RegionIter};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const RW: Protection = Protection::READ.union(Protection::WRITE);

    fn quick_config() -> DiscoveryConfig {
        DiscoveryConfig {
            snapshot_interval: Duration::from_millis(1),
            ..DiscoveryConfig::default()
        }
    }

    #[test]
    fn contract_rejects_impossible_bits_and_axes() {
        let contract = ShapeContract::default();
        assert!(contract.matches(&[0x90, 0x00, 0x7F, 0x81]));
        assert!(contract.matches(&[0, 0, 0, 0]));
        assert!(!contract.matches(&[0xFF, 0xFF, 0, 0]));
        assert!(!contract.matches(&[0x00, 0x80, 0, 0]));
        assert!(!contract.matches(&[0x80, 0x00, 0x80, 0]));
        assert!(!contract.matches(&[0x80, 0x00, 0, 0x80]));
    }

    #[test]
    fn static_scan_skips_zeros_and_invalid_words() {
        let contract = ShapeContract::default();
        let mut bytes = vec![0u8; 64];
        bytes[8..12].copy_from_slice(&[0xFF, 0xFF, 0x00, 0x00]);
        bytes[20..24].copy_from_slice(&[0x80, 0x00, 0x10, 0xF0]);
        assert_eq!(contract.find_in(&bytes), Some(20));
        assert_eq!(contract.find_in(&[0u8; 64]), None);
    }

    #[test]
    fn plausible_scan_finds_structure_in_small_region() {
        let mut small = vec![0xFFu8; 4096];
        small[0x40..0x44].copy_from_slice(&[0x10, 0x00, 0x05, 0x00]);
        let image = ImageProcess::new()
            .with_region(0x1000, RW, vec![0xFF; 512])
            .with_region(0x10_0000, RW, small);
        let process = ForeignProcess::from_backend(1, Box::new(image));

        let found = InputLocator::new(quick_config()).locate(&process).unwrap();
        assert_eq!(found.base, 0x10_0040);
        assert_eq!(found.method, DiscoveryMethod::ShapeScan);
        assert_eq!(process.cached_input(), Some(found));
    }

    #[test]
    fn diff_returns_the_one_changed_word() {
        let base = 0x2000_0000;
        let before = MemorySnapshot::new(BTreeMap::from([(base, vec![0u8; 256])]));
        let mut changed = vec![0u8; 256];
        changed[0x84..0x88].copy_from_slice(&[0x80, 0x00, 0x00, 0x00]);
        let after = MemorySnapshot::new(BTreeMap::from([(base, changed)]));

        let contract = ShapeContract::default();
        assert_eq!(diff_snapshots(&before, &after, &contract), Some(base + 0x84));
        assert_eq!(diff_snapshots(&before, &before, &contract), None);
    }

    #[test]
    fn diff_ignores_changes_that_break_the_contract() {
        let base = 0x2000_0000;
        let before = MemorySnapshot::new(BTreeMap::from([(base, vec![0u8; 16])]));
        let mut changed = vec![0u8; 16];
        // A counter ticking; bit 6 is never a button
        changed[0..4].copy_from_slice(&[0x00, 0x40, 0x00, 0x00]);
        let after = MemorySnapshot::new(BTreeMap::from([(base, changed)]));
        assert_eq!(diff_snapshots(&before, &after, &ShapeContract::default()), None);
    }

    #[test]
    fn nothing_changed_is_not_found() {
        // Too big for the plausible scan, not file-backed
        let image = ImageProcess::new().with_region(0x3000_0000, RW, vec![0u8; 2 * 1024 * 1024]);
        let process = ForeignProcess::from_backend(1, Box::new(image));
        assert!(matches!(
            InputLocator::new(quick_config()).locate(&process),
            Err(DiscoveryError::NotFound)
        ));
    }

    #[test]
    fn module_scan_only_considers_named_regions() {
        let mut data = vec![0u8; 8 * 1024];
        data[0x100..0x104].copy_from_slice(&[0x00, 0x01, 0x00, 0x00]);
        let image = ImageProcess::new()
            .with_region(0x4000_0000, RW, {
                let mut anon = vec![0u8; 2 * 1024 * 1024];
                anon[0..4].copy_from_slice(&[0x00, 0x01, 0x00, 0x00]);
                anon
            })
            .with_named_region(0x5000_0000, RW, "/usr/lib/mupen64plus-input-sdl.so", data);
        let process = ForeignProcess::from_backend(1, Box::new(image));

        let config = DiscoveryConfig {
            small_region_max: 1024,
            ..quick_config()
        };
        assert_eq!(
            scan_modules(&process, &config, &ShapeContract::default()).unwrap(),
            Some(0x5000_0100)
        );
    }

    /// Holds a button down between the first and second full read of one
    /// region, like a user pressing during a differential capture
    struct PressDuringCapture {
        image: ImageProcess,
        watched: u64,
        reads: AtomicUsize,
        state_at: u64,
    }

    impl ProcessMemory for PressDuringCapture {
        fn read(&self, address: u64, buffer: &mut [u8]) -> Result<(), MemoryAccessError> {
            if address == self.watched && self.reads.fetch_add(1, Ordering::SeqCst) == 1 {
                self.image.poke(self.state_at, &[0x80, 0x00, 0x20, 0x00])?;
            }
            self.image.read(address, buffer)
        }

        fn write(&self, address: u64, buffer: &[u8]) -> Result<(), MemoryAccessError> {
            self.image.write(address, buffer)
        }

        fn regions(&self) -> Result<RegionIter, MemoryAccessError> {
            self.image.regions()
        }
    }

    #[test]
    fn capture_skips_read_only_and_oversized_regions() {
        let image = ImageProcess::new()
            .with_region(0x1000, RW, vec![1; 16])
            .with_region(0x2000, Protection::READ, vec![2; 16])
            .with_region(0x3000, RW, vec![3; 64]);
        let process = ForeignProcess::from_backend(1, Box::new(image));

        let snapshot = capture_writable(&process, 32).unwrap();
        assert_eq!(snapshot.regions.keys().copied().collect::<Vec<_>>(), vec![0x1000]);
        assert_eq!(snapshot.regions[&0x1000], vec![1; 16]);
    }

    #[test]
    fn differential_scan_sees_input_that_arrives_between_captures() {
        // A quiet small region for the plausible scan, then one too big for
        // it that is not file-backed either
        let image = ImageProcess::new()
            .with_region(0x1000, RW, vec![0u8; 4096])
            .with_region(0x3000_0000, RW, vec![0u8; 2 * 1024 * 1024]);
        let backend = PressDuringCapture {
            image,
            watched: 0x3000_0000,
            reads: AtomicUsize::new(0),
            state_at: 0x3000_0A10,
        };
        let process = ForeignProcess::from_backend(1, Box::new(backend));

        let found = InputLocator::new(quick_config()).locate(&process).unwrap();
        assert_eq!(found.base, 0x3000_0A10);
        assert_eq!(found.method, DiscoveryMethod::Differential);
        assert_eq!(process.cached_input(), Some(found));
    }

    #[test]
    fn discovery_stops_when_the_target_exits() {
        let image = ImageProcess::new().with_region(0x1000, RW, vec![0u8; 512]);
        image.exit();
        let process = ForeignProcess::from_backend(1, Box::new(image));
        assert!(matches!(
            InputLocator::new(quick_config()).locate(&process),
            Err(DiscoveryError::Access(MemoryAccessError::Disconnected))
        ));
        assert!(!process.is_connected());
    }
}
