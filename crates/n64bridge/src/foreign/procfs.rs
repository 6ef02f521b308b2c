//! Linux backend over `/proc/<pid>/maps` and `/proc/<pid>/mem`.
//!
//! Opening `mem` for writing needs ptrace access to the target (same user and
//! a permissive `kernel.yama.ptrace_scope`, or `CAP_SYS_PTRACE`).

use super::{AttachError, MemoryAccessError, MemoryRegion, ProcessMemory, Protection, RegionIter};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader};
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use tracing::{trace, warn};

pub struct ProcFs {
    proc_dir: PathBuf,
    mem: File,
}

impl ProcFs {
    pub fn open(pid: u32) -> Result<Self, AttachError> {
        let proc_dir = PathBuf::from(format!("/proc/{pid}"));
        if !proc_dir.exists() {
            return Err(AttachError::ProcessNotFound { pid });
        }

        let mem = OpenOptions::new()
            .read(true)
            .write(true)
            .open(proc_dir.join("mem"))
            .map_err(|err| match err.kind() {
                io::ErrorKind::PermissionDenied => AttachError::PermissionDenied { pid },
                io::ErrorKind::NotFound => AttachError::ProcessNotFound { pid },
                _ => AttachError::Os { pid, source: err },
            })?;

        Ok(Self { proc_dir, mem })
    }

    fn access_error(&self, address: u64, length: usize, err: io::Error) -> MemoryAccessError {
        if self.proc_dir.exists() {
            trace!("Access to {:#x} (+{}) failed: {}", address, length, err);
            MemoryAccessError::Unmapped { address, length }
        } else {
            MemoryAccessError::Disconnected
        }
    }
}

impl ProcessMemory for ProcFs {
    fn read(&self, address: u64, buffer: &mut [u8]) -> Result<(), MemoryAccessError> {
        self.mem
            .read_exact_at(buffer, address)
            .map_err(|err| self.access_error(address, buffer.len(), err))
    }

    fn write(&self, address: u64, buffer: &[u8]) -> Result<(), MemoryAccessError> {
        self.mem
            .write_all_at(buffer, address)
            .map_err(|err| self.access_error(address, buffer.len(), err))
    }

    fn regions(&self) -> Result<RegionIter, MemoryAccessError> {
        let maps = File::open(self.proc_dir.join("maps"))
            .map_err(|_| MemoryAccessError::Disconnected)?;
        let lines = BufReader::new(maps).lines();
        Ok(Box::new(lines.map_while(Result::ok).filter_map(|line| {
            let region = parse_maps_line(&line);
            if region.is_none() {
                warn!("Skipping unparseable maps line: {}", line);
            }
            region
        })))
    }
}

/// Parse one line of `/proc/<pid>/maps`:
///
/// ```text
/// 7f3a1c000000-7f3a1c800000 rw-p 00000000 00:00 0          [heap]
/// ```
pub(crate) fn parse_maps_line(line: &str) -> Option<MemoryRegion> {
    let mut fields = line.split_whitespace();
    let (start, end) = fields.next()?.split_once('-')?;
    let perms = fields.next()?.as_bytes();
    // offset, device, inode
    let mut fields = fields.skip(3);
    let name = fields.next().map(str::to_string);

    let base = u64::from_str_radix(start, 16).ok()?;
    let end = u64::from_str_radix(end, 16).ok()?;
    if end < base || perms.len() < 3 {
        return None;
    }

    let mut protection = Protection::empty();
    protection.set(Protection::READ, perms[0] == b'r');
    protection.set(Protection::WRITE, perms[1] == b'w');
    protection.set(Protection::EXECUTE, perms[2] == b'x');

    Some(MemoryRegion {
        base,
        size: end - base,
        protection,
        name,
    })
}
