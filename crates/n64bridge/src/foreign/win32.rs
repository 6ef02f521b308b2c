//! Windows backend over `OpenProcess`, `ReadProcessMemory`,
//! `WriteProcessMemory` and `VirtualQueryEx`.
//!
//! This is the only module in the crate with `unsafe`.

use super::{AttachError, MemoryAccessError, MemoryRegion, ProcessMemory, Protection, RegionIter};
use std::ffi::c_void;
use std::mem::size_of;
use std::sync::Arc;
use tracing::{trace, warn};
use windows::Win32::{
    Foundation::{
        CloseHandle, ERROR_ACCESS_DENIED, ERROR_INVALID_PARAMETER, FALSE, HANDLE, STILL_ACTIVE,
    },
    System::{
        Diagnostics::Debug::{ReadProcessMemory, WriteProcessMemory},
        Memory::{
            MEM_COMMIT, MEM_IMAGE, MEM_MAPPED, MEMORY_BASIC_INFORMATION, PAGE_EXECUTE,
            PAGE_EXECUTE_READ, PAGE_EXECUTE_READWRITE, PAGE_EXECUTE_WRITECOPY, PAGE_GUARD,
            PAGE_NOACCESS, PAGE_READONLY, PAGE_READWRITE, PAGE_WRITECOPY, VirtualQueryEx,
        },
        ProcessStatus::GetMappedFileNameW,
        Threading::{
            GetExitCodeProcess, OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_OPERATION,
            PROCESS_VM_READ, PROCESS_VM_WRITE,
        },
    },
};

/// Process handle closed on drop
struct OwnedHandle(HANDLE);

// Process handles are usable from any thread.
unsafe impl Send for OwnedHandle {}
unsafe impl Sync for OwnedHandle {}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        if let Err(err) = unsafe { CloseHandle(self.0) } {
            warn!("CloseHandle failed: {}", err);
        }
    }
}

pub struct Win32Process {
    process: Arc<OwnedHandle>,
}

impl Win32Process {
    pub fn open(pid: u32) -> Result<Self, AttachError> {
        let process = unsafe {
            OpenProcess(
                PROCESS_QUERY_INFORMATION
                    | PROCESS_VM_OPERATION
                    | PROCESS_VM_READ
                    | PROCESS_VM_WRITE,
                FALSE,
                pid,
            )
        }
        .map_err(|err| attach_error(pid, err))?;

        Ok(Self {
            process: Arc::new(OwnedHandle(process)),
        })
    }

    fn exit_code(&self) -> Option<u32> {
        let mut code = 0u32;
        unsafe { GetExitCodeProcess(self.process.0, &mut code) }
            .ok()
            .map(|()| code)
    }

    /// Classify a failed access. Reads fail once the target exits, so ask
    /// the OS whether it is still running.
    fn access_error(&self, address: u64, length: usize) -> MemoryAccessError {
        classify_failure(self.exit_code(), address, length)
    }
}

fn attach_error(pid: u32, err: windows::core::Error) -> AttachError {
    if err.code() == ERROR_ACCESS_DENIED.to_hresult() {
        AttachError::PermissionDenied { pid }
    } else if err.code() == ERROR_INVALID_PARAMETER.to_hresult() {
        // OpenProcess reports an unknown pid this way
        AttachError::ProcessNotFound { pid }
    } else {
        AttachError::Os {
            pid,
            source: std::io::Error::from(err),
        }
    }
}

fn classify_failure(exit_code: Option<u32>, address: u64, length: usize) -> MemoryAccessError {
    match exit_code {
        Some(code) if code != STILL_ACTIVE.0 as u32 => MemoryAccessError::Disconnected,
        _ => MemoryAccessError::Unmapped { address, length },
    }
}

impl ProcessMemory for Win32Process {
    fn read(&self, address: u64, buffer: &mut [u8]) -> Result<(), MemoryAccessError> {
        let length = buffer.len();
        let mut number_of_bytes_read: usize = 0;
        let result = unsafe {
            ReadProcessMemory(
                self.process.0,
                address as usize as *const c_void,
                buffer.as_mut_ptr() as *mut c_void,
                length,
                Some(&mut number_of_bytes_read),
            )
        };
        match result {
            Ok(()) if number_of_bytes_read == length => Ok(()),
            Ok(()) => Err(MemoryAccessError::Unmapped { address, length }),
            Err(err) => {
                trace!("ReadProcessMemory at {:#x} failed: {}", address, err);
                Err(self.access_error(address, length))
            }
        }
    }

    fn write(&self, address: u64, buffer: &[u8]) -> Result<(), MemoryAccessError> {
        let length = buffer.len();
        let mut number_of_bytes_written: usize = 0;
        let result = unsafe {
            WriteProcessMemory(
                self.process.0,
                address as usize as *const c_void,
                buffer.as_ptr() as *const c_void,
                length,
                Some(&mut number_of_bytes_written),
            )
        };
        match result {
            Ok(()) if number_of_bytes_written == length => Ok(()),
            Ok(()) => Err(MemoryAccessError::Unmapped { address, length }),
            Err(err) => {
                trace!("WriteProcessMemory at {:#x} failed: {}", address, err);
                Err(self.access_error(address, length))
            }
        }
    }

    fn regions(&self) -> Result<RegionIter, MemoryAccessError> {
        if self.access_error(0, 0) == MemoryAccessError::Disconnected {
            return Err(MemoryAccessError::Disconnected);
        }
        Ok(Box::new(RegionWalk {
            process: Arc::clone(&self.process),
            next: 0,
        }))
    }
}

/// Walks the address space one `VirtualQueryEx` call at a time
struct RegionWalk {
    process: Arc<OwnedHandle>,
    next: u64,
}

impl RegionWalk {
    fn query(&self, address: u64) -> Option<MEMORY_BASIC_INFORMATION> {
        let mut info = MEMORY_BASIC_INFORMATION::default();
        let written = unsafe {
            VirtualQueryEx(
                self.process.0,
                Some(address as usize as *const c_void),
                &mut info,
                size_of::<MEMORY_BASIC_INFORMATION>(),
            )
        };
        (written != 0).then_some(info)
    }

    fn mapped_file_name(&self, address: u64) -> Option<String> {
        let mut name = [0u16; 512];
        let len = unsafe {
            GetMappedFileNameW(self.process.0, address as usize as *const c_void, &mut name)
        };
        (len > 0).then(|| String::from_utf16_lossy(&name[..len as usize]))
    }
}

fn protection_of(protect: u32) -> Option<Protection> {
    if protect & PAGE_GUARD.0 != 0 {
        return None;
    }
    let base = protect & 0xFF;
    let protection = if base == PAGE_READONLY.0 {
        Protection::READ
    } else if base == PAGE_READWRITE.0 || base == PAGE_WRITECOPY.0 {
        Protection::READ | Protection::WRITE
    } else if base == PAGE_EXECUTE.0 {
        Protection::EXECUTE
    } else if base == PAGE_EXECUTE_READ.0 {
        Protection::READ | Protection::EXECUTE
    } else if base == PAGE_EXECUTE_READWRITE.0 || base == PAGE_EXECUTE_WRITECOPY.0 {
        Protection::all()
    } else if base == PAGE_NOACCESS.0 {
        return None;
    } else {
        Protection::empty()
    };
    Some(protection)
}

impl Iterator for RegionWalk {
    type Item = MemoryRegion;

    fn next(&mut self) -> Option<MemoryRegion> {
        loop {
            let info = self.query(self.next)?;
            let base = info.BaseAddress as usize as u64;
            let size = info.RegionSize as u64;
            if size == 0 {
                return None;
            }
            self.next = base.checked_add(size)?;

            if info.State != MEM_COMMIT {
                continue;
            }
            let Some(protection) = protection_of(info.Protect.0) else {
                continue;
            };
            let name = if info.Type == MEM_IMAGE || info.Type == MEM_MAPPED {
                self.mapped_file_name(base)
            } else {
                None
            };
            return Some(MemoryRegion {
                base,
                size,
                protection,
                name,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protection_flags_map() {
        assert_eq!(
            protection_of(PAGE_READWRITE.0),
            Some(Protection::READ | Protection::WRITE)
        );
        assert_eq!(
            protection_of(PAGE_EXECUTE_READ.0),
            Some(Protection::READ | Protection::EXECUTE)
        );
        assert_eq!(protection_of(PAGE_NOACCESS.0), None);
        assert_eq!(protection_of(PAGE_READWRITE.0 | PAGE_GUARD.0), None);
    }

    #[test]
    fn reads_own_memory() {
        let value = [0x5Au8, 0xA5, 0x0F, 0xF0];
        let process = Win32Process::open(std::process::id()).unwrap();
        let mut buffer = [0u8; 4];
        process.read(value.as_ptr() as u64, &mut buffer).unwrap();
        assert_eq!(buffer, value);
        assert!(process.regions().unwrap().any(|region| region.is_writable()));
    }

    #[test]
    fn failures_after_exit_are_disconnects() {
        assert_eq!(
            classify_failure(Some(STILL_ACTIVE.0 as u32), 0x1000, 4),
            MemoryAccessError::Unmapped {
                address: 0x1000,
                length: 4
            }
        );
        assert_eq!(classify_failure(Some(0), 0x1000, 4), MemoryAccessError::Disconnected);
        assert!(matches!(
            classify_failure(None, 0x1000, 4),
            MemoryAccessError::Unmapped { .. }
        ));
    }

    #[test]
    fn open_errors_are_classified() {
        let denied = windows::core::Error::from(ERROR_ACCESS_DENIED.to_hresult());
        assert!(matches!(attach_error(1, denied), AttachError::PermissionDenied { pid: 1 }));
        let missing = windows::core::Error::from(ERROR_INVALID_PARAMETER.to_hresult());
        assert!(matches!(attach_error(1, missing), AttachError::ProcessNotFound { pid: 1 }));
        let other = windows::core::Error::from(windows::Win32::Foundation::E_OUTOFMEMORY);
        assert!(matches!(attach_error(1, other), AttachError::Os { pid: 1, .. }));
    }

    #[test]
    fn exited_child_reads_as_disconnected() {
        let mut child = std::process::Command::new("cmd")
            .args(["/C", "exit 3"])
            .spawn()
            .unwrap();
        let process = Win32Process::open(child.id()).unwrap();
        child.wait().unwrap();

        let mut buffer = [0u8; 4];
        assert_eq!(
            process.read(0x1_0000, &mut buffer),
            Err(MemoryAccessError::Disconnected)
        );
        assert!(matches!(process.regions(), Err(MemoryAccessError::Disconnected)));
    }
}
