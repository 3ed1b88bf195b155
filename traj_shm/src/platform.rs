//! Linux-specific segment mapping and process helpers

use crate::error::{ShmError, ShmResult};
use memmap2::{MmapMut, MmapOptions};
use nix::unistd::getpid;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// Create a new segment file of `size` bytes and map it.
///
/// Pages are pre-faulted so the real-time reader never takes a fault on
/// first touch.
pub fn create_segment_mmap(path: &Path, size: usize) -> ShmResult<MmapMut> {
    let file = OpenOptions::new()
        .create_new(true)
        .read(true)
        .write(true)
        .mode(0o600) // Owner read/write only
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => ShmError::AlreadyExists {
                path: path.to_path_buf(),
            },
            _ => ShmError::Io { source: e },
        })?;

    // Zero-filled by the kernel
    file.set_len(size as u64)?;

    let mmap = unsafe { MmapOptions::new().populate().map_mut(&file)? };
    Ok(mmap)
}

/// Map an existing segment file.
pub fn attach_segment_mmap(path: &Path) -> ShmResult<MmapMut> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => ShmError::NotFound {
                path: path.to_path_buf(),
            },
            _ => ShmError::Io { source: e },
        })?;

    let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
    Ok(mmap)
}

/// Check if process is alive using kill(pid, 0)
pub fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(_) => true,
        Err(nix::Error::ESRCH) => false, // No such process
        Err(nix::Error::EPERM) => true,  // Exists, not ours to signal
        Err(_) => false,
    }
}

/// Get current process ID
pub fn get_current_pid() -> u32 {
    getpid().as_raw() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        assert!(is_process_alive(get_current_pid()));
    }

    #[test]
    fn create_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seg");
        let mmap = create_segment_mmap(&path, 4096).unwrap();
        assert_eq!(mmap.len(), 4096);
        assert!(mmap.iter().all(|b| *b == 0));
        assert!(matches!(
            create_segment_mmap(&path, 4096),
            Err(ShmError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn attach_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            attach_segment_mmap(&dir.path().join("missing")),
            Err(ShmError::NotFound { .. })
        ));
    }
}
