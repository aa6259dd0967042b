//! Shared work queue — a file-backed record forked peers claim indices from.
//!
//! The record is 8 bytes: `next_worker_index: u32` then `total_workers:
//! u32`, host byte order. The coordinator creates it before forking and
//! every child inherits the open descriptor; claims go through an
//! advisory exclusive whole-file lock, so assignment is first-come-first-
//! served and each participant gets a distinct index.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

/// Handle to the on-disk queue record.
#[derive(Debug)]
pub struct SharedQueue {
    file: File,
}

impl SharedQueue {
    /// Create the queue file and initialise it to `(0, total_workers)`.
    ///
    /// The descriptor is left inheritable so forked children can claim
    /// from the same record.
    pub fn create(path: &Path, total_workers: u32) -> io::Result<SharedQueue> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(&0u32.to_ne_bytes())?;
        file.write_all(&total_workers.to_ne_bytes())?;
        file.flush()?;
        clear_cloexec(&file)?;
        debug!(path = %path.display(), total_workers, "created work queue");
        Ok(SharedQueue { file })
    }

    /// Open an existing queue file.
    pub fn open(path: &Path) -> io::Result<SharedQueue> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(SharedQueue { file })
    }

    /// Atomically claim the next worker index.
    ///
    /// Returns `(my_index, total_workers)`. The record's next-index field
    /// is incremented under the lock, so concurrent claimants each
    /// receive a distinct index.
    pub fn claim(&mut self) -> io::Result<(u32, u32)> {
        lock_exclusive(&self.file)?;
        let result = self.claim_locked();
        let unlocked = unlock(&self.file);
        let claimed = result?;
        unlocked?;
        Ok(claimed)
    }

    fn claim_locked(&mut self) -> io::Result<(u32, u32)> {
        let (next, total) = self.read_record()?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&(next + 1).to_ne_bytes())?;
        self.file.write_all(&total.to_ne_bytes())?;
        self.file.flush()?;
        Ok((next, total))
    }

    /// Read the record without modifying it.
    pub fn read_record(&mut self) -> io::Result<(u32, u32)> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut buf = [0u8; 8];
        self.file.read_exact(&mut buf)?;
        let next = u32::from_ne_bytes(buf[0..4].try_into().unwrap());
        let total = u32::from_ne_bytes(buf[4..8].try_into().unwrap());
        Ok((next, total))
    }
}

#[cfg(unix)]
fn lock_exclusive(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    if unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(unix)]
fn unlock(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    if unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Clear close-on-exec so the descriptor survives into worker processes.
#[cfg(unix)]
fn clear_cloexec(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    let fd = file.as_raw_fd();
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

// Without process forking there are no concurrent claimants; the plain
// file operations stand in for the advisory lock.
#[cfg(not(unix))]
fn lock_exclusive(_file: &File) -> io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn unlock(_file: &File) -> io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn clear_cloexec(_file: &File) -> io::Result<()> {
    Ok(())
}
