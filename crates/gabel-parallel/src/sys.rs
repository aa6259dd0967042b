//! Thin safe wrappers over the libc process primitives.
//!
//! Everything unsafe in the coordinator funnels through here. The
//! wrappers translate `-1` returns into `io::Error` and keep descriptor
//! ownership in [`OwnedFd`].

use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::ptr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

/// Outcome of a successful `fork`.
pub enum Fork {
    /// In the parent; the child's pid.
    Parent(libc::pid_t),
    /// In the child.
    Child,
}

/// Create a pipe; returns `(read_end, write_end)`.
pub fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0 as RawFd; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: the kernel just handed us two fresh descriptors we own.
    unsafe { Ok((OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1]))) }
}

/// Fork the process.
pub fn fork() -> io::Result<Fork> {
    match unsafe { libc::fork() } {
        -1 => Err(io::Error::last_os_error()),
        0 => Ok(Fork::Child),
        pid => Ok(Fork::Parent(pid)),
    }
}

/// Point this process's stdout and stderr at `fd` (worker side).
pub fn redirect_stdio(fd: &OwnedFd) -> io::Result<()> {
    for target in [libc::STDOUT_FILENO, libc::STDERR_FILENO] {
        if unsafe { libc::dup2(fd.as_raw_fd(), target) } < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Switch a descriptor between non-blocking and blocking mode.
pub fn set_nonblocking(fd: RawFd, nonblocking: bool) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    let flags = if nonblocking {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Read into `buf`; 0 means EOF, `WouldBlock` means try again later.
pub fn read_fd(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
    if n < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

/// Wait up to `timeout` for any of `fds` to become readable.
///
/// Returns the subset that is ready; empty on timeout or on an
/// interrupted wait.
pub fn wait_readable(fds: &[RawFd], timeout: Duration) -> io::Result<Vec<RawFd>> {
    if fds.is_empty() {
        std::thread::sleep(timeout);
        return Ok(Vec::new());
    }

    let mut set: libc::fd_set = unsafe { mem::zeroed() };
    let mut max_fd: RawFd = 0;
    unsafe {
        libc::FD_ZERO(&mut set);
        for &fd in fds {
            libc::FD_SET(fd, &mut set);
            max_fd = max_fd.max(fd);
        }
    }

    let mut tv = libc::timeval {
        tv_sec: timeout.as_secs() as libc::time_t,
        tv_usec: timeout.subsec_micros() as libc::suseconds_t,
    };
    let ready = unsafe {
        libc::select(
            max_fd + 1,
            &mut set,
            ptr::null_mut(),
            ptr::null_mut(),
            &mut tv,
        )
    };
    if ready < 0 {
        let error = io::Error::last_os_error();
        if error.kind() == io::ErrorKind::Interrupted {
            return Ok(Vec::new());
        }
        return Err(error);
    }

    Ok(fds
        .iter()
        .copied()
        .filter(|&fd| unsafe { libc::FD_ISSET(fd, &set) })
        .collect())
}

/// Send `signal` to `pid`. Delivery failures are ignored; the target may
/// already be gone.
pub fn kill(pid: libc::pid_t, signal: i32) {
    unsafe {
        libc::kill(pid, signal);
    }
}

/// Block until the child `pid` has exited.
pub fn wait_child(pid: libc::pid_t) {
    let mut status: libc::c_int = 0;
    unsafe {
        libc::waitpid(pid, &mut status, 0);
    }
}

static PENDING_SIGNAL: AtomicI32 = AtomicI32::new(0);

extern "C" fn record_signal(signal: libc::c_int) {
    PENDING_SIGNAL.store(signal, Ordering::SeqCst);
}

/// Route SIGINT/SIGTERM into [`pending_interrupt`] for the supervise loop.
pub fn install_interrupt_handlers() {
    unsafe {
        libc::signal(libc::SIGINT, record_signal as libc::sighandler_t);
        libc::signal(libc::SIGTERM, record_signal as libc::sighandler_t);
    }
}

/// Restore default SIGINT/SIGTERM dispositions (worker side).
pub fn reset_interrupt_handlers() {
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_DFL);
        libc::signal(libc::SIGTERM, libc::SIG_DFL);
    }
}

/// The recorded interrupt signal, if one arrived.
pub fn pending_interrupt() -> Option<i32> {
    match PENDING_SIGNAL.load(Ordering::SeqCst) {
        0 => None,
        signal => Some(signal),
    }
}

/// Forget any recorded interrupt (start of a new run).
pub fn clear_pending_interrupt() {
    PENDING_SIGNAL.store(0, Ordering::SeqCst);
}

/// Re-raise `signal` with its default disposition.
pub fn reraise_default(signal: i32) -> ! {
    unsafe {
        libc::signal(signal, libc::SIG_DFL);
        libc::raise(signal);
    }
    // Only reached if the signal is blocked; exit the conventional way.
    std::process::exit(128 + signal);
}
