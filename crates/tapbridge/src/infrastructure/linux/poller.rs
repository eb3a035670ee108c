//! `poll(2)`-based readiness over the link socket, the tap and a shutdown
//! `eventfd`.
//!
//! The forwarding loop blocks here with no timeout.  A [`ShutdownHandle`] can
//! be cloned into a signal handler task; triggering it makes the eventfd
//! readable, which wakes the poll and reports `shutdown`.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;

use crate::application::{Readiness, ReadySet};

/// Poll events that mean "a read will not block": data, or an error/hangup
/// the next read will report.
const READABLE: libc::c_short = libc::POLLIN | libc::POLLERR | libc::POLLHUP | libc::POLLNVAL;

/// Wakes a blocked [`PollReadiness`] and makes it report shutdown.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    event: Arc<OwnedFd>,
}

impl ShutdownHandle {
    /// Creates the underlying `eventfd`.
    pub fn new() -> io::Result<Self> {
        // SAFETY: eventfd(2) returns a new descriptor or -1.
        let fd = unsafe { libc::eventfd(0, libc::EFD_CLOEXEC | libc::EFD_NONBLOCK) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: fd is a freshly created descriptor nobody else owns.
        let event = unsafe { OwnedFd::from_raw_fd(fd) };
        Ok(Self {
            event: Arc::new(event),
        })
    }

    /// Requests shutdown.  Idempotent; safe to call from any thread.
    pub fn trigger(&self) -> io::Result<()> {
        let one: u64 = 1;
        // SAFETY: writes the 8 bytes of `one`, as eventfd requires.
        let n = unsafe {
            libc::write(
                self.event.as_raw_fd(),
                &one as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            // Counter saturated: a shutdown is already pending.
            if err.kind() != io::ErrorKind::WouldBlock {
                return Err(err);
            }
        }
        Ok(())
    }

    /// Returns `true` once [`trigger`](Self::trigger) has been called.
    #[cfg(test)]
    fn is_triggered(&self) -> io::Result<bool> {
        let mut pfd = libc::pollfd {
            fd: self.event.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: `pfd` is a single valid pollfd.
        let ret = unsafe { libc::poll(&mut pfd, 1, 0) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(pfd.revents & libc::POLLIN != 0)
    }

    fn raw_fd(&self) -> RawFd {
        self.event.as_raw_fd()
    }
}

/// Blocking readiness wait over exactly two endpoint descriptors.
///
/// Holds raw descriptors borrowed from the endpoints; it must not outlive
/// them.  `main` moves all three into the same `ForwardingLoop`, so they are
/// dropped together.
#[derive(Debug)]
pub struct PollReadiness {
    link_fd: RawFd,
    tap_fd: RawFd,
    shutdown: ShutdownHandle,
}

impl PollReadiness {
    pub fn new(link: &impl AsRawFd, tap: &impl AsRawFd, shutdown: ShutdownHandle) -> Self {
        Self {
            link_fd: link.as_raw_fd(),
            tap_fd: tap.as_raw_fd(),
            shutdown,
        }
    }
}

impl Readiness for PollReadiness {
    fn wait(&mut self) -> io::Result<ReadySet> {
        let mut fds = [
            libc::pollfd {
                fd: self.link_fd,
                events: libc::POLLIN,
                revents: 0,
            },
            libc::pollfd {
                fd: self.tap_fd,
                events: libc::POLLIN,
                revents: 0,
            },
            libc::pollfd {
                fd: self.shutdown.raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
        ];

        // SAFETY: `fds` is a valid array of `fds.len()` pollfd entries.
        let ret = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
        if ret < 0 {
            // EINTR surfaces as ErrorKind::Interrupted; the loop retries it.
            return Err(io::Error::last_os_error());
        }

        Ok(ReadySet {
            link: fds[0].revents & READABLE != 0,
            tap: fds[1].revents & READABLE != 0,
            shutdown: fds[2].revents & libc::POLLIN != 0,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
