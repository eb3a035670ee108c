//! Linux tap device: the virtual interface endpoint.
//!
//! Opening `/dev/net/tun` yields a "clone" descriptor; the `TUNSETIFF` ioctl
//! then attaches it to a named interface.  With `IFF_TAP | IFF_NO_PI`:
//!
//! - each `read` returns exactly one Ethernet frame the local stack sent out
//!   of the tap, with no extra packet-information header;
//! - each `write` injects exactly one frame, which the stack sees as received
//!   on the tap.
//!
//! Requires `CAP_NET_ADMIN`.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;

use tracing::debug;

use super::iface::{name_from_ifreq, InterfaceName};
use crate::application::VirtualEndpoint;

/// The tun/tap clone device.
pub const CLONE_DEVICE: &str = "/dev/net/tun";

/// An open tap interface.
#[derive(Debug)]
pub struct TapDevice {
    file: File,
    name: String,
}

impl TapDevice {
    /// Creates (or attaches to) the tap interface `name`.
    ///
    /// The kernel may rename the interface, e.g. when `name` contains `%d`;
    /// [`name`](Self::name) returns the name actually assigned.
    ///
    /// # Errors
    ///
    /// Returns the `open(2)` error if the clone device is unavailable, or the
    /// `ioctl(2)` error if the interface cannot be registered (typically
    /// `EPERM` without `CAP_NET_ADMIN`, or `EBUSY` if it is in use).
    pub fn open(name: &InterfaceName) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_CLOEXEC)
            .open(CLONE_DEVICE)?;

        let mut ifr = name.ifreq();
        ifr.ifr_ifru.ifru_flags = (libc::IFF_TAP | libc::IFF_NO_PI) as libc::c_short;

        // SAFETY: `ifr` is a valid ifreq for the duration of the call and
        // TUNSETIFF reads the name/flags and writes back the assigned name.
        let ret = unsafe {
            libc::ioctl(
                file.as_raw_fd(),
                libc::TUNSETIFF as _,
                &mut ifr as *mut libc::ifreq,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        let name = name_from_ifreq(&ifr);
        debug!("tap interface {name} registered");
        Ok(Self { file, name })
    }

    /// The interface name the kernel assigned.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl AsRawFd for TapDevice {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl VirtualEndpoint for TapDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn write(&mut self, frame: &[u8]) -> io::Result<()> {
        write_whole(&mut self.file, frame)
    }
}

/// Writes `frame` with a single `write` call.  A tap write is one frame, so a
/// partial write cannot be resumed and is reported as `WriteZero`.
fn write_whole(w: &mut impl Write, frame: &[u8]) -> io::Result<()> {
    let written = w.write(frame)?;
    if written != frame.len() {
        return Err(io::Error::new(
            io::ErrorKind::WriteZero,
            format!("tap accepted {written} of {} bytes", frame.len()),
        ));
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
