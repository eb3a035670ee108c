//! Interface queries and state changes via `ioctl(2)`.
//!
//! All requests go through a `struct ifreq` carrying the interface name:
//!
//! | Request         | Purpose                                  |
//! |-----------------|------------------------------------------|
//! | `SIOCGIFINDEX`  | kernel interface index                   |
//! | `SIOCGIFHWADDR` | hardware (MAC) address                   |
//! | `SIOCGIFFLAGS`  | read `IFF_*` flags                       |
//! | `SIOCSIFFLAGS`  | write `IFF_*` flags (needs CAP_NET_ADMIN)|
//!
//! Flag changes read the current flags first and OR in the new one, so flags
//! set by other tools (e.g. `IFF_MULTICAST`) are preserved.

use std::io;
use std::os::fd::RawFd;

use tapbridge_core::MacAddr;

/// A validated interface name, ready to be copied into `ifr_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceName(String);

impl InterfaceName {
    /// Validates `name` against the kernel's `IFNAMSIZ` limit.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the name is empty, longer than
    /// `IFNAMSIZ - 1` bytes, or contains a NUL byte.
    pub fn new(name: &str) -> io::Result<Self> {
        if name.is_empty() || name.len() >= libc::IFNAMSIZ || name.contains('\0') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid interface name {name:?}"),
            ));
        }
        Ok(Self(name.to_string()))
    }

    /// Returns a zeroed `ifreq` with `ifr_name` filled in.
    pub(crate) fn ifreq(&self) -> libc::ifreq {
        // SAFETY: ifreq is plain old data; all-zero is a valid value.
        let mut ifr: libc::ifreq = unsafe { std::mem::zeroed() };
        for (dst, src) in ifr.ifr_name.iter_mut().zip(self.0.bytes()) {
            *dst = src as libc::c_char;
        }
        ifr
    }
}

impl std::fmt::Display for InterfaceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reads the interface name the kernel wrote back into `ifr_name`.
pub(crate) fn name_from_ifreq(ifr: &libc::ifreq) -> String {
    let bytes: Vec<u8> = ifr
        .ifr_name
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn ioctl(fd: RawFd, request: libc::c_ulong, ifr: &mut libc::ifreq) -> io::Result<()> {
    // SAFETY: `ifr` is a valid, exclusively borrowed ifreq for the duration
    // of the call and every request used here reads/writes only an ifreq.
    let ret = unsafe { libc::ioctl(fd, request as _, ifr as *mut libc::ifreq) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Returns the kernel interface index of `name`.
pub fn interface_index(fd: RawFd, name: &InterfaceName) -> io::Result<i32> {
    let mut ifr = name.ifreq();
    ioctl(fd, libc::SIOCGIFINDEX as libc::c_ulong, &mut ifr)?;
    // SAFETY: SIOCGIFINDEX fills the ifindex member of the union.
    Ok(unsafe { ifr.ifr_ifru.ifru_ifindex })
}

/// Returns the hardware address of `name`.
pub fn hardware_address(fd: RawFd, name: &InterfaceName) -> io::Result<MacAddr> {
    let mut ifr = name.ifreq();
    ioctl(fd, libc::SIOCGIFHWADDR as libc::c_ulong, &mut ifr)?;
    // SAFETY: SIOCGIFHWADDR fills the hwaddr member of the union.
    let sa_data = unsafe { ifr.ifr_ifru.ifru_hwaddr.sa_data };
    let bytes: Vec<u8> = sa_data.iter().map(|&b| b as u8).collect();
    MacAddr::from_slice(&bytes)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "short hardware address"))
}

/// Returns the `IFF_*` flags of `name`.
pub fn flags(fd: RawFd, name: &InterfaceName) -> io::Result<libc::c_short> {
    let mut ifr = name.ifreq();
    ioctl(fd, libc::SIOCGIFFLAGS as libc::c_ulong, &mut ifr)?;
    // SAFETY: SIOCGIFFLAGS fills the flags member of the union.
    Ok(unsafe { ifr.ifr_ifru.ifru_flags })
}

/// ORs `flag` into the flags of `name`.
pub fn set_flag(fd: RawFd, name: &InterfaceName, flag: libc::c_int) -> io::Result<()> {
    let current = flags(fd, name)?;
    let wanted = current | flag as libc::c_short;
    if wanted == current {
        return Ok(());
    }

    let mut ifr = name.ifreq();
    ifr.ifr_ifru.ifru_flags = wanted;
    ioctl(fd, libc::SIOCSIFFLAGS as libc::c_ulong, &mut ifr)
}

/// Administratively brings `name` up (`IFF_UP`).
pub fn set_up(fd: RawFd, name: &InterfaceName) -> io::Result<()> {
    set_flag(fd, name, libc::IFF_UP)
}

/// Enables promiscuous capture on `name` (`IFF_PROMISC`).
pub fn set_promiscuous(fd: RawFd, name: &InterfaceName) -> io::Result<()> {
    set_flag(fd, name, libc::IFF_PROMISC)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
