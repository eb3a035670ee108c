//! `AF_PACKET` raw socket: the link endpoint.
//!
//! A `SOCK_RAW` packet socket exchanges complete link-layer frames.  Binding it
//! with a `sockaddr_ll` restricts both directions to one interface:
//!
//! - `recvfrom` fills a `sockaddr_ll` whose `sll_ifindex` tells which
//!   interface the frame was captured on.  Frames queued before `bind`
//!   completes may still carry another interface's index, which is why the
//!   forwarding loop checks it.
//! - `send` (no destination address) transmits on the bound interface.
//!
//! The kernel never loops a packet socket's own transmissions back to that
//! same socket.

use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use tapbridge_core::EndpointIdentity;

use crate::application::{LinkEndpoint, Received};

/// A raw packet socket, optionally bound to one interface.
#[derive(Debug)]
pub struct PacketSocket {
    fd: OwnedFd,
    /// EtherType in host byte order.
    ethertype: u16,
}

impl PacketSocket {
    /// Creates an unbound raw socket capturing `ethertype` (host byte order,
    /// e.g. `0x0003` for `ETH_P_ALL`).
    ///
    /// # Errors
    ///
    /// Returns the `socket(2)` error; `EPERM` without `CAP_NET_RAW`.
    pub fn open(ethertype: u16) -> io::Result<Self> {
        // SAFETY: socket(2) returns a new descriptor or -1.
        let fd = unsafe {
            libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC,
                libc::c_int::from(ethertype.to_be()),
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: fd is a freshly created descriptor nobody else owns.
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };
        Ok(Self { fd, ethertype })
    }

    /// Binds the socket to the interface described by `identity`.
    ///
    /// # Errors
    ///
    /// Returns the `bind(2)` error, e.g. `ENODEV` if the index is stale.
    pub fn bind(&self, identity: &EndpointIdentity) -> io::Result<()> {
        let addr = link_address(self.ethertype, identity);
        // SAFETY: `addr` is a fully initialised sockaddr_ll and the length
        // passed matches its size.
        let ret = unsafe {
            libc::bind(
                self.fd.as_raw_fd(),
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub fn ethertype(&self) -> u16 {
        self.ethertype
    }
}

/// Builds the `sockaddr_ll` the socket is bound with.
fn link_address(ethertype: u16, identity: &EndpointIdentity) -> libc::sockaddr_ll {
    // SAFETY: sockaddr_ll is plain old data; all-zero is a valid value.
    let mut addr: libc::sockaddr_ll = unsafe { mem::zeroed() };
    addr.sll_family = libc::AF_PACKET as libc::c_ushort;
    addr.sll_protocol = ethertype.to_be();
    addr.sll_ifindex = identity.if_index;
    addr.sll_halen = tapbridge_core::domain::identity::ETH_ALEN as u8;
    addr.sll_addr[..6].copy_from_slice(&identity.hw_addr.octets());
    addr
}

impl AsRawFd for PacketSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl LinkEndpoint for PacketSocket {
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<Received> {
        // SAFETY: sockaddr_ll is plain old data; all-zero is a valid value.
        let mut from: libc::sockaddr_ll = unsafe { mem::zeroed() };
        let mut from_len = mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t;

        // SAFETY: `buf` is valid for `buf.len()` writable bytes and `from` /
        // `from_len` describe a writable sockaddr_ll.
        let n = unsafe {
            libc::recvfrom(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
                &mut from as *mut libc::sockaddr_ll as *mut libc::sockaddr,
                &mut from_len,
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Received {
            len: n as usize,
            origin_index: from.sll_ifindex,
        })
    }

    fn send(&mut self, frame: &[u8]) -> io::Result<usize> {
        // SAFETY: `frame` is valid for `frame.len()` readable bytes.
        let n = unsafe {
            libc::send(
                self.fd.as_raw_fd(),
                frame.as_ptr() as *const libc::c_void,
                frame.len(),
                0,
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
