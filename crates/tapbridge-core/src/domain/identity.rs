//! Identity of the physical endpoint the bridge is bound to.
//!
//! The setup code resolves the physical interface's kernel index and hardware
//! address once, binds the raw socket to them, and hands an
//! [`EndpointIdentity`] to the forwarding loop.  The loop never mutates it; it
//! only compares the origin index of each captured frame against it.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Number of bytes in an Ethernet hardware address.
pub const ETH_ALEN: usize = 6;

/// Errors produced when parsing a textual MAC address.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MacAddrParseError {
    /// The string did not contain exactly six octets.
    #[error("expected 6 octets, found {0}")]
    WrongLength(usize),

    /// One octet was not a one- or two-digit hexadecimal number.
    #[error("invalid octet {0:?}")]
    InvalidOctet(String),
}

/// A 48-bit Ethernet hardware address.
///
/// Displayed in the conventional lowercase, colon-separated form
/// (`02:00:5e:10:00:01`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; ETH_ALEN]);

impl MacAddr {
    /// Builds an address from the first six bytes of a kernel `sa_data` array.
    ///
    /// Returns `None` if fewer than six bytes are supplied.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let octets: [u8; ETH_ALEN] = bytes.get(..ETH_ALEN)?.try_into().ok()?;
        Some(Self(octets))
    }

    /// Returns the raw octets.
    pub fn octets(&self) -> [u8; ETH_ALEN] {
        self.0
    }

    /// Returns `true` for the all-zero address reported by interfaces with no
    /// hardware address (e.g. some point-to-point devices).
    pub fn is_unspecified(&self) -> bool {
        self.0 == [0u8; ETH_ALEN]
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddr {
    type Err = MacAddrParseError;

    /// Parses `aa:bb:cc:dd:ee:ff` or `aa-bb-cc-dd-ee-ff`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(|c| c == ':' || c == '-').collect();
        if parts.len() != ETH_ALEN {
            return Err(MacAddrParseError::WrongLength(parts.len()));
        }

        let mut octets = [0u8; ETH_ALEN];
        for (octet, part) in octets.iter_mut().zip(&parts) {
            if part.is_empty() || part.len() > 2 {
                return Err(MacAddrParseError::InvalidOctet((*part).to_string()));
            }
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| MacAddrParseError::InvalidOctet((*part).to_string()))?;
        }
        Ok(Self(octets))
    }
}

/// The reference interface captured once at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointIdentity {
    /// Kernel interface index (`ifindex`) of the bridged physical link.
    pub if_index: i32,
    /// Hardware address of the bridged physical link.
    pub hw_addr: MacAddr,
}

impl EndpointIdentity {
    pub fn new(if_index: i32, hw_addr: MacAddr) -> Self {
        Self { if_index, hw_addr }
    }

    /// Returns `true` if a frame captured with `origin_index` arrived on the
    /// bridged link.
    pub fn is_same_origin(&self, origin_index: i32) -> bool {
        origin_index == self.if_index
    }
}

impl fmt::Display for EndpointIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ifindex {} hwaddr {}", self.if_index, self.hw_addr)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
