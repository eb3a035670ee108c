//! Linux setup collaborator and endpoint implementations.
//!
//! [`establish`] performs the one-shot setup the forwarding loop depends on
//! and hands back ready-to-use endpoints:
//!
//! ```text
//! establish(config)
//!  ├─ TapDevice::open(tap.name)            /dev/net/tun + TUNSETIFF
//!  ├─ PacketSocket::open(link.ethertype)   socket(AF_PACKET, SOCK_RAW)
//!  ├─ iface::set_up(link.interface)        SIOCSIFFLAGS |= IFF_UP
//!  ├─ iface::set_promiscuous(link)         SIOCSIFFLAGS |= IFF_PROMISC
//!  ├─ iface::interface_index / hardware_address
//!  ├─ PacketSocket::bind(identity)
//!  └─ iface::set_up(tap)                   SIOCSIFFLAGS |= IFF_UP
//! ```
//!
//! Every step needs `CAP_NET_ADMIN` / `CAP_NET_RAW`; a failure at any step is
//! a [`SetupError`] naming the step and interface.

pub mod iface;
pub mod packet_socket;
pub mod poller;
pub mod tap;

use std::io;
use std::os::fd::AsRawFd;

use tapbridge_core::EndpointIdentity;
use thiserror::Error;
use tracing::info;

use crate::infrastructure::storage::config::AppConfig;

pub use iface::InterfaceName;
pub use packet_socket::PacketSocket;
pub use poller::{PollReadiness, ShutdownHandle};
pub use tap::TapDevice;

/// Failures while preparing the endpoints.  Always fatal.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid interface name: {0}")]
    InvalidInterfaceName(#[source] io::Error),

    #[error("allocating tap interface {name} failed: {source}")]
    TapAlloc {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("creating raw packet socket failed: {0}")]
    Socket(#[source] io::Error),

    #[error("{op} on {iface} failed: {source}")]
    Interface {
        op: &'static str,
        iface: String,
        #[source]
        source: io::Error,
    },

    #[error("binding raw socket to {iface} failed: {source}")]
    Bind {
        iface: String,
        #[source]
        source: io::Error,
    },

    #[error("creating shutdown eventfd failed: {0}")]
    Shutdown(#[source] io::Error),
}

fn interface_error(op: &'static str, name: &InterfaceName) -> impl FnOnce(io::Error) -> SetupError {
    let iface = name.to_string();
    move |source| SetupError::Interface { op, iface, source }
}

/// The endpoints and identity produced by [`establish`].
#[derive(Debug)]
pub struct Endpoints {
    pub link: PacketSocket,
    pub tap: TapDevice,
    pub identity: EndpointIdentity,
}

/// Creates the tap, binds the raw socket to the physical link, and configures
/// both interfaces as `config` describes.
///
/// # Errors
///
/// Returns the first [`SetupError`] encountered.  Resources created before the
/// failure are closed when dropped.
pub fn establish(config: &AppConfig) -> Result<Endpoints, SetupError> {
    let link_name =
        InterfaceName::new(&config.link.interface).map_err(SetupError::InvalidInterfaceName)?;
    let tap_name = InterfaceName::new(&config.tap.name).map_err(SetupError::InvalidInterfaceName)?;

    let tap = TapDevice::open(&tap_name).map_err(|source| SetupError::TapAlloc {
        name: tap_name.to_string(),
        source,
    })?;
    // The kernel may have expanded a `%d` pattern.
    let tap_name = InterfaceName::new(tap.name()).map_err(SetupError::InvalidInterfaceName)?;

    let link = PacketSocket::open(config.link.ethertype).map_err(SetupError::Socket)?;
    let fd = link.as_raw_fd();

    if config.link.bring_up {
        iface::set_up(fd, &link_name).map_err(interface_error("bring up", &link_name))?;
    }
    if config.link.promiscuous {
        iface::set_promiscuous(fd, &link_name)
            .map_err(interface_error("enable promiscuous mode", &link_name))?;
    }

    let if_index = iface::interface_index(fd, &link_name)
        .map_err(interface_error("SIOCGIFINDEX", &link_name))?;
    info!("{link_name} index is {if_index}");
    let hw_addr = iface::hardware_address(fd, &link_name)
        .map_err(interface_error("SIOCGIFHWADDR", &link_name))?;
    info!("{link_name} hw addr is {hw_addr}");

    let identity = EndpointIdentity::new(if_index, hw_addr);
    link.bind(&identity).map_err(|source| SetupError::Bind {
        iface: link_name.to_string(),
        source,
    })?;

    if config.tap.bring_up {
        iface::set_up(fd, &tap_name).map_err(interface_error("bring up", &tap_name))?;
    }

    info!(
        "bridging {link_name} ({identity}) <-> {tap_name}, ethertype {:#06x}",
        link.ethertype()
    );
    Ok(Endpoints {
        link,
        tap,
        identity,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
