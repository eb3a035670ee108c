//! # tapbridge-core
//!
//! Shared domain types for tap-bridge: the frame buffers that carry raw
//! link-layer frames, the identity of the physical endpoint the bridge is
//! bound to, and the optional echo suppression window.
//!
//! This crate has zero dependencies on OS APIs or sockets.  Everything that
//! touches `/dev/net/tun`, `AF_PACKET` sockets or `poll(2)` lives in the
//! `tapbridge` crate.
//!
//! # Architecture overview (for beginners)
//!
//! tap-bridge connects a physical network interface (for example `eth0`) to a
//! virtual *tap* interface (for example `tap0`).  Every Ethernet frame seen on
//! the physical link is written into the tap, and every frame the local
//! network stack sends out of the tap is transmitted on the physical link.
//!
//! This crate (`tapbridge-core`) defines:
//!
//! - **`domain::frame`** – The fixed-size, per-direction buffers frames are
//!   received into, and the 64 KiB maximum frame length.
//!
//! - **`domain::identity`** – The interface index and hardware address the
//!   bridge was bound to at setup.  Used to decide whether a captured frame
//!   genuinely arrived on the bridged link.
//!
//! - **`domain::echo`** – A short-lived record of frames the bridge itself
//!   transmitted, used to drop them if the capture mechanism echoes them back.

pub mod domain;

// Re-export the most-used types at the crate root so callers can write
// `tapbridge_core::EndpointIdentity` instead of the full module path.
pub use domain::echo::{EchoSuppressor, DEFAULT_ECHO_MAX_AGE, DEFAULT_ECHO_WINDOW};
pub use domain::frame::{FrameBuffer, MAX_FRAME_LEN};
pub use domain::identity::{EndpointIdentity, MacAddr, MacAddrParseError};
