//! Application layer use cases for tap-bridge.
//!
//! The application layer sits between the domain (`tapbridge-core`) and the
//! infrastructure (Linux sockets and devices).  Code here:
//!
//! - **Orchestrates** domain objects: frame buffers, the endpoint identity and
//!   the echo suppressor.
//! - **Depends on abstractions** (traits) rather than file descriptors, so the
//!   Linux endpoints can be swapped for scripted mocks in tests.
//! - **Contains no system calls**.
//!
//! # Sub-modules
//!
//! - **`forward_frames`** – The forwarding loop: readiness wait, origin
//!   filter, and the link ↔ tap hand-off.  Runs for the life of the process.

pub mod forward_frames;

pub use forward_frames::{
    BridgeError, ForwardStats, ForwardingLoop, LinkEndpoint, Readiness, ReadySet, Received, Step,
    VirtualEndpoint,
};
