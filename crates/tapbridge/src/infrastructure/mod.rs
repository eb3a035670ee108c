//! Infrastructure layer for tap-bridge.
//!
//! Contains the OS-facing adapters: the Linux tap device, the `AF_PACKET`
//! socket, interface ioctls, the `poll(2)` readiness source, and TOML
//! configuration storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `tapbridge_core`, but MUST NOT be imported by the `application` layer.

#[cfg(target_os = "linux")]
pub mod linux;

pub mod mock;
pub mod storage;
