//! Domain entities for tap-bridge.
//!
//! This module contains pure logic with no infrastructure dependencies.  It can
//! be compiled and tested on any platform, without root privileges and without
//! a tap device.
//!
//! Code in the outer layers (the forwarding loop, the Linux endpoints) depends
//! on these types, but the domain never depends on them.

/// Frame buffers and the maximum frame size.
pub mod frame;

/// Interface index + hardware address captured at setup.
pub mod identity;

/// Suppression of the bridge's own transmissions echoed back by the capture.
pub mod echo;
