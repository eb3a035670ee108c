//! ForwardingLoop: moves frames between the physical link and the tap.
//!
//! This use case is the heart of tap-bridge.  It blocks until either endpoint
//! has a frame, applies the same-origin filter to frames captured on the link,
//! and forwards each frame to the opposite endpoint exactly once.
//!
//! # Architecture
//!
//! The loop depends only on three traits:
//!
//! - [`LinkEndpoint`]    – the raw link-layer socket bound to the physical NIC.
//! - [`VirtualEndpoint`] – the tap interface descriptor.
//! - [`Readiness`]       – the blocking wait over both descriptors.
//!
//! The Linux implementations live in `infrastructure::linux`; the scripted
//! test doubles live in `infrastructure::mock`.  Nothing in this module makes a
//! system call, so every forwarding rule is unit-testable without root.
//!
//! # Failure policy
//!
//! | Failure                       | Outcome                             |
//! |-------------------------------|-------------------------------------|
//! | readiness wait                | fatal ([`BridgeError::Wait`])       |
//! | link receive / send           | fatal                               |
//! | tap read                      | logged, counted, branch skipped     |
//! | tap write                     | fatal ([`BridgeError::VirtualWrite`]) |
//! | frame from a foreign ifindex  | logged, counted, frame dropped      |
//! | `EINTR` on any call           | retried, never surfaced             |
//!
//! # State machine
//!
//! ```text
//!            ┌────────────── WAITING ◄─────────────┐
//!            │                  │                  │
//!            ▼                  ▼                  │
//!       LINK_READY  ──── BOTH_READY ────  TAP_READY
//!            │        (link branch, then         │
//!            │         tap branch)               │
//!            └───────────────────────────────────┘
//! ```
//!
//! The two readiness checks are independent `if`s, never `if / else`: when
//! both descriptors are readable, both frames move in the same iteration.

use std::io;

use tapbridge_core::{EchoSuppressor, EndpointIdentity, FrameBuffer};
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

/// A frame received on the link: its length in the receive buffer and the
/// interface index the capture mechanism reported for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Received {
    pub len: usize,
    pub origin_index: i32,
}

/// The raw link-layer socket bound to the physical interface.
pub trait LinkEndpoint: Send {
    /// Receives one frame into `buf`, blocking until one is available.
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<Received>;

    /// Transmits `frame` on the bound interface and returns the bytes written.
    fn send(&mut self, frame: &[u8]) -> io::Result<usize>;
}

/// The tap interface descriptor.
pub trait VirtualEndpoint: Send {
    /// Reads one frame the local stack queued for transmission.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Injects `frame` so the local stack observes it as inbound traffic.
    fn write(&mut self, frame: &[u8]) -> io::Result<()>;
}

/// Which descriptors reported readable data in one wait.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadySet {
    pub link: bool,
    pub tap: bool,
    /// A shutdown was requested; the loop stops before touching the endpoints.
    pub shutdown: bool,
}

/// Blocking readiness wait over the link and tap descriptors.
pub trait Readiness: Send {
    /// Blocks, with no timeout, until at least one descriptor is readable or
    /// a shutdown is requested.
    fn wait(&mut self) -> io::Result<ReadySet>;
}

/// Fatal forwarding failures.  Each one ends the loop.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("waiting for link/tap readiness failed: {0}")]
    Wait(#[source] io::Error),

    #[error("receiving from the link socket failed: {0}")]
    LinkReceive(#[source] io::Error),

    #[error("sending on the link socket failed: {0}")]
    LinkSend(#[source] io::Error),

    #[error("writing to the tap interface failed: {0}")]
    VirtualWrite(#[source] io::Error),
}

impl BridgeError {
    /// The OS error code behind the failure, if there is one.
    pub fn os_error(&self) -> Option<i32> {
        match self {
            Self::Wait(e) | Self::LinkReceive(e) | Self::LinkSend(e) | Self::VirtualWrite(e) => {
                e.raw_os_error()
            }
        }
    }
}

/// Result of a single loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Shutdown,
}

/// Counters kept while forwarding.  Diagnostic only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardStats {
    /// Iterations that found at least one endpoint ready.
    pub iterations: u64,
    pub link_to_tap_frames: u64,
    pub link_to_tap_bytes: u64,
    pub tap_to_link_frames: u64,
    pub tap_to_link_bytes: u64,
    /// Frames dropped because they were captured on another interface.
    pub origin_mismatches: u64,
    /// Frames dropped as echoes of the bridge's own transmissions.
    pub echoes_suppressed: u64,
    /// Tap reads that failed and were skipped.
    pub tap_read_errors: u64,
    /// Link sends that wrote fewer bytes than the frame held.
    pub short_sends: u64,
}

/// The forwarding loop.  Owns both endpoints and both frame buffers.
pub struct ForwardingLoop<L, V, R> {
    link: L,
    tap: V,
    readiness: R,
    identity: EndpointIdentity,
    echo: Option<EchoSuppressor>,
    /// Receive buffer for link → tap.
    link_buf: FrameBuffer,
    /// Receive buffer for tap → link.
    tap_buf: FrameBuffer,
    stats: ForwardStats,
}

impl<L, V, R> ForwardingLoop<L, V, R>
where
    L: LinkEndpoint,
    V: VirtualEndpoint,
    R: Readiness,
{
    /// Creates a loop over already-configured endpoints.
    ///
    /// `identity` is the physical interface the link endpoint is bound to;
    /// only frames captured with its index are delivered into the tap.
    pub fn new(link: L, tap: V, readiness: R, identity: EndpointIdentity) -> Self {
        Self {
            link,
            tap,
            readiness,
            identity,
            echo: None,
            link_buf: FrameBuffer::new(),
            tap_buf: FrameBuffer::new(),
            stats: ForwardStats::default(),
        }
    }

    /// Drops same-origin frames that match a recent link transmission.
    pub fn with_echo_suppression(mut self, echo: EchoSuppressor) -> Self {
        self.echo = Some(echo);
        self
    }

    pub fn stats(&self) -> &ForwardStats {
        &self.stats
    }

    /// Runs until a shutdown is requested (`Ok`) or a fatal error occurs.
    pub fn run(&mut self) -> Result<ForwardStats, BridgeError> {
        info!(
            "forwarding between link {} and tap (echo suppression {})",
            self.identity,
            if self.echo.is_some() { "on" } else { "off" }
        );

        loop {
            match self.step() {
                Ok(Step::Continue) => {}
                Ok(Step::Shutdown) => {
                    let s = &self.stats;
                    info!(
                        iterations = s.iterations,
                        link_to_tap = s.link_to_tap_frames,
                        tap_to_link = s.tap_to_link_frames,
                        origin_mismatches = s.origin_mismatches,
                        echoes_suppressed = s.echoes_suppressed,
                        tap_read_errors = s.tap_read_errors,
                        "forwarding stopped"
                    );
                    return Ok(self.stats.clone());
                }
                Err(e) => {
                    error!("forwarding aborted: {e}");
                    return Err(e);
                }
            }
        }
    }

    /// Waits once and services every endpoint that reported ready.
    pub fn step(&mut self) -> Result<Step, BridgeError> {
        let ready = retry_interrupted(|| self.readiness.wait()).map_err(BridgeError::Wait)?;
        if ready.shutdown {
            return Ok(Step::Shutdown);
        }
        if !ready.link && !ready.tap {
            return Ok(Step::Continue);
        }

        self.stats.iterations += 1;

        if ready.link {
            self.forward_link_to_tap()?;
        }
        if ready.tap {
            self.forward_tap_to_link()?;
        }
        Ok(Step::Continue)
    }

    fn forward_link_to_tap(&mut self) -> Result<(), BridgeError> {
        let link = &mut self.link;
        let buf = &mut self.link_buf;
        let received = match retry_interrupted(|| link.receive(buf.as_mut_slice())) {
            Ok(r) => r,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                trace!("link readiness was spurious");
                return Ok(());
            }
            Err(e) => return Err(BridgeError::LinkReceive(e)),
        };

        if !self.identity.is_same_origin(received.origin_index) {
            self.stats.origin_mismatches += 1;
            warn!(
                origin = received.origin_index,
                expected = self.identity.if_index,
                len = received.len,
                "dropping frame captured on a foreign interface"
            );
            return Ok(());
        }
        if received.len == 0 {
            trace!("ignoring empty link frame");
            return Ok(());
        }

        let frame = self.link_buf.frame(received.len);
        if let Some(echo) = self.echo.as_mut() {
            if echo.take_echo(frame) {
                self.stats.echoes_suppressed += 1;
                debug!(len = frame.len(), "dropping echo of our own transmission");
                return Ok(());
            }
        }

        let tap = &mut self.tap;
        retry_interrupted(|| tap.write(frame)).map_err(BridgeError::VirtualWrite)?;

        self.stats.link_to_tap_frames += 1;
        self.stats.link_to_tap_bytes += frame.len() as u64;
        trace!(len = frame.len(), "link → tap");
        Ok(())
    }

    fn forward_tap_to_link(&mut self) -> Result<(), BridgeError> {
        let tap = &mut self.tap;
        let buf = &mut self.tap_buf;
        let len = match retry_interrupted(|| tap.read(buf.as_mut_slice())) {
            Ok(0) => {
                trace!("ignoring empty tap read");
                return Ok(());
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                trace!("tap readiness was spurious");
                return Ok(());
            }
            Err(e) => {
                self.stats.tap_read_errors += 1;
                let failures = self.stats.tap_read_errors;
                if should_report_tap_error(failures) {
                    warn!(failures, "tap read failed, skipping: {e}");
                } else {
                    trace!("tap read failed, skipping: {e}");
                }
                return Ok(());
            }
        };

        let frame = self.tap_buf.frame(len);
        let link = &mut self.link;
        let written = retry_interrupted(|| link.send(frame)).map_err(BridgeError::LinkSend)?;
        if written < frame.len() {
            self.stats.short_sends += 1;
            warn!(written, len = frame.len(), "link send was truncated");
        }
        if let Some(echo) = self.echo.as_mut() {
            echo.record(frame);
        }

        self.stats.tap_to_link_frames += 1;
        self.stats.tap_to_link_bytes += frame.len() as u64;
        trace!(len = frame.len(), "tap → link");
        Ok(())
    }
}

/// Tap read failures repeat on every wakeup once the interface is gone, so
/// only the first and every `TAP_ERROR_REPORT_INTERVAL`th are logged at `warn`.
const TAP_ERROR_REPORT_INTERVAL: u64 = 1000;

fn should_report_tap_error(failures: u64) -> bool {
    failures == 1 || failures % TAP_ERROR_REPORT_INTERVAL == 0
}

/// Re-issues `op` for as long as it fails with `EINTR`.
fn retry_interrupted<T>(mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    loop {
        match op() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                trace!("interrupted system call, retrying");
            }
            other => return other,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
