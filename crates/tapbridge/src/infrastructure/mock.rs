//! Scripted endpoints for testing the forwarding loop without a tap device.
//!
//! Each mock is paired with a cloneable handle.  The loop takes ownership of
//! the mock; the test keeps the handle to queue frames and inspect what was
//! forwarded.
//!
//! [`MockReadiness`] derives readiness from the queues: the link is ready when
//! the link has a queued frame, the tap when the tap has one, and once both
//! queues are drained it reports shutdown.  A scenario therefore runs to
//! completion with a single `ForwardingLoop::run()` call.
//!
//! ```rust
//! use tapbridge::application::ForwardingLoop;
//! use tapbridge::infrastructure::mock::{MockLink, MockReadiness, MockTap};
//! use tapbridge_core::{EndpointIdentity, MacAddr};
//!
//! let (link, link_handle) = MockLink::new();
//! let (tap, tap_handle) = MockTap::new();
//! let readiness = MockReadiness::new(&link_handle, &tap_handle);
//!
//! link_handle.inject_frame(vec![1, 2, 3], 3);
//! let identity = EndpointIdentity::new(3, MacAddr::default());
//! ForwardingLoop::new(link, tap, readiness, identity).run().unwrap();
//!
//! assert_eq!(tap_handle.written(), vec![vec![1, 2, 3]]);
//! ```

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use crate::application::{LinkEndpoint, Readiness, ReadySet, Received, VirtualEndpoint};

// ── Link ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct LinkState {
    inbound: VecDeque<Result<(Vec<u8>, i32), io::ErrorKind>>,
    sent: Vec<Vec<u8>>,
    /// When set, every sent frame is re-captured with this origin index.
    loopback_origin: Option<i32>,
    send_failure: Option<io::ErrorKind>,
}

/// A link endpoint fed from a queue.
#[derive(Debug)]
pub struct MockLink {
    state: Arc<Mutex<LinkState>>,
}

/// Test-side handle to a [`MockLink`].
#[derive(Debug, Clone)]
pub struct MockLinkHandle {
    state: Arc<Mutex<LinkState>>,
}

impl MockLink {
    pub fn new() -> (Self, MockLinkHandle) {
        let state = Arc::new(Mutex::new(LinkState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockLinkHandle { state },
        )
    }

    /// A link whose capture sees every frame it sends, tagged `origin_index`,
    /// like a capture mechanism that echoes the bridge's own traffic.
    pub fn with_loopback(origin_index: i32) -> (Self, MockLinkHandle) {
        let (link, handle) = Self::new();
        handle.lock().loopback_origin = Some(origin_index);
        (link, handle)
    }
}

impl MockLinkHandle {
    fn lock(&self) -> std::sync::MutexGuard<'_, LinkState> {
        self.state.lock().expect("lock poisoned")
    }

    /// Queues a frame to be captured with `origin_index`.
    pub fn inject_frame(&self, frame: Vec<u8>, origin_index: i32) {
        self.lock().inbound.push_back(Ok((frame, origin_index)));
    }

    /// Queues a receive failure.
    pub fn inject_error(&self, kind: io::ErrorKind) {
        self.lock().inbound.push_back(Err(kind));
    }

    /// Makes every subsequent send fail with `kind`.
    pub fn fail_sends(&self, kind: io::ErrorKind) {
        self.lock().send_failure = Some(kind);
    }

    /// Frames passed to `send`, in order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    /// Number of queued receive results.
    pub fn pending(&self) -> usize {
        self.lock().inbound.len()
    }
}

impl LinkEndpoint for MockLink {
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<Received> {
        let next = self.state.lock().expect("lock poisoned").inbound.pop_front();
        match next {
            Some(Ok((frame, origin_index))) => {
                let len = frame.len().min(buf.len());
                buf[..len].copy_from_slice(&frame[..len]);
                Ok(Received { len, origin_index })
            }
            Some(Err(kind)) => Err(io::Error::from(kind)),
            None => Err(io::Error::from(io::ErrorKind::WouldBlock)),
        }
    }

    fn send(&mut self, frame: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().expect("lock poisoned");
        if let Some(kind) = state.send_failure {
            return Err(io::Error::from(kind));
        }
        state.sent.push(frame.to_vec());
        if let Some(origin) = state.loopback_origin {
            state.inbound.push_back(Ok((frame.to_vec(), origin)));
        }
        Ok(frame.len())
    }
}

// ── Tap ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct TapState {
    outbound: VecDeque<Result<Vec<u8>, io::ErrorKind>>,
    written: Vec<Vec<u8>>,
    write_failure: Option<io::ErrorKind>,
}

/// A tap endpoint fed from a queue.
#[derive(Debug)]
pub struct MockTap {
    state: Arc<Mutex<TapState>>,
}

/// Test-side handle to a [`MockTap`].
#[derive(Debug, Clone)]
pub struct MockTapHandle {
    state: Arc<Mutex<TapState>>,
}

impl MockTap {
    pub fn new() -> (Self, MockTapHandle) {
        let state = Arc::new(Mutex::new(TapState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockTapHandle { state },
        )
    }
}

impl MockTapHandle {
    fn lock(&self) -> std::sync::MutexGuard<'_, TapState> {
        self.state.lock().expect("lock poisoned")
    }

    /// Queues a frame as if the local stack sent it out of the tap.
    pub fn inject_frame(&self, frame: Vec<u8>) {
        self.lock().outbound.push_back(Ok(frame));
    }

    /// Queues a read failure.
    pub fn inject_error(&self, kind: io::ErrorKind) {
        self.lock().outbound.push_back(Err(kind));
    }

    /// Makes every subsequent write fail with `kind`.
    pub fn fail_writes(&self, kind: io::ErrorKind) {
        self.lock().write_failure = Some(kind);
    }

    /// Frames injected into the tap, in order.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.lock().written.clone()
    }

    /// Number of queued read results.
    pub fn pending(&self) -> usize {
        self.lock().outbound.len()
    }
}

impl VirtualEndpoint for MockTap {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let next = self.state.lock().expect("lock poisoned").outbound.pop_front();
        match next {
            Some(Ok(frame)) => {
                let len = frame.len().min(buf.len());
                buf[..len].copy_from_slice(&frame[..len]);
                Ok(len)
            }
            Some(Err(kind)) => Err(io::Error::from(kind)),
            None => Err(io::Error::from(io::ErrorKind::WouldBlock)),
        }
    }

    fn write(&mut self, frame: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock().expect("lock poisoned");
        if let Some(kind) = state.write_failure {
            return Err(io::Error::from(kind));
        }
        state.written.push(frame.to_vec());
        Ok(())
    }
}

// ── Readiness ─────────────────────────────────────────────────────────────────

/// Reports readiness from the mock queues; shuts down once both are empty.
#[derive(Debug)]
pub struct MockReadiness {
    link: MockLinkHandle,
    tap: MockTapHandle,
    interrupts: usize,
    waits: Arc<Mutex<usize>>,
}

impl MockReadiness {
    pub fn new(link: &MockLinkHandle, tap: &MockTapHandle) -> Self {
        Self {
            link: link.clone(),
            tap: tap.clone(),
            interrupts: 0,
            waits: Arc::new(Mutex::new(0)),
        }
    }

    /// Makes the next `count` waits fail with `EINTR` before reporting.
    pub fn interrupt_next(mut self, count: usize) -> Self {
        self.interrupts = count;
        self
    }

    /// Shared counter of completed (non-interrupted) waits.
    pub fn wait_counter(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.waits)
    }
}

impl Readiness for MockReadiness {
    fn wait(&mut self) -> io::Result<ReadySet> {
        if self.interrupts > 0 {
            self.interrupts -= 1;
            return Err(io::Error::from(io::ErrorKind::Interrupted));
        }
        *self.waits.lock().expect("lock poisoned") += 1;

        let link = self.link.pending() > 0;
        let tap = self.tap.pending() > 0;
        Ok(ReadySet {
            link,
            tap,
            shutdown: !link && !tap,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
