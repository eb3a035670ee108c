//! Echo suppression for self-transmitted frames.
//!
//! The same-origin check compares a captured frame's interface index with the
//! bridged link's index.  A frame the bridge itself just transmitted on that
//! link carries the same index if the capture mechanism delivers it back, so
//! the origin check alone cannot tell the two apart.
//!
//! On Linux an `AF_PACKET` socket never receives its own transmissions, and
//! the bridge runs with suppression disabled by default.  For capture
//! mechanisms that do loop transmissions back, [`EchoSuppressor`] keeps a
//! bounded window of digests of recently sent frames.  A captured frame whose
//! digest matches a live entry is treated as an echo; the entry is consumed so
//! that a genuine identical frame arriving afterwards is still forwarded.
//!
//! # Digest
//!
//! The digest is the frame length plus a 64-bit SipHash of its bytes.  Hash
//! collisions between a genuine frame and a recent transmission within the
//! max-age window would drop the genuine frame; with a 64-bit hash and a
//! window of tens of milliseconds this is not a practical concern.

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::Hasher;
use std::time::{Duration, Instant};

use tracing::trace;

/// Default number of transmitted frames remembered.
pub const DEFAULT_ECHO_WINDOW: usize = 64;

/// Default lifetime of a remembered transmission.
pub const DEFAULT_ECHO_MAX_AGE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy)]
struct SentFrame {
    len: usize,
    digest: u64,
    sent_at: Instant,
}

/// Bounded, time-limited record of frames recently sent on the link.
#[derive(Debug)]
pub struct EchoSuppressor {
    window: usize,
    max_age: Duration,
    sent: VecDeque<SentFrame>,
}

impl EchoSuppressor {
    /// Creates a suppressor remembering at most `window` frames for at most
    /// `max_age` each.  A `window` of zero remembers nothing.
    pub fn new(window: usize, max_age: Duration) -> Self {
        Self {
            window,
            max_age,
            sent: VecDeque::with_capacity(window),
        }
    }

    /// Records a frame that was just sent on the link.
    pub fn record(&mut self, frame: &[u8]) {
        self.record_at(frame, Instant::now());
    }

    /// Records a frame sent at `now`.
    pub fn record_at(&mut self, frame: &[u8], now: Instant) {
        if self.window == 0 {
            return;
        }
        self.expire(now);
        if self.sent.len() == self.window {
            self.sent.pop_front();
        }
        self.sent.push_back(SentFrame {
            len: frame.len(),
            digest: digest(frame),
            sent_at: now,
        });
    }

    /// Returns `true` and forgets the matching record if `frame` is an echo of
    /// a recent transmission.
    pub fn take_echo(&mut self, frame: &[u8]) -> bool {
        self.take_echo_at(frame, Instant::now())
    }

    /// Same as [`take_echo`](Self::take_echo) with an explicit clock.
    pub fn take_echo_at(&mut self, frame: &[u8], now: Instant) -> bool {
        self.expire(now);
        if self.sent.is_empty() {
            return false;
        }

        let len = frame.len();
        let hash = digest(frame);
        match self
            .sent
            .iter()
            .position(|s| s.len == len && s.digest == hash)
        {
            Some(pos) => {
                self.sent.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Number of transmissions currently remembered.
    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }

    fn expire(&mut self, now: Instant) {
        while let Some(front) = self.sent.front() {
            if now.saturating_duration_since(front.sent_at) <= self.max_age {
                break;
            }
            trace!(len = front.len, "echo record expired");
            self.sent.pop_front();
        }
    }
}

impl Default for EchoSuppressor {
    fn default() -> Self {
        Self::new(DEFAULT_ECHO_WINDOW, DEFAULT_ECHO_MAX_AGE)
    }
}

fn digest(frame: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    hasher.write(frame);
    hasher.finish()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(fill: u8, len: usize) -> Vec<u8> {
        vec![fill; len]
    }

    #[test]
    fn test_recorded_frame_is_recognised_as_echo_once() {
        // Arrange
        let mut echo = EchoSuppressor::default();
        let now = Instant::now();
        let sent = frame(0xab, 60);
        echo.record_at(&sent, now);

        // Act
        let first = echo.take_echo_at(&sent, now + Duration::from_millis(1));
        let second = echo.take_echo_at(&sent, now + Duration::from_millis(2));

        // Assert: the record is consumed by the first match
        assert!(first);
        assert!(!second, "an identical genuine frame must not be suppressed");
        assert!(echo.is_empty());
    }

    #[test]
    fn test_unrecorded_frame_is_not_an_echo() {
        let mut echo = EchoSuppressor::default();
        let now = Instant::now();
        echo.record_at(&frame(1, 64), now);

        assert!(!echo.take_echo_at(&frame(2, 64), now));
        assert!(!echo.take_echo_at(&frame(1, 63), now));
        assert_eq!(echo.len(), 1);
    }

    #[test]
    fn test_record_expires_after_max_age() {
        // Arrange
        let mut echo = EchoSuppressor::new(8, Duration::from_millis(50));
        let now = Instant::now();
        let sent = frame(7, 100);
        echo.record_at(&sent, now);

        // Act
        let late = echo.take_echo_at(&sent, now + Duration::from_millis(51));

        // Assert
        assert!(!late);
        assert!(echo.is_empty());
    }

    #[test]
    fn test_window_evicts_oldest_record() {
        // Arrange
        let mut echo = EchoSuppressor::new(2, Duration::from_secs(10));
        let now = Instant::now();
        echo.record_at(&frame(1, 10), now);
        echo.record_at(&frame(2, 10), now);
        echo.record_at(&frame(3, 10), now);

        // Assert
        assert_eq!(echo.len(), 2);
        assert!(!echo.take_echo_at(&frame(1, 10), now));
        assert!(echo.take_echo_at(&frame(2, 10), now));
        assert!(echo.take_echo_at(&frame(3, 10), now));
    }

    #[test]
    fn test_duplicate_transmissions_suppress_one_echo_each() {
        let mut echo = EchoSuppressor::default();
        let now = Instant::now();
        let sent = frame(9, 42);
        echo.record_at(&sent, now);
        echo.record_at(&sent, now);

        assert!(echo.take_echo_at(&sent, now));
        assert!(echo.take_echo_at(&sent, now));
        assert!(!echo.take_echo_at(&sent, now));
    }

    #[test]
    fn test_zero_window_remembers_nothing() {
        let mut echo = EchoSuppressor::new(0, DEFAULT_ECHO_MAX_AGE);
        echo.record(&frame(1, 10));
        assert!(echo.is_empty());
        assert!(!echo.take_echo(&frame(1, 10)));
    }

    #[test]
    fn test_empty_frame_can_be_recorded() {
        let mut echo = EchoSuppressor::default();
        let now = Instant::now();
        echo.record_at(&[], now);
        assert!(echo.take_echo_at(&[], now));
    }
}
