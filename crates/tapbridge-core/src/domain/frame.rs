//! Frame buffers.
//!
//! A frame is an opaque link-layer byte sequence.  The bridge never parses,
//! validates or rewrites it; it only moves bytes from one endpoint to the
//! other.
//!
//! Each forwarding direction owns exactly one [`FrameBuffer`].  A frame
//! borrowed from a buffer via [`FrameBuffer::frame`] is valid until the next
//! receive into that buffer, which the borrow checker enforces: the loop
//! cannot receive again while a `&[u8]` into the buffer is still alive.

/// Largest frame the bridge will receive in one call.
///
/// Exceeds any realistic link MTU, including 9000-byte jumbo frames and the
/// 64 KiB frames some virtual NICs produce with segmentation offload.
pub const MAX_FRAME_LEN: usize = 65536;

/// A fixed-size, heap-allocated receive buffer for one forwarding direction.
///
/// Allocated once at startup and reused for every frame in its direction.
pub struct FrameBuffer {
    bytes: Box<[u8]>,
}

impl FrameBuffer {
    /// Allocates a zeroed buffer of [`MAX_FRAME_LEN`] bytes.
    pub fn new() -> Self {
        Self::with_capacity(MAX_FRAME_LEN)
    }

    fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: vec![0u8; capacity].into_boxed_slice(),
        }
    }

    /// Returns the buffer's capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Returns the whole buffer for an endpoint to receive into.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Returns the first `len` bytes: the frame most recently received.
    ///
    /// `len` is clamped to the capacity so a misbehaving endpoint reporting
    /// more bytes than it could have written cannot cause a panic.
    pub fn frame(&self, len: usize) -> &[u8] {
        &self.bytes[..len.min(self.bytes.len())]
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("capacity", &self.bytes.len())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_has_max_frame_capacity() {
        // Arrange / Act
        let buf = FrameBuffer::new();

        // Assert
        assert_eq!(buf.capacity(), MAX_FRAME_LEN);
        assert_eq!(buf.capacity(), 65536);
    }

    #[test]
    fn test_frame_returns_prefix_written_by_endpoint() {
        // Arrange
        let mut buf = FrameBuffer::new();
        buf.as_mut_slice()[..4].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);

        // Act
        let frame = buf.frame(4);

        // Assert
        assert_eq!(frame, &[0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_frame_len_is_clamped_to_capacity() {
        let buf = FrameBuffer::with_capacity(16);
        assert_eq!(buf.frame(1_000).len(), 16);
    }

    #[test]
    fn test_zero_length_frame_is_empty() {
        let buf = FrameBuffer::new();
        assert!(buf.frame(0).is_empty());
    }

    #[test]
    fn test_debug_does_not_dump_contents() {
        let buf = FrameBuffer::with_capacity(8);
        assert_eq!(format!("{buf:?}"), "FrameBuffer { capacity: 8 }");
    }
}
