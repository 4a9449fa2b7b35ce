//! Frame types for the blinkwell agent.
//!
//! A frame is an opaque image buffer plus its capture timestamp. Frames are
//! produced by a [`FrameSource`](crate::capture::FrameSource), borrowed by the
//! processing path for one step, then released.

use chrono::{DateTime, Utc};

/// An opaque image buffer.
///
/// The agent never interprets pixel data itself; buffers are passed through
/// to the landmark provider and discarded after one processing step.
#[derive(Debug, Clone, Default)]
pub struct ImageBuffer {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Raw pixel data, layout defined by the producing source
    pub data: Vec<u8>,
}

impl ImageBuffer {
    /// Create an empty buffer (used by sources that carry no pixel data).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check whether the buffer carries any pixel data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A single captured video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonic capture timestamp
    pub timestamp: DateTime<Utc>,
    /// The image contents
    pub image: ImageBuffer,
}

impl Frame {
    /// Create a frame with the given timestamp and image.
    pub fn new(timestamp: DateTime<Utc>, image: ImageBuffer) -> Self {
        Self { timestamp, image }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer() {
        let buffer = ImageBuffer::empty();
        assert!(buffer.is_empty());
        assert_eq!(buffer.width, 0);
        assert_eq!(buffer.height, 0);
    }

    #[test]
    fn test_frame_creation() {
        let now = Utc::now();
        let frame = Frame::new(now, ImageBuffer::empty());
        assert_eq!(frame.timestamp, now);
        assert!(frame.image.is_empty());
    }
}
