//! The frame source seam.
//!
//! Cameras, file readers and test scripts all deliver frames through the
//! [`FrameSource`] trait. The capture thread drives the source at its native
//! cadence and hands frames to the processing path through a bounded queue.

use crate::capture::types::Frame;

/// A producer of timestamped video frames.
///
/// Implementations are expected to return promptly or time out internally;
/// the capture loop never imposes its own deadline on a source.
pub trait FrameSource {
    /// Fetch the next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Option<Frame>;
}
