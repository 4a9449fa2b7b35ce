//! Scripted synthetic frame source.
//!
//! Produces frames whose landmark geometry follows a scripted eye-openness
//! trace, so the full pipeline can run and be tested without a camera or a
//! face-mesh model. The source and its matching landmark provider share one
//! script and one start instant, keyed by frame timestamp, so the pairing
//! survives dropped frames.

use crate::capture::types::{Frame, ImageBuffer};
use crate::capture::FrameSource;
use crate::signal::landmarks::{EyeLandmarks, FaceLandmarks, LandmarkProvider, Observation, Point2};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// EAR of a scripted open eye.
pub const OPEN_EAR: f64 = 0.30;

/// EAR of a scripted closed eye.
pub const CLOSED_EAR: f64 = 0.12;

/// One stretch of the scripted trace.
///
/// `ear: None` simulates tracking loss (no face in the frame).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScriptSegment {
    pub ear: Option<f64>,
    pub frames: u32,
}

/// A scripted eye-openness trace at a fixed frame rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlinkScript {
    fps: f64,
    segments: Vec<ScriptSegment>,
}

impl BlinkScript {
    /// Create an empty script at the given frame rate.
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            segments: Vec::new(),
        }
    }

    /// Append a stretch of open-eye frames.
    pub fn open(self, frames: u32) -> Self {
        self.hold(OPEN_EAR, frames)
    }

    /// Append a full blink (closed-eye frames).
    pub fn blink(self, frames: u32) -> Self {
        self.hold(CLOSED_EAR, frames)
    }

    /// Append frames at an explicit EAR value.
    pub fn hold(mut self, ear: f64, frames: u32) -> Self {
        self.segments.push(ScriptSegment {
            ear: Some(ear),
            frames,
        });
        self
    }

    /// Append frames with no detectable face.
    pub fn gap(mut self, frames: u32) -> Self {
        self.segments.push(ScriptSegment { ear: None, frames });
        self
    }

    /// Frame rate of the script.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Total number of frames in the script.
    pub fn total_frames(&self) -> u32 {
        self.segments.iter().map(|s| s.frames).sum()
    }

    /// Scripted EAR for a frame index.
    ///
    /// Returns `None` past the end of the script, `Some(None)` for a
    /// tracking-loss frame, `Some(Some(ear))` otherwise.
    pub fn ear_at(&self, index: u32) -> Option<Option<f64>> {
        let mut offset = 0u32;
        for segment in &self.segments {
            if index < offset + segment.frames {
                return Some(segment.ear);
            }
            offset += segment.frames;
        }
        None
    }

    /// A naturalistic demo trace: a blink roughly every three seconds, with
    /// an occasional single-frame noise dip, a brief tracking loss, and a
    /// long blink-free stretch at the end to provoke a wellness alert.
    pub fn demo(fps: f64, seconds: u64) -> Self {
        let blink_frames = (fps * 0.12).round().max(2.0) as u32;
        let cycle_frames = (fps * 3.0) as u32;
        let open_frames = cycle_frames.saturating_sub(blink_frames);
        let cycles = (seconds as f64 / 3.0 * 0.6).ceil() as u32;

        let mut script = Self::new(fps);
        for cycle in 0..cycles {
            script = script.open(open_frames).blink(blink_frames);
            match cycle % 4 {
                1 => script = script.hold(CLOSED_EAR, 1).open(2), // noise dip, rejected
                3 => script = script.gap((fps * 0.5) as u32),     // brief tracking loss
                _ => {}
            }
        }
        // Blink-free tail: low rate territory
        let tail = (seconds as f64 * 0.4 * fps) as u32;
        script.open(tail)
    }
}

/// Frame source that plays back a [`BlinkScript`].
pub struct SyntheticFrameSource {
    script: BlinkScript,
    start: DateTime<Utc>,
    index: u32,
    paced: bool,
}

impl SyntheticFrameSource {
    /// Create a source for the script. When `paced` is true, frames are
    /// delivered in real time at the script's frame rate; otherwise as fast
    /// as the consumer pulls them.
    pub fn new(script: BlinkScript, paced: bool) -> Self {
        Self {
            script,
            start: Utc::now(),
            index: 0,
            paced,
        }
    }

    /// The matching landmark provider for this source.
    pub fn provider(&self) -> ScriptedLandmarkProvider {
        ScriptedLandmarkProvider {
            script: self.script.clone(),
            start: self.start,
        }
    }

    fn frame_interval_ms(&self) -> i64 {
        (1000.0 / self.script.fps()).round() as i64
    }
}

impl FrameSource for SyntheticFrameSource {
    fn next_frame(&mut self) -> Option<Frame> {
        if self.index >= self.script.total_frames() {
            return None;
        }
        if self.paced && self.index > 0 {
            std::thread::sleep(std::time::Duration::from_millis(
                self.frame_interval_ms() as u64
            ));
        }
        let timestamp = self.start + Duration::milliseconds(self.index as i64 * self.frame_interval_ms());
        self.index += 1;
        Some(Frame::new(timestamp, ImageBuffer::empty()))
    }
}

/// Landmark provider that reconstructs eye geometry from the script.
pub struct ScriptedLandmarkProvider {
    script: BlinkScript,
    start: DateTime<Utc>,
}

impl ScriptedLandmarkProvider {
    fn frame_index(&self, timestamp: DateTime<Utc>) -> u32 {
        let elapsed_ms = (timestamp - self.start).num_milliseconds().max(0) as f64;
        (elapsed_ms * self.script.fps() / 1000.0).round() as u32
    }
}

impl LandmarkProvider for ScriptedLandmarkProvider {
    fn extract(&mut self, frame: &Frame) -> Observation {
        match self.script.ear_at(self.frame_index(frame.timestamp)) {
            Some(Some(ear)) => Observation::Face(FaceLandmarks {
                left: eye_for_ear(ear),
                right: eye_for_ear(ear),
            }),
            _ => Observation::NoFace,
        }
    }
}

/// Build a six-point eye whose aspect ratio equals `ear` exactly.
///
/// Corners span a unit horizontal distance; each vertical pair is separated
/// by `ear`, so (|p2-p6| + |p3-p5|) / (2 |p1-p4|) = ear.
fn eye_for_ear(ear: f64) -> EyeLandmarks {
    let half = ear / 2.0;
    EyeLandmarks::from_points(vec![
        Point2::new(0.0, 0.0),
        Point2::new(0.3, -half),
        Point2::new(0.7, -half),
        Point2::new(1.0, 0.0),
        Point2::new(0.7, half),
        Point2::new(0.3, half),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::ear::compute_ear;

    #[test]
    fn test_script_frame_lookup() {
        let script = BlinkScript::new(30.0).open(3).blink(2).gap(1);
        assert_eq!(script.total_frames(), 6);
        assert_eq!(script.ear_at(0), Some(Some(OPEN_EAR)));
        assert_eq!(script.ear_at(2), Some(Some(OPEN_EAR)));
        assert_eq!(script.ear_at(3), Some(Some(CLOSED_EAR)));
        assert_eq!(script.ear_at(5), Some(None));
        assert_eq!(script.ear_at(6), None);
    }

    #[test]
    fn test_synthetic_geometry_matches_script() {
        let eye = eye_for_ear(0.27);
        let ear = compute_ear(&eye).expect("six points");
        assert!((ear - 0.27).abs() < 1e-9);
    }

    #[test]
    fn test_source_yields_script_length() {
        let script = BlinkScript::new(30.0).open(4).blink(2);
        let mut source = SyntheticFrameSource::new(script, false);
        let mut count = 0;
        while source.next_frame().is_some() {
            count += 1;
        }
        assert_eq!(count, 6);
    }

    #[test]
    fn test_provider_tracks_timestamps() {
        let script = BlinkScript::new(30.0).open(2).gap(1);
        let mut source = SyntheticFrameSource::new(script, false);
        let mut provider = source.provider();

        let first = source.next_frame().expect("frame");
        assert!(matches!(provider.extract(&first), Observation::Face(_)));

        let _second = source.next_frame().expect("frame");
        let third = source.next_frame().expect("frame");
        assert!(matches!(provider.extract(&third), Observation::NoFace));
    }
}
