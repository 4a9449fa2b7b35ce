//! Eye Aspect Ratio extraction.
//!
//! EAR is the ratio of eyelid vertical distance to eye-corner horizontal
//! distance. The horizontal normalization cancels face scale, so the value
//! is comparable regardless of distance from the camera: large while the
//! eye is open, dropping sharply toward zero as the lid closes.

use crate::signal::landmarks::{EyeLandmarks, FaceLandmarks, EAR_POINT_COUNT};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Signal extraction errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    /// The landmark sequence does not carry the required point count.
    InvalidLandmarks { expected: usize, actual: usize },
}

impl std::fmt::Display for SignalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalError::InvalidLandmarks { expected, actual } => {
                write!(f, "invalid eye landmarks: expected {expected} points, got {actual}")
            }
        }
    }
}

impl std::error::Error for SignalError {}

/// Per-frame eye-openness measurement.
///
/// Values are a ratio of distances; landmark noise can push them past the
/// typical 0..=1 range, so no clamp is applied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EarSample {
    pub timestamp: DateTime<Utc>,
    pub left_ear: f64,
    pub right_ear: f64,
    /// Arithmetic mean of the two eyes
    pub combined_ear: f64,
}

/// One frame's worth of signal, as seen by the blink detector.
#[derive(Debug, Clone, Copy)]
pub enum SignalFrame {
    /// A valid eye-openness measurement
    Sample(EarSample),
    /// Tracking loss for this frame. A gap aborts any in-progress blink
    /// candidate; it is never treated as an eyes-closed sample.
    Gap(DateTime<Utc>),
}

impl SignalFrame {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            SignalFrame::Sample(s) => s.timestamp,
            SignalFrame::Gap(t) => *t,
        }
    }
}

/// Compute the aspect ratio of one eye from its six p1..p6 landmarks
/// (p1, p4 horizontal corners; p2/p6 and p3/p5 vertical pairs):
///
/// `EAR = (‖p2-p6‖ + ‖p3-p5‖) / (2 · ‖p1-p4‖)`
pub fn compute_ear(eye: &EyeLandmarks) -> Result<f64, SignalError> {
    let points = eye.points();
    if points.len() != EAR_POINT_COUNT {
        return Err(SignalError::InvalidLandmarks {
            expected: EAR_POINT_COUNT,
            actual: points.len(),
        });
    }

    let vertical_a = points[1].distance(&points[5]);
    let vertical_b = points[2].distance(&points[4]);
    let horizontal = points[0].distance(&points[3]);

    Ok((vertical_a + vertical_b) / (2.0 * horizontal))
}

/// Compute a full per-frame sample from both eyes.
pub fn extract_sample(
    face: &FaceLandmarks,
    timestamp: DateTime<Utc>,
) -> Result<EarSample, SignalError> {
    let left_ear = compute_ear(&face.left)?;
    let right_ear = compute_ear(&face.right)?;

    Ok(EarSample {
        timestamp,
        left_ear,
        right_ear,
        combined_ear: (left_ear + right_ear) / 2.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::landmarks::Point2;

    fn eye(points: &[(f64, f64)]) -> EyeLandmarks {
        EyeLandmarks::from_points(points.iter().map(|&(x, y)| Point2::new(x, y)).collect())
    }

    fn open_eye() -> EyeLandmarks {
        // Unit corner span, vertical pairs 0.3 apart: EAR = 0.3
        eye(&[
            (0.0, 0.0),
            (0.3, -0.15),
            (0.7, -0.15),
            (1.0, 0.0),
            (0.7, 0.15),
            (0.3, 0.15),
        ])
    }

    #[test]
    fn test_compute_ear_known_geometry() {
        let ear = compute_ear(&open_eye()).expect("six points");
        assert!((ear - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_ear_is_scale_invariant() {
        let small = compute_ear(&open_eye()).expect("six points");
        let doubled = eye(&[
            (0.0, 0.0),
            (0.6, -0.3),
            (1.4, -0.3),
            (2.0, 0.0),
            (1.4, 0.3),
            (0.6, 0.3),
        ]);
        let large = compute_ear(&doubled).expect("six points");
        assert!((small - large).abs() < 1e-12);
    }

    #[test]
    fn test_wrong_point_count_rejected() {
        let short = eye(&[(0.0, 0.0), (1.0, 0.0)]);
        assert_eq!(
            compute_ear(&short),
            Err(SignalError::InvalidLandmarks {
                expected: EAR_POINT_COUNT,
                actual: 2
            })
        );
    }

    #[test]
    fn test_combined_is_mean_of_eyes() {
        let face = FaceLandmarks {
            left: open_eye(),
            right: eye(&[
                (0.0, 0.0),
                (0.3, -0.05),
                (0.7, -0.05),
                (1.0, 0.0),
                (0.7, 0.05),
                (0.3, 0.05),
            ]),
        };
        let sample = extract_sample(&face, Utc::now()).expect("valid face");
        assert!((sample.left_ear - 0.3).abs() < 1e-12);
        assert!((sample.right_ear - 0.1).abs() < 1e-12);
        assert!((sample.combined_ear - 0.2).abs() < 1e-12);
    }
}
