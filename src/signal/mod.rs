//! Signal extraction for the blinkwell agent.
//!
//! This module contains:
//! - Eye landmark geometry and the landmark-provider seam
//! - Eye Aspect Ratio computation from six-point eye landmarks

pub mod ear;
pub mod landmarks;

// Re-export commonly used types
pub use ear::{compute_ear, extract_sample, EarSample, SignalError, SignalFrame};
pub use landmarks::{
    EyeLandmarks, FaceLandmarks, LandmarkProvider, Observation, Point2, EAR_POINT_COUNT,
    LEFT_EYE_INDICES, RIGHT_EYE_INDICES,
};
