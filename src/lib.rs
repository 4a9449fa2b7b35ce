//! Blinkwell Agent - Real-time blink detection and eye-wellness tracking.
//!
//! This library turns a live video stream into debounced blink events and
//! session-level wellness statistics, with strong privacy guarantees.
//!
//! # Privacy Guarantees
//!
//! - **No frame storage**: Frames are processed one at a time and discarded
//! - **No imagery leaves the machine**: Only derived blink statistics are
//!   persisted or uploaded
//! - **Transparency**: Pipeline activity is counted and auditable
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Blinkwell Agent                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Capture   │──▶│   Signal    │──▶│   Blink     │       │
//! │  │ (FrameSource)│   │ (EAR/frame) │   │  Detector   │       │
//! │  └─────────────┘   └─────────────┘   └──────┬──────┘       │
//! │         │                                    ▼              │
//! │  ┌─────────────┐                     ┌─────────────┐       │
//! │  │ Diagnostics │                     │   Session   │       │
//! │  │  Counters   │                     │ Aggregator  │       │
//! │  └─────────────┘                     └──────┬──────┘       │
//! │                                             ▼              │
//! │                                      ┌─────────────┐       │
//! │                                      │ SessionSink │       │
//! │                                      └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use blinkwell_agent::capture::{BlinkScript, SyntheticFrameSource};
//! use blinkwell_agent::diagnostics::create_shared_log;
//! use blinkwell_agent::pipeline::{Pipeline, PipelineConfig};
//!
//! // A scripted source stands in for a camera + face-mesh stack
//! let script = BlinkScript::demo(30.0, 60);
//! let source = SyntheticFrameSource::new(script, true);
//! let provider = source.provider();
//!
//! let pipeline = Pipeline::start(
//!     PipelineConfig::default(),
//!     Box::new(source),
//!     Box::new(provider),
//!     create_shared_log(),
//! )
//! .expect("Failed to start pipeline");
//!
//! // ... later
//! let (session, stats) = pipeline.stop().expect("Failed to end session");
//! println!("{} blinks in {:.0}s", stats.total_blinks, stats.duration_seconds);
//! # let _ = session;
//! ```

pub mod capture;
pub mod config;
pub mod detector;
pub mod diagnostics;
pub mod pipeline;
pub mod session;
pub mod signal;
pub mod sink;

// Re-export key types at crate root for convenience
pub use capture::{BlinkScript, Frame, FrameSource, ImageBuffer, SyntheticFrameSource};
pub use config::{Config, ConfigError};
pub use detector::{BlinkDetector, BlinkEvent, DetectorConfig};
pub use diagnostics::{DiagnosticsLog, DiagnosticsStats, SharedDiagnosticsLog};
pub use pipeline::{Pipeline, PipelineConfig};
pub use session::{
    Session, SessionAggregator, SessionError, SessionRecord, SessionState, SessionStatistics,
    WellnessAlert, WellnessConfig,
};
pub use signal::{compute_ear, EarSample, LandmarkProvider, Observation, SignalError, SignalFrame};
pub use sink::{JsonExportSink, SessionSink, SinkError, UploadConfig};

// Upload re-exports (when enabled)
#[cfg(feature = "sync")]
pub use sink::{BlockingUploadClient, UploadClient};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              BLINKWELL AGENT - PRIVACY DECLARATION               ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This agent watches your camera feed to track blink health.      ║
║                                                                  ║
║  ✓ WHAT WE KEEP:                                                 ║
║    • When blinks happen and how long they last                   ║
║    • Per-session totals and blink rates                          ║
║                                                                  ║
║  ✗ WHAT WE NEVER KEEP:                                           ║
║    • Video frames or any image content                           ║
║    • Facial landmarks beyond the current frame                   ║
║    • Anything else visible to the camera                         ║
║                                                                  ║
║  All video is processed locally, frame by frame, and each        ║
║  frame is discarded as soon as its eye measurement is taken.     ║
║  Only derived blink statistics are stored or uploaded.           ║
║                                                                  ║
║  You can view pipeline statistics anytime with:                  ║
║    blinkwell status                                              ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_declaration_contents() {
        assert!(PRIVACY_DECLARATION.contains("PRIVACY"));
        assert!(PRIVACY_DECLARATION.contains("NEVER KEEP"));
        assert!(PRIVACY_DECLARATION.contains("Video frames"));
    }
}
