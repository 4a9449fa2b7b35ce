//! Pipeline diagnostics counters.
//!
//! Tracks how the tracking pipeline is behaving without retaining any frame
//! content. Dropped frames are reduced sampling density, not an error, so
//! they surface here rather than in any failure path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Diagnostics counters for the current agent run.
#[derive(Debug)]
pub struct DiagnosticsLog {
    /// Frames delivered by the frame source
    frames_captured: AtomicU64,
    /// Frames discarded under backpressure (oldest-drop)
    frames_dropped: AtomicU64,
    /// Frames that made it through signal extraction
    frames_processed: AtomicU64,
    /// Frames with no detectable face
    no_signal_frames: AtomicU64,
    /// Frames rejected for malformed landmarks
    invalid_landmark_frames: AtomicU64,
    /// Blink events emitted by the detector
    blinks_detected: AtomicU64,
    /// Wellness alerts raised
    alerts_raised: AtomicU64,
    /// Run start time
    run_start: DateTime<Utc>,
    /// Path for persisting counters
    persist_path: Option<PathBuf>,
}

impl DiagnosticsLog {
    /// Create a new diagnostics log.
    pub fn new() -> Self {
        Self {
            frames_captured: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            frames_processed: AtomicU64::new(0),
            no_signal_frames: AtomicU64::new(0),
            invalid_landmark_frames: AtomicU64::new(0),
            blinks_detected: AtomicU64::new(0),
            alerts_raised: AtomicU64::new(0),
            run_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a diagnostics log with persistence.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::debug!("no previous diagnostics loaded: {e}");
        }

        log
    }

    pub fn record_frame_captured(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_processed(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_no_signal_frame(&self) {
        self.no_signal_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalid_landmarks(&self) {
        self.invalid_landmark_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_blink(&self) {
        self.blinks_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alert(&self) {
        self.alerts_raised.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current counters.
    pub fn stats(&self) -> DiagnosticsStats {
        DiagnosticsStats {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            no_signal_frames: self.no_signal_frames.load(Ordering::Relaxed),
            invalid_landmark_frames: self.invalid_landmark_frames.load(Ordering::Relaxed),
            blinks_detected: self.blinks_detected.load(Ordering::Relaxed),
            alerts_raised: self.alerts_raised.load(Ordering::Relaxed),
            run_start: self.run_start,
            run_duration_secs: (Utc::now() - self.run_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Run Diagnostics:\n\
             - Frames captured: {}\n\
             - Frames dropped under backpressure: {}\n\
             - Frames processed: {}\n\
             - Tracking-loss frames: {}\n\
             - Invalid-landmark frames: {}\n\
             - Blinks detected: {}\n\
             - Wellness alerts raised: {}\n\
             - Run duration: {} seconds",
            stats.frames_captured,
            stats.frames_dropped,
            stats.frames_processed,
            stats.no_signal_frames,
            stats.invalid_landmark_frames,
            stats.blinks_detected,
            stats.alerts_raised,
            stats.run_duration_secs
        )
    }

    /// Save counters to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedCounters {
                frames_captured: stats.frames_captured,
                frames_dropped: stats.frames_dropped,
                frames_processed: stats.frames_processed,
                no_signal_frames: stats.no_signal_frames,
                invalid_landmark_frames: stats.invalid_landmark_frames,
                blinks_detected: stats.blinks_detected,
                alerts_raised: stats.alerts_raised,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load counters from disk.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedCounters =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.frames_captured
                    .store(persisted.frames_captured, Ordering::Relaxed);
                self.frames_dropped
                    .store(persisted.frames_dropped, Ordering::Relaxed);
                self.frames_processed
                    .store(persisted.frames_processed, Ordering::Relaxed);
                self.no_signal_frames
                    .store(persisted.no_signal_frames, Ordering::Relaxed);
                self.invalid_landmark_frames
                    .store(persisted.invalid_landmark_frames, Ordering::Relaxed);
                self.blinks_detected
                    .store(persisted.blinks_detected, Ordering::Relaxed);
                self.alerts_raised
                    .store(persisted.alerts_raised, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.frames_captured.store(0, Ordering::Relaxed);
        self.frames_dropped.store(0, Ordering::Relaxed);
        self.frames_processed.store(0, Ordering::Relaxed);
        self.no_signal_frames.store(0, Ordering::Relaxed);
        self.invalid_landmark_frames.store(0, Ordering::Relaxed);
        self.blinks_detected.store(0, Ordering::Relaxed);
        self.alerts_raised.store(0, Ordering::Relaxed);
    }
}

impl Default for DiagnosticsLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of diagnostics counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsStats {
    pub frames_captured: u64,
    pub frames_dropped: u64,
    pub frames_processed: u64,
    pub no_signal_frames: u64,
    pub invalid_landmark_frames: u64,
    pub blinks_detected: u64,
    pub alerts_raised: u64,
    pub run_start: DateTime<Utc>,
    pub run_duration_secs: u64,
}

/// Counter format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedCounters {
    frames_captured: u64,
    frames_dropped: u64,
    frames_processed: u64,
    no_signal_frames: u64,
    invalid_landmark_frames: u64,
    blinks_detected: u64,
    alerts_raised: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared diagnostics log.
pub type SharedDiagnosticsLog = Arc<DiagnosticsLog>;

/// Create a new shared diagnostics log.
pub fn create_shared_log() -> SharedDiagnosticsLog {
    Arc::new(DiagnosticsLog::new())
}

/// Create a new shared diagnostics log with persistence.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedDiagnosticsLog {
    Arc::new(DiagnosticsLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let log = DiagnosticsLog::new();

        log.record_frame_captured();
        log.record_frame_captured();
        log.record_frame_dropped();
        log.record_blink();

        let stats = log.stats();
        assert_eq!(stats.frames_captured, 2);
        assert_eq!(stats.frames_dropped, 1);
        assert_eq!(stats.blinks_detected, 1);
        assert_eq!(stats.alerts_raised, 0);
    }

    #[test]
    fn test_reset() {
        let log = DiagnosticsLog::new();
        log.record_frame_captured();
        log.record_no_signal_frame();
        log.reset();

        let stats = log.stats();
        assert_eq!(stats.frames_captured, 0);
        assert_eq!(stats.no_signal_frames, 0);
    }

    #[test]
    fn test_summary_format() {
        let log = DiagnosticsLog::new();
        let summary = log.summary();

        assert!(summary.contains("Frames captured"));
        assert!(summary.contains("Blinks detected"));
        assert!(summary.contains("Wellness alerts"));
    }
}
