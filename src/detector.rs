//! Debounced blink detection.
//!
//! A naive threshold crossing over-counts badly under camera and landmark
//! jitter. The detector therefore runs a four-state machine over the EAR
//! stream:
//!
//! ```text
//! Open ──ear<thr──▶ ClosingCandidate ──N frames──▶ Closed
//!   ▲                      │                          │
//!   │◀──ear≥thr (reject)───┘                      ear≥thr
//!   │                                                 ▼
//!   └──confirm, emit◀──────────────────── ReopeningCandidate
//! ```
//!
//! Three mechanisms separate blinks from noise and from deliberate eye
//! closure: a candidate must stay below threshold for `min_closed_frames`
//! consecutive frames, an episode longer than `max_blink_frames` is
//! discarded as a sustained closure, and after each emitted event threshold
//! crossings are ignored for `refractory_ms` (compared by timestamp, so
//! variable frame rates do not shorten the cooldown). A tracking-loss gap
//! aborts any in-progress candidate.

use crate::signal::ear::SignalFrame;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tunable detection parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// EAR below this value counts as eyes-closed
    pub ear_threshold: f64,
    /// Consecutive below-threshold frames required to accept a closure
    pub min_closed_frames: u32,
    /// Episodes longer than this many frames are sustained closures, not blinks
    pub max_blink_frames: u32,
    /// Cooldown after an emitted event before a new candidate may open
    pub refractory_ms: i64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.21,
            min_closed_frames: 2,
            max_blink_frames: 7,
            refractory_ms: 100,
        }
    }
}

/// A completed blink. Emitted exactly once, immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlinkEvent {
    /// First below-threshold sample of the blink
    pub start: DateTime<Utc>,
    /// First above-threshold sample after the closure
    pub end: DateTime<Utc>,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetectorState {
    Open,
    ClosingCandidate,
    Closed,
    ReopeningCandidate,
}

/// The blink state machine.
///
/// Owned by a single processing path; the debounce state is never shared.
pub struct BlinkDetector {
    config: DetectorConfig,
    state: DetectorState,
    /// Timestamp of the candidate's first below-threshold sample
    candidate_start: Option<DateTime<Utc>>,
    /// Consecutive below-threshold samples while still a candidate
    frames_below: u32,
    /// Total frames consumed by the episode so far
    candidate_frames: u32,
    /// First above-threshold sample after Closed; becomes the event end
    reopen_at: Option<DateTime<Utc>>,
    /// End timestamp of the last emitted event, for the refractory window
    last_emitted_end: Option<DateTime<Utc>>,
    /// A dip began inside the refractory window; ignore it until it ends
    suppressed_dip: bool,
}

impl BlinkDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            state: DetectorState::Open,
            candidate_start: None,
            frames_below: 0,
            candidate_frames: 0,
            reopen_at: None,
            last_emitted_end: None,
            suppressed_dip: false,
        }
    }

    /// Return to the initial `Open` state, discarding all episode and
    /// refractory state. Called at session start.
    pub fn reset(&mut self) {
        self.state = DetectorState::Open;
        self.clear_candidate();
        self.last_emitted_end = None;
        self.suppressed_dip = false;
    }

    /// Consume one frame of signal, emitting at most one completed blink.
    pub fn advance(&mut self, frame: &SignalFrame) -> Option<BlinkEvent> {
        let sample = match frame {
            SignalFrame::Sample(sample) => sample,
            SignalFrame::Gap(_) => {
                // Tracking loss must never be read as a blink
                if self.state != DetectorState::Open {
                    self.clear_candidate();
                    self.state = DetectorState::Open;
                }
                self.suppressed_dip = false;
                return None;
            }
        };

        let below = sample.combined_ear < self.config.ear_threshold;
        let now = sample.timestamp;

        match self.state {
            DetectorState::Open => {
                if below {
                    if self.in_refractory(now) {
                        self.suppressed_dip = true;
                    } else if !self.suppressed_dip {
                        // Fresh crossing: open a candidate
                        self.state = DetectorState::ClosingCandidate;
                        self.candidate_start = Some(now);
                        self.frames_below = 1;
                        self.candidate_frames = 1;
                        if self.frames_below >= self.config.min_closed_frames {
                            self.state = DetectorState::Closed;
                        }
                    }
                    // A dip that began inside the refractory window stays
                    // suppressed for its whole duration.
                } else {
                    self.suppressed_dip = false;
                }
                None
            }
            DetectorState::ClosingCandidate => {
                if below {
                    self.frames_below += 1;
                    self.candidate_frames += 1;
                    if self.frames_below >= self.config.min_closed_frames {
                        self.state = DetectorState::Closed;
                    }
                } else {
                    // Rose back above threshold before the debounce count:
                    // single-frame noise, not a blink
                    self.clear_candidate();
                    self.state = DetectorState::Open;
                }
                None
            }
            DetectorState::Closed => {
                if below {
                    self.candidate_frames += 1;
                } else {
                    self.state = DetectorState::ReopeningCandidate;
                    self.reopen_at = Some(now);
                }
                None
            }
            DetectorState::ReopeningCandidate => {
                if below {
                    // Re-dip: the same closure continues
                    self.state = DetectorState::Closed;
                    self.reopen_at = None;
                    self.candidate_frames += 1;
                    None
                } else {
                    self.finish_episode()
                }
            }
        }
    }

    /// Confirmed reopening: emit unless the episode ran past the blink
    /// duration ceiling.
    fn finish_episode(&mut self) -> Option<BlinkEvent> {
        let event = match (self.candidate_start, self.reopen_at) {
            (Some(start), Some(end)) if self.candidate_frames <= self.config.max_blink_frames => {
                self.last_emitted_end = Some(end);
                Some(BlinkEvent {
                    start,
                    end,
                    duration_ms: (end - start).num_milliseconds(),
                })
            }
            // Eyes stayed shut too long: a sustained closure, discarded
            _ => None,
        };
        self.clear_candidate();
        self.state = DetectorState::Open;
        event
    }

    fn in_refractory(&self, now: DateTime<Utc>) -> bool {
        match self.last_emitted_end {
            Some(end) => (now - end).num_milliseconds() < self.config.refractory_ms,
            None => false,
        }
    }

    fn clear_candidate(&mut self) {
        self.candidate_start = None;
        self.frames_below = 0;
        self.candidate_frames = 0;
        self.reopen_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::ear::EarSample;
    use chrono::Duration;

    const FRAME_MS: i64 = 33; // ~30fps

    /// Feed a trace of `Some(ear)` samples and `None` gaps at a fixed frame
    /// interval, collecting every emitted event.
    fn run(detector: &mut BlinkDetector, trace: &[Option<f64>]) -> Vec<BlinkEvent> {
        let base = Utc::now();
        let mut events = Vec::new();
        for (i, entry) in trace.iter().enumerate() {
            let timestamp = base + Duration::milliseconds(i as i64 * FRAME_MS);
            let frame = match entry {
                Some(ear) => SignalFrame::Sample(EarSample {
                    timestamp,
                    left_ear: *ear,
                    right_ear: *ear,
                    combined_ear: *ear,
                }),
                None => SignalFrame::Gap(timestamp),
            };
            events.extend(detector.advance(&frame));
        }
        events
    }

    fn detector() -> BlinkDetector {
        BlinkDetector::new(DetectorConfig::default())
    }

    #[test]
    fn test_open_eyes_emit_nothing() {
        let trace: Vec<Option<f64>> = std::iter::repeat(Some(0.30)).take(120).collect();
        assert!(run(&mut detector(), &trace).is_empty());
    }

    #[test]
    fn test_clean_blink_emits_once() {
        let trace = [
            Some(0.30),
            Some(0.30),
            Some(0.15),
            Some(0.14),
            Some(0.13),
            Some(0.28),
            Some(0.29),
        ];
        let events = run(&mut detector(), &trace);
        assert_eq!(events.len(), 1);
        // Spans the dip: start at sample 3, end at the reopening sample 6
        assert_eq!(events[0].duration_ms, 3 * FRAME_MS);
    }

    #[test]
    fn test_single_frame_dip_rejected_as_noise() {
        let trace = [Some(0.30), Some(0.15), Some(0.30), Some(0.30), Some(0.30)];
        assert!(run(&mut detector(), &trace).is_empty());
    }

    #[test]
    fn test_sustained_closure_rejected() {
        let mut trace = vec![Some(0.30); 2];
        trace.extend(vec![Some(0.12); 10]); // > max_blink_frames
        trace.extend(vec![Some(0.30); 3]);
        assert!(run(&mut detector(), &trace).is_empty());
    }

    #[test]
    fn test_dip_of_exactly_min_closed_frames_counts() {
        let trace = [
            Some(0.30),
            Some(0.15),
            Some(0.14),
            Some(0.30),
            Some(0.30),
        ];
        let events = run(&mut detector(), &trace);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].duration_ms, 2 * FRAME_MS);
    }

    #[test]
    fn test_blinks_inside_refractory_collapse() {
        // Second dip starts one frame (33ms < 100ms) after the first event
        // ends; its crossing falls inside the refractory window.
        let trace = [
            Some(0.30),
            Some(0.15),
            Some(0.14),
            Some(0.30), // reopen: event end
            Some(0.29), // confirm: event emitted
            Some(0.15), // suppressed crossing
            Some(0.14),
            Some(0.30),
            Some(0.29),
        ];
        let events = run(&mut detector(), &trace);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_blinks_outside_refractory_both_count() {
        let mut trace = vec![
            Some(0.30),
            Some(0.15),
            Some(0.14),
            Some(0.30),
            Some(0.29),
        ];
        trace.extend(vec![Some(0.30); 4]); // > 100ms above threshold
        trace.extend([Some(0.15), Some(0.14), Some(0.30), Some(0.29)]);
        let events = run(&mut detector(), &trace);
        assert_eq!(events.len(), 2);
        assert!(events[0].end < events[1].start);
    }

    #[test]
    fn test_gap_aborts_candidate() {
        let trace = [Some(0.30), Some(0.15), None, Some(0.30), Some(0.30)];
        assert!(run(&mut detector(), &trace).is_empty());
    }

    #[test]
    fn test_gap_while_closed_aborts() {
        let trace = [
            Some(0.30),
            Some(0.15),
            Some(0.14),
            None,
            Some(0.30),
            Some(0.29),
        ];
        assert!(run(&mut detector(), &trace).is_empty());
    }

    #[test]
    fn test_redip_during_reopening_continues_closure() {
        // Closure, brief rise, re-dip, then final reopen: one episode.
        let trace = [
            Some(0.30),
            Some(0.15),
            Some(0.14),
            Some(0.25), // reopening candidate
            Some(0.13), // re-dip, back to Closed
            Some(0.28),
            Some(0.29),
        ];
        let events = run(&mut detector(), &trace);
        assert_eq!(events.len(), 1);
        // start at the first dip sample, end at the final reopening sample
        assert_eq!(events[0].duration_ms, 4 * FRAME_MS);
    }

    #[test]
    fn test_reset_discards_candidate() {
        let mut det = detector();
        run(&mut det, &[Some(0.30), Some(0.15), Some(0.14)]);
        det.reset();
        // Without the reset the next two samples would complete a blink
        let events = run(&mut det, &[Some(0.30), Some(0.29)]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_emitted_events_are_ordered_and_disjoint() {
        let mut trace = Vec::new();
        for _ in 0..5 {
            trace.extend(vec![Some(0.30); 6]);
            trace.extend(vec![Some(0.13); 3]);
        }
        trace.extend(vec![Some(0.30); 3]);
        let events = run(&mut detector(), &trace);
        assert_eq!(events.len(), 5);
        for pair in events.windows(2) {
            assert!(pair[0].start < pair[1].start);
            assert!(pair[0].end <= pair[1].start);
        }
    }

    #[test]
    fn test_blink_event_serializes_to_export_contract() {
        let event = BlinkEvent {
            start: Utc::now(),
            end: Utc::now(),
            duration_ms: 99,
        };
        let json = serde_json::to_value(&event).expect("serializable");
        assert!(json.get("start").is_some());
        assert!(json.get("end").is_some());
        assert_eq!(json.get("durationMs").and_then(|v| v.as_i64()), Some(99));
    }
}
