//! Session data model.
//!
//! A session is the unit of persistence: one contiguous tracking run with
//! its ordered blink events. Statistics are derived on demand, never stored.

use crate::detector::BlinkEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
    Paused,
    Ended,
}

/// One tracking session.
///
/// Owned exclusively by the aggregator while active; handed off read-only
/// once ended.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    /// Set when the session ends; `None` while active
    pub end_time: Option<DateTime<Utc>>,
    /// Strictly ordered by start timestamp, non-overlapping
    pub blink_events: Vec<BlinkEvent>,
    pub state: SessionState,
}

impl Session {
    /// Create a fresh running session.
    pub fn begin(now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_time: now,
            end_time: None,
            blink_events: Vec::new(),
            state: SessionState::Running,
        }
    }

    /// Derive statistics over the session's span. For an active session the
    /// span runs to `now`; for an ended one, to its end time.
    pub fn statistics(&self, now: DateTime<Utc>) -> SessionStatistics {
        let span_end = self.end_time.unwrap_or(now);
        let duration_seconds = ((span_end - self.start_time).num_milliseconds() as f64 / 1000.0)
            .max(0.0);
        let total_blinks = self.blink_events.len();
        let blinks_per_minute = if duration_seconds > 0.0 {
            total_blinks as f64 * 60.0 / duration_seconds
        } else {
            0.0
        };

        SessionStatistics {
            total_blinks,
            duration_seconds,
            blinks_per_minute,
        }
    }
}

/// Derived session statistics, recomputed on demand.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionStatistics {
    pub total_blinks: usize,
    pub duration_seconds: f64,
    pub blinks_per_minute: f64,
}

/// Advisory notification that the blink rate fell below the wellness floor.
///
/// Transient and best-effort; never persisted with the session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WellnessAlert {
    pub timestamp: DateTime<Utc>,
    pub observed_rate_per_minute: f64,
    pub threshold: f64,
}

/// The persisted/exported shape of a finalized session.
///
/// Field names and nesting match the wellness backend's export contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub blink_count: usize,
    pub blink_events: Vec<BlinkEvent>,
}

impl From<&Session> for SessionRecord {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            start_time: session.start_time,
            end_time: session.end_time,
            blink_count: session.blink_events.len(),
            blink_events: session.blink_events.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_statistics_of_active_session() {
        let start = Utc::now();
        let mut session = Session::begin(start);
        session.blink_events.push(BlinkEvent {
            start: start + Duration::seconds(1),
            end: start + Duration::milliseconds(1100),
            duration_ms: 100,
        });

        let stats = session.statistics(start + Duration::seconds(30));
        assert_eq!(stats.total_blinks, 1);
        assert!((stats.duration_seconds - 30.0).abs() < 1e-9);
        assert!((stats.blinks_per_minute - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_statistics_use_end_time_once_ended() {
        let start = Utc::now();
        let mut session = Session::begin(start);
        session.end_time = Some(start + Duration::seconds(60));
        session.state = SessionState::Ended;

        // `now` far past the end must not stretch the span
        let stats = session.statistics(start + Duration::seconds(600));
        assert!((stats.duration_seconds - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_record_matches_export_contract() {
        let start = Utc::now();
        let mut session = Session::begin(start);
        session.blink_events.push(BlinkEvent {
            start,
            end: start + Duration::milliseconds(120),
            duration_ms: 120,
        });
        session.end_time = Some(start + Duration::seconds(10));
        session.state = SessionState::Ended;

        let record = SessionRecord::from(&session);
        let json = serde_json::to_value(&record).expect("serializable");

        assert!(json.get("id").is_some());
        assert!(json.get("startTime").is_some());
        assert!(json.get("endTime").is_some());
        assert_eq!(json.get("blinkCount").and_then(|v| v.as_u64()), Some(1));
        let events = json
            .get("blinkEvents")
            .and_then(|v| v.as_array())
            .expect("event array");
        assert!(events[0].get("start").is_some());
        assert!(events[0].get("end").is_some());
        assert!(events[0].get("durationMs").is_some());
    }
}
