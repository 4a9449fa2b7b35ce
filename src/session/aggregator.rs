//! Session lifecycle and statistics aggregation.
//!
//! The aggregator owns exactly one session through
//! `Idle → Running ⇄ Paused → Ended` and is the only writer to it. Time is
//! always injected by the caller, so the whole state machine runs
//! deterministically under simulated clocks in tests.

use crate::detector::BlinkEvent;
use crate::session::types::{Session, SessionState, SessionStatistics, WellnessAlert};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Wellness alerting parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WellnessConfig {
    /// Trailing window over which the blink rate is computed
    pub window_secs: u64,
    /// Alert floor in blinks per minute
    pub min_blinks_per_minute: f64,
}

impl Default for WellnessConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            min_blinks_per_minute: 15.0,
        }
    }
}

/// Caller-misuse errors of the session state machine.
///
/// Surfaced to the caller, never retried internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// `start()` on an aggregator that is not idle
    AlreadyRunning,
    /// `end()` on a session that has already ended
    AlreadyEnded,
    /// Any other operation in a state that does not accept it
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::AlreadyRunning => write!(f, "a session is already running"),
            SessionError::AlreadyEnded => write!(f, "the session has already ended"),
            SessionError::InvalidState { operation, state } => {
                write!(f, "{operation} is not valid in state {state:?}")
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// Owns one session's lifecycle, its event sequence, and wellness alerting.
pub struct SessionAggregator {
    wellness: WellnessConfig,
    state: SessionState,
    session: Option<Session>,
    last_alert_at: Option<DateTime<Utc>>,
}

impl SessionAggregator {
    pub fn new(wellness: WellnessConfig) -> Self {
        Self {
            wellness,
            state: SessionState::Idle,
            session: None,
            last_alert_at: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// Begin a new session. The caller resets its blink detector alongside.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<uuid::Uuid, SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyRunning);
        }
        let session = Session::begin(now);
        let id = session.id;
        self.session = Some(session);
        self.state = SessionState::Running;
        self.last_alert_at = None;
        Ok(id)
    }

    /// Append a completed blink to the running session.
    pub fn on_blink_event(&mut self, event: BlinkEvent) -> Result<(), SessionError> {
        if self.state != SessionState::Running {
            return Err(SessionError::InvalidState {
                operation: "on_blink_event",
                state: self.state,
            });
        }
        if let Some(session) = self.session.as_mut() {
            session.blink_events.push(event);
        }
        Ok(())
    }

    /// Periodic tick: recompute the rolling blink rate and raise an alert
    /// when it sits below the floor.
    ///
    /// No alert is considered before one full window has elapsed since
    /// session start, and at most one alert is raised per window duration.
    pub fn on_heartbeat(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Option<WellnessAlert>, SessionError> {
        if self.state != SessionState::Running {
            return Err(SessionError::InvalidState {
                operation: "on_heartbeat",
                state: self.state,
            });
        }
        let session = match self.session.as_ref() {
            Some(session) => session,
            None => return Ok(None),
        };

        let window = Duration::seconds(self.wellness.window_secs as i64);
        if now - session.start_time < window {
            return Ok(None);
        }

        let window_start = now - window;
        let in_window = session
            .blink_events
            .iter()
            .filter(|e| e.start > window_start)
            .count();
        let rate = in_window as f64 * 60.0 / self.wellness.window_secs as f64;

        if rate >= self.wellness.min_blinks_per_minute {
            return Ok(None);
        }
        if let Some(last) = self.last_alert_at {
            if now - last < window {
                return Ok(None);
            }
        }

        self.last_alert_at = Some(now);
        Ok(Some(WellnessAlert {
            timestamp: now,
            observed_rate_per_minute: rate,
            threshold: self.wellness.min_blinks_per_minute,
        }))
    }

    /// Suspend tracking. Incoming samples and events are dropped by the
    /// processing path while paused, not buffered.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Running {
            return Err(SessionError::InvalidState {
                operation: "pause",
                state: self.state,
            });
        }
        self.set_state(SessionState::Paused);
        Ok(())
    }

    /// Resume a paused session.
    pub fn resume(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Paused {
            return Err(SessionError::InvalidState {
                operation: "resume",
                state: self.state,
            });
        }
        self.set_state(SessionState::Running);
        Ok(())
    }

    /// Finalize the session and hand it off with its statistics.
    pub fn end(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<(Session, SessionStatistics), SessionError> {
        match self.state {
            SessionState::Ended => return Err(SessionError::AlreadyEnded),
            SessionState::Idle => {
                return Err(SessionError::InvalidState {
                    operation: "end",
                    state: self.state,
                })
            }
            SessionState::Running | SessionState::Paused => {}
        }

        self.state = SessionState::Ended;
        let mut session = match self.session.take() {
            Some(session) => session,
            None => {
                return Err(SessionError::InvalidState {
                    operation: "end",
                    state: self.state,
                })
            }
        };
        session.end_time = Some(now);
        session.state = SessionState::Ended;
        let stats = session.statistics(now);
        Ok((session, stats))
    }

    /// Current statistics of the live session, if one is active.
    pub fn statistics(&self, now: DateTime<Utc>) -> Option<SessionStatistics> {
        self.session.as_ref().map(|s| s.statistics(now))
    }

    fn set_state(&mut self, state: SessionState) {
        self.state = state;
        if let Some(session) = self.session.as_mut() {
            session.state = state;
        }
    }
}

impl Default for SessionAggregator {
    fn default() -> Self {
        Self::new(WellnessConfig::default())
    }
}
