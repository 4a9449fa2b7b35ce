//! The live tracking pipeline.
//!
//! Three paths cooperate around one session:
//!
//! ```text
//! ┌─────────────┐  bounded(2)   ┌──────────────────────────────┐
//! │   capture    │──────────────▶│ extract → detect → aggregate │
//! │ (source fps) │  oldest-drop  │      (single consumer)       │
//! └─────────────┘               └──────────────┬───────────────┘
//!                                              │ lock
//! ┌─────────────┐                       ┌──────▼──────┐   alerts
//! │  heartbeat   │──────on_heartbeat───▶│ aggregator  │──────────▶
//! │  (periodic)  │                      └─────────────┘ best-effort
//! └─────────────┘
//! ```
//!
//! The frame queue is kept shallow on purpose: blink timing depends on low,
//! bounded latency, not on processing every frame. When the consumer falls
//! behind, the oldest queued frame is discarded and counted in diagnostics.
//! The aggregator sits behind a single lock, so the blink-event path and the
//! heartbeat path never mutate the session concurrently, and a late frame
//! can never append to a session that has already ended.

use crate::capture::source::FrameSource;
use crate::detector::{BlinkDetector, DetectorConfig};
use crate::diagnostics::SharedDiagnosticsLog;
use crate::session::aggregator::{SessionAggregator, SessionError, WellnessConfig};
use crate::session::types::{Session, SessionState, SessionStatistics, WellnessAlert};
use crate::signal::ear::{extract_sample, SignalFrame};
use crate::signal::landmarks::{LandmarkProvider, Observation};
use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Depth of the producer/consumer frame queue.
const DEFAULT_QUEUE_DEPTH: usize = 2;

/// Capacity of the best-effort alert channel. Alerts past this are dropped.
const ALERT_CHANNEL_DEPTH: usize = 16;

/// Pipeline tuning.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub detector: DetectorConfig,
    pub wellness: WellnessConfig,
    /// Frame handoff queue depth
    pub queue_depth: usize,
    /// Interval between heartbeat ticks
    pub heartbeat_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            wellness: WellnessConfig::default(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            heartbeat_interval: Duration::from_secs(1),
        }
    }
}

/// A running tracking pipeline.
pub struct Pipeline {
    aggregator: Arc<Mutex<SessionAggregator>>,
    running: Arc<AtomicBool>,
    alert_rx: Receiver<WellnessAlert>,
    capture_handle: Option<JoinHandle<()>>,
    process_handle: Option<JoinHandle<()>>,
    heartbeat_handle: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Start a new session and spawn the capture, processing and heartbeat
    /// paths.
    pub fn start(
        config: PipelineConfig,
        source: Box<dyn FrameSource + Send>,
        provider: Box<dyn LandmarkProvider + Send>,
        diagnostics: SharedDiagnosticsLog,
    ) -> Result<Self, SessionError> {
        let mut aggregator = SessionAggregator::new(config.wellness);
        let session_id = aggregator.start(Utc::now())?;
        tracing::info!(%session_id, "session started");

        let aggregator = Arc::new(Mutex::new(aggregator));
        let running = Arc::new(AtomicBool::new(true));
        let (frame_tx, frame_rx) = bounded(config.queue_depth.max(1));
        let (alert_tx, alert_rx) = bounded(ALERT_CHANNEL_DEPTH);

        // Capture path: drive the source at its native cadence.
        let capture_handle = {
            let running = running.clone();
            let diagnostics = diagnostics.clone();
            let drop_rx = frame_rx.clone();
            let mut source = source;
            thread::spawn(move || {
                while running.load(Ordering::SeqCst) {
                    let frame = match source.next_frame() {
                        Some(frame) => frame,
                        None => break, // end of stream
                    };
                    diagnostics.record_frame_captured();

                    if let Err(TrySendError::Full(frame)) = frame_tx.try_send(frame) {
                        // Consumer is behind: discard the oldest queued
                        // frame to keep latency bounded.
                        let _ = drop_rx.try_recv();
                        diagnostics.record_frame_dropped();
                        let _ = frame_tx.try_send(frame);
                    }
                }
                // frame_tx drops here; the consumer drains and exits.
            })
        };

        // Processing path: extract → detect → aggregate.
        let process_handle = {
            let running = running.clone();
            let diagnostics = diagnostics.clone();
            let aggregator = aggregator.clone();
            let mut provider = provider;
            let mut detector = BlinkDetector::new(config.detector);
            thread::spawn(move || loop {
                match frame_rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(frame) => {
                        let signal = match provider.extract(&frame) {
                            Observation::Face(face) => {
                                match extract_sample(&face, frame.timestamp) {
                                    Ok(sample) => SignalFrame::Sample(sample),
                                    Err(e) => {
                                        // Frame skipped, no event, no
                                        // session mutation
                                        diagnostics.record_invalid_landmarks();
                                        tracing::warn!("skipping frame: {e}");
                                        continue;
                                    }
                                }
                            }
                            Observation::NoFace => {
                                diagnostics.record_no_signal_frame();
                                SignalFrame::Gap(frame.timestamp)
                            }
                        };
                        diagnostics.record_frame_processed();

                        let mut agg = lock_aggregator(&aggregator);
                        if !agg.is_running() {
                            // Paused or ended: samples are dropped, not
                            // buffered, and the detector forgets any
                            // in-progress candidate.
                            detector.reset();
                            continue;
                        }
                        if let Some(event) = detector.advance(&signal) {
                            diagnostics.record_blink();
                            match agg.on_blink_event(event) {
                                Ok(()) => {
                                    tracing::debug!(
                                        duration_ms = event.duration_ms,
                                        "blink detected"
                                    );
                                }
                                // Lost the race with end(): benign no-op
                                Err(e) => tracing::debug!("blink event dropped: {e}"),
                            }
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        if !running.load(Ordering::SeqCst) {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            })
        };

        // Heartbeat path: periodic statistics tick, serialized with the
        // event path through the same aggregator lock.
        let heartbeat_handle = {
            let running = running.clone();
            let diagnostics = diagnostics.clone();
            let aggregator = aggregator.clone();
            let interval = config.heartbeat_interval;
            thread::spawn(move || {
                let mut last_tick = Instant::now();
                while running.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(100));
                    if last_tick.elapsed() < interval {
                        continue;
                    }
                    last_tick = Instant::now();

                    let outcome = lock_aggregator(&aggregator).on_heartbeat(Utc::now());
                    match outcome {
                        Ok(Some(alert)) => {
                            diagnostics.record_alert();
                            tracing::warn!(
                                rate = alert.observed_rate_per_minute,
                                threshold = alert.threshold,
                                "blink rate below wellness floor"
                            );
                            // Delivery is fire-and-forget; a full channel
                            // loses the alert, which is not an error.
                            let _ = alert_tx.try_send(alert);
                        }
                        Ok(None) => {}
                        // Paused, or racing a concurrent end(): skip the tick
                        Err(_) => {}
                    }
                }
            })
        };

        Ok(Self {
            aggregator,
            running,
            alert_rx,
            capture_handle: Some(capture_handle),
            process_handle: Some(process_handle),
            heartbeat_handle: Some(heartbeat_handle),
        })
    }

    /// The best-effort wellness alert stream.
    pub fn alerts(&self) -> &Receiver<WellnessAlert> {
        &self.alert_rx
    }

    /// Current state of the session.
    pub fn session_state(&self) -> SessionState {
        lock_aggregator(&self.aggregator).state()
    }

    /// Statistics of the live session.
    pub fn session_statistics(&self) -> Option<SessionStatistics> {
        lock_aggregator(&self.aggregator).statistics(Utc::now())
    }

    /// Suspend tracking without ending the session.
    pub fn pause(&self) -> Result<(), SessionError> {
        lock_aggregator(&self.aggregator).pause()
    }

    /// Resume a paused session.
    pub fn resume(&self) -> Result<(), SessionError> {
        lock_aggregator(&self.aggregator).resume()
    }

    /// Stop all paths, finalize the session and return it with its
    /// statistics.
    ///
    /// Safe to call at any point: in-flight frames finish or are abandoned,
    /// and none of them can touch the session once it has ended.
    pub fn stop(mut self) -> Result<(Session, SessionStatistics), SessionError> {
        self.shutdown();
        let result = lock_aggregator(&self.aggregator).end(Utc::now());
        if let Ok((ref session, ref stats)) = result {
            tracing::info!(
                session_id = %session.id,
                total_blinks = stats.total_blinks,
                "session ended"
            );
        }
        result
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        for handle in [
            self.capture_handle.take(),
            self.process_handle.take(),
            self.heartbeat_handle.take(),
        ]
        .into_iter()
        .flatten()
        {
            let _ = handle.join();
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Lock the aggregator, recovering the guard if a panicking thread
/// poisoned the mutex.
fn lock_aggregator(aggregator: &Arc<Mutex<SessionAggregator>>) -> MutexGuard<'_, SessionAggregator> {
    aggregator.lock().unwrap_or_else(|e| e.into_inner())
}
