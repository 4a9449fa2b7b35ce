//! Integration tests for the full tracking pipeline.
//!
//! A scripted synthetic source plays a known blink trace through the real
//! capture/processing/heartbeat threads; the finalized session must contain
//! exactly the scripted blinks.

use blinkwell_agent::capture::{BlinkScript, SyntheticFrameSource};
use blinkwell_agent::detector::DetectorConfig;
use blinkwell_agent::diagnostics::{create_shared_log, SharedDiagnosticsLog};
use blinkwell_agent::pipeline::{Pipeline, PipelineConfig};
use blinkwell_agent::session::{SessionRecord, SessionState, WellnessConfig};

/// Block until the processing path has consumed the whole script, so a
/// subsequent stop() cannot cut the trace short.
fn wait_for_frames(diagnostics: &SharedDiagnosticsLog, total: u64) {
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
    while diagnostics.stats().frames_processed < total {
        assert!(
            std::time::Instant::now() < deadline,
            "pipeline did not drain the script in time"
        );
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
}

/// A deep queue so the unpaced script is never thinned by backpressure;
/// blink counts must then be exact.
fn lossless_config() -> PipelineConfig {
    PipelineConfig {
        detector: DetectorConfig::default(),
        wellness: WellnessConfig::default(),
        queue_depth: 1024,
        heartbeat_interval: std::time::Duration::from_millis(200),
    }
}

/// Three clean blinks, one single-frame noise dip, one tracking-loss gap
/// cutting through a would-be blink.
fn scripted_trace() -> BlinkScript {
    BlinkScript::new(30.0)
        .open(10)
        .blink(3) // blink 1
        .open(10)
        .hold(0.12, 1) // noise dip, below the closure debounce
        .open(10)
        .blink(3) // blink 2
        .open(10)
        .hold(0.12, 1)
        .gap(3) // tracking loss aborts this candidate
        .open(10)
        .blink(4) // blink 3
        .open(10)
}

#[test]
fn test_scripted_trace_yields_exact_blinks() {
    let source = SyntheticFrameSource::new(scripted_trace(), false);
    let provider = source.provider();
    let diagnostics = create_shared_log();

    let pipeline = Pipeline::start(
        lossless_config(),
        Box::new(source),
        Box::new(provider),
        diagnostics.clone(),
    )
    .expect("pipeline starts");

    wait_for_frames(&diagnostics, scripted_trace().total_frames() as u64);
    let (session, stats) = pipeline.stop().expect("session ends");

    assert_eq!(session.state, SessionState::Ended);
    assert_eq!(session.blink_events.len(), 3);
    assert_eq!(stats.total_blinks, 3);

    // Ordered and non-overlapping
    for pair in session.blink_events.windows(2) {
        assert!(pair[0].start < pair[1].start);
        assert!(pair[0].end <= pair[1].start);
    }

    // Every scripted frame made it through
    let script_stats = diagnostics.stats();
    assert_eq!(script_stats.frames_dropped, 0);
    assert_eq!(script_stats.frames_captured, scripted_trace().total_frames() as u64);
    assert_eq!(script_stats.no_signal_frames, 3);
    assert_eq!(script_stats.blinks_detected, 3);
}

#[test]
fn test_open_eyes_trace_yields_no_blinks() {
    let script = BlinkScript::new(30.0).open(90);
    let source = SyntheticFrameSource::new(script, false);
    let provider = source.provider();
    let diagnostics = create_shared_log();

    let pipeline = Pipeline::start(
        lossless_config(),
        Box::new(source),
        Box::new(provider),
        diagnostics.clone(),
    )
    .expect("pipeline starts");

    wait_for_frames(&diagnostics, 90);
    let (session, stats) = pipeline.stop().expect("session ends");
    assert!(session.blink_events.is_empty());
    assert_eq!(stats.total_blinks, 0);
}

#[test]
fn test_paused_pipeline_drops_blinks() {
    // Paced playback: the scripted blink starts a full second in, long
    // after the immediate pause below has taken effect.
    let script = BlinkScript::new(30.0).open(30).blink(3).open(5);
    let total_frames = script.total_frames();
    let source = SyntheticFrameSource::new(script, true);
    let provider = source.provider();

    let pipeline = Pipeline::start(
        lossless_config(),
        Box::new(source),
        Box::new(provider),
        create_shared_log(),
    )
    .expect("pipeline starts");

    // Pause before the blink arrives: it must be dropped, not buffered.
    pipeline.pause().expect("pause");
    assert_eq!(pipeline.session_state(), SessionState::Paused);

    // Let the whole script play out while paused.
    let script_ms = (total_frames as u64 * 1000) / 30 + 500;
    std::thread::sleep(std::time::Duration::from_millis(script_ms));
    pipeline.resume().expect("resume");

    let (session, _) = pipeline.stop().expect("session ends");
    assert!(session.blink_events.is_empty());
}

#[test]
fn test_finalized_session_serializes_to_export_contract() {
    let source = SyntheticFrameSource::new(scripted_trace(), false);
    let provider = source.provider();
    let diagnostics = create_shared_log();

    let pipeline = Pipeline::start(
        lossless_config(),
        Box::new(source),
        Box::new(provider),
        diagnostics.clone(),
    )
    .expect("pipeline starts");

    wait_for_frames(&diagnostics, scripted_trace().total_frames() as u64);
    let (session, _) = pipeline.stop().expect("session ends");

    let record = SessionRecord::from(&session);
    let json = serde_json::to_value(&record).expect("serializable");
    assert!(json.get("id").is_some());
    assert!(json.get("startTime").is_some());
    assert!(json.get("endTime").and_then(|v| v.as_str()).is_some());
    assert_eq!(json.get("blinkCount").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(
        json.get("blinkEvents")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(3)
    );
}
