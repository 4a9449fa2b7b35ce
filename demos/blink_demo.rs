//! Demonstration of the Blinkwell tracking pipeline.
//!
//! This example shows how to:
//! 1. Build a scripted frame source (no camera required)
//! 2. Start the capture/processing/heartbeat pipeline
//! 3. Observe wellness alerts and live statistics
//! 4. Finalize the session and inspect the export record
//!
//! Run with: cargo run --example blink_demo

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use blinkwell_agent::{
    capture::{BlinkScript, SyntheticFrameSource},
    diagnostics::create_shared_log,
    pipeline::{Pipeline, PipelineConfig},
    session::{SessionRecord, SessionState, WellnessConfig},
    PRIVACY_DECLARATION,
};

fn main() {
    println!("Blinkwell Agent - Pipeline Demo");
    println!("===============================");
    println!();

    // Display privacy declaration
    println!("{PRIVACY_DECLARATION}");
    println!();

    // A 40-second scripted trace: regular blinking at first, then a long
    // blink-free stare to push the rate below the wellness floor.
    let script = BlinkScript::demo(30.0, 40);
    println!("Script: {} frames at 30 fps", script.total_frames());

    let source = SyntheticFrameSource::new(script, true);
    let provider = source.provider();
    let diagnostics = create_shared_log();

    // A short window and low floor so the alert fires within the demo.
    let config = PipelineConfig {
        wellness: WellnessConfig {
            window_secs: 15,
            min_blinks_per_minute: 10.0,
        },
        ..PipelineConfig::default()
    };

    println!();
    println!("Starting pipeline (Ctrl+C to stop early)...");
    println!();

    let pipeline = match Pipeline::start(
        config,
        Box::new(source),
        Box::new(provider),
        diagnostics.clone(),
    ) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("Error starting pipeline: {e}");
            return;
        }
    };

    // Set up stop flag and Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let start = std::time::Instant::now();
    let mut last_stats = std::time::Instant::now();

    while running.load(Ordering::SeqCst) && start.elapsed() < Duration::from_secs(42) {
        std::thread::sleep(Duration::from_millis(100));

        // Alerts arrive on a best-effort channel
        while let Ok(alert) = pipeline.alerts().try_recv() {
            println!(
                "  !! Wellness alert: {:.1} blinks/min (floor: {:.0})",
                alert.observed_rate_per_minute, alert.threshold
            );
        }

        if last_stats.elapsed() >= Duration::from_secs(5) {
            if let Some(stats) = pipeline.session_statistics() {
                println!(
                    "  [{:>3.0}s] {} blinks so far, {:.1}/min",
                    start.elapsed().as_secs_f64(),
                    stats.total_blinks,
                    stats.blinks_per_minute
                );
            }
            last_stats = std::time::Instant::now();
        }

        if pipeline.session_state() == SessionState::Ended {
            break;
        }
    }

    // Finalize
    println!();
    println!("Stopping pipeline...");
    let (session, stats) = match pipeline.stop() {
        Ok(finalized) => finalized,
        Err(e) => {
            eprintln!("Error ending session: {e}");
            return;
        }
    };

    println!();
    println!("=== Session Complete ===");
    println!("  ID: {}", session.id);
    println!("  Duration: {:.1}s", stats.duration_seconds);
    println!("  Total blinks: {}", stats.total_blinks);
    println!("  Blink rate: {:.1}/min", stats.blinks_per_minute);
    println!();

    // Show the export record
    let record = SessionRecord::from(&session);
    match serde_json::to_string_pretty(&record) {
        Ok(json) => {
            println!("  Export record (truncated):");
            for line in json.lines().take(20) {
                println!("    {line}");
            }
            println!("    ...");
        }
        Err(e) => eprintln!("Error serializing record: {e}"),
    }

    // Final statistics
    println!();
    println!("{}", diagnostics.summary());
    println!();
    println!("Demo complete!");
}
