//! Blinkwell Agent CLI
//!
//! Real-time blink detection and eye-wellness session tracking.

use blinkwell_agent::{
    capture::{BlinkScript, SyntheticFrameSource},
    config::Config,
    diagnostics::create_shared_log_with_persistence,
    pipeline::{Pipeline, PipelineConfig},
    session::{SessionRecord, SessionState},
    sink::{JsonExportSink, SessionSink},
    PRIVACY_DECLARATION, VERSION,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[cfg(feature = "sync")]
use blinkwell_agent::sink::{BlockingUploadClient, UploadConfig};

#[derive(Parser)]
#[command(name = "blinkwell")]
#[command(author = "Blinkwell")]
#[command(version = VERSION)]
#[command(about = "Real-time blink detection and eye-wellness tracking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a tracking session
    Start {
        /// Frame rate of the synthetic source
        #[arg(long, default_value = "30.0")]
        fps: f64,

        /// Session length in seconds (tracking stops automatically)
        #[arg(long, default_value = "60")]
        duration: u64,

        /// Override the EAR eyes-closed threshold
        #[arg(long)]
        ear_threshold: Option<f64>,

        /// Override the consecutive-frame closure debounce
        #[arg(long)]
        min_closed_frames: Option<u32>,

        /// Override the sustained-closure frame ceiling
        #[arg(long)]
        max_blink_frames: Option<u32>,

        /// Override the post-blink refractory interval in milliseconds
        #[arg(long)]
        refractory_ms: Option<i64>,

        /// Override the wellness floor in blinks per minute
        #[arg(long)]
        wellness_floor: Option<f64>,

        /// Upload the finalized session to the backend (requires sync feature)
        #[arg(long)]
        sync: bool,

        /// Backend base URL (falls back to the configured one)
        #[arg(long)]
        backend_url: Option<String>,

        /// Backend bearer token
        #[arg(long)]
        token: Option<String>,
    },

    /// Pause tracking
    Pause,

    /// Resume tracking
    Resume,

    /// Show current tracking status
    Status,

    /// Display privacy declaration
    Privacy,

    /// Export recorded sessions
    Export {
        /// Output directory for the combined export
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Export format (json or jsonl)
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Show configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            fps,
            duration,
            ear_threshold,
            min_closed_frames,
            max_blink_frames,
            refractory_ms,
            wellness_floor,
            sync,
            backend_url,
            token,
        } => {
            cmd_start(StartArgs {
                fps,
                duration,
                ear_threshold,
                min_closed_frames,
                max_blink_frames,
                refractory_ms,
                wellness_floor,
                sync,
                backend_url,
                token,
            });
        }
        Commands::Pause => {
            cmd_pause();
        }
        Commands::Resume => {
            cmd_resume();
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Privacy => {
            cmd_privacy();
        }
        Commands::Export { output, format } => {
            cmd_export(output, &format);
        }
        Commands::Config => {
            cmd_config();
        }
    }
}

#[cfg_attr(not(feature = "sync"), allow(dead_code))]
struct StartArgs {
    fps: f64,
    duration: u64,
    ear_threshold: Option<f64>,
    min_closed_frames: Option<u32>,
    max_blink_frames: Option<u32>,
    refractory_ms: Option<i64>,
    wellness_floor: Option<f64>,
    sync: bool,
    backend_url: Option<String>,
    token: Option<String>,
}

#[allow(unused_variables)]
fn cmd_start(args: StartArgs) {
    println!("Blinkwell Agent v{VERSION}");
    println!();

    // Load configuration and apply CLI overrides
    let mut config = Config::load().unwrap_or_default();
    if let Some(v) = args.ear_threshold {
        config.detector.ear_threshold = v;
    }
    if let Some(v) = args.min_closed_frames {
        config.detector.min_closed_frames = v;
    }
    if let Some(v) = args.max_blink_frames {
        config.detector.max_blink_frames = v;
    }
    if let Some(v) = args.refractory_ms {
        config.detector.refractory_ms = v;
    }
    if let Some(v) = args.wellness_floor {
        config.wellness.min_blinks_per_minute = v;
    }
    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    println!("Starting tracking...");
    println!("  EAR threshold: {}", config.detector.ear_threshold);
    println!(
        "  Closure debounce: {} frames",
        config.detector.min_closed_frames
    );
    println!(
        "  Wellness floor: {} blinks/min over {}s",
        config.wellness.min_blinks_per_minute, config.wellness.window_secs
    );
    println!("  Session length: {}s at {:.0} fps", args.duration, args.fps);

    // Show upload status
    #[cfg(feature = "sync")]
    let upload_client = if args.sync {
        match create_upload_client(&config, args.backend_url.clone(), args.token.clone()) {
            Ok(client) => {
                println!("  Session upload: enabled");
                println!("  Device ID: {}", client.device_id());

                match client.test_connection() {
                    Ok(true) => println!("  Backend connection: OK"),
                    Ok(false) => {
                        eprintln!("Warning: Backend health check failed");
                    }
                    Err(e) => {
                        eprintln!("Warning: Could not connect to backend: {e}");
                    }
                }
                Some(client)
            }
            Err(e) => {
                eprintln!("Warning: Upload initialization failed: {e}");
                eprintln!("Continuing without session upload.");
                None
            }
        }
    } else {
        println!("  Session upload: disabled");
        None
    };

    #[cfg(not(feature = "sync"))]
    if args.sync {
        eprintln!("Warning: --sync flag ignored (sync feature not enabled at compile time)");
    }

    println!();
    println!("Press Ctrl+C to stop");
    println!();

    // Set up diagnostics
    let diagnostics =
        create_shared_log_with_persistence(config.data_path.join("diagnostics.json"));

    // The synthetic source stands in for a camera + face-mesh stack; real
    // capture integrates through the same FrameSource/LandmarkProvider seams.
    let script = BlinkScript::demo(args.fps, args.duration);
    let source = SyntheticFrameSource::new(script, true);
    let provider = source.provider();

    let pipeline_config = PipelineConfig {
        detector: config.detector,
        wellness: config.wellness,
        heartbeat_interval: config.heartbeat_interval,
        ..PipelineConfig::default()
    };

    let pipeline = match Pipeline::start(
        pipeline_config,
        Box::new(source),
        Box::new(provider),
        diagnostics.clone(),
    ) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("Error starting pipeline: {e}");
            std::process::exit(1);
        }
    };

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc_handler(r);

    // Support pause/resume from another process by polling the config file.
    let mut paused = config.paused;
    if paused {
        println!("Tracking is currently paused.");
        println!("Run `blinkwell resume` to start tracking.");
        let _ = pipeline.pause();
    }

    let started = std::time::Instant::now();
    let mut last_config_check = std::time::Instant::now();
    let mut last_status_line = std::time::Instant::now();

    while running.load(Ordering::SeqCst) && started.elapsed() < Duration::from_secs(args.duration)
    {
        thread::sleep(Duration::from_millis(100));

        // Periodically reload config so `blinkwell pause/resume` can control
        // a running agent.
        if last_config_check.elapsed() >= Duration::from_secs(1) {
            if let Ok(cfg) = Config::load() {
                if cfg.paused != paused {
                    paused = cfg.paused;
                    if paused {
                        println!();
                        println!("Pausing tracking...");
                        if let Err(e) = pipeline.pause() {
                            eprintln!("Warning: pause failed: {e}");
                        }
                    } else {
                        println!();
                        println!("Resuming tracking...");
                        if let Err(e) = pipeline.resume() {
                            eprintln!("Warning: resume failed: {e}");
                        }
                    }
                }
            }
            last_config_check = std::time::Instant::now();
        }

        // Surface wellness alerts as they arrive
        while let Ok(alert) = pipeline.alerts().try_recv() {
            println!(
                "[{}] Wellness alert: {:.1} blinks/min (recommended: {:.0}+)",
                alert.timestamp.format("%H:%M:%S"),
                alert.observed_rate_per_minute,
                alert.threshold
            );
        }

        // Periodic status line
        if last_status_line.elapsed() >= Duration::from_secs(5) && !paused {
            if let Some(stats) = pipeline.session_statistics() {
                println!(
                    "[{}] {} blinks, {:.1}/min",
                    Utc::now().format("%H:%M:%S"),
                    stats.total_blinks,
                    stats.blinks_per_minute
                );
            }
            last_status_line = std::time::Instant::now();
        }

        if pipeline.session_state() == SessionState::Ended {
            break;
        }
    }

    // Stop tracking and finalize the session
    println!();
    println!("Stopping tracking...");
    let (session, stats) = match pipeline.stop() {
        Ok(finalized) => finalized,
        Err(e) => {
            eprintln!("Error ending session: {e}");
            std::process::exit(1);
        }
    };

    println!();
    println!("Session {}", session.id);
    println!("  Duration: {:.0}s", stats.duration_seconds);
    println!("  Total blinks: {}", stats.total_blinks);
    println!("  Blink rate: {:.1}/min", stats.blinks_per_minute);

    // Persist the finalized session
    let export_sink = JsonExportSink::new(config.export_path.clone());
    if let Err(e) = export_sink.persist(&session) {
        eprintln!("Error exporting session: {e}");
    }

    // Upload if enabled
    #[cfg(feature = "sync")]
    if let Some(client) = upload_client {
        println!();
        println!("Uploading session to backend...");
        match client.persist(&session) {
            Ok(()) => println!("Upload complete."),
            Err(e) => eprintln!("Upload failed: {e}"),
        }
    }

    // Save diagnostics
    if let Err(e) = diagnostics.save() {
        eprintln!("Warning: Could not save diagnostics: {e}");
    }

    println!();
    println!("{}", diagnostics.summary());
}

fn cmd_pause() {
    let mut config = Config::load().unwrap_or_default();
    config.paused = true;
    if let Err(e) = config.save() {
        eprintln!("Error saving config: {e}");
        std::process::exit(1);
    }
    println!("Tracking paused. Use 'blinkwell resume' to continue.");
}

fn cmd_resume() {
    let mut config = Config::load().unwrap_or_default();
    config.paused = false;
    if let Err(e) = config.save() {
        eprintln!("Error saving config: {e}");
        std::process::exit(1);
    }
    println!("Tracking resumed.");
}

fn cmd_status() {
    let config = Config::load().unwrap_or_default();

    println!("Blinkwell Agent Status");
    println!("======================");
    println!();

    println!("Configuration:");
    println!("  EAR threshold: {}", config.detector.ear_threshold);
    println!(
        "  Closure debounce: {} frames",
        config.detector.min_closed_frames
    );
    println!(
        "  Sustained-closure ceiling: {} frames",
        config.detector.max_blink_frames
    );
    println!("  Refractory interval: {}ms", config.detector.refractory_ms);
    println!(
        "  Wellness floor: {} blinks/min over {}s",
        config.wellness.min_blinks_per_minute, config.wellness.window_secs
    );
    println!("  Paused: {}", config.paused);
    println!();

    // Load and show diagnostics if available
    let stats_path = config.data_path.join("diagnostics.json");
    if stats_path.exists() {
        if let Ok(content) = std::fs::read_to_string(&stats_path) {
            if let Ok(stats) = serde_json::from_str::<serde_json::Value>(&content) {
                println!("Cumulative Statistics:");
                if let Some(frames) = stats.get("frames_captured") {
                    println!("  Frames captured: {frames}");
                }
                if let Some(dropped) = stats.get("frames_dropped") {
                    println!("  Frames dropped: {dropped}");
                }
                if let Some(blinks) = stats.get("blinks_detected") {
                    println!("  Blinks detected: {blinks}");
                }
                if let Some(alerts) = stats.get("alerts_raised") {
                    println!("  Wellness alerts: {alerts}");
                }
            }
        }
    } else {
        println!("No previous tracking data found.");
    }
}

fn cmd_privacy() {
    println!("{PRIVACY_DECLARATION}");
}

fn cmd_export(output: Option<PathBuf>, format: &str) {
    let config = Config::load().unwrap_or_default();
    let export_dir = output.unwrap_or(config.export_path.clone());

    // Find all session files
    let session_files: Vec<PathBuf> = std::fs::read_dir(&export_dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .map(|n| n.to_string_lossy().starts_with("session_"))
                        .unwrap_or(false)
                })
                .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
                .collect()
        })
        .unwrap_or_default();

    if session_files.is_empty() {
        println!("No session data found in {export_dir:?}");
        println!("Run 'blinkwell start' to begin tracking.");
        return;
    }

    println!(
        "Found {} session file(s) in {:?}",
        session_files.len(),
        export_dir
    );

    // Combine all session records
    let mut all_sessions: Vec<SessionRecord> = Vec::new();
    for file in &session_files {
        if let Ok(content) = std::fs::read_to_string(file) {
            if let Ok(record) = serde_json::from_str::<SessionRecord>(&content) {
                all_sessions.push(record);
            }
        }
    }
    all_sessions.sort_by_key(|s| s.start_time);

    let total_blinks: usize = all_sessions.iter().map(|s| s.blink_count).sum();
    println!(
        "Total sessions: {} ({} blinks)",
        all_sessions.len(),
        total_blinks
    );

    // Export based on format
    let output_path = export_dir.join(format!(
        "export_{}.{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        if format == "jsonl" { "jsonl" } else { "json" }
    ));

    let result = if format == "jsonl" {
        // JSON Lines format
        let lines: Vec<String> = all_sessions
            .iter()
            .filter_map(|s| serde_json::to_string(s).ok())
            .collect();
        std::fs::write(&output_path, lines.join("\n"))
    } else {
        // Pretty JSON format
        match serde_json::to_string_pretty(&all_sessions) {
            Ok(json) => std::fs::write(&output_path, json),
            Err(e) => {
                eprintln!("Error serializing: {e}");
                return;
            }
        }
    };

    match result {
        Ok(_) => println!("Exported to {output_path:?}"),
        Err(e) => eprintln!("Error writing export: {e}"),
    }
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");
}

/// Create an upload client from CLI args or the configured backend URL.
#[cfg(feature = "sync")]
fn create_upload_client(
    config: &Config,
    backend_url: Option<String>,
    token: Option<String>,
) -> Result<BlockingUploadClient, blinkwell_agent::sink::SinkError> {
    let base_url = backend_url
        .or_else(|| config.backend_url.clone())
        .ok_or_else(|| {
            blinkwell_agent::sink::SinkError::Config(
                "no backend URL configured (use --backend-url or set backend_url)".to_string(),
            )
        })?;
    let token = token.ok_or_else(|| {
        blinkwell_agent::sink::SinkError::Config(
            "no backend token provided (use --token)".to_string(),
        )
    })?;

    BlockingUploadClient::new(UploadConfig::new(base_url, token))
}
