// Logging behavior:
// - Writes logs to both stderr and a daily-rotated file at logs/pushtalk.log.
// - Default log level is INFO; control via RUST_LOG (e.g. RUST_LOG=debug
//   for per-event decisions, RUST_LOG=trace for per-frame detail).
// - The logs/ directory is created on startup if missing; file output
//   uses a non-blocking writer with ANSI disabled.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pushtalk_app::ptt::record_with_ptt;
use pushtalk_app::{PttMode, Settings};
use pushtalk_audio::DeviceManager;
use pushtalk_telemetry::EventLog;

fn init_logging() -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "pushtalk.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr);
    let file_layer = fmt::layer().with_writer(non_blocking_file).with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(guard)
}

#[derive(Parser, Debug)]
#[command(name = "pushtalk", author, version, about = "Push-to-talk voice capture")]
struct Cli {
    /// Settings file (defaults to ./pushtalk.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// List available input devices and exit
    #[arg(long = "list-devices")]
    list_devices: bool,

    /// Record one utterance and print a capture summary
    #[arg(long)]
    once: bool,

    /// Override ptt.mode (hold|toggle|hybrid)
    #[arg(long)]
    mode: Option<String>,

    /// Override ptt.trigger_chord (e.g. "ctrl+space")
    #[arg(long)]
    chord: Option<String>,

    /// Session cap in seconds for --once (0 disables)
    #[arg(long, default_value_t = 120.0)]
    max_seconds: f64,

    /// Print the structured event log as JSON lines after --once
    #[arg(long = "dump-events")]
    dump_events: bool,
}

fn main() -> anyhow::Result<()> {
    let _log_guard = init_logging()?;
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref()).unwrap_or_else(|e| {
        tracing::error!("failed to load settings: {}", e);
        Settings::default()
    });

    if let Some(mode) = &cli.mode {
        settings.ptt.mode = mode.parse::<PttMode>().context("invalid --mode")?;
    }
    if let Some(chord) = &cli.chord {
        settings.ptt.trigger_chord = chord.clone();
    }

    if cli.list_devices {
        let manager = DeviceManager::new();
        println!("Input devices (host: {:?}):", manager.host_id());
        for name in manager.enumerate_input_devices() {
            println!("  {}", name);
        }
        return Ok(());
    }

    if cli.once {
        println!(
            "Press {} to record ({} mode); {} cancels.",
            settings.ptt.trigger_chord,
            settings.ptt.mode.as_str(),
            settings.ptt.cancel_key
        );
        let min_duration_s = settings.ptt.min_duration_ms as f64 / 1000.0;
        let vad = settings.ptt.vad_aggressiveness;
        let (pcm, speech_detected) =
            record_with_ptt(&settings.ptt, cli.max_seconds, false, min_duration_s, vad)
                .context("PTT recording failed")?;

        let seconds = pcm.len() as f64 / 16_000.0;
        println!(
            "Captured {} samples ({:.2} s), speech_detected = {}",
            pcm.len(),
            seconds,
            speech_detected
        );

        if cli.dump_events {
            print!("{}", EventLog::global().to_json_lines());
        }
        return Ok(());
    }

    println!("Nothing to do. Try --once or --list-devices.");
    Ok(())
}
