//! CAN Live Decoder CLI Application
//!
//! Command-line front end for the can-live-decoder library:
//! - Replays candump logs through the decoding pipeline
//! - Decodes single frames given on the command line
//! - Prints per-series summaries and exports series as JSON

use anyhow::{Context, Result};
use can_live_decoder::bus::parse_candump_line;
use can_live_decoder::{presets, CandumpReplay, Session};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod config;
mod report;

/// How long to wait between progress checks while a replay drains
const DRAIN_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// CAN Live Decoder - Decode CAN frames into signal time series
#[derive(Parser, Debug)]
#[command(name = "can-live-cli")]
#[command(about = "Decode CAN frames into named signals and time series", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// candump log to replay through the pipeline
    #[arg(short, long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Register the preset decoders
    #[arg(long)]
    defaults: bool,

    /// Samples retained per series
    #[arg(long, value_name = "N")]
    capacity: Option<usize>,

    /// Write the stored series as JSON
    #[arg(long, value_name = "FILE")]
    json: Option<PathBuf>,

    /// Decode a single frame (ID#HEX, can be repeated)
    #[arg(short, long, value_name = "ID#HEX")]
    decode: Vec<String>,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("CAN Live Decoder CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", can_live_decoder::VERSION);

    let app = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => config::AppConfig::default(),
    };

    let replay = args.replay.clone().or_else(|| app.input.file.clone());

    if replay.is_none() && args.decode.is_empty() {
        println!("CAN Live Decoder - No input specified");
        println!("\nQuick Start:");
        println!("  can-live-cli --defaults --replay trace.log");
        println!("  can-live-cli --defaults --decode 25E#0000EC05B906");
        println!("\nWith signal definitions:");
        println!("  can-live-cli --config config.toml");
        println!("\nUse --help for more options");
        return Ok(());
    }

    let mut session = build_session(&args, &app)?;

    for frame in &args.decode {
        decode_one(&session, frame)?;
    }

    if let Some(path) = replay {
        replay_mode(&mut session, &path, &args)?;
    }

    Ok(())
}

/// Create the session and register every configured signal
fn build_session(args: &Args, app: &config::AppConfig) -> Result<Session> {
    let mut session_config = app.session.clone();
    if let Some(capacity) = args.capacity {
        session_config = session_config.with_history_capacity(capacity);
    }

    let session = Session::new(session_config).context("Invalid session configuration")?;

    if args.defaults || app.input.use_default_signals {
        session.load_defaults().context("Failed to load default decoders")?;
    }

    let count = session
        .load_signal_configs(app.signal_pairs())
        .context("Failed to register configured signals")?;
    log::debug!("Registered {} configured signals", count);

    if session.identifiers().is_empty() {
        log::warn!("No signals registered; frames will decode to nothing (try --defaults)");
    }

    Ok(session)
}

/// Decode one `ID#HEX` frame and print its signals
fn decode_one(session: &Session, text: &str) -> Result<()> {
    let record = parse_candump_line(text)
        .with_context(|| format!("Invalid frame: {}", text))?
        .with_context(|| format!("Empty frame: {:?}", text))?;
    let frame = record.frame;

    println!(
        "\n🔎 {} ({})",
        frame,
        presets::identifier_name(frame.can_id())
    );

    let decoded = session.decode(frame.can_id(), frame.payload());
    if decoded.is_empty() {
        println!("  (no decoder registered)");
    }
    for signal in &decoded.signals {
        match signal.value {
            Some(value) => println!("  {:<24} {:>12.4} {}", signal.name, value, signal.unit),
            None => println!("  {:<24} {:>12}", signal.name, "n/a"),
        }
    }

    Ok(())
}

/// Replay a candump log through the pipeline and report the result
fn replay_mode(session: &mut Session, path: &Path, args: &Args) -> Result<()> {
    println!("═══════════════════════════════════════════════");
    println!("  CAN Live Decoder - Replay");
    println!("═══════════════════════════════════════════════");
    println!("\n📄 Replaying: {:?}", path);

    let source = CandumpReplay::open(path)
        .with_context(|| format!("Failed to open candump log: {:?}", path))?;
    session.start(source).context("Failed to start capture")?;

    while !session.wait_until_drained(DRAIN_CHECK_INTERVAL) {
        let stats = session.stats();
        log::info!(
            "Replaying... {} frames received, {} decoded",
            stats.frames_received,
            stats.frames_decoded
        );
    }
    let stats = session.stop();

    let summaries = report::summarize(session);
    report::print_summary(&summaries, &stats);

    if let Some(json_path) = &args.json {
        report::export_json(session, &stats, json_path)?;
        println!("\n✓ Series written to {:?}", json_path);
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
