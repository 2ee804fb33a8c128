//! Series summaries and JSON export

use anyhow::{Context, Result};
use can_live_decoder::types::{Sample, SeriesKey, Timestamp};
use can_live_decoder::{PipelineStats, Session};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Aggregate view of one stored series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub key: SeriesKey,
    pub unit: String,
    pub count: usize,
    /// Seconds since the first sample of the run
    pub first_secs: f64,
    pub last_secs: f64,
    pub min: f64,
    pub max: f64,
    pub last: f64,
}

impl SeriesSummary {
    /// Summarise `samples`; `None` for an empty series
    pub fn from_samples(
        key: SeriesKey,
        unit: &str,
        samples: &[Sample],
        origin: Timestamp,
    ) -> Option<Self> {
        let first = samples.first()?;
        let last = samples.last()?;

        let (min, max) = samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
                (lo.min(s.value), hi.max(s.value))
            });

        Some(Self {
            key,
            unit: unit.to_string(),
            count: samples.len(),
            first_secs: first.elapsed_secs(origin),
            last_secs: last.elapsed_secs(origin),
            min,
            max,
            last: last.value,
        })
    }
}

/// JSON document written by `--json`
#[derive(Debug, Serialize)]
struct Export<'a> {
    exported_at: Timestamp,
    stats: PipelineStats,
    series: Vec<ExportSeries<'a>>,
}

#[derive(Debug, Serialize)]
struct ExportSeries<'a> {
    can_id: u32,
    signal: &'a str,
    unit: String,
    samples: &'a [Sample],
}

fn unit_of(session: &Session, key: &SeriesKey) -> String {
    session
        .signal(key.can_id, &key.signal)
        .map(|spec| spec.unit().to_string())
        .unwrap_or_default()
}

/// Summaries of every stored series, sorted by key
pub fn summarize(session: &Session) -> Vec<SeriesSummary> {
    let snapshot = session.snapshot();
    let Some(origin) = snapshot
        .iter()
        .filter_map(|(_, samples)| samples.first().map(|s| s.timestamp))
        .min()
    else {
        return Vec::new();
    };

    snapshot
        .into_iter()
        .filter_map(|(key, samples)| {
            let unit = unit_of(session, &key);
            SeriesSummary::from_samples(key, &unit, &samples, origin)
        })
        .collect()
}

/// Print the per-series table and pipeline counters
pub fn print_summary(summaries: &[SeriesSummary], stats: &PipelineStats) {
    println!("\n📊 Series:");
    if summaries.is_empty() {
        println!("  (no samples stored)");
    }
    for s in summaries {
        println!(
            "  {:<32} {:>6} samples  {:>9.3}s..{:>9.3}s  min {:>12.4}  max {:>12.4}  last {:>12.4} {}",
            s.key.to_string(),
            s.count,
            s.first_secs,
            s.last_secs,
            s.min,
            s.max,
            s.last,
            s.unit
        );
    }

    println!("\n📈 Pipeline:");
    println!("  Frames received: {}", stats.frames_received);
    println!("  Frames filtered: {}", stats.frames_filtered);
    println!("  Frames dropped:  {}", stats.frames_dropped);
    println!("  Frames decoded:  {}", stats.frames_decoded);
    println!("  Samples stored:  {}", stats.samples_stored);
    println!("  Receive errors:  {}", stats.receive_errors);
    if stats.decode_panics > 0 {
        println!("  Decoder panics:  {}", stats.decode_panics);
    }
}

/// Write every stored series plus the counters as pretty JSON
pub fn write_json(session: &Session, stats: &PipelineStats, writer: impl Write) -> Result<()> {
    let snapshot = session.snapshot();
    let series = snapshot
        .iter()
        .map(|(key, samples)| ExportSeries {
            can_id: key.can_id,
            signal: &key.signal,
            unit: unit_of(session, key),
            samples,
        })
        .collect();

    let export = Export {
        exported_at: chrono::Utc::now(),
        stats: *stats,
        series,
    };

    serde_json::to_writer_pretty(writer, &export).context("Failed to serialize series")?;
    Ok(())
}

/// [`write_json`] into a file
pub fn export_json(session: &Session, stats: &PipelineStats, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create output file: {:?}", path))?;
    let mut writer = BufWriter::new(file);
    write_json(session, stats, &mut writer)?;
    writer
        .flush()
        .with_context(|| format!("Failed to write output file: {:?}", path))?;

    log::info!("Exported {} series to {:?}", session.series_keys().len(), path);
    Ok(())
}
