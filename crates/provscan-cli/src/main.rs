//! provscan
//!
//! Batch front end for the AI-provenance detectors.
//!
//! Scans image files for embedded evidence of AI generation (content
//! credentials, EXIF, raw-byte text, XMP) and prints one JSON line per file.

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use provscan_detectors::ProvenanceDetector;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

mod config;
mod scan;

use scan::{Mode, Scanner};

#[derive(Parser, Debug)]
#[command(name = "provscan")]
#[command(about = "Detect AI-generation provenance evidence in images", long_about = None)]
pub struct Cli {
    /// Image files to scan
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// XMP sidecar packet applied to every file
    #[arg(short, long)]
    xmp: Option<PathBuf>,

    /// Detection entry point
    #[arg(short, long, value_enum, default_value_t = Mode::Sequential)]
    mode: Mode,

    /// Configuration file path
    #[arg(short, long, env = "PROVSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Override the concurrent deadline in milliseconds
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Also match generic "AI generated" terms (more false positives)
    #[arg(long)]
    generic_terms: bool,

    /// Print Prometheus metrics to stderr after the batch
    #[arg(long)]
    metrics: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose);

    let config = config::load(&cli)?;
    info!(mode = ?cli.mode, files = cli.files.len(), "Starting provscan");

    let metrics_handle = if cli.metrics {
        Some(init_metrics()?)
    } else {
        None
    };

    let xmp = match &cli.xmp {
        Some(path) => Some(Bytes::from(
            std::fs::read(path).with_context(|| format!("Failed to read XMP sidecar {}", path.display()))?,
        )),
        None => None,
    };

    let scanner = Scanner::new(ProvenanceDetector::new(config), cli.mode, xmp);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for path in &cli.files {
        let report = scanner.scan(path).await;
        serde_json::to_writer(&mut out, &report)?;
        writeln!(out)?;
    }
    out.flush()?;

    let snapshot = scanner.metrics().snapshot();
    info!(
        scanned = snapshot.total_scans,
        detections = snapshot.total_detections(),
        deadline_expired = snapshot.deadline_expired,
        avg_latency_us = snapshot.avg_latency_us(),
        "Batch complete"
    );

    if let Some(handle) = metrics_handle {
        eprint!("{}", handle.render());
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("provscan=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("provscan=info"))
    };

    // stdout carries the JSON reports
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Install the Prometheus recorder and return the handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    provscan_telemetry::describe_metrics();

    info!("Metrics recorder installed");
    Ok(handle)
}
