//! Scanner module - coordinates a full-range TCP sweep.
//!
//! The orchestrator walks the target's port range, takes a slot from the
//! [`slots::SlotScheduler`] for each port and spawns a worker into a
//! `JoinSet`. Workers probe, classify, retry and write one report line each.
//! Once every worker has been joined the report sink is closed and a
//! [`ScanSummary`] is returned.

pub mod classify;
pub mod slots;
pub mod tcp;
pub mod traits;
pub mod worker;

use crate::error::{ScanError, ScanResult};
use crate::report::{prepare_report_dir, report_file, ReportSink};
use crate::types::ScanTarget;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub use classify::{classify, classify_errno, Classification, ConnectFailure, PortVerdict};
pub use slots::{SlotHandle, SlotScheduler, SlotState};
pub use tcp::TcpProber;
pub use traits::{
    Exchange, ProbeResult, Prober, ScanConfig, SetupStage, SharedProber, Transfer,
};
pub use worker::{scan_port, ScanOutcome, TerminalCause, WorkerContext};

/// End-of-run statistics.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub target: String,
    pub port_range: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub worker_count: usize,
    /// Highest number of slots busy at the same time.
    pub peak_workers: usize,
    pub ports_dispatched: usize,
    pub ports_scanned: usize,
    pub open_ports: usize,
    pub filtered_ports: usize,
    pub transient_errors: usize,
    pub setup_errors: usize,
    pub total_retries: u64,
    /// Worker tasks that panicked and left no report line.
    pub lost_workers: usize,
    pub report_path: PathBuf,
    pub report_lines: u64,
    pub failed_writes: u64,
    pub cancelled: bool,
}

impl ScanSummary {
    fn new(target: &ScanTarget, config: &ScanConfig, report_path: PathBuf) -> Self {
        Self {
            target: target.host.to_string(),
            port_range: target.ports.to_string(),
            started_at: Utc::now(),
            completed_at: Utc::now(),
            duration_ms: 0,
            worker_count: config.worker_count,
            peak_workers: 0,
            ports_dispatched: 0,
            ports_scanned: 0,
            open_ports: 0,
            filtered_ports: 0,
            transient_errors: 0,
            setup_errors: 0,
            total_retries: 0,
            lost_workers: 0,
            report_path,
            report_lines: 0,
            failed_writes: 0,
            cancelled: false,
        }
    }

    fn record(&mut self, outcome: &ScanOutcome) {
        self.ports_scanned += 1;
        self.total_retries += u64::from(outcome.retries());
        match outcome.verdict {
            PortVerdict::Open => self.open_ports += 1,
            PortVerdict::FilteredOrTimedOut => self.filtered_ports += 1,
            PortVerdict::TransientError => self.transient_errors += 1,
            PortVerdict::ProbeSetupError => self.setup_errors += 1,
        }
    }

    fn absorb(
        &mut self,
        joined: Result<ScanOutcome, JoinError>,
        progress: Option<&ProgressBar>,
    ) {
        match joined {
            Ok(outcome) => {
                self.record(&outcome);
                if let Some(pb) = progress {
                    pb.inc(1);
                    if outcome.cause() == TerminalCause::OpenAccepted {
                        pb.set_message(format!("accepted on port {}", outcome.port));
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "worker task failed");
                self.lost_workers += 1;
            }
        }
    }

    /// Get a short summary of the scan.
    pub fn one_line(&self) -> String {
        format!(
            "{} [{}] - {} open, {} filtered, {} transient, {} setup errors [{:.2}s]",
            self.target,
            self.port_range,
            self.open_ports,
            self.filtered_ports,
            self.transient_errors,
            self.setup_errors,
            self.duration_ms as f64 / 1000.0
        )
    }
}

/// Execute a complete scan with the TCP connect prober.
pub async fn run_scan(target: ScanTarget, config: ScanConfig) -> ScanResult<ScanSummary> {
    run_scan_with_cancel(target, config, CancellationToken::new()).await
}

/// Execute a complete scan that stops dispatching once `cancel` fires.
pub async fn run_scan_with_cancel(
    target: ScanTarget,
    config: ScanConfig,
    cancel: CancellationToken,
) -> ScanResult<ScanSummary> {
    let prober: SharedProber = Arc::new(TcpProber::from_config(&config));
    run_scan_with(prober, target, config, cancel).await
}

/// Execute a complete scan with any prober.
pub async fn run_scan_with(
    prober: SharedProber,
    target: ScanTarget,
    config: ScanConfig,
    cancel: CancellationToken,
) -> ScanResult<ScanSummary> {
    config.validate()?;
    let start_time = Instant::now();

    prepare_report_dir(&config.report_dir, target.host)?;
    let path = report_file(&config.report_dir, target.host, config.report_format);
    let sink = Arc::new(ReportSink::create(&path).await?);
    let mut summary = ScanSummary::new(&target, &config, sink.path().to_path_buf());

    info!(
        host = %target.host,
        ports = %target.ports,
        workers = config.worker_count,
        report = %sink.path().display(),
        "starting scan"
    );

    let progress = progress_bar(&config, target.ports.len());
    let scheduler = SlotScheduler::new(config.worker_count);
    let context = Arc::new(WorkerContext {
        prober,
        sink: Arc::clone(&sink),
        config: Arc::new(config),
        cancel: cancel.clone(),
        host: target.host,
    });

    let mut workers = JoinSet::new();
    for port in target.ports.iter() {
        if cancel.is_cancelled() {
            break;
        }
        let slot = tokio::select! {
            slot = scheduler.acquire(port) => slot?,
            _ = cancel.cancelled() => break,
        };

        let context = Arc::clone(&context);
        workers.spawn(async move { context.run(slot).await });
        summary.ports_dispatched += 1;

        while let Some(joined) = workers.try_join_next() {
            summary.absorb(joined, progress.as_ref());
        }
    }

    if cancel.is_cancelled() {
        warn!(
            dispatched = summary.ports_dispatched,
            "scan cancelled, waiting for running workers"
        );
        summary.cancelled = true;
    }

    while let Some(joined) = workers.join_next().await {
        summary.absorb(joined, progress.as_ref());
    }

    let still_busy = scheduler.busy();
    if still_busy != 0 {
        warn!(busy = still_busy, "slots still marked busy after all workers joined");
    }
    summary.peak_workers = scheduler.peak_busy();

    drop(context);
    let sink = Arc::try_unwrap(sink).map_err(|_| ScanError::SinkInUse)?;
    let stats = sink.close().await?;
    summary.report_lines = stats.lines_written;
    summary.failed_writes = stats.failed_writes;

    if let Some(pb) = progress {
        pb.finish_with_message("Scan complete");
    }

    summary.completed_at = Utc::now();
    summary.duration_ms = start_time.elapsed().as_millis() as u64;
    info!(summary = %summary.one_line(), "scan finished");

    Ok(summary)
}

fn progress_bar(config: &ScanConfig, total: usize) -> Option<ProgressBar> {
    if !config.show_progress {
        return None;
    }

    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    pb.set_style(style);
    Some(pb)
}
