//! Command-line interface for portsweep.
//!
//! Uses `clap` derive macros for declarative argument parsing. `-h` selects
//! the host, so the help flag is long-only.

use crate::config::AppSettings;
use crate::logging;
use crate::output;
use crate::report::{report_file, ReportFormat};
use crate::scanner::{run_scan_with_cancel, ScanConfig};
use crate::types::ScanTarget;
use anyhow::Context;
use clap::{ArgAction, CommandFactory, Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Full-range concurrent TCP connect port scanner.
#[derive(Parser, Debug)]
#[command(name = "portsweep")]
#[command(version)]
#[command(about = "Scan every TCP port of one IPv4 host and log one line per port", long_about = None)]
#[command(disable_help_flag = true)]
pub struct Args {
    /// Target host (IPv4)
    #[arg(short = 'h', long = "host", value_name = "IPV4")]
    pub host: Option<String>,

    /// Number of concurrent workers [default: 8]
    #[arg(short = 't', long = "thread", visible_alias = "threads", value_name = "NUM")]
    pub threads: Option<usize>,

    /// recv(2) timeout in seconds [default: 5]
    #[arg(short = 'r', long = "recv-timeout", value_name = "SECS")]
    pub recv_timeout: Option<u64>,

    /// send(2) and connect timeout in seconds [default: 5]
    #[arg(short = 's', long = "send-timeout", value_name = "SECS")]
    pub send_timeout: Option<u64>,

    /// Verbose output (repeat to increase the level)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Extra attempts for transient connect errors [default: 3]
    #[arg(long = "max-retries", value_name = "N")]
    pub max_retries: Option<u32>,

    /// Only connect; do not send the probe payload to open ports
    #[arg(long = "no-probe")]
    pub no_probe: bool,

    /// Report line format
    #[arg(short = 'f', long = "format", value_enum)]
    pub format: Option<ReportFormat>,

    /// Base directory for reports [default: reports]
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Summary output format
    #[arg(short = 'o', long = "output", value_enum, default_value = "plain")]
    pub output: OutputFormat,

    /// Path to a settings file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress the header, progress bar and plain summary
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,
}

/// Output format for the end-of-run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable plain text
    #[default]
    Plain,
    /// JSON structured output
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl Args {
    /// Merge flags over the settings file defaults.
    pub fn scan_config(&self, settings: &AppSettings) -> ScanConfig {
        let mut config = settings.to_scan_config();

        if let Some(threads) = self.threads {
            config = config.with_workers(threads);
        }
        if let Some(secs) = self.send_timeout {
            config = config.with_send_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.recv_timeout {
            config = config.with_recv_timeout(Duration::from_secs(secs));
        }
        if let Some(retries) = self.max_retries {
            config = config.with_max_retries(retries);
        }
        if self.no_probe {
            config = config.with_probe(false);
        }
        if let Some(format) = self.format {
            config = config.with_format(format);
        }
        if let Some(dir) = &self.output_dir {
            config = config.with_report_dir(dir);
        }

        let show_progress =
            !self.quiet && self.verbose < 2 && console::Term::stderr().is_term();
        config.with_progress(show_progress)
    }

    fn settings(&self) -> anyhow::Result<AppSettings> {
        match &self.config {
            Some(path) => AppSettings::load_from(path)
                .with_context(|| format!("loading settings from {}", path.display())),
            None => Ok(AppSettings::load().unwrap_or_else(|e| {
                warn!(error = %e, "ignoring settings file");
                AppSettings::default()
            })),
        }
    }
}

/// Parse arguments, run the scan and report the outcome.
pub async fn run() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    logging::init(args.verbose);

    let Some(host) = args.host.as_deref() else {
        output::print_error("Target host cannot be empty!");
        Args::command().print_help()?;
        return Ok(ExitCode::from(1));
    };

    let target: ScanTarget = host.parse().context("parsing --host")?;
    let settings = args.settings()?;
    let config = args.scan_config(&settings);
    config.validate()?;

    if !args.quiet && args.output == OutputFormat::Plain {
        let report = report_file(&config.report_dir, target.host, config.report_format);
        output::print_scan_header(&target, &config, &report);
    }

    let cancel = CancellationToken::new();
    let cancel_on_ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            output::print_warning("interrupted, finishing running workers...");
            cancel_on_ctrlc.cancel();
        }
    });

    let summary = run_scan_with_cancel(target, config, cancel)
        .await
        .context("scan failed")?;

    if !args.quiet || args.output == OutputFormat::Json {
        output::print_summary(&summary, args.output)?;
    }

    Ok(if summary.cancelled {
        ExitCode::from(130)
    } else {
        ExitCode::SUCCESS
    })
}
