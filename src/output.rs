//! Console output for the scan header and the end-of-run summary.
//!
//! The report file is the durable record; this is only what the operator
//! sees on the terminal.

use crate::cli::OutputFormat;
use crate::scanner::{ScanConfig, ScanSummary};
use crate::types::ScanTarget;
use console::style;
use std::io::{self, Write};
use std::path::Path;

/// Format and print the scan summary.
pub fn print_summary(summary: &ScanSummary, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Plain => print_plain(summary),
        OutputFormat::Json => print_json(summary),
    }
}

/// Print the summary in human-readable plain text format.
fn print_plain(summary: &ScanSummary) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let rule = "═══════════════════════════════════════════════════════════════";

    writeln!(out)?;
    writeln!(out, "{}", style(rule).cyan())?;
    writeln!(
        out,
        "                    {} Scan Summary",
        style("portsweep").cyan().bold()
    )?;
    writeln!(out, "{}", style(rule).cyan())?;
    writeln!(out)?;

    writeln!(out, "  {} {}", style("Target:").bold(), summary.target)?;
    writeln!(out, "  {} {}", style("Ports:").bold(), summary.port_range)?;
    writeln!(
        out,
        "  {} {} (peak {})",
        style("Workers:").bold(),
        summary.worker_count,
        summary.peak_workers
    )?;
    writeln!(out)?;

    writeln!(
        out,
        "  {} {} ports scanned in {:.2}s",
        style("Statistics:").bold(),
        summary.ports_scanned,
        summary.duration_ms as f64 / 1000.0
    )?;
    writeln!(
        out,
        "               {} open, {} filtered, {} transient, {} setup errors",
        style(summary.open_ports).green().bold(),
        style(summary.filtered_ports).yellow(),
        style(summary.transient_errors).red(),
        style(summary.setup_errors).red()
    )?;
    writeln!(
        out,
        "               {} retries",
        style(summary.total_retries).dim()
    )?;
    writeln!(out)?;

    writeln!(
        out,
        "  {} {} ({} lines)",
        style("Report:").bold(),
        summary.report_path.display(),
        summary.report_lines
    )?;
    if summary.failed_writes > 0 {
        writeln!(
            out,
            "  {} {} report lines could not be written",
            style("Warning:").yellow().bold(),
            summary.failed_writes
        )?;
    }
    if summary.lost_workers > 0 {
        writeln!(
            out,
            "  {} {} workers failed without a report line",
            style("Warning:").yellow().bold(),
            summary.lost_workers
        )?;
    }
    if summary.cancelled {
        writeln!(
            out,
            "  {} scan cancelled after {} ports were dispatched",
            style("Note:").yellow().bold(),
            summary.ports_dispatched
        )?;
    }

    writeln!(out)?;
    writeln!(out, "{}", style(rule).cyan())?;
    writeln!(out)?;

    Ok(())
}

/// Print the summary in JSON format.
fn print_json(summary: &ScanSummary) -> io::Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    println!("{}", json);
    Ok(())
}

/// Print a scan header before scanning begins.
pub fn print_scan_header(target: &ScanTarget, config: &ScanConfig, report: &Path) {
    println!();
    println!(
        "{} {} v{}",
        style("Starting").cyan(),
        style("portsweep").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(
        "{} Target: {}",
        style("•").dim(),
        style(target.host).white().bold()
    );
    println!(
        "{} Scanning {} ports with {} workers (send {}s, recv {}s, {} retries)",
        style("•").dim(),
        style(target.ports.len()).white().bold(),
        config.worker_count,
        config.send_timeout.as_secs(),
        config.recv_timeout.as_secs(),
        config.max_retries
    );
    println!(
        "{} Report: {}",
        style("•").dim(),
        style(report.display()).yellow()
    );
    println!();
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}
