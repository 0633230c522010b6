//! Per-port scan lifecycle.
//!
//! A worker probes one port, classifies the result and re-probes while the
//! classifier says the failure was transient and the retry budget lasts.
//! Whatever happens, the worker ends with exactly one [`ScanOutcome`].

use crate::report::{ReportLine, ReportSink};
use crate::scanner::classify::{classify, ConnectFailure, PortVerdict};
use crate::scanner::slots::SlotHandle;
use crate::scanner::traits::{
    Exchange, ProbeResult, Prober, ScanConfig, SetupStage, SharedProber,
};
use crate::types::Port;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Why a port's lifecycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalCause {
    /// The handshake completed.
    OpenAccepted,
    /// The peer answered with a reset.
    Refused,
    /// The connect deadline or the kernel's SYN retries ran out.
    FilteredOrTimedOut(ConnectFailure),
    /// A transient or unknown connect error, after the retry budget.
    ProbeError(ConnectFailure),
    /// The socket could not be prepared.
    SetupFailed(SetupStage),
}

impl TerminalCause {
    /// Short tag used in report lines.
    pub fn tag(&self) -> String {
        match self {
            Self::OpenAccepted => "accepted".to_string(),
            Self::Refused => "refused".to_string(),
            Self::FilteredOrTimedOut(failure) | Self::ProbeError(failure) => {
                failure.tag().to_string()
            }
            Self::SetupFailed(stage) => format!("setup_{stage}"),
        }
    }
}

impl fmt::Display for TerminalCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

/// Final result for one port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub port: Port,
    /// Number of probes made, 1 to `max_retries + 1`.
    pub attempts: u32,
    /// The last probe result.
    pub result: ProbeResult,
    pub verdict: PortVerdict,
}

impl ScanOutcome {
    pub fn cause(&self) -> TerminalCause {
        match &self.result {
            ProbeResult::Connected(_) => TerminalCause::OpenAccepted,
            ProbeResult::SetupFailed { stage, .. } => TerminalCause::SetupFailed(*stage),
            ProbeResult::ConnectFailed { errno } => match ConnectFailure::from_errno(*errno) {
                ConnectFailure::Refused => TerminalCause::Refused,
                failure @ (ConnectFailure::TimedOut | ConnectFailure::InProgress) => {
                    TerminalCause::FilteredOrTimedOut(failure)
                }
                failure => TerminalCause::ProbeError(failure),
            },
        }
    }

    /// Extra attempts made beyond the first.
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    pub fn exchange(&self) -> Option<&Exchange> {
        self.result.exchange()
    }
}

/// Run one port to completion.
///
/// Each attempt goes through the prober, which opens a fresh socket. A
/// cancelled token stops further retries; the last result stands.
pub async fn scan_port<P>(
    prober: &P,
    host: Ipv4Addr,
    port: Port,
    config: &ScanConfig,
    cancel: &CancellationToken,
) -> ScanOutcome
where
    P: Prober + ?Sized,
{
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let result = prober.probe(host, port).await;
        let classification = classify(&result);

        let retry = classification.retryable
            && attempts <= config.max_retries
            && !cancel.is_cancelled();

        if retry {
            info!(
                %host,
                %port,
                attempt = attempts,
                errno = ?result.errno(),
                "retrying"
            );
            continue;
        }

        debug!(
            %host,
            %port,
            attempts,
            verdict = %classification.verdict,
            "port done"
        );

        return ScanOutcome {
            port,
            attempts,
            result,
            verdict: classification.verdict,
        };
    }
}

/// Everything a spawned worker task shares with its siblings.
pub struct WorkerContext {
    pub prober: SharedProber,
    pub sink: Arc<ReportSink>,
    pub config: Arc<ScanConfig>,
    pub cancel: CancellationToken,
    pub host: Ipv4Addr,
}

impl WorkerContext {
    /// Scan the port bound to `slot`, write its report line, then free the slot.
    pub async fn run(&self, slot: SlotHandle) -> ScanOutcome {
        let outcome = scan_port(
            self.prober.as_ref(),
            self.host,
            slot.port(),
            &self.config,
            &self.cancel,
        )
        .await;

        let line = ReportLine::from_outcome(self.host, &outcome);
        let written = match line.render(self.config.report_format) {
            Ok(text) => self.sink.write_line(&text).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            error!(port = %outcome.port, error = %e, "failed to write report line");
        }

        slot.release();
        outcome
    }
}
