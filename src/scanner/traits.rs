//! Prober trait abstraction and the values that flow through a scan.
//!
//! The `Prober` seam lets the worker and orchestrator run against the real
//! TCP prober or an instrumented stand-in.

use crate::error::{ScanError, ScanResult};
use crate::report::ReportFormat;
use crate::types::Port;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Which socket setup step failed before a connect was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupStage {
    /// `socket(2)` itself.
    Socket,
    /// `SO_RCVTIMEO`.
    RecvTimeout,
    /// `SO_SNDTIMEO`.
    SendTimeout,
}

impl fmt::Display for SetupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Socket => write!(f, "socket"),
            Self::RecvTimeout => write!(f, "recv_timeout"),
            Self::SendTimeout => write!(f, "send_timeout"),
        }
    }
}

/// Outcome of one direction of the post-connect exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transfer {
    /// Bytes moved by a single send or recv call.
    Bytes(usize),
    /// The call failed with this errno.
    Failed { errno: i32 },
}

impl Transfer {
    /// Byte count with the classic `-1` for failure.
    pub fn as_count(&self) -> i64 {
        match self {
            Self::Bytes(n) => *n as i64,
            Self::Failed { .. } => -1,
        }
    }

    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Bytes(_) => None,
            Self::Failed { errno } => Some(*errno),
        }
    }
}

/// What happened after a successful connect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    /// Result of writing the probe payload, if one was sent.
    pub sent: Option<Transfer>,
    /// Result of reading the response, if a read was attempted.
    pub received: Option<Transfer>,
    /// Raw response bytes, capped at the read buffer size.
    #[serde(skip)]
    pub response: Vec<u8>,
}

impl Exchange {
    /// A connect with no payload exchanged.
    pub fn silent() -> Self {
        Self::default()
    }
}

/// Structured result of a single connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// The three-way handshake completed.
    Connected(Exchange),
    /// `connect(2)` failed; the errno is passed through untouched.
    ConnectFailed { errno: i32 },
    /// Socket creation or option setup failed before connecting.
    SetupFailed { stage: SetupStage, errno: i32 },
}

impl ProbeResult {
    /// The errno carried by a failed attempt.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Connected(_) => None,
            Self::ConnectFailed { errno } | Self::SetupFailed { errno, .. } => Some(*errno),
        }
    }

    pub fn exchange(&self) -> Option<&Exchange> {
        match self {
            Self::Connected(exchange) => Some(exchange),
            _ => None,
        }
    }
}

/// Trait for connection probers.
///
/// One call is one attempt: a fresh socket, a connect, and the optional
/// payload exchange. Implementations must never panic or return early
/// without closing what they opened.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe `host:port` once.
    async fn probe(&self, host: Ipv4Addr, port: Port) -> ProbeResult;
}

/// A shared prober for dynamic dispatch across worker tasks.
pub type SharedProber = Arc<dyn Prober>;

/// Immutable configuration for a scan run.
///
/// Built once, validated, then shared by every component through an `Arc`.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Maximum number of ports probed at the same time.
    pub worker_count: usize,
    /// `SO_SNDTIMEO`, also the connect deadline.
    pub send_timeout: Duration,
    /// `SO_RCVTIMEO`, also the response read deadline.
    pub recv_timeout: Duration,
    /// Additional attempts allowed after the first, for retryable errors.
    pub max_retries: u32,
    /// Whether to send the probe payload after a successful connect.
    pub send_probe: bool,
    /// Encoding used for report lines.
    pub report_format: ReportFormat,
    /// Base directory under which `<host>/000_report.*` is written.
    pub report_dir: PathBuf,
    /// Draw a progress bar while scanning.
    pub show_progress: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            worker_count: Self::DEFAULT_WORKERS,
            send_timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            recv_timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            max_retries: Self::DEFAULT_MAX_RETRIES,
            send_probe: true,
            report_format: ReportFormat::Text,
            report_dir: PathBuf::from("reports"),
            show_progress: false,
        }
    }
}

impl ScanConfig {
    pub const DEFAULT_WORKERS: usize = 8;
    pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.worker_count = workers;
        self
    }

    /// Set the send (and connect) timeout.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Set the receive timeout.
    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Enable or disable the probe payload.
    pub fn with_probe(mut self, send_probe: bool) -> Self {
        self.send_probe = send_probe;
        self
    }

    /// Set the report line format.
    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.report_format = format;
        self
    }

    /// Set the report base directory.
    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = dir.into();
        self
    }

    /// Show a progress bar during the sweep.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Reject values the scheduler and prober cannot work with.
    pub fn validate(&self) -> ScanResult<()> {
        if self.worker_count == 0 {
            return Err(ScanError::InvalidConfig(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.send_timeout.is_zero() {
            return Err(ScanError::InvalidConfig(
                "send timeout must be greater than zero".to_string(),
            ));
        }
        if self.recv_timeout.is_zero() {
            return Err(ScanError::InvalidConfig(
                "recv timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScanConfig::default();
        assert_eq!(config.worker_count, 8);
        assert_eq!(config.send_timeout, Duration::from_secs(5));
        assert_eq!(config.recv_timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 3);
        assert!(config.send_probe);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        assert!(ScanConfig::new().with_workers(0).validate().is_err());
        assert!(ScanConfig::new()
            .with_send_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(ScanConfig::new()
            .with_recv_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_transfer_counts() {
        assert_eq!(Transfer::Bytes(18).as_count(), 18);
        assert_eq!(Transfer::Failed { errno: libc::EPIPE }.as_count(), -1);
        assert_eq!(
            Transfer::Failed { errno: libc::EPIPE }.errno(),
            Some(libc::EPIPE)
        );
    }

    #[test]
    fn test_probe_result_errno() {
        assert_eq!(ProbeResult::Connected(Exchange::silent()).errno(), None);
        assert_eq!(
            ProbeResult::ConnectFailed {
                errno: libc::ECONNREFUSED
            }
            .errno(),
            Some(libc::ECONNREFUSED)
        );
        assert_eq!(SetupStage::RecvTimeout.to_string(), "recv_timeout");
    }
}
