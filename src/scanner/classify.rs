//! Outcome classification.
//!
//! Maps a probe result to a port verdict and a retry decision. Only errors
//! that point at a local or transient fault are retried. Errors that say
//! something about the remote port (refused, timed out, in progress) are
//! terminal on first sight.

use crate::scanner::traits::ProbeResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classified state of a target port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortVerdict {
    /// Connected, or actively refused (reachable, not firewall-dropped).
    Open,
    /// No answer before the deadline, likely dropped by a firewall.
    FilteredOrTimedOut,
    /// A local or transient fault; the port state is unknown.
    TransientError,
    /// The socket could not be set up, so nothing was sent.
    ProbeSetupError,
}

impl PortVerdict {
    /// Short tag used in report lines.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::FilteredOrTimedOut => "filtered",
            Self::TransientError => "transient",
            Self::ProbeSetupError => "setup_error",
        }
    }
}

impl fmt::Display for PortVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Named view of a `connect(2)` errno.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectFailure {
    Refused,
    TimedOut,
    InProgress,
    NetUnreachable,
    Interrupted,
    Fault,
    BadDescriptor,
    NotSocket,
    WrongProtocol,
    Unknown(i32),
}

impl ConnectFailure {
    pub fn from_errno(errno: i32) -> Self {
        match errno {
            libc::ECONNREFUSED => Self::Refused,
            libc::ETIMEDOUT => Self::TimedOut,
            libc::EINPROGRESS => Self::InProgress,
            libc::ENETUNREACH => Self::NetUnreachable,
            libc::EINTR => Self::Interrupted,
            libc::EFAULT => Self::Fault,
            libc::EBADF => Self::BadDescriptor,
            libc::ENOTSOCK => Self::NotSocket,
            libc::EPROTOTYPE => Self::WrongProtocol,
            other => Self::Unknown(other),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Refused => "refused",
            Self::TimedOut => "timed_out",
            Self::InProgress => "in_progress",
            Self::NetUnreachable => "net_unreachable",
            Self::Interrupted => "interrupted",
            Self::Fault => "fault",
            Self::BadDescriptor => "bad_fd",
            Self::NotSocket => "not_socket",
            Self::WrongProtocol => "wrong_protocol",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Verdict and retry decision for this failure.
    pub fn verdict(&self) -> (PortVerdict, bool) {
        match self {
            Self::Refused => (PortVerdict::Open, false),
            Self::TimedOut | Self::InProgress => (PortVerdict::FilteredOrTimedOut, false),
            Self::NetUnreachable
            | Self::Interrupted
            | Self::Fault
            | Self::BadDescriptor
            | Self::NotSocket
            | Self::WrongProtocol
            | Self::Unknown(_) => (PortVerdict::TransientError, true),
        }
    }
}

/// Verdict plus whether another attempt is warranted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub verdict: PortVerdict,
    pub retryable: bool,
}

/// Classify a raw connect errno.
pub fn classify_errno(errno: i32) -> (PortVerdict, bool) {
    ConnectFailure::from_errno(errno).verdict()
}

/// Classify a full probe result.
///
/// Post-connect send/recv failures never affect the verdict: a connected
/// probe is always `Open` and never retried.
pub fn classify(result: &ProbeResult) -> Classification {
    let (verdict, retryable) = match result {
        ProbeResult::Connected(_) => (PortVerdict::Open, false),
        ProbeResult::ConnectFailed { errno } => classify_errno(*errno),
        ProbeResult::SetupFailed { .. } => (PortVerdict::ProbeSetupError, false),
    };
    Classification { verdict, retryable }
}
