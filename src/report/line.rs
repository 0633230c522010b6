//! Report line construction.
//!
//! A [`ReportLine`] is built field by field from one scan outcome, then
//! rendered once in the configured format.

use crate::banner::{sanitize_response, SAMPLE_LEN};
use crate::scanner::traits::Transfer;
use crate::scanner::worker::ScanOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::net::Ipv4Addr;

/// Encoding of report lines.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Pipe-delimited text
    #[default]
    Text,
    /// One JSON object per line
    Json,
    /// Comma-separated values, no header row
    Csv,
}

impl ReportFormat {
    /// File extension for the report file.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Json => "jsonl",
            Self::Csv => "csv",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// One report record, derived 1:1 from a scan outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportLine {
    pub port: u16,
    /// `host:port`.
    pub target: String,
    pub connect_ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errno: Option<i32>,
    pub cause: String,
    pub verdict: String,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_errno: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recv: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recv_errno: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

impl ReportLine {
    pub fn from_outcome(host: Ipv4Addr, outcome: &ScanOutcome) -> Self {
        let exchange = outcome.exchange();
        let sent = exchange.and_then(|e| e.sent);
        let received = exchange.and_then(|e| e.received);
        let response = exchange
            .filter(|e| !e.response.is_empty())
            .map(|e| sanitize_response(&e.response, SAMPLE_LEN));

        Self {
            port: outcome.port.as_u16(),
            target: format!("{}:{}", host, outcome.port),
            connect_ok: exchange.is_some(),
            errno: outcome.result.errno(),
            cause: outcome.cause().tag(),
            verdict: outcome.verdict.tag().to_string(),
            attempts: outcome.attempts,
            send: sent.as_ref().map(Transfer::as_count),
            send_errno: sent.as_ref().and_then(Transfer::errno),
            recv: received.as_ref().map(Transfer::as_count),
            recv_errno: received.as_ref().and_then(Transfer::errno),
            response,
        }
    }

    /// Pipe-delimited tokens in field order, absent fields omitted.
    fn tokens(&self) -> Vec<String> {
        let mut tokens = vec![format!("{:05}", self.port), self.target.clone()];

        if self.connect_ok {
            tokens.push("connect_ok".to_string());
        } else if let Some(errno) = self.errno {
            tokens.push(format!("errno:{errno}"));
        }
        tokens.push(self.cause.clone());
        tokens.push(self.verdict.clone());
        tokens.push(format!("attempts:{}", self.attempts));

        if let Some(send) = self.send {
            tokens.push(format!("send:{send}"));
        }
        if let Some(errno) = self.send_errno {
            tokens.push(format!("send_errno:{errno}"));
        }
        if let Some(recv) = self.recv {
            tokens.push(format!("recv:{recv}"));
        }
        if let Some(errno) = self.recv_errno {
            tokens.push(format!("recv_errno:{errno}"));
        }
        if let Some(response) = &self.response {
            tokens.push(format!("response:{response}"));
        }
        tokens
    }

    /// Fixed columns for CSV, empty where a field is absent.
    fn columns(&self) -> [String; 12] {
        let opt = |v: Option<i64>| v.map(|n| n.to_string()).unwrap_or_default();
        [
            self.port.to_string(),
            self.target.clone(),
            self.connect_ok.to_string(),
            opt(self.errno.map(i64::from)),
            self.cause.clone(),
            self.verdict.clone(),
            self.attempts.to_string(),
            opt(self.send),
            opt(self.send_errno.map(i64::from)),
            opt(self.recv),
            opt(self.recv_errno.map(i64::from)),
            self.response.clone().unwrap_or_default(),
        ]
    }

    /// Render without a trailing newline.
    pub fn render(&self, format: ReportFormat) -> io::Result<String> {
        match format {
            ReportFormat::Text => Ok(self.tokens().join("|")),
            ReportFormat::Json => Ok(serde_json::to_string(self)?),
            ReportFormat::Csv => {
                let mut wtr = csv::WriterBuilder::new()
                    .has_headers(false)
                    .terminator(csv::Terminator::Any(b'\n'))
                    .from_writer(Vec::new());
                wtr.write_record(self.columns())?;
                let bytes = wtr
                    .into_inner()
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
                let line = String::from_utf8(bytes)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                Ok(line.trim_end_matches('\n').to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::classify::PortVerdict;
    use crate::scanner::traits::{Exchange, ProbeResult};
    use crate::types::Port;

    fn refused() -> ScanOutcome {
        ScanOutcome {
            port: Port::new(81).unwrap(),
            attempts: 1,
            result: ProbeResult::ConnectFailed {
                errno: libc::ECONNREFUSED,
            },
            verdict: PortVerdict::Open,
        }
    }

    fn answered() -> ScanOutcome {
        ScanOutcome {
            port: Port::new(8080).unwrap(),
            attempts: 1,
            result: ProbeResult::Connected(Exchange {
                sent: Some(Transfer::Bytes(18)),
                received: Some(Transfer::Bytes(19)),
                response: b"HTTP/1.0 200 OK\r\n\r\n".to_vec(),
            }),
            verdict: PortVerdict::Open,
        }
    }

    #[test]
    fn test_text_refused_line() {
        let line = ReportLine::from_outcome(Ipv4Addr::LOCALHOST, &refused());
        assert_eq!(
            line.render(ReportFormat::Text).unwrap(),
            format!("00081|127.0.0.1:81|errno:{}|refused|open|attempts:1", libc::ECONNREFUSED)
        );
    }

    #[test]
    fn test_text_connected_line() {
        let line = ReportLine::from_outcome(Ipv4Addr::LOCALHOST, &answered());
        assert_eq!(
            line.render(ReportFormat::Text).unwrap(),
            "08080|127.0.0.1:8080|connect_ok|accepted|open|attempts:1|send:18|recv:19|response:HTTP/1.0 200 OK"
        );
    }

    #[test]
    fn test_failed_transfers_keep_errno() {
        let outcome = ScanOutcome {
            result: ProbeResult::Connected(Exchange {
                sent: Some(Transfer::Failed { errno: libc::EPIPE }),
                received: Some(Transfer::Failed { errno: libc::EAGAIN }),
                response: Vec::new(),
            }),
            ..answered()
        };
        let text = ReportLine::from_outcome(Ipv4Addr::LOCALHOST, &outcome)
            .render(ReportFormat::Text)
            .unwrap();
        assert!(text.ends_with(&format!(
            "send:-1|send_errno:{}|recv:-1|recv_errno:{}",
            libc::EPIPE,
            libc::EAGAIN
        )));
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let outcome = answered();
        for format in [ReportFormat::Text, ReportFormat::Json, ReportFormat::Csv] {
            let first = ReportLine::from_outcome(Ipv4Addr::LOCALHOST, &outcome)
                .render(format)
                .unwrap();
            let second = ReportLine::from_outcome(Ipv4Addr::LOCALHOST, &outcome)
                .render(format)
                .unwrap();
            assert_eq!(first, second);
            assert!(!first.contains('\n'));
        }
    }

    #[test]
    fn test_json_line_fields() {
        let line = ReportLine::from_outcome(Ipv4Addr::LOCALHOST, &refused());
        let value: serde_json::Value =
            serde_json::from_str(&line.render(ReportFormat::Json).unwrap()).unwrap();
        assert_eq!(value["port"], 81);
        assert_eq!(value["target"], "127.0.0.1:81");
        assert_eq!(value["connect_ok"], false);
        assert_eq!(value["errno"], libc::ECONNREFUSED);
        assert_eq!(value["cause"], "refused");
        assert_eq!(value["verdict"], "open");
        assert!(value.get("send").is_none());
    }

    #[test]
    fn test_csv_has_fixed_columns() {
        let refused = ReportLine::from_outcome(Ipv4Addr::LOCALHOST, &refused())
            .render(ReportFormat::Csv)
            .unwrap();
        let answered = ReportLine::from_outcome(Ipv4Addr::LOCALHOST, &answered())
            .render(ReportFormat::Csv)
            .unwrap();
        assert_eq!(refused.split(',').count(), 12);
        assert_eq!(answered.split(',').count(), 12);
        assert!(refused.starts_with("81,127.0.0.1:81,false,"));
    }

    #[test]
    fn test_format_extensions() {
        assert_eq!(ReportFormat::Text.extension(), "txt");
        assert_eq!(ReportFormat::Json.extension(), "jsonl");
        assert_eq!(ReportFormat::Csv.extension(), "csv");
    }
}
