//! # portsweep - Full-Range TCP Connect Scanner
//!
//! portsweep tries a TCP connection to every port of one IPv4 host,
//! classifies each outcome and writes one line per port to a report file.
//!
//! ## Features
//!
//! - **Bounded Concurrency**: a fixed number of worker slots, granted through a semaphore
//! - **Retry on Transient Errors**: only local faults are retried, within a fixed budget
//! - **Probe Payload**: open ports get a minimal HTTP-like request and the reply is sampled
//! - **Durable Report**: line-atomic, flushed writes in text, JSON lines or CSV
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use portsweep::scanner::{run_scan, ScanConfig};
//! use portsweep::types::ScanTarget;
//! use std::net::Ipv4Addr;
//!
//! #[tokio::main]
//! async fn main() {
//!     let target = ScanTarget::new(Ipv4Addr::new(192, 168, 1, 1));
//!     let config = ScanConfig::new().with_workers(64);
//!
//!     let summary = run_scan(target, config).await.unwrap();
//!     println!("{}", summary.one_line());
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Port and target types
//! - [`scanner`] - Prober, classifier, worker, slot scheduler and orchestrator
//! - [`report`] - Report line formatting and the serialized report sink
//! - [`config`] - Settings file and paths
//! - [`error`] - Error types
//! - [`output`] - Console header and summary

pub mod banner;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod report;
pub mod scanner;
pub mod types;

// Re-export commonly used types
pub use error::{ConfigError, ScanError};
pub use scanner::{run_scan, PortVerdict, ScanConfig, ScanOutcome, ScanSummary};
pub use types::{Port, PortRange, ScanTarget};
