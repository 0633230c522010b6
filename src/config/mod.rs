//! Configuration management for portsweep.
//!
//! Provides XDG-compliant settings storage. The settings file only supplies
//! defaults; the validated [`crate::scanner::ScanConfig`] is what a scan uses.

mod settings;

pub use settings::{AppSettings, Paths};
