//! Per-port report output.
//!
//! - [`line`] builds and renders one record per scanned port
//! - [`sink`] serializes concurrent writes into a single file
//! - [`path`] places that file under `<base>/<host>/`

mod line;
mod path;
mod sink;

pub use line::{ReportFormat, ReportLine};
pub use path::{host_dir, prepare_report_dir, report_file, REPORT_STEM};
pub use sink::{ReportSink, SinkStats};
