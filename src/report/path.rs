//! Report file location.
//!
//! Reports live at `<base>/<host>/000_report.<ext>`. The per-host directory
//! is created owner-only when missing. Failing to create it is the one
//! fatal filesystem error, raised before any port is dispatched.

use crate::error::{ScanError, ScanResult};
use crate::report::ReportFormat;
use std::fs::{self, DirBuilder};
use std::io;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

/// Report file name without extension.
pub const REPORT_STEM: &str = "000_report";

/// Directory holding the reports for `host`.
pub fn host_dir(base: &Path, host: Ipv4Addr) -> PathBuf {
    base.join(host.to_string())
}

/// Full path of the report file for `host`.
pub fn report_file(base: &Path, host: Ipv4Addr, format: ReportFormat) -> PathBuf {
    host_dir(base, host).join(format!("{REPORT_STEM}.{}", format.extension()))
}

/// Make sure the host directory exists and is a directory.
pub fn prepare_report_dir(base: &Path, host: Ipv4Addr) -> ScanResult<PathBuf> {
    let dir = host_dir(base, host);
    let unusable = |reason: String| ScanError::ReportDirectory {
        path: dir.clone(),
        reason,
    };

    match fs::metadata(&dir) {
        Ok(meta) if meta.is_dir() => Ok(dir),
        Ok(_) => Err(unusable("exists but is not a directory".to_string())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            create_private_dir(&dir).map_err(|e| unusable(e.to_string()))?;
            Ok(dir)
        }
        Err(e) => Err(unusable(e.to_string())),
    }
}

fn create_private_dir(dir: &Path) -> io::Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_file_layout() {
        let path = report_file(
            Path::new("reports"),
            Ipv4Addr::new(10, 0, 0, 1),
            ReportFormat::Text,
        );
        assert_eq!(path, PathBuf::from("reports/10.0.0.1/000_report.txt"));
    }

    #[test]
    fn test_creates_missing_dir() {
        let base = tempfile::tempdir().unwrap();
        let dir = prepare_report_dir(base.path(), Ipv4Addr::LOCALHOST).unwrap();
        assert!(dir.is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&dir).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }

        // A second call reuses the existing directory.
        assert_eq!(prepare_report_dir(base.path(), Ipv4Addr::LOCALHOST).unwrap(), dir);
    }

    #[test]
    fn test_file_in_the_way_is_fatal() {
        let base = tempfile::tempdir().unwrap();
        fs::write(base.path().join("127.0.0.1"), b"not a dir").unwrap();
        assert!(matches!(
            prepare_report_dir(base.path(), Ipv4Addr::LOCALHOST),
            Err(ScanError::ReportDirectory { .. })
        ));
    }
}
