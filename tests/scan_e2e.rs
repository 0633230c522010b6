use async_trait::async_trait;
use portsweep::report::ReportFormat;
use portsweep::scanner::{
    run_scan, run_scan_with, ProbeResult, Prober, ScanConfig, SharedProber,
};
use portsweep::types::{Port, PortRange, ScanTarget};
use portsweep::ScanError;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Always fails the connect with the same errno.
struct FixedErrno(i32);

#[async_trait]
impl Prober for FixedErrno {
    async fn probe(&self, _host: Ipv4Addr, _port: Port) -> ProbeResult {
        ProbeResult::ConnectFailed { errno: self.0 }
    }
}

/// Refuses every port after a short delay, tracking how many probes overlap.
#[derive(Default)]
struct InFlightCounter {
    current: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Prober for InFlightCounter {
    async fn probe(&self, _host: Ipv4Addr, _port: Port) -> ProbeResult {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        ProbeResult::ConnectFailed {
            errno: libc::ECONNREFUSED,
        }
    }
}

fn config(dir: &Path) -> ScanConfig {
    ScanConfig::new()
        .with_report_dir(dir)
        .with_send_timeout(Duration::from_millis(500))
        .with_recv_timeout(Duration::from_millis(500))
}

fn range(start: u16, end: u16) -> PortRange {
    PortRange::new(Port::new(start).unwrap(), Port::new(end).unwrap()).unwrap()
}

fn report_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn port_of(line: &str) -> u16 {
    line.split('|').next().unwrap().parse().unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn full_range_writes_one_line_per_port() {
    let dir = tempfile::tempdir().unwrap();
    let prober: SharedProber = Arc::new(FixedErrno(libc::ECONNREFUSED));
    let target = ScanTarget::new(Ipv4Addr::LOCALHOST);

    let summary = run_scan_with(
        prober,
        target,
        config(dir.path()).with_workers(64),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.ports_dispatched, 65535);
    assert_eq!(summary.ports_scanned, 65535);
    assert_eq!(summary.report_lines, 65535);
    assert_eq!(summary.open_ports, 65535);
    assert_eq!(summary.total_retries, 0);
    assert!(!summary.cancelled);
    assert_eq!(
        summary.report_path,
        dir.path().join("127.0.0.1").join("000_report.txt")
    );

    let lines = report_lines(&summary.report_path);
    assert_eq!(lines.len(), 65535);
    let ports: HashSet<u16> = lines.iter().map(|l| port_of(l)).collect();
    assert_eq!(ports.len(), 65535);
    assert_eq!(ports, (1..=65535).collect::<HashSet<u16>>());

    let expected_tail = format!("errno:{}|refused|open|attempts:1", libc::ECONNREFUSED);
    assert!(lines.iter().all(|l| l.ends_with(&expected_tail)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_never_exceeds_worker_count() {
    let dir = tempfile::tempdir().unwrap();
    let counter = Arc::new(InFlightCounter::default());
    let prober: SharedProber = counter.clone();
    let target = ScanTarget::new(Ipv4Addr::LOCALHOST).with_ports(range(1, 400));

    let summary = run_scan_with(
        prober,
        target,
        config(dir.path()).with_workers(7),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.ports_scanned, 400);
    assert!(counter.peak.load(Ordering::SeqCst) <= 7);
    assert!(summary.peak_workers <= 7);
    assert!(summary.peak_workers >= 1);
    assert_eq!(counter.current.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unreachable_host_exhausts_retries_and_still_closes_report() {
    let dir = tempfile::tempdir().unwrap();
    let prober: SharedProber = Arc::new(FixedErrno(libc::ENETUNREACH));
    let target = ScanTarget::new(Ipv4Addr::new(10, 255, 255, 1)).with_ports(range(1, 200));

    let summary = run_scan_with(
        prober,
        target,
        config(dir.path()).with_workers(16).with_max_retries(2),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.transient_errors, 200);
    assert_eq!(summary.total_retries, 400);
    assert_eq!(summary.report_lines, 200);

    let lines = report_lines(&summary.report_path);
    assert_eq!(lines.len(), 200);
    let expected_tail = format!(
        "errno:{}|net_unreachable|transient|attempts:3",
        libc::ENETUNREACH
    );
    assert!(lines.iter().all(|l| l.ends_with(&expected_tail)));
}

#[tokio::test]
async fn answering_port_records_exchange() {
    let dir = tempfile::tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let open = listener.local_addr().unwrap().port();
    let response = b"HTTP/1.0 200 OK\r\n\r\nhello";

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 18];
        stream.read_exact(&mut request).await.unwrap();
        stream.write_all(response).await.unwrap();
        stream.flush().await.unwrap();
        // Keep the connection open until the prober has read the reply.
        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest).await;
    });

    let lo = open.saturating_sub(1).max(1);
    let hi = open.saturating_add(1);
    let target = ScanTarget::new(Ipv4Addr::LOCALHOST).with_ports(range(lo, hi));

    let summary = run_scan(target, config(dir.path()).with_workers(4))
        .await
        .unwrap();
    server.await.unwrap();

    let lines = report_lines(&summary.report_path);
    assert_eq!(lines.len(), usize::from(hi - lo) + 1);

    let line = lines
        .iter()
        .find(|l| port_of(l) == open)
        .expect("line for the open port");
    let fields: Vec<&str> = line.split('|').collect();
    assert_eq!(fields[0], format!("{open:05}"));
    assert_eq!(fields[1], format!("127.0.0.1:{open}"));
    assert_eq!(fields[2], "connect_ok");
    assert_eq!(fields[3], "accepted");
    assert_eq!(fields[4], "open");
    assert!(fields.contains(&"send:18"));
    assert!(fields.contains(&format!("recv:{}", response.len()).as_str()));
    assert!(fields.contains(&"response:HTTP/1.0 200 OK hello"));
}

#[tokio::test]
async fn closed_loopback_port_is_refused_without_retry() {
    let dir = tempfile::tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let target = ScanTarget::new(Ipv4Addr::LOCALHOST).with_ports(range(port, port));
    let summary = run_scan(target, config(dir.path()).with_format(ReportFormat::Json))
        .await
        .unwrap();

    assert_eq!(
        summary.report_path,
        dir.path().join("127.0.0.1").join("000_report.jsonl")
    );
    let lines = report_lines(&summary.report_path);
    assert_eq!(lines.len(), 1);

    let value: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(value["port"], port);
    assert_eq!(value["connect_ok"], false);
    assert_eq!(value["errno"], libc::ECONNREFUSED);
    assert_eq!(value["cause"], "refused");
    assert_eq!(value["verdict"], "open");
    assert_eq!(value["attempts"], 1);
}

#[tokio::test]
async fn cancelled_scan_dispatches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let prober: SharedProber = Arc::new(FixedErrno(libc::ECONNREFUSED));
    let summary = run_scan_with(
        prober,
        ScanTarget::new(Ipv4Addr::LOCALHOST),
        config(dir.path()),
        cancel,
    )
    .await
    .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.ports_dispatched, 0);
    assert_eq!(summary.report_lines, 0);
    assert!(summary.report_path.exists());
}

#[tokio::test]
async fn unusable_report_dir_aborts_before_scanning() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("reports");
    std::fs::write(&blocker, b"file in the way").unwrap();

    let counter = Arc::new(InFlightCounter::default());
    let prober: SharedProber = counter.clone();
    let result = run_scan_with(
        prober,
        ScanTarget::new(Ipv4Addr::LOCALHOST),
        config(&blocker),
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(result, Err(ScanError::ReportDirectory { .. })));
    assert_eq!(counter.peak.load(Ordering::SeqCst), 0);
}
