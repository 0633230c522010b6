//! TCP connect prober.
//!
//! Performs one full TCP handshake per call using the operating system's
//! socket API, then optionally exchanges a fixed probe payload. Socket
//! timeouts are applied with `socket2` before connecting; the async
//! deadlines below enforce the same values on tokio's non-blocking socket.

use crate::banner::{MAX_RESPONSE_SIZE, PROBE_PAYLOAD};
use crate::scanner::traits::{Exchange, ProbeResult, Prober, ScanConfig, SetupStage, Transfer};
use crate::types::Port;
use async_trait::async_trait;
use socket2::SockRef;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpSocket, TcpStream};
use tokio::time::timeout;
use tracing::{debug, trace};

/// TCP connect prober.
///
/// Does not require elevated privileges.
///
/// - The connect deadline is the send timeout, as with a blocking
///   `connect(2)` under `SO_SNDTIMEO`. Hitting it reports `EINPROGRESS`.
/// - The payload write is bounded by the send timeout, the response read by
///   the receive timeout. Either failing is recorded, never retried.
#[derive(Debug, Clone)]
pub struct TcpProber {
    send_timeout: Duration,
    recv_timeout: Duration,
    send_probe: bool,
}

impl TcpProber {
    /// Create a new TCP prober.
    ///
    /// # Arguments
    /// * `send_timeout` - `SO_SNDTIMEO` and connect deadline
    /// * `recv_timeout` - `SO_RCVTIMEO` and response read deadline
    /// * `send_probe` - Whether to exchange the probe payload on open ports
    pub fn new(send_timeout: Duration, recv_timeout: Duration, send_probe: bool) -> Self {
        Self {
            send_timeout,
            recv_timeout,
            send_probe,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.send_timeout, config.recv_timeout, config.send_probe)
    }

    /// Create the socket and apply both timeouts.
    fn open_socket(&self) -> Result<TcpSocket, (SetupStage, io::Error)> {
        let socket = TcpSocket::new_v4().map_err(|e| (SetupStage::Socket, e))?;

        let sock = SockRef::from(&socket);
        sock.set_read_timeout(Some(self.recv_timeout))
            .map_err(|e| (SetupStage::RecvTimeout, e))?;
        sock.set_write_timeout(Some(self.send_timeout))
            .map_err(|e| (SetupStage::SendTimeout, e))?;

        Ok(socket)
    }

    /// Send the payload and read back at most `MAX_RESPONSE_SIZE` bytes.
    async fn exchange(&self, stream: &mut TcpStream) -> Exchange {
        let sent = match timeout(self.send_timeout, stream.write(PROBE_PAYLOAD)).await {
            Ok(Ok(n)) => Transfer::Bytes(n),
            Ok(Err(e)) => Transfer::Failed { errno: errno_of(&e) },
            Err(_) => Transfer::Failed {
                errno: libc::EAGAIN,
            },
        };

        let mut buffer = vec![0u8; MAX_RESPONSE_SIZE];
        let received = match timeout(self.recv_timeout, stream.read(&mut buffer)).await {
            Ok(Ok(n)) => {
                buffer.truncate(n);
                Transfer::Bytes(n)
            }
            Ok(Err(e)) => {
                buffer.clear();
                Transfer::Failed { errno: errno_of(&e) }
            }
            Err(_) => {
                buffer.clear();
                Transfer::Failed {
                    errno: libc::EAGAIN,
                }
            }
        };

        Exchange {
            sent: Some(sent),
            received: Some(received),
            response: buffer,
        }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, host: Ipv4Addr, port: Port) -> ProbeResult {
        let addr = SocketAddr::V4(SocketAddrV4::new(host, port.as_u16()));

        trace!(%addr, "initializing TCP socket");
        let socket = match self.open_socket() {
            Ok(socket) => socket,
            Err((stage, e)) => {
                debug!(%addr, %stage, error = %e, "socket setup failed");
                return ProbeResult::SetupFailed {
                    stage,
                    errno: errno_of(&e),
                };
            }
        };

        debug!(%addr, "connecting");
        match timeout(self.send_timeout, socket.connect(addr)).await {
            Ok(Ok(mut stream)) => {
                let exchange = if self.send_probe {
                    self.exchange(&mut stream).await
                } else {
                    Exchange::silent()
                };
                ProbeResult::Connected(exchange)
            }
            Ok(Err(e)) => ProbeResult::ConnectFailed { errno: errno_of(&e) },
            // The pending connect (and its socket) is dropped with the future.
            Err(_) => ProbeResult::ConnectFailed {
                errno: libc::EINPROGRESS,
            },
        }
    }
}

/// The OS errno behind an I/O error, or a close stand-in when there is none.
fn errno_of(e: &io::Error) -> i32 {
    e.raw_os_error().unwrap_or(match e.kind() {
        io::ErrorKind::TimedOut => libc::ETIMEDOUT,
        io::ErrorKind::WouldBlock => libc::EAGAIN,
        io::ErrorKind::ConnectionRefused => libc::ECONNREFUSED,
        _ => libc::EIO,
    })
}
