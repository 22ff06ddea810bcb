// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// TCP transport for the printer's status service.
//
// One `TcpTransport` owns one socket for one fetch attempt. Every command
// frame is zero-padded to the configured packet size because the printer
// reads fixed-size frames. Reads are single `read` calls (not read-exact):
// the printer's replies arrive in whatever segments the network produces.
// No retries happen here; every socket-level failure becomes
// a connection failure (`Connection`, or `Timeout` when a timer elapsed) and
// the fetcher decides what to do.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use stratamon_core::config::PrinterConfig;
use stratamon_core::error::{Result, StratamonError};

/// Framed send/receive over one exclusive connection.
///
/// `send` and `receive` are the only suspension points; timeouts are enforced
/// per call using whatever `timeout()` currently returns.
pub trait Transport: Send {
    /// Zero-pad `frame` to the packet size and write all of it.
    fn send(&mut self, frame: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// One read of at most `max_size` bytes. An empty result means the peer
    /// closed the connection.
    fn receive(&mut self, max_size: usize) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// The active per-operation timeout.
    fn timeout(&self) -> Duration;

    fn set_timeout(&mut self, timeout: Duration);

    /// Release the socket. Idempotent, never fails.
    fn close(&mut self);
}

/// Opens a fresh `Transport` for each fetch attempt.
pub trait Connector: Send + Sync {
    type Conn: Transport;

    fn open(&self, config: &PrinterConfig) -> impl Future<Output = Result<Self::Conn>> + Send;
}

/// Right-pad `frame` with NUL bytes up to `packet_size`.
///
/// Frames already at or over the packet size are sent unchanged.
pub fn pad_frame(frame: &[u8], packet_size: usize) -> Vec<u8> {
    let mut padded = Vec::with_capacity(packet_size.max(frame.len()));
    padded.extend_from_slice(frame);
    if padded.len() < packet_size {
        padded.resize(packet_size, 0);
    }
    padded
}

/// Production transport over `tokio::net::TcpStream`.
pub struct TcpTransport {
    stream: Option<TcpStream>,
    addr: String,
    packet_size: usize,
    timeout: Duration,
}

impl TcpTransport {
    /// Connect to `host:port`, failing with `Connection` on refusal, DNS
    /// failure or timeout.
    pub async fn open(host: &str, port: u16, timeout: Duration, packet_size: usize) -> Result<Self> {
        let addr = format!("{}:{}", host, port);
        debug!(addr = %addr, timeout_ms = timeout.as_millis() as u64, "connecting to printer");

        let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                StratamonError::Timeout(format!(
                    "connect to {} after {}ms",
                    addr,
                    timeout.as_millis()
                ))
            })?
            .map_err(|e| StratamonError::Connection(format!("connect to {}: {}", addr, e)))?;

        // Frames are tiny and strictly ordered; don't let Nagle hold them.
        stream
            .set_nodelay(true)
            .map_err(|e| StratamonError::Connection(format!("set TCP_NODELAY on {}: {}", addr, e)))?;

        info!(addr = %addr, "connected to printer");
        Ok(Self {
            stream: Some(stream),
            addr,
            packet_size,
            timeout,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream> {
        let addr = &self.addr;
        self.stream
            .as_mut()
            .ok_or_else(|| StratamonError::Connection(format!("connection to {} is closed", addr)))
    }
}

impl Transport for TcpTransport {
    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        let padded = pad_frame(frame, self.packet_size);
        let timeout = self.timeout;
        let addr = self.addr.clone();
        let stream = self.stream_mut()?;

        tokio::time::timeout(timeout, stream.write_all(&padded))
            .await
            .map_err(|_| {
                StratamonError::Timeout(format!(
                    "send to {} after {}ms",
                    addr,
                    timeout.as_millis()
                ))
            })?
            .map_err(|e| StratamonError::Connection(format!("send to {}: {}", addr, e)))?;

        debug!(bytes = padded.len(), "frame sent");
        Ok(())
    }

    async fn receive(&mut self, max_size: usize) -> Result<Vec<u8>> {
        let timeout = self.timeout;
        let addr = self.addr.clone();
        let stream = self.stream_mut()?;
        let mut buf = vec![0u8; max_size];

        let n = tokio::time::timeout(timeout, stream.read(&mut buf))
            .await
            .map_err(|_| {
                StratamonError::Timeout(format!(
                    "receive from {} after {}ms",
                    addr,
                    timeout.as_millis()
                ))
            })?
            .map_err(|e| StratamonError::Connection(format!("receive from {}: {}", addr, e)))?;

        buf.truncate(n);
        Ok(buf)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!(addr = %self.addr, "connection closed");
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens `TcpTransport`s from a `PrinterConfig`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Conn = TcpTransport;

    async fn open(&self, config: &PrinterConfig) -> Result<TcpTransport> {
        TcpTransport::open(
            &config.host,
            config.port,
            config.connect_timeout,
            config.packet_size,
        )
        .await
    }
}
