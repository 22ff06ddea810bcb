// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer connection configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StratamonError};

/// Default TCP port of the printer's status service.
pub const DEFAULT_PORT: u16 = 53742;

/// Default fixed command frame size.
pub const DEFAULT_PACKET_SIZE: usize = 64;

/// Recommended receive size for the bulk transfer (one Ethernet MSS).
pub const DEFAULT_CHUNK_SIZE: usize = 1460;

/// Name of the status file requested from the printer.
pub const DEFAULT_STATUS_FILENAME: &str = "status.sts";

/// Settling time the printer needs between handshake frames.
///
/// These are device requirements, not tuning knobs: shrinking them makes the
/// printer drop frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolDelays {
    /// After each command frame (`GetFile`, filename).
    #[serde(rename = "command_ms", with = "millis")]
    pub command: Duration,
    /// After the `NA` frame, before the first reply is read.
    #[serde(rename = "response_ms", with = "millis")]
    pub response: Duration,
    /// After `SendFile` is received, before reading the `NA` reply.
    #[serde(rename = "transfer_ms", with = "millis")]
    pub transfer: Duration,
}

impl Default for ProtocolDelays {
    fn default() -> Self {
        Self {
            command: Duration::from_millis(4),
            response: Duration::from_millis(18),
            transfer: Duration::from_millis(46),
        }
    }
}

/// Everything the fetcher needs to reach one printer.
///
/// Immutable once handed to a `Fetcher`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterConfig {
    /// Printer hostname or IP address.
    pub host: String,
    /// Status service port (default 53742).
    pub port: u16,
    /// Connect timeout, also the short per-frame timeout of the handshake.
    #[serde(rename = "connect_timeout_ms", with = "millis")]
    pub connect_timeout: Duration,
    /// Per-read timeout while the status file is streaming.
    #[serde(rename = "transfer_timeout_ms", with = "millis")]
    pub transfer_timeout: Duration,
    /// Total attempts per fetch, each on a fresh connection.
    pub retry_attempts: u32,
    /// Fixed pause between attempts.
    #[serde(rename = "retry_delay_ms", with = "millis")]
    pub retry_delay: Duration,
    /// Size every command frame is zero-padded to.
    pub packet_size: usize,
    /// Receive size used during the bulk transfer.
    pub chunk_size: usize,
    /// File requested with `GetFile`.
    pub status_filename: String,
    /// Inter-frame settling delays.
    pub delays: ProtocolDelays,
    /// Optional hard limit on one attempt (connect + handshake + transfer).
    #[serde(rename = "attempt_deadline_ms", with = "option_millis")]
    pub attempt_deadline: Option<Duration>,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(2),
            transfer_timeout: Duration::from_secs(5),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
            packet_size: DEFAULT_PACKET_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            status_filename: DEFAULT_STATUS_FILENAME.into(),
            delays: ProtocolDelays::default(),
            attempt_deadline: None,
        }
    }
}

impl PrinterConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_timeouts(mut self, connect: Duration, transfer: Duration) -> Self {
        self.connect_timeout = connect;
        self.transfer_timeout = transfer;
        self
    }

    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay = delay;
        self
    }

    pub fn with_status_filename(mut self, name: impl Into<String>) -> Self {
        self.status_filename = name.into();
        self
    }

    pub fn with_delays(mut self, delays: ProtocolDelays) -> Self {
        self.delays = delays;
        self
    }

    pub fn with_attempt_deadline(mut self, deadline: Duration) -> Self {
        self.attempt_deadline = Some(deadline);
        self
    }

    /// `host:port` as passed to the socket layer.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reject configurations that can never produce a valid fetch.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(StratamonError::InvalidConfig("host is empty".into()));
        }
        if self.retry_attempts == 0 {
            return Err(StratamonError::InvalidConfig(
                "retry_attempts must be at least 1".into(),
            ));
        }
        if self.packet_size == 0 {
            return Err(StratamonError::InvalidConfig(
                "packet_size must be non-zero".into(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(StratamonError::InvalidConfig(
                "chunk_size must be non-zero".into(),
            ));
        }
        if self.status_filename.is_empty() {
            return Err(StratamonError::InvalidConfig(
                "status_filename is empty".into(),
            ));
        }
        if self.status_filename.len() > self.packet_size {
            return Err(StratamonError::InvalidConfig(format!(
                "status_filename '{}' does not fit in a {}-byte frame",
                self.status_filename, self.packet_size
            )));
        }
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

mod option_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|ms| ms.map(Duration::from_millis))
    }
}
