// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Stratamon.
//
// Only two kinds ever reach a caller of `fetch_status` after retries:
// connection failures (`Connection`, `Timeout`) and `Protocol`. Parse
// problems are not errors at all; they degrade to an empty status tree.

use thiserror::Error;

/// Top-level error type for all Stratamon operations.
#[derive(Debug, Error)]
pub enum StratamonError {
    // -- Transport --
    /// Socket open/send/receive failure or timeout.
    #[error("connection failed: {0}")]
    Connection(String),

    /// A connection failure caused by an elapsed read/write/connect timeout.
    #[error("connection timed out: {0}")]
    Timeout(String),

    // -- Handshake / transfer --
    /// The printer replied with something the handshake did not expect, or
    /// the sequence failed underneath and was rewrapped.
    #[error("protocol violation: {message}")]
    Protocol {
        message: String,
        #[source]
        cause: Option<Box<StratamonError>>,
    },

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // -- Plumbing --
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StratamonError {
    /// A protocol violation with no underlying cause.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
            cause: None,
        }
    }

    /// Rewrap `cause` as a protocol violation. An error that already is a
    /// protocol violation is returned unchanged so causes don't nest twice.
    pub fn protocol_from(context: &str, cause: StratamonError) -> Self {
        match cause {
            already @ Self::Protocol { .. } => already,
            other => Self::Protocol {
                message: format!("{context}: {other}"),
                cause: Some(Box::new(other)),
            },
        }
    }

    /// Whether a fresh attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Timeout(_) | Self::Protocol { .. } | Self::Io(_)
        )
    }

    /// Transport-level failure, whether or not a timeout caused it.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, StratamonError>;
