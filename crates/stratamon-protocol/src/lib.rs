// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stratamon protocol engine: TCP transport, status-file handshake, status
// text parser and the retrying fetcher built on top of them.

pub mod fetcher;
pub mod health;
pub mod parser;
pub mod retry;
pub mod sequencer;
pub mod transport;
pub mod wire;

#[cfg(test)]
mod testing;

pub use fetcher::{FetchObserver, Fetcher, NoopObserver};
pub use health::OnlineTracker;
pub use parser::{parse_status_payload, parse_status_text};
pub use sequencer::{RawPayload, Sequencer, TransferEnd};
pub use transport::{Connector, TcpConnector, TcpTransport, Transport};
