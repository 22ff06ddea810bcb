// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The retrying status fetcher.
//
// `Fetcher::fetch_status` is the only entry point outer layers call. Each
// attempt opens a fresh connection, runs the full handshake from step 1 and
// parses the payload. The connection is closed after every attempt, whether
// it succeeded, failed or was cancelled by the attempt deadline. Failed
// attempts are retried after a fixed pause until the attempt budget is spent;
// the last error is then returned unchanged.

use tracing::{debug, error, info, instrument, warn};

use stratamon_core::config::PrinterConfig;
use stratamon_core::error::{Result, StratamonError};
use stratamon_core::types::{FetchId, StatusTree};

use crate::parser::parse_status_payload;
use crate::retry::{RetryDecision, should_retry};
use crate::sequencer::Sequencer;
use crate::transport::{Connector, TcpConnector, Transport};

/// Diagnostic hooks called by the fetcher at each outcome.
///
/// Every method defaults to doing nothing.
pub trait FetchObserver: Send {
    /// Attempt `attempt` (1-based) failed. A retry may follow.
    fn on_attempt_failed(&mut self, _attempt: u32, _error: &StratamonError) {}

    /// Attempt `attempt` produced a status tree.
    fn on_success(&mut self, _attempt: u32, _status: &StatusTree) {}

    /// The fetch failed for good; `error` is what the caller receives.
    fn on_exhausted(&mut self, _error: &StratamonError) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl FetchObserver for NoopObserver {}

/// Polls one printer.
///
/// `fetch_status` takes `&mut self`: one fetch at a time per instance.
pub struct Fetcher<C: Connector = TcpConnector, O: FetchObserver = NoopObserver> {
    config: PrinterConfig,
    connector: C,
    observer: O,
}

impl Fetcher<TcpConnector, NoopObserver> {
    /// A fetcher talking TCP to `config.host:config.port`.
    pub fn tcp(config: PrinterConfig) -> Self {
        Self::new(config, TcpConnector, NoopObserver)
    }
}

impl<C: Connector, O: FetchObserver> Fetcher<C, O> {
    pub fn new(config: PrinterConfig, connector: C, observer: O) -> Self {
        Self {
            config,
            connector,
            observer,
        }
    }

    /// Replace the observer, keeping config and connector.
    pub fn with_observer<P: FetchObserver>(self, observer: P) -> Fetcher<C, P> {
        Fetcher {
            config: self.config,
            connector: self.connector,
            observer,
        }
    }

    pub fn config(&self) -> &PrinterConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Fetch and parse the printer's status file.
    ///
    /// Returns a populated (or, if the text was unreadable, empty) tree, or
    /// the last `Connection`/`Timeout`/`Protocol` error once every attempt
    /// has failed. An invalid configuration fails immediately.
    #[instrument(skip(self), fields(fetch_id = %FetchId::new(), addr = %self.config.address()))]
    pub async fn fetch_status(&mut self) -> Result<StatusTree> {
        if let Err(e) = self.config.validate() {
            error!(error = %e, "refusing to fetch with invalid configuration");
            return Err(e);
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            debug!(attempt, max = self.config.retry_attempts, "starting fetch attempt");

            match self.attempt().await {
                Ok(status) => {
                    info!(attempt, entries = status.len(), "status fetched");
                    self.observer.on_success(attempt, &status);
                    return Ok(status);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "fetch attempt failed");
                    self.observer.on_attempt_failed(attempt, &e);

                    match should_retry(&e, attempt, &self.config) {
                        RetryDecision::RetryAfter(delay) => tokio::time::sleep(delay).await,
                        // `GiveUp` needs a non-retryable error, which only a
                        // bad config produces and `validate()` has ruled out.
                        // Kept so a new error variant cannot loop forever.
                        RetryDecision::GiveUp | RetryDecision::Exhausted => {
                            error!(attempts = attempt, error = %e, "giving up on status fetch");
                            self.observer.on_exhausted(&e);
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// One attempt, bounded by the attempt deadline when one is set.
    ///
    /// On expiry the in-flight future is dropped, which drops (and so
    /// closes) its transport.
    async fn attempt(&self) -> Result<StatusTree> {
        let Some(deadline) = self.config.attempt_deadline else {
            return self.connect_and_fetch().await;
        };

        match tokio::time::timeout(deadline, self.connect_and_fetch()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(StratamonError::Timeout(format!(
                "attempt deadline elapsed after {}ms",
                deadline.as_millis()
            ))),
        }
    }

    async fn connect_and_fetch(&self) -> Result<StatusTree> {
        let mut transport = self.connector.open(&self.config).await?;
        let outcome = Sequencer::new(&self.config).run(&mut transport).await;
        transport.close();

        let payload = outcome?;
        debug!(
            received = payload.len(),
            expected_size = payload.expected_size,
            end = ?payload.end,
            "payload received"
        );
        Ok(parse_status_payload(&payload.bytes))
    }
}
