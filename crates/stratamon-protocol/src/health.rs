// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer online tracking.
//
// A single failed poll is not enough to call a printer offline: it may just
// have been busy streaming a build. The tracker counts consecutive failed
// fetches and only reports the printer offline once the count reaches the
// threshold. Any successful fetch resets it.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use stratamon_core::error::StratamonError;
use stratamon_core::types::StatusTree;

use crate::fetcher::FetchObserver;

/// Consecutive failed fetches before the printer is reported offline.
pub const DEFAULT_OFFLINE_THRESHOLD: u32 = 5;

/// Online/offline view of one printer, fed by its fetcher.
#[derive(Debug, Clone)]
pub struct OnlineTracker {
    /// Number of failures before the printer is considered offline.
    threshold: u32,
    /// Failed fetches since the last success.
    consecutive_failures: u32,
    /// Last successful fetch.
    last_success: Option<DateTime<Utc>>,
    /// Last failure message (attempt or fetch level).
    last_error: Option<String>,
}

impl Default for OnlineTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl OnlineTracker {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_OFFLINE_THRESHOLD)
    }

    pub fn with_threshold(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive_failures: 0,
            last_success: None,
            last_error: None,
        }
    }

    pub fn is_online(&self) -> bool {
        self.consecutive_failures < self.threshold
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Record a successful fetch.
    pub fn record_success(&mut self) {
        if !self.is_online() {
            info!(
                failures = self.consecutive_failures,
                "printer reachable again"
            );
        }
        self.consecutive_failures = 0;
        self.last_success = Some(Utc::now());
        self.last_error = None;
    }

    /// Record a fetch that failed after all retries.
    pub fn record_failure(&mut self, error: &str) {
        let was_online = self.is_online();
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(error.to_string());

        if was_online && !self.is_online() {
            warn!(
                failures = self.consecutive_failures,
                "printer considered offline"
            );
        }
    }

    /// Human-readable status, `None` while everything is fine.
    pub fn status_message(&self) -> Option<String> {
        if self.consecutive_failures == 0 {
            None
        } else if self.is_online() {
            Some(format!(
                "The last {} status poll(s) failed. Still treating the printer as online.",
                self.consecutive_failures
            ))
        } else {
            Some(format!(
                "The printer hasn't answered {} polls in a row and is considered offline.",
                self.consecutive_failures
            ))
        }
    }
}

impl FetchObserver for OnlineTracker {
    fn on_attempt_failed(&mut self, _attempt: u32, error: &StratamonError) {
        self.last_error = Some(error.to_string());
    }

    fn on_success(&mut self, _attempt: u32, _status: &StatusTree) {
        self.record_success();
    }

    fn on_exhausted(&mut self, error: &StratamonError) {
        self.record_failure(&error.to_string());
    }
}
