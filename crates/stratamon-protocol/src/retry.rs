// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retry decisions for the fetcher.
//
// The status protocol has no resumable state, so every retry is a complete
// new attempt on a new connection after a fixed pause. Connection failures
// and protocol violations are both worth another attempt (the printer
// drops frames when busy); configuration errors never are.

use std::time::Duration;

use stratamon_core::config::PrinterConfig;
use stratamon_core::error::StratamonError;
use tracing::{debug, info, warn};

/// Result of evaluating whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after this delay.
    RetryAfter(Duration),
    /// Do not retry: the error cannot be fixed by another attempt.
    GiveUp,
    /// Every configured attempt has been used.
    Exhausted,
}

/// Decide what to do after `attempt` (1-based) failed with `err`.
pub fn should_retry(err: &StratamonError, attempt: u32, config: &PrinterConfig) -> RetryDecision {
    if !err.is_retryable() {
        info!(error = %err, "non-retryable error, not retrying");
        return RetryDecision::GiveUp;
    }

    if attempt >= config.retry_attempts {
        warn!(attempt, max = config.retry_attempts, "retry limit exhausted");
        RetryDecision::Exhausted
    } else {
        debug!(
            attempt,
            delay_ms = config.retry_delay.as_millis() as u64,
            "scheduling retry"
        );
        RetryDecision::RetryAfter(config.retry_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(attempts: u32) -> PrinterConfig {
        PrinterConfig::new("printer.test", 53742).with_retry(attempts, Duration::from_millis(250))
    }

    #[test]
    fn transient_errors_retry_with_fixed_delay() {
        let err = StratamonError::Connection("connection refused".into());
        assert_eq!(
            should_retry(&err, 1, &config(3)),
            RetryDecision::RetryAfter(Duration::from_millis(250))
        );
        assert_eq!(
            should_retry(&err, 2, &config(3)),
            RetryDecision::RetryAfter(Duration::from_millis(250))
        );
    }

    #[test]
    fn retry_respects_max() {
        let err = StratamonError::protocol("expected SendFile");
        assert_eq!(should_retry(&err, 3, &config(3)), RetryDecision::Exhausted);
        assert_eq!(should_retry(&err, 1, &config(1)), RetryDecision::Exhausted);
    }

    #[test]
    fn config_error_never_retries() {
        let err = StratamonError::InvalidConfig("host is empty".into());
        assert_eq!(should_retry(&err, 1, &config(3)), RetryDecision::GiveUp);
    }
}
