// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for whoever is watching the printer.
//
// Every technical error is mapped to plain English with a clear suggestion.
// Severity drives how an outer layer presents it.

use crate::error::StratamonError;

/// Severity of an error from the operator's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Network blip or busy printer. The next poll will likely succeed.
    Transient,
    /// Someone must change something (address, cabling, printer settings).
    ActionRequired,
    /// Retrying cannot help.
    Permanent,
}

/// A human-readable error with a plain English message and a suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What to try next.
    pub suggestion: String,
    /// Whether polling again may fix it.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `StratamonError` into a `HumanError`.
pub fn humanize_error(err: &StratamonError) -> HumanError {
    match err {
        StratamonError::Connection(detail) => humanize_connection_error(detail),

        StratamonError::Timeout(_) => timed_out(),

        StratamonError::Protocol { message, cause } => match cause.as_deref() {
            // A transport failure mid-handshake reads better as what it is.
            Some(StratamonError::Connection(detail)) => humanize_connection_error(detail),
            Some(StratamonError::Timeout(_)) => timed_out(),
            _ => HumanError {
                message: "The printer answered, but not the way we expected.".into(),
                suggestion: format!(
                    "The printer may be busy starting or finishing a job. We'll ask again on the next poll. (Detail: {message})"
                ),
                retriable: true,
                severity: Severity::Transient,
            },
        },

        StratamonError::InvalidConfig(detail) => HumanError {
            message: "The printer settings aren't valid.".into(),
            suggestion: format!("Fix the configuration and try again. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        StratamonError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "A file couldn't be found.".into(),
                    suggestion: "Check the path of the configuration file.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem talking to the network or disk.".into(),
                    suggestion: "Try again. If this keeps happening, check the machine running the monitor.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        StratamonError::Serialization(_) => HumanError {
            message: "The status couldn't be written out.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
    }
}

fn timed_out() -> HumanError {
    HumanError {
        message: "The printer didn't respond in time.".into(),
        suggestion: "The printer might be busy or turned off. Check it's on and connected.".into(),
        retriable: true,
        severity: Severity::Transient,
    }
}

/// Map socket-level failure details onto messages.
fn humanize_connection_error(detail: &str) -> HumanError {
    let lower = detail.to_ascii_lowercase();

    if lower.contains("timed out") || lower.contains("deadline") {
        timed_out()
    } else if lower.contains("connection refused") {
        HumanError {
            message: "The printer refused our connection.".into(),
            suggestion: "Check the port number. The status service normally listens on 53742.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        }
    } else if lower.contains("connection reset") || lower.contains("broken pipe") {
        HumanError {
            message: "The connection to the printer was interrupted.".into(),
            suggestion: "This sometimes happens when the printer is busy. We'll try again automatically.".into(),
            retriable: true,
            severity: Severity::Transient,
        }
    } else if lower.contains("resolve") || lower.contains("lookup") || lower.contains("unreachable") {
        HumanError {
            message: "The printer address can't be reached.".into(),
            suggestion: "Check the host name or IP address. It should look like 192.168.1.28.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        }
    } else {
        HumanError {
            message: "We couldn't talk to the printer.".into(),
            suggestion: format!("Check the printer is on and on the network. (Detail: {detail})"),
            retriable: true,
            severity: Severity::Transient,
        }
    }
}
