// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stratamon: core types, configuration and error definitions shared by the
// protocol engine and its front ends.

pub mod config;
pub mod error;
pub mod human_errors;
pub mod types;

pub use config::{PrinterConfig, ProtocolDelays};
pub use error::{Result, StratamonError};
pub use types::*;
