// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types: the parsed status tree and the small projections that
// outer layers read from it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation id for one `fetch_status` call (spans all of its attempts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchId(pub Uuid);

impl FetchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FetchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FetchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A keyed mapping inside the status tree.
pub type StatusMap = BTreeMap<String, StatusValue>;

/// One value of the status tree. The variant is decided by the syntactic
/// shape of the text, never by a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Brace-quoted word list, e.g. `{Door open}`.
    List(Vec<String>),
    /// A named section.
    Map(StatusMap),
    /// A section made of repeated anonymous blocks.
    Records(Vec<StatusMap>),
}

impl StatusValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Integers widen to floats; nothing else converts.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&StatusMap> {
        match self {
            Self::Map(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_records(&self) -> Option<&[StatusMap]> {
        match self {
            Self::Records(v) => Some(v),
            _ => None,
        }
    }

    /// Text as-is, or a word list joined with single spaces.
    pub fn joined(&self) -> Option<String> {
        match self {
            Self::Text(v) => Some(v.clone()),
            Self::List(words) => Some(words.join(" ")),
            _ => None,
        }
    }
}

/// Result of parsing one status file.
///
/// Always a mapping at the root. An empty tree means "no status" (missing
/// start marker or unreadable text), not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusTree(StatusMap);

impl StatusTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The root mapping.
    pub fn root(&self) -> &StatusMap {
        &self.0
    }

    pub fn into_inner(self) -> StatusMap {
        self.0
    }

    /// A named top-level section, if it is a keyed mapping.
    pub fn section(&self, name: &str) -> Option<&StatusMap> {
        self.0.get(name).and_then(StatusValue::as_map)
    }

    /// Look up a dotted path such as `general.modelerStatus`.
    ///
    /// Numeric segments index into record sections
    /// (`queue.0.jobName`).
    pub fn get(&self, path: &str) -> Option<&StatusValue> {
        let mut segments = path.split('.');
        let mut current = self.0.get(segments.next()?)?;
        let mut record: Option<&StatusMap> = None;
        for segment in segments {
            if let Some(map) = record.take() {
                current = map.get(segment)?;
                continue;
            }
            match current {
                StatusValue::Map(map) => current = map.get(segment)?,
                StatusValue::Records(records) => {
                    record = Some(records.get(segment.parse::<usize>().ok()?)?);
                }
                _ => return None,
            }
        }
        // A path ending on a record index names a mapping, not a value.
        if record.is_some() {
            return None;
        }
        Some(current)
    }

    /// Coarse printer state derived from `general.modelerStatus`.
    pub fn modeler_state(&self) -> ModelerState {
        self.get("general.modelerStatus")
            .and_then(StatusValue::joined)
            .map(|s| ModelerState::classify(&s))
            .unwrap_or(ModelerState::Unknown)
    }

    /// Job start time from `general.startTime` (epoch seconds, zero = none).
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        let seconds = self.get("general.startTime")?.as_i64()?;
        if seconds <= 0 {
            return None;
        }
        DateTime::from_timestamp(seconds, 0)
    }
}

impl From<StatusMap> for StatusTree {
    fn from(map: StatusMap) -> Self {
        Self(map)
    }
}

/// Coarse printer state for dashboards and alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelerState {
    Idle,
    Building,
    Error,
    Unknown,
}

impl ModelerState {
    /// Map a free-text `modelerStatus` onto a coarse state.
    pub fn classify(status: &str) -> Self {
        let lower = status.trim().to_ascii_lowercase();
        if lower.contains("error") || lower.contains("fault") {
            Self::Error
        } else if lower.starts_with("building") || lower.starts_with("printing") {
            Self::Building
        } else if lower.starts_with("idle") || lower.starts_with("ready") {
            Self::Idle
        } else {
            Self::Unknown
        }
    }
}

/// Format a duration in seconds as `HH:MM` (seconds are truncated).
pub fn format_hhmm(seconds: u64) -> String {
    let minutes = seconds / 60;
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}
