// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Parser for the printer's status file.
//
// The file is Tcl-flavoured, one statement per line:
//
//   # comment
//   set machineStatus(general) {
//     -modelerStatus {Building}
//     -currentLayer 112
//   }
//   set machineStatus(queue) {
//     {
//       -jobName bracket
//     }
//   }
//
// Values are typed by shape only. Parsing is best effort: unknown lines are
// skipped, and a structural failure yields an empty tree instead of an error,
// so one garbled snapshot never breaks polling.
//
// Nesting is tracked with an explicit stack of indices into a frame arena,
// so malformed or very deep brace runs cannot overflow the call stack.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{trace, warn};

use stratamon_core::types::{StatusMap, StatusTree, StatusValue};

use crate::wire::{STATUS_MARKER, TRANSFER_MARKER, find_subslice};

const SECTION_PREFIX: &str = "set machineStatus(";

/// Structural failures. Never surfaced by the best-effort entry points.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: section '{name}' collides with a plain value")]
    SectionShadowsValue { line: usize, name: String },
}

/// Parse a raw transfer payload into a status tree.
///
/// Only the bytes from the first `set machineStatus` up to the following
/// `Transferred:` are parsed. A payload without the start marker has no
/// status in it and yields an empty tree.
pub fn parse_status_payload(payload: &[u8]) -> StatusTree {
    match extract_status(payload) {
        Some(body) => parse_status_text(&decode_ignoring_invalid(body)),
        None => {
            warn!(bytes = payload.len(), "no status data found in payload");
            StatusTree::new()
        }
    }
}

/// The slice between the status start marker and the transfer sentinel.
///
/// Without a sentinel the slice runs to the end of the payload.
pub fn extract_status(payload: &[u8]) -> Option<&[u8]> {
    let start = find_subslice(payload, STATUS_MARKER)?;
    let body = &payload[start..];
    // Only a sentinel after the start marker ends the slice; an earlier one is ignored.
    let end = find_subslice(body, TRANSFER_MARKER).unwrap_or(body.len());
    Some(&body[..end])
}

/// UTF-8 decode that drops invalid byte sequences instead of replacing them.
pub fn decode_ignoring_invalid(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text
}

/// Best-effort parse: any structural failure degrades to an empty tree.
pub fn parse_status_text(text: &str) -> StatusTree {
    match try_parse_status_text(text) {
        Ok(tree) => tree,
        Err(e) => {
            warn!(error = %e, "status parsing failed, discarding snapshot");
            StatusTree::new()
        }
    }
}

/// Strict parse, reporting structural failures.
pub fn try_parse_status_text(text: &str) -> Result<StatusTree, ParseError> {
    let mut builder = TreeBuilder::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        builder.line(index + 1, line)?;
    }
    Ok(builder.finish())
}

/// Type a value by its shape.
///
/// * `{a b c}` is a word list, `{word}` a single string
/// * digits with at most one `.` are numbers (integer without the dot)
/// * `true` / `false` in any case are booleans
/// * everything else is kept verbatim
///
/// Signs are not recognised, so `-3` stays a string.
pub fn type_value(raw: &str) -> StatusValue {
    if let Some(inner) = raw.strip_prefix('{') {
        let inner = inner.strip_suffix('}').unwrap_or(inner);
        if inner.contains(char::is_whitespace) {
            return StatusValue::List(inner.split_whitespace().map(str::to_string).collect());
        }
        return StatusValue::Text(inner.to_string());
    }

    if let Some(number) = type_number(raw) {
        return number;
    }

    if raw.eq_ignore_ascii_case("true") {
        return StatusValue::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return StatusValue::Bool(false);
    }

    StatusValue::Text(raw.to_string())
}

fn type_number(raw: &str) -> Option<StatusValue> {
    let dots = raw.bytes().filter(|&b| b == b'.').count();
    let digits = raw.bytes().filter(u8::is_ascii_digit).count();
    if digits == 0 || dots > 1 || digits + dots != raw.len() {
        return None;
    }
    if dots == 0 {
        // Out-of-range integers stay strings rather than losing precision.
        raw.parse().ok().map(StatusValue::Int)
    } else {
        raw.parse().ok().map(StatusValue::Float)
    }
}

/// Root entries are either plain values or sections.
enum Slot {
    Value(StatusValue),
    Section(usize),
}

enum Frame {
    Map { entries: StatusMap, section: bool },
    Records(Vec<usize>),
}

#[derive(Debug, Clone, Copy)]
enum Cursor {
    Root,
    Frame(usize),
}

struct TreeBuilder {
    root: BTreeMap<String, Slot>,
    frames: Vec<Frame>,
    stack: Vec<Cursor>,
    current: Cursor,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            root: BTreeMap::new(),
            frames: Vec::new(),
            stack: Vec::new(),
            current: Cursor::Root,
        }
    }

    fn line(&mut self, number: usize, line: &str) -> Result<(), ParseError> {
        if let Some(rest) = line.strip_prefix(SECTION_PREFIX) {
            match rest.split_once(')') {
                Some((name, _)) if !name.is_empty() => self.select_section(number, name)?,
                _ => trace!(line = number, "malformed section line skipped"),
            }
        } else if line.starts_with('{') {
            self.open_block();
        } else if line.starts_with('}') {
            if let Some(parent) = self.stack.pop() {
                self.current = parent;
            }
        } else if let Some(pair) = line.strip_prefix('-') {
            self.assign(number, pair);
        } else {
            trace!(line = number, "unrecognised line skipped");
        }
        Ok(())
    }

    /// Select (creating if needed) a top-level section. Unclosed braces from
    /// the previous section are abandoned.
    fn select_section(&mut self, number: usize, name: &str) -> Result<(), ParseError> {
        self.stack.clear();
        let index = match self.root.get(name) {
            Some(Slot::Section(index)) => *index,
            Some(Slot::Value(_)) => {
                return Err(ParseError::SectionShadowsValue {
                    line: number,
                    name: name.to_string(),
                });
            }
            None => {
                let index = self.push_frame(Frame::Map {
                    entries: StatusMap::new(),
                    section: true,
                });
                self.root.insert(name.to_string(), Slot::Section(index));
                index
            }
        };
        self.current = Cursor::Frame(index);
        Ok(())
    }

    /// Descend into a new anonymous block.
    ///
    /// Blocks opened in a record section (or in a still-empty section, which
    /// thereby becomes a record section) are kept as records. Blocks opened
    /// anywhere else are parsed but detached, so their keys never leak into
    /// the enclosing mapping.
    fn open_block(&mut self) {
        let block = self.push_frame(Frame::Map {
            entries: StatusMap::new(),
            section: false,
        });

        if let Cursor::Frame(index) = self.current {
            let becomes_records = match &mut self.frames[index] {
                Frame::Records(records) => {
                    records.push(block);
                    false
                }
                Frame::Map { entries, section } => *section && entries.is_empty(),
            };
            if becomes_records {
                self.frames[index] = Frame::Records(vec![block]);
            }
        }

        self.stack.push(self.current);
        self.current = Cursor::Frame(block);
    }

    fn assign(&mut self, number: usize, pair: &str) {
        let Some((key, value)) = pair.split_once(char::is_whitespace) else {
            trace!(line = number, "key without value skipped");
            return;
        };
        if key.is_empty() {
            trace!(line = number, "empty key skipped");
            return;
        }
        let value = type_value(value.trim());

        match self.current {
            Cursor::Root => {
                self.root.insert(key.to_string(), Slot::Value(value));
            }
            Cursor::Frame(index) => match &mut self.frames[index] {
                Frame::Map { entries, .. } => {
                    entries.insert(key.to_string(), value);
                }
                Frame::Records(_) => trace!(line = number, key, "value outside a block skipped"),
            },
        }
    }

    fn push_frame(&mut self, frame: Frame) -> usize {
        self.frames.push(frame);
        self.frames.len() - 1
    }

    fn take_map(&mut self, index: usize) -> StatusMap {
        match std::mem::replace(&mut self.frames[index], Frame::Records(Vec::new())) {
            Frame::Map { entries, .. } => entries,
            Frame::Records(_) => StatusMap::new(),
        }
    }

    fn finish(mut self) -> StatusTree {
        let root = std::mem::take(&mut self.root);
        let mut tree = StatusMap::new();
        for (name, slot) in root {
            let value = match slot {
                Slot::Value(value) => value,
                Slot::Section(index) => match &mut self.frames[index] {
                    Frame::Records(records) => {
                        let records = std::mem::take(records);
                        StatusValue::Records(records.into_iter().map(|r| self.take_map(r)).collect())
                    }
                    Frame::Map { .. } => StatusValue::Map(self.take_map(index)),
                },
            };
            tree.insert(name, value);
        }
        StatusTree::from(tree)
    }
}
