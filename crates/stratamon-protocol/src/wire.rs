// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Byte-exact strings of the status-file transfer protocol.

/// Requests a file; followed by a frame carrying the file name.
pub const CMD_GET_FILE: &[u8] = b"GetFile";

/// Sent after the file name; also echoed back by the printer.
pub const CMD_NA: &[u8] = b"NA";

/// Acknowledges the printer's `NA` and, later, its size announcement.
pub const CMD_OK: &[u8] = b"OK";

/// The printer's answer once it has accepted a `GetFile`.
pub const REPLY_SEND_FILE: &[u8] = b"SendFile";

/// Sentinel that ends the status payload.
pub const TRANSFER_MARKER: &[u8] = b"Transferred:";

/// First bytes of the status body inside the payload.
pub const STATUS_MARKER: &[u8] = b"set machineStatus";

/// The confirmation frame sent after the transfer.
pub fn transferred_frame(received: usize) -> Vec<u8> {
    format!("Transferred: {received}").into_bytes()
}

/// Offset of the first occurrence of `needle` in `haystack`.
pub fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

pub fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    find_subslice(haystack, needle).is_some()
}

/// Parse the size announcement (e.g. `b"3597 \0\0..."`).
///
/// The first token delimited by ASCII whitespace or NUL padding must be an
/// unsigned decimal integer.
pub fn parse_size_reply(reply: &[u8]) -> Option<usize> {
    let token = reply
        .split(|b| b.is_ascii_whitespace() || *b == 0)
        .find(|t| !t.is_empty())?;
    std::str::from_utf8(token).ok()?.parse().ok()
}

/// Printable form of a reply for log and error messages.
pub fn printable(reply: &[u8]) -> String {
    let end = reply.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&reply[..end]).escape_debug().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_markers() {
        let payload = b"junk set machineStatus(general) {\n} Transferred: 10";
        assert_eq!(find_subslice(payload, STATUS_MARKER), Some(5));
        assert!(contains_subslice(payload, TRANSFER_MARKER));
        assert!(!contains_subslice(b"Transferred", TRANSFER_MARKER));
    }

    #[test]
    fn size_reply_variants() {
        assert_eq!(parse_size_reply(b"3597 "), Some(3597));
        assert_eq!(parse_size_reply(b"120\0\0\0\0"), Some(120));
        assert_eq!(parse_size_reply(b"  42 bytes"), Some(42));
        assert_eq!(parse_size_reply(b"-5 "), None);
        assert_eq!(parse_size_reply(b"abc"), None);
        assert_eq!(parse_size_reply(b"\0\0\0"), None);
        assert_eq!(parse_size_reply(b""), None);
    }

    #[test]
    fn confirmation_frame() {
        assert_eq!(transferred_frame(120), b"Transferred: 120".to_vec());
    }

    #[test]
    fn printable_strips_padding() {
        assert_eq!(printable(b"NA\0\0\0"), "NA");
    }
}
