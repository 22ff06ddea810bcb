// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The status-file handshake.
//
// One fixed, strictly ordered exchange per attempt:
//   1. send GetFile            (command delay)
//   2. send <status filename>  (command delay)
//   3. send NA                 (response delay)
//   4. recv, must contain SendFile (transfer delay)
//   5. recv, must contain NA
//   6. send OK
//   7. recv size announcement ("3597 ")
//   8. send OK
//   9. recv chunks with the long transfer timeout until the announced size
//      is reached, a chunk carries "Transferred:", or the printer closes
//  10. send "Transferred: <N>"
//
// The delays are settling time the printer needs between frames. The
// transport's timeout is restored on every exit path, and any failure
// inside the sequence surfaces as a protocol violation carrying its cause.

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use tracing::{debug, error, warn};

use stratamon_core::config::PrinterConfig;
use stratamon_core::error::{Result, StratamonError};

use crate::transport::Transport;
use crate::wire::{
    CMD_GET_FILE, CMD_NA, CMD_OK, REPLY_SEND_FILE, TRANSFER_MARKER, contains_subslice,
    parse_size_reply, printable, transferred_frame,
};

/// Why the bulk transfer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEnd {
    /// The announced size was reached.
    Complete,
    /// A chunk carried the `Transferred:` sentinel.
    Sentinel,
    /// The printer closed the connection after sending some data.
    PeerClosed,
    /// A read timed out after some data had arrived.
    TimedOut,
}

/// Bytes of one status-file transfer.
#[derive(Debug, Clone)]
pub struct RawPayload {
    pub bytes: Vec<u8>,
    /// Size the printer announced in step 7.
    pub expected_size: usize,
    pub end: TransferEnd,
}

impl RawPayload {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether fewer bytes arrived than were announced.
    pub fn is_short(&self) -> bool {
        self.bytes.len() < self.expected_size
    }
}

/// Restores a transport's timeout when dropped.
struct TimeoutGuard<'a, T: Transport> {
    transport: &'a mut T,
    original: Duration,
}

impl<'a, T: Transport> TimeoutGuard<'a, T> {
    fn new(transport: &'a mut T) -> Self {
        let original = transport.timeout();
        Self {
            transport,
            original,
        }
    }
}

impl<T: Transport> Deref for TimeoutGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.transport
    }
}

impl<T: Transport> DerefMut for TimeoutGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.transport
    }
}

impl<T: Transport> Drop for TimeoutGuard<'_, T> {
    fn drop(&mut self) {
        self.transport.set_timeout(self.original);
    }
}

/// Drives the handshake for one attempt over a borrowed transport.
pub struct Sequencer<'a> {
    config: &'a PrinterConfig,
}

impl<'a> Sequencer<'a> {
    pub fn new(config: &'a PrinterConfig) -> Self {
        Self { config }
    }

    /// Run steps 1-10 and return the raw status payload.
    ///
    /// Every failure is reported as `StratamonError::Protocol`; transport
    /// errors are kept as its cause.
    pub async fn run<T: Transport>(&self, transport: &mut T) -> Result<RawPayload> {
        let mut guard = TimeoutGuard::new(transport);
        match self.exchange(&mut *guard).await {
            Ok(payload) => Ok(payload),
            Err(e) => {
                error!(error = %e, "protocol sequence failed");
                Err(StratamonError::protocol_from("protocol sequence failed", e))
            }
        }
    }

    async fn exchange<T: Transport>(&self, transport: &mut T) -> Result<RawPayload> {
        let delays = &self.config.delays;
        let frame_size = self.config.packet_size;

        transport.send(CMD_GET_FILE).await?;
        tokio::time::sleep(delays.command).await;

        transport.send(self.config.status_filename.as_bytes()).await?;
        tokio::time::sleep(delays.command).await;

        transport.send(CMD_NA).await?;
        tokio::time::sleep(delays.response).await;

        let reply = transport.receive(frame_size).await?;
        if !contains_subslice(&reply, REPLY_SEND_FILE) {
            return Err(StratamonError::protocol(format!(
                "expected SendFile, got '{}'",
                printable(&reply)
            )));
        }
        tokio::time::sleep(delays.transfer).await;

        let reply = transport.receive(frame_size).await?;
        if !contains_subslice(&reply, CMD_NA) {
            return Err(StratamonError::protocol(format!(
                "expected NA, got '{}'",
                printable(&reply)
            )));
        }

        transport.send(CMD_OK).await?;

        let reply = transport.receive(frame_size).await?;
        if reply.is_empty() {
            return Err(StratamonError::protocol("no size data received"));
        }
        let expected_size = parse_size_reply(&reply).ok_or_else(|| {
            StratamonError::protocol(format!("invalid size data '{}'", printable(&reply)))
        })?;
        debug!(expected_size, "printer announced status file");

        transport.send(CMD_OK).await?;

        transport.set_timeout(self.config.transfer_timeout);
        let (bytes, end) = self.receive_payload(transport, expected_size).await?;
        debug!(
            received = bytes.len(),
            expected = expected_size,
            end = ?end,
            "status transfer finished"
        );

        transport.send(&transferred_frame(bytes.len())).await?;

        Ok(RawPayload {
            bytes,
            expected_size,
            end,
        })
    }

    async fn receive_payload<T: Transport>(
        &self,
        transport: &mut T,
        expected_size: usize,
    ) -> Result<(Vec<u8>, TransferEnd)> {
        // The announced size comes off the wire; reserve a bounded amount.
        let mut data = Vec::with_capacity(expected_size.min(self.config.chunk_size * 64));

        while data.len() < expected_size {
            let chunk = match transport.receive(self.config.chunk_size).await {
                Ok(chunk) => chunk,
                Err(StratamonError::Timeout(detail)) if !data.is_empty() => {
                    warn!(received = data.len(), detail = %detail, "timeout after partial data");
                    return Ok((data, TransferEnd::TimedOut));
                }
                Err(e) => return Err(e),
            };

            if chunk.is_empty() {
                if data.is_empty() {
                    return Err(StratamonError::protocol("connection closed without data"));
                }
                warn!(
                    received = data.len(),
                    expected = expected_size,
                    "printer closed connection before announced size"
                );
                return Ok((data, TransferEnd::PeerClosed));
            }

            data.extend_from_slice(&chunk);
            if contains_subslice(&chunk, TRANSFER_MARKER) {
                return Ok((data, TransferEnd::Sentinel));
            }
        }

        Ok((data, TransferEnd::Complete))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Reply, ScriptedTransport, handshake};

    fn config() -> PrinterConfig {
        PrinterConfig::new("printer.test", 53742)
            .with_timeouts(Duration::from_secs(1), Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn sends_commands_in_order() {
        let mut script = handshake(b"10 ");
        script.push(Reply::Data(b"0123456789".to_vec()));
        let (mut transport, probe) = ScriptedTransport::new(script);

        let payload = Sequencer::new(&config()).run(&mut transport).await.expect("run");
        assert_eq!(payload.bytes, b"0123456789");
        assert_eq!(payload.end, TransferEnd::Complete);

        let sent = probe.sent();
        assert_eq!(
            sent,
            vec![
                b"GetFile".to_vec(),
                b"status.sts".to_vec(),
                b"NA".to_vec(),
                b"OK".to_vec(),
                b"OK".to_vec(),
                b"Transferred: 10".to_vec(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn payload_spans_several_chunks() {
        let mut script = handshake(b"3000 ");
        script.push(Reply::Data(vec![b'a'; 3000]));
        let (mut transport, probe) = ScriptedTransport::new(script);

        let payload = Sequencer::new(&config()).run(&mut transport).await.expect("run");
        assert_eq!(payload.len(), 3000);
        assert!(!payload.is_short());
        // 1460 + 1460 + 80
        assert_eq!(probe.payload_reads(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn sentinel_stops_early() {
        let mut script = handshake(b"5000 ");
        script.push(Reply::Data(b"set machineStatus(general)\n".to_vec()));
        script.push(Reply::Data(b"-modelerStatus {Idle}\nTransferred: 45".to_vec()));
        script.push(Reply::Data(b"never read".to_vec()));
        let (mut transport, probe) = ScriptedTransport::new(script);

        let payload = Sequencer::new(&config()).run(&mut transport).await.expect("run");
        assert_eq!(payload.end, TransferEnd::Sentinel);
        assert!(payload.is_short());
        let sent = probe.sent();
        let confirm = format!("Transferred: {}", payload.len()).into_bytes();
        assert_eq!(sent.last(), Some(&confirm));
    }

    #[tokio::test(start_paused = true)]
    async fn absurd_size_announcement_is_not_preallocated() {
        for size in [&b"18446744073709551615 "[..], b"200000000000 "] {
            let mut script = handshake(size);
            script.push(Reply::Data(
                b"set machineStatus(general)\n-modelerStatus {Idle}\nTransferred: 45".to_vec(),
            ));
            let (mut transport, _probe) = ScriptedTransport::new(script);

            let payload = Sequencer::new(&config()).run(&mut transport).await.expect("run");
            assert_eq!(payload.end, TransferEnd::Sentinel);
            assert!(payload.is_short());
            assert!(payload.bytes.capacity() < 1 << 20);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn close_without_data_is_violation() {
        let mut script = handshake(b"120 ");
        script.push(Reply::Closed);
        let (mut transport, _probe) = ScriptedTransport::new(script);

        let err = Sequencer::new(&config()).run(&mut transport).await.expect_err("fails");
        assert!(matches!(err, StratamonError::Protocol { ref message, .. } if message.contains("without data")));
    }

    #[tokio::test(start_paused = true)]
    async fn short_transfer_is_tolerated() {
        let mut script = handshake(b"120 ");
        script.push(Reply::Data(b"partial".to_vec()));
        script.push(Reply::Closed);
        let (mut transport, probe) = ScriptedTransport::new(script);

        let payload = Sequencer::new(&config()).run(&mut transport).await.expect("run");
        assert_eq!(payload.end, TransferEnd::PeerClosed);
        assert_eq!(payload.bytes, b"partial");
        assert_eq!(probe.sent().last(), Some(&b"Transferred: 7".to_vec()));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_after_partial_data_is_tolerated() {
        let mut script = handshake(b"120 ");
        script.push(Reply::Data(b"some bytes".to_vec()));
        script.push(Reply::TimedOut);
        let (mut transport, _probe) = ScriptedTransport::new(script);

        let payload = Sequencer::new(&config()).run(&mut transport).await.expect("run");
        assert_eq!(payload.end, TransferEnd::TimedOut);
        assert_eq!(payload.len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_without_data_keeps_cause() {
        let mut script = handshake(b"120 ");
        script.push(Reply::TimedOut);
        let (mut transport, _probe) = ScriptedTransport::new(script);

        let err = Sequencer::new(&config()).run(&mut transport).await.expect_err("fails");
        match err {
            StratamonError::Protocol { cause: Some(cause), .. } => {
                assert!(matches!(*cause, StratamonError::Timeout(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_first_reply_is_violation() {
        let (mut transport, probe) =
            ScriptedTransport::new(vec![Reply::Data(b"Busy".to_vec())]);

        let err = Sequencer::new(&config()).run(&mut transport).await.expect_err("fails");
        assert!(err.to_string().contains("expected SendFile"));
        // Nothing after step 3 was sent.
        assert_eq!(probe.sent().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_na_is_violation() {
        let (mut transport, _probe) = ScriptedTransport::new(vec![
            Reply::Data(b"SendFile".to_vec()),
            Reply::Data(b"Huh".to_vec()),
        ]);
        let err = Sequencer::new(&config()).run(&mut transport).await.expect_err("fails");
        assert!(err.to_string().contains("expected NA"));
    }

    #[tokio::test(start_paused = true)]
    async fn unparsable_size_is_violation() {
        let (mut transport, _probe) = ScriptedTransport::new(handshake(b"lots"));
        let err = Sequencer::new(&config()).run(&mut transport).await.expect_err("fails");
        assert!(err.to_string().contains("invalid size data"));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_size_reply_is_violation() {
        let mut script = handshake(b"");
        script[2] = Reply::Closed;
        let (mut transport, _probe) = ScriptedTransport::new(script);
        let err = Sequencer::new(&config()).run(&mut transport).await.expect_err("fails");
        assert!(err.to_string().contains("no size data"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_restored_on_success_and_failure() {
        let mut script = handshake(b"4 ");
        script.push(Reply::Data(b"data".to_vec()));
        let (mut transport, probe) = ScriptedTransport::new(script);
        Sequencer::new(&config()).run(&mut transport).await.expect("run");
        assert_eq!(transport.timeout(), Duration::from_secs(1));
        assert_eq!(
            probe.timeouts(),
            vec![Duration::from_secs(5), Duration::from_secs(1)]
        );

        let mut script = handshake(b"4 ");
        script.push(Reply::Reset);
        let (mut transport, _probe) = ScriptedTransport::new(script);
        Sequencer::new(&config()).run(&mut transport).await.expect_err("fails");
        assert_eq!(transport.timeout(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn protocol_delays_are_observed() {
        let mut script = handshake(b"1 ");
        script.push(Reply::Data(b"x".to_vec()));
        let (mut transport, _probe) = ScriptedTransport::new(script);

        let start = tokio::time::Instant::now();
        Sequencer::new(&config()).run(&mut transport).await.expect("run");
        // 4 + 4 + 18 + 46 ms of mandated settling time.
        assert!(start.elapsed() >= Duration::from_millis(72));
    }

    #[tokio::test(start_paused = true)]
    async fn send_failure_is_rewrapped() {
        let (mut transport, _probe) = ScriptedTransport::new(Vec::new());
        transport.fail_sends();
        let err = Sequencer::new(&config()).run(&mut transport).await.expect_err("fails");
        match err {
            StratamonError::Protocol { cause: Some(cause), .. } => {
                assert!(cause.is_connection_failure());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
