// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scripted in-memory transport for the sequencer and fetcher tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stratamon_core::config::{DEFAULT_CHUNK_SIZE, PrinterConfig};
use stratamon_core::error::{Result, StratamonError};

use crate::transport::{Connector, Transport};

/// One scripted answer to a `receive` call.
pub enum Reply {
    /// Bytes handed out across as many reads as `max_size` requires.
    Data(Vec<u8>),
    /// Graceful close: the read returns no bytes.
    Closed,
    TimedOut,
    Reset,
}

/// The canonical replies for steps 4, 5 and 7.
pub fn handshake(size_reply: &[u8]) -> Vec<Reply> {
    vec![
        Reply::Data(b"SendFile status.sts".to_vec()),
        Reply::Data(b"NA 0".to_vec()),
        Reply::Data(size_reply.to_vec()),
    ]
}

/// Something that happened to a scripted connection, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Open(tokio::time::Instant),
    Close(tokio::time::Instant),
}

/// Shared view of what the transport under test saw.
#[derive(Clone, Default)]
pub struct Probe {
    inner: Arc<Mutex<ProbeLog>>,
}

#[derive(Default)]
struct ProbeLog {
    sent: Vec<Vec<u8>>,
    timeouts: Vec<Duration>,
    read_sizes: Vec<usize>,
    events: Vec<Event>,
}

impl Probe {
    fn log(&self) -> std::sync::MutexGuard<'_, ProbeLog> {
        self.inner.lock().expect("probe lock")
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.log().sent.clone()
    }

    /// Every `set_timeout` call, in order.
    pub fn timeouts(&self) -> Vec<Duration> {
        self.log().timeouts.clone()
    }

    /// Reads issued with the bulk-transfer chunk size.
    pub fn payload_reads(&self) -> usize {
        self.log()
            .read_sizes
            .iter()
            .filter(|&&n| n == DEFAULT_CHUNK_SIZE)
            .count()
    }

    pub fn events(&self) -> Vec<Event> {
        self.log().events.clone()
    }

    pub fn opens(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Open(_)))
            .count()
    }

    pub fn closes(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Close(_)))
            .count()
    }
}

pub struct ScriptedTransport {
    replies: VecDeque<Reply>,
    probe: Probe,
    timeout: Duration,
    closed: bool,
    fail_sends: bool,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Reply>) -> (Self, Probe) {
        let probe = Probe::default();
        (Self::with_probe(replies, probe.clone()), probe)
    }

    fn with_probe(replies: Vec<Reply>, probe: Probe) -> Self {
        Self {
            replies: replies.into(),
            probe,
            timeout: Duration::from_secs(1),
            closed: false,
            fail_sends: false,
        }
    }

    pub fn fail_sends(&mut self) {
        self.fail_sends = true;
    }
}

impl Transport for ScriptedTransport {
    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        if self.fail_sends || self.closed {
            return Err(StratamonError::Connection("send: broken pipe".into()));
        }
        self.probe.log().sent.push(frame.to_vec());
        Ok(())
    }

    async fn receive(&mut self, max_size: usize) -> Result<Vec<u8>> {
        self.probe.log().read_sizes.push(max_size);
        match self.replies.pop_front() {
            None | Some(Reply::Closed) => Ok(Vec::new()),
            Some(Reply::TimedOut) => Err(StratamonError::Timeout("receive after 5000ms".into())),
            Some(Reply::Reset) => Err(StratamonError::Connection("connection reset by peer".into())),
            Some(Reply::Data(mut bytes)) => {
                if bytes.len() > max_size {
                    let rest = bytes.split_off(max_size);
                    self.replies.push_front(Reply::Data(rest));
                }
                Ok(bytes)
            }
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.probe.log().timeouts.push(timeout);
        self.timeout = timeout;
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.probe
                .log()
                .events
                .push(Event::Close(tokio::time::Instant::now()));
        }
    }
}

impl Drop for ScriptedTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// What the connector does for one `open` call.
pub enum Attempt {
    Refuse,
    Script(Vec<Reply>),
}

/// Hands out one scripted transport per attempt, sharing a single probe.
pub struct ScriptedConnector {
    attempts: Mutex<VecDeque<Attempt>>,
    probe: Probe,
    open_calls: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(attempts: Vec<Attempt>) -> (Self, Probe) {
        let probe = Probe::default();
        let connector = Self {
            attempts: Mutex::new(attempts.into()),
            probe: probe.clone(),
            open_calls: AtomicUsize::new(0),
        };
        (connector, probe)
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }
}

impl Connector for ScriptedConnector {
    type Conn = ScriptedTransport;

    async fn open(&self, _config: &PrinterConfig) -> Result<ScriptedTransport> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.attempts.lock().expect("attempts lock").pop_front();
        match next {
            None | Some(Attempt::Refuse) => {
                Err(StratamonError::Connection("connection refused".into()))
            }
            Some(Attempt::Script(replies)) => {
                self.probe
                    .log()
                    .events
                    .push(Event::Open(tokio::time::Instant::now()));
                Ok(ScriptedTransport::with_probe(replies, self.probe.clone()))
            }
        }
    }
}
