//! Deterministic in-memory doubles shared by the unit tests.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use frames::Frame;
use serde_json::Value;

use crate::config::{ClientConfig, SessionIdentity};
use crate::error::{SendError, TransportError};
use crate::net::connection::FrameSink;
use crate::net::transport::{SocketId, TimerId, Transport};
use crate::state::terminal::TerminalWidget;

pub fn test_config() -> ClientConfig {
    ClientConfig::from_lookup(|_| None).unwrap()
}

pub fn alice() -> SessionIdentity {
    SessionIdentity::new("room-1", "alice")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(SocketId, String),
    Send(SocketId, String),
    Close(SocketId, u16),
    Schedule(TimerId, Duration),
    Cancel(TimerId),
}

/// Records every transport command. Sends succeed unless `fail_sends` is set.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub calls: Vec<Call>,
    pub pending_timers: BTreeSet<TimerId>,
    pub fail_sends: bool,
}

impl RecordingTransport {
    pub fn opened(&self) -> Vec<SocketId> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Open(socket, _) => Some(*socket),
                _ => None,
            })
            .collect()
    }

    pub fn closed(&self) -> Vec<(SocketId, u16)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Close(socket, code) => Some((*socket, *code)),
                _ => None,
            })
            .collect()
    }

    pub fn sent_json(&self) -> Vec<Value> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Send(_, text) => Some(serde_json::from_str(text).unwrap()),
                _ => None,
            })
            .collect()
    }

    pub fn last_timer(&self) -> Option<TimerId> {
        self.pending_timers.iter().next_back().copied()
    }
}

impl Transport for RecordingTransport {
    fn open(&mut self, socket: SocketId, url: &str) {
        self.calls.push(Call::Open(socket, url.to_owned()));
    }

    fn send(&mut self, socket: SocketId, text: String) -> Result<(), TransportError> {
        if self.fail_sends {
            return Err(TransportError::Dropped(socket));
        }
        self.calls.push(Call::Send(socket, text));
        Ok(())
    }

    fn close(&mut self, socket: SocketId, code: u16) {
        self.calls.push(Call::Close(socket, code));
    }

    fn schedule_retry(&mut self, timer: TimerId, delay: Duration) {
        self.pending_timers.insert(timer);
        self.calls.push(Call::Schedule(timer, delay));
    }

    fn cancel_retry(&mut self, timer: TimerId) {
        self.pending_timers.remove(&timer);
        self.calls.push(Call::Cancel(timer));
    }
}

/// Collects frames handed to it, or fails every send with `fail`.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub frames: Vec<Frame>,
    pub fail: Option<SendError>,
}

impl RecordingSink {
    pub fn failing(err: SendError) -> Self {
        Self { frames: Vec::new(), fail: Some(err) }
    }
}

impl FrameSink for RecordingSink {
    fn send_frame(&mut self, frame: Frame) -> Result<(), SendError> {
        if let Some(err) = &self.fail {
            return Err(err.clone());
        }
        self.frames.push(frame);
        Ok(())
    }
}

/// Terminal widget whose writes can be inspected through a shared handle.
#[derive(Debug, Clone, Default)]
pub struct RecordingWidget {
    pub written: Arc<Mutex<Vec<String>>>,
}

impl RecordingWidget {
    pub fn output(&self) -> Vec<String> {
        self.written.lock().unwrap().clone()
    }
}

impl TerminalWidget for RecordingWidget {
    fn write(&mut self, text: &str) {
        self.written.lock().unwrap().push(text.to_owned());
    }
}
