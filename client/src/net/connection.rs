//! Connection lifecycle for the session socket.
//!
//! STATE MACHINE
//! =============
//! ```text
//! idle -> connecting -> open -> closing -> closed
//!            ^                               |
//!            +------- retry timer -----------+   (abnormal close only)
//! ```
//!
//! A close with code 1000, or any close after [`ConnectionManager::teardown`],
//! stays closed. Any other code schedules one retry after the configured
//! delay. After `max_attempts` consecutive abnormal closes the manager gives
//! up until [`ConnectionManager::reconnect`] is called. A successful open
//! resets the counter.
//!
//! INVARIANTS
//! ==========
//! - At most one socket is current. Opening a new one releases the old one
//!   first, and events tagged with any other [`SocketId`] are ignored.
//! - At most one retry timer is pending. Scheduling or connecting cancels it.

#[cfg(test)]
#[path = "connection_test.rs"]
mod connection_test;

use std::fmt;

use frames::{Frame, FrameType};
use tracing::{debug, info, warn};

use super::transport::{NORMAL_CLOSE, SocketId, TimerId, Transport};
use crate::config::{ClientConfig, SessionIdentity};
use crate::error::SendError;

/// Observable state of the session connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// `connect` has never been called.
    #[default]
    Idle,
    Connecting,
    Open,
    /// The peer started the close handshake.
    Closing,
    Closed,
}

impl ConnectionState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the manager decided when a socket closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The event belonged to a socket that is no longer current.
    Stale,
    /// Normal or manual close. No retry.
    Normal,
    /// A retry is scheduled. `attempt` counts consecutive abnormal closes.
    Reconnecting { attempt: u32, delay: std::time::Duration },
    /// The retry budget is spent. Only `reconnect()` opens a new socket.
    GaveUp { attempts: u32 },
}

/// Anything that can carry an outbound frame for the session.
pub trait FrameSink {
    fn send_frame(&mut self, frame: Frame) -> Result<(), SendError>;
}

/// Owns the session socket, its retry timer, and the wire codec boundary.
pub struct ConnectionManager<T> {
    transport: T,
    config: ClientConfig,
    identity: Option<SessionIdentity>,
    state: ConnectionState,
    socket: Option<SocketId>,
    attempt: u32,
    retry: Option<TimerId>,
    manual_close: bool,
    gave_up: bool,
    next_socket: u64,
    next_timer: u64,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            identity: None,
            state: ConnectionState::Idle,
            socket: None,
            attempt: 0,
            retry: None,
            manual_close: false,
            gave_up: false,
            next_socket: 0,
            next_timer: 0,
        }
    }

    // =========================================================================
    // Caller operations
    // =========================================================================

    /// Open the session socket. Returns `false` when a socket for the same
    /// identity is already connecting or open.
    pub fn connect(&mut self, identity: SessionIdentity) -> bool {
        if self.identity.as_ref() == Some(&identity)
            && matches!(self.state, ConnectionState::Connecting | ConnectionState::Open)
        {
            debug!(session_id = %identity.session_id, state = %self.state, "connect ignored; already active");
            return false;
        }
        if self.identity.as_ref() != Some(&identity) {
            self.attempt = 0;
        }
        self.identity = Some(identity);
        self.manual_close = false;
        self.gave_up = false;
        self.open_socket();
        true
    }

    /// Reset the retry counter and open a fresh socket immediately.
    /// Returns `false` if `connect` was never called.
    pub fn reconnect(&mut self) -> bool {
        if self.identity.is_none() {
            warn!("reconnect requested before connect");
            return false;
        }
        self.attempt = 0;
        self.manual_close = false;
        self.gave_up = false;
        self.open_socket();
        true
    }

    /// Manual close. Safe to call repeatedly and from any state.
    pub fn teardown(&mut self) {
        self.manual_close = true;
        self.cancel_retry();
        if let Some(socket) = self.socket.take() {
            info!(%socket, "closing session socket");
            self.transport.close(socket, NORMAL_CLOSE);
        }
        self.state = ConnectionState::Closed;
    }

    /// Send one frame built from its parts. See [`FrameSink::send_frame`].
    pub fn send(&mut self, kind: FrameType, content: Option<&str>, terminal_id: Option<&str>) -> Result<(), SendError> {
        let mut frame = Frame::new(kind);
        frame.content = content.map(str::to_owned);
        frame.terminal_id = terminal_id.map(str::to_owned);
        self.send_frame(frame)
    }

    // =========================================================================
    // Transport events
    // =========================================================================

    /// Returns `true` if `socket` is current and is now open.
    pub fn on_open(&mut self, socket: SocketId) -> bool {
        if !self.is_current(socket) {
            debug!(%socket, "ignoring open from stale socket");
            return false;
        }
        if self.attempt > 0 {
            info!(%socket, after_attempts = self.attempt, "session socket reopened");
        } else {
            info!(%socket, "session socket open");
        }
        self.state = ConnectionState::Open;
        self.attempt = 0;
        true
    }

    /// Decode an inbound text frame. Malformed frames are logged and dropped.
    pub fn on_text(&mut self, socket: SocketId, text: &str) -> Option<Frame> {
        if !self.is_current(socket) {
            return None;
        }
        match frames::decode_frame(text) {
            Ok(frame) => Some(frame),
            Err(err) => {
                warn!(%socket, error = %err, "dropping malformed frame");
                None
            }
        }
    }

    /// Binary frames carry the same JSON as text frames.
    pub fn on_binary(&mut self, socket: SocketId, bytes: &[u8]) -> Option<Frame> {
        if !self.is_current(socket) {
            return None;
        }
        match frames::decode_frame_bytes(bytes) {
            Ok(frame) => Some(frame),
            Err(err) => {
                warn!(%socket, error = %err, "dropping malformed binary frame");
                None
            }
        }
    }

    pub fn on_closing(&mut self, socket: SocketId) {
        if self.is_current(socket) && self.state == ConnectionState::Open {
            self.state = ConnectionState::Closing;
        }
    }

    pub fn on_error(&mut self, socket: SocketId, message: &str) {
        if self.is_current(socket) {
            warn!(%socket, error = message, "session socket error");
        } else {
            debug!(%socket, error = message, "error from stale socket");
        }
    }

    pub fn on_closed(&mut self, socket: SocketId, code: u16) -> CloseOutcome {
        if !self.is_current(socket) {
            debug!(%socket, code, "ignoring close from stale socket");
            return CloseOutcome::Stale;
        }
        self.socket = None;
        self.state = ConnectionState::Closed;

        if self.manual_close || code == NORMAL_CLOSE {
            info!(%socket, code, "session socket closed");
            return CloseOutcome::Normal;
        }

        self.attempt = self.attempt.saturating_add(1);
        if self.attempt >= self.config.reconnect.max_attempts {
            self.gave_up = true;
            self.cancel_retry();
            warn!(%socket, code, attempts = self.attempt, "giving up on session socket");
            return CloseOutcome::GaveUp { attempts: self.attempt };
        }

        let delay = self.config.reconnect.delay;
        self.schedule_retry();
        warn!(%socket, code, attempt = self.attempt, ?delay, "session socket dropped; retrying");
        CloseOutcome::Reconnecting { attempt: self.attempt, delay }
    }

    /// Returns `true` if the timer was still pending and a socket was opened.
    pub fn on_retry_due(&mut self, timer: TimerId) -> bool {
        if self.retry != Some(timer) {
            debug!(timer = timer.0, "ignoring cancelled retry timer");
            return false;
        }
        self.retry = None;
        if self.manual_close || self.gave_up {
            return false;
        }
        self.open_socket();
        true
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive abnormal closes since the last successful open.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    #[must_use]
    pub fn has_pending_retry(&self) -> bool {
        self.retry.is_some()
    }

    #[must_use]
    pub fn has_given_up(&self) -> bool {
        self.gave_up
    }

    #[must_use]
    pub fn identity(&self) -> Option<&SessionIdentity> {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn current_socket(&self) -> Option<SocketId> {
        self.socket
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn is_current(&self, socket: SocketId) -> bool {
        self.socket == Some(socket)
    }

    fn open_socket(&mut self) {
        self.cancel_retry();
        if let Some(old) = self.socket.take() {
            debug!(socket = %old, "releasing previous socket");
            self.transport.close(old, NORMAL_CLOSE);
        }
        let Some(identity) = &self.identity else {
            return;
        };
        let url = self.config.endpoint(identity);

        self.next_socket += 1;
        let socket = SocketId(self.next_socket);
        self.socket = Some(socket);
        self.state = ConnectionState::Connecting;
        info!(%socket, attempt = self.attempt, url = %url, "connecting session socket");
        self.transport.open(socket, url.as_str());
    }

    fn schedule_retry(&mut self) {
        self.cancel_retry();
        self.next_timer += 1;
        let timer = TimerId(self.next_timer);
        self.transport.schedule_retry(timer, self.config.reconnect.delay);
        self.retry = Some(timer);
    }

    fn cancel_retry(&mut self) {
        if let Some(timer) = self.retry.take() {
            self.transport.cancel_retry(timer);
        }
    }

    fn reconnect_opportunistically(&mut self) {
        if self.manual_close || self.gave_up || self.identity.is_none() {
            return;
        }
        if matches!(self.state, ConnectionState::Idle | ConnectionState::Closed) {
            debug!("send while disconnected; reconnecting now");
            self.open_socket();
        }
    }
}

impl<T: Transport> FrameSink for ConnectionManager<T> {
    /// Stamp `sender` and transmit one frame. Fails with
    /// [`SendError::NotConnected`] unless the socket is open, and in that case
    /// starts a reconnect unless one is already underway, the session was torn
    /// down, or retries were exhausted.
    fn send_frame(&mut self, mut frame: Frame) -> Result<(), SendError> {
        let (Some(socket), ConnectionState::Open) = (self.socket, self.state) else {
            self.reconnect_opportunistically();
            return Err(SendError::NotConnected);
        };
        if let Some(identity) = &self.identity {
            frame.sender = Some(identity.client_id.clone());
        }
        let text = frames::encode_frame(&frame)?;
        self.transport.send(socket, text)?;
        Ok(())
    }
}
