//! Transport seam between the connection state machine and real sockets.
//!
//! The connection manager never awaits. It issues commands through
//! [`Transport`] and is fed [`TransportEvent`]s by whoever drives it. Every
//! socket gets a fresh [`SocketId`], so late events from a replaced socket
//! can be recognised and ignored.

use std::fmt;
use std::time::Duration;

use crate::error::TransportError;

/// Normal closure. Suppresses automatic reconnection.
pub const NORMAL_CLOSE: u16 = 1000;
/// Peer sent a close frame without a status code.
pub const NO_STATUS_CLOSE: u16 = 1005;
/// Connection dropped without a close handshake.
pub const ABNORMAL_CLOSE: u16 = 1006;

/// Identity of one socket attempt. Monotonically increasing per manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(pub u64);

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of one scheduled reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Side effects the connection manager needs from its environment.
pub trait Transport {
    /// Begin opening `socket` against `url`. Completion arrives as
    /// [`TransportEvent::Opened`] or [`TransportEvent::Closed`].
    fn open(&mut self, socket: SocketId, url: &str);

    /// Queue one text frame on an open socket.
    fn send(&mut self, socket: SocketId, text: String) -> Result<(), TransportError>;

    /// Release `socket`, sending a close frame with `code` if it is open.
    /// The manager has already forgotten the socket when this is called.
    fn close(&mut self, socket: SocketId, code: u16);

    /// Deliver [`TransportEvent::RetryDue`] for `timer` after `delay`.
    fn schedule_retry(&mut self, timer: TimerId, delay: Duration);

    /// Drop a scheduled retry. Unknown timers are ignored.
    fn cancel_retry(&mut self, timer: TimerId);
}

/// Something that happened on a socket or timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened(SocketId),
    Text(SocketId, String),
    Binary(SocketId, Vec<u8>),
    /// The peer started the close handshake; `Closed` follows.
    Closing(SocketId),
    Closed { socket: SocketId, code: u16 },
    /// Informational. A `Closed` event always follows a fatal error.
    Error(SocketId, String),
    RetryDue(TimerId),
}
