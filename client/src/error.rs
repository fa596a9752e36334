//! Error types for the session client.
//!
//! Nothing in this crate panics on bad input. Malformed frames surface as
//! [`frames::CodecError`] and are dropped at the connection boundary. The
//! enums below cover the conditions a caller can act on.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

use crate::net::transport::SocketId;

/// Outbound send failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The connection is not open. An opportunistic reconnect may be underway.
    #[error("not connected")]
    NotConnected,
    /// The frame could not be encoded or handed to the socket.
    #[error("transport send failed: {0}")]
    Transport(String),
}

impl From<TransportError> for SendError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<frames::CodecError> for SendError {
    fn from(err: frames::CodecError) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Terminal registry operation failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("creation request not sent: {0}")]
    Send(#[from] SendError),
    #[error("unknown terminal: {0}")]
    UnknownTerminal(String),
}

/// Configuration could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid server url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },
}

/// The socket layer could not carry a command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No live socket with this id (never opened, or already released).
    #[error("socket {0} is not open")]
    NotOpen(SocketId),
    /// The socket task has exited.
    #[error("socket {0} dropped")]
    Dropped(SocketId),
}

/// A [`SessionHandle`](crate::net::driver::SessionHandle) request failed.
#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    /// The driver loop has exited, so nothing will answer.
    #[error("session driver stopped")]
    Stopped,
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Send(#[from] SendError),
}
