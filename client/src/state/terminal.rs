//! One virtual terminal multiplexed over the session socket.

#[cfg(test)]
#[path = "terminal_test.rs"]
mod terminal_test;

use std::fmt;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use canvas::camera::Point;

/// Consumer of PTY output, typically a terminal-emulation widget.
pub trait TerminalWidget {
    fn write(&mut self, text: &str);
}

/// Creation lifecycle of a terminal.
///
/// `Ready` and `Error` are final with respect to creation. A ready terminal
/// keeps carrying input and output until it is removed; an errored one is
/// inert and exists only to be shown until dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalStatus {
    Creating,
    Ready { authoritative_id: String },
    Error { message: String },
}

impl TerminalStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creating => "creating",
            Self::Ready { .. } => "ready",
            Self::Error { .. } => "error",
        }
    }

    #[must_use]
    pub fn authoritative_id(&self) -> Option<&str> {
        match self {
            Self::Ready { authoritative_id } => Some(authoritative_id),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error { message } => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct TerminalEntry {
    pub provisional_id: String,
    pub status: TerminalStatus,
    /// Workspace coordinates of the terminal's top-left corner.
    pub position: Point,
    pub created_at: Instant,
    /// Insertion order within the registry. Breaks `created_at` ties.
    pub(crate) seq: u64,
    pub(crate) widget: Option<Box<dyn TerminalWidget + Send>>,
}

impl TerminalEntry {
    pub(crate) fn creating(provisional_id: String, position: Point, created_at: Instant, seq: u64) -> Self {
        Self { provisional_id, status: TerminalStatus::Creating, position, created_at, seq, widget: None }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.status, TerminalStatus::Ready { .. })
    }

    #[must_use]
    pub fn authoritative_id(&self) -> Option<&str> {
        self.status.authoritative_id()
    }

    #[must_use]
    pub fn has_widget(&self) -> bool {
        self.widget.is_some()
    }
}

impl fmt::Debug for TerminalEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalEntry")
            .field("provisional_id", &self.provisional_id)
            .field("status", &self.status)
            .field("position", &self.position)
            .field("created_at", &self.created_at)
            .field("has_widget", &self.widget.is_some())
            .finish()
    }
}

/// Fresh provisional id: wall-clock millis plus a random v4 suffix.
pub(crate) fn provisional_id() -> String {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_millis());
    format!("term-{millis}-{}", uuid::Uuid::new_v4().simple())
}
