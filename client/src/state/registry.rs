//! Terminal registry: lifecycle and id reconciliation for every terminal in
//! the session.
//!
//! DESIGN
//! ======
//! A terminal is born with a client-issued provisional id and later learns
//! its server-issued authoritative id. Output frames carry only the
//! authoritative id, so the registry keeps both directions of the mapping:
//! `entries` is keyed by provisional id, and `by_authoritative` points back
//! from authoritative ids held by ready entries.
//!
//! INVARIANTS
//! ==========
//! - `by_authoritative` holds exactly the authoritative ids of ready entries.
//! - An authoritative id is only ever copied from a server confirmation and
//!   is never reassigned once set.
//! - Every operation runs to completion without yielding.

#[cfg(test)]
#[path = "registry_test.rs"]
mod registry_test;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use canvas::camera::Point;
use frames::{Frame, FrameType};
use tracing::{debug, info, warn};

use super::terminal::{TerminalEntry, TerminalStatus, TerminalWidget, provisional_id};
use crate::error::{RegistryError, SendError};
use crate::net::connection::FrameSink;

pub const CREATE_TIMEOUT_MESSAGE: &str = "terminal creation timed out";

/// Result of a creation confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    /// `creating` became `ready`.
    Promoted,
    /// Duplicate confirmation for an entry already ready with the same id.
    AlreadyReady,
    /// No entry with that provisional id. It was removed locally.
    Unknown,
    /// Confirmation conflicts with current state and was ignored.
    Rejected,
}

/// Result of routing one output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The terminal is ready but nothing is attached to display it.
    NoWidget,
    /// No ready terminal carries that authoritative id.
    Dropped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub creating: usize,
    pub ready: usize,
    pub error: usize,
}

impl StatusCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.creating + self.ready + self.error
    }
}

#[derive(Debug, Default)]
pub struct TerminalRegistry {
    entries: HashMap<String, TerminalEntry>,
    by_authoritative: HashMap<String, String>,
    next_seq: u64,
}

impl TerminalRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Create a terminal at the workspace origin. See [`request_create_at`](Self::request_create_at).
    pub fn request_create(&mut self, sink: &mut impl FrameSink) -> Result<String, RegistryError> {
        self.request_create_at(sink, Point::ORIGIN)
    }

    /// Insert a `creating` entry and ask the server for a PTY.
    ///
    /// The `create_terminal` frame carries the provisional id as `frontendId`
    /// so the server can echo it back. If the frame cannot be sent the entry is
    /// removed before returning.
    pub fn request_create_at(&mut self, sink: &mut impl FrameSink, position: Point) -> Result<String, RegistryError> {
        self.request_create_with(sink, position, None)
    }

    /// Like [`request_create_at`](Self::request_create_at), with `widget`
    /// attached before the request leaves, so output that arrives right
    /// behind the confirmation is not lost.
    pub fn request_create_with(
        &mut self,
        sink: &mut impl FrameSink,
        position: Point,
        widget: Option<Box<dyn TerminalWidget + Send>>,
    ) -> Result<String, RegistryError> {
        let id = provisional_id();
        self.next_seq += 1;
        let mut entry = TerminalEntry::creating(id.clone(), position, Instant::now(), self.next_seq);
        entry.widget = widget;
        self.entries.insert(id.clone(), entry);

        let frame = Frame::new(FrameType::CreateTerminal).with_frontend_id(id.as_str());
        if let Err(err) = sink.send_frame(frame) {
            self.entries.remove(&id);
            debug!(provisional_id = %id, error = %err, "create request not sent; entry discarded");
            return Err(err.into());
        }
        info!(provisional_id = %id, "terminal creation requested");
        Ok(id)
    }

    /// Promote a `creating` entry to `ready`. Duplicate confirmations are a
    /// no-op.
    pub fn on_created(&mut self, provisional_id: &str, authoritative_id: &str) -> Promotion {
        let Some(entry) = self.entries.get_mut(provisional_id) else {
            debug!(provisional_id, authoritative_id, "confirmation for unknown terminal");
            return Promotion::Unknown;
        };

        match &entry.status {
            TerminalStatus::Ready { authoritative_id: current } if current == authoritative_id => {
                return Promotion::AlreadyReady;
            }
            TerminalStatus::Ready { authoritative_id: current } => {
                warn!(provisional_id, current = %current, offered = authoritative_id, "refusing to reassign terminal id");
                return Promotion::Rejected;
            }
            TerminalStatus::Error { .. } => {
                debug!(provisional_id, authoritative_id, "confirmation for failed terminal ignored");
                return Promotion::Rejected;
            }
            TerminalStatus::Creating => {}
        }

        if let Some(owner) = self.by_authoritative.get(authoritative_id) {
            warn!(provisional_id, authoritative_id, owner = %owner, "authoritative id already in use");
            return Promotion::Rejected;
        }

        entry.status = TerminalStatus::Ready { authoritative_id: authoritative_id.to_owned() };
        self.by_authoritative.insert(authoritative_id.to_owned(), provisional_id.to_owned());
        info!(provisional_id, authoritative_id, "terminal ready");
        Promotion::Promoted
    }

    /// Fail a `creating` entry. Returns `false` if nothing changed.
    pub fn on_error(&mut self, provisional_id: &str, message: &str) -> bool {
        let Some(entry) = self.entries.get_mut(provisional_id) else {
            debug!(provisional_id, "creation error for unknown terminal");
            return false;
        };
        if entry.status != TerminalStatus::Creating {
            debug!(provisional_id, status = %entry.status, "creation error ignored");
            return false;
        }
        entry.status = TerminalStatus::Error { message: message.to_owned() };
        info!(provisional_id, error = message, "terminal creation failed");
        true
    }

    /// Deliver PTY output verbatim to the terminal holding `authoritative_id`.
    pub fn on_output(&mut self, authoritative_id: &str, content: &str) -> Delivery {
        let Some(entry) = self.by_authoritative.get(authoritative_id).and_then(|p| self.entries.get_mut(p)) else {
            debug!(authoritative_id, "output for unknown terminal dropped");
            return Delivery::Dropped;
        };
        match entry.widget.as_mut() {
            Some(widget) => {
                widget.write(content);
                Delivery::Delivered
            }
            None => Delivery::NoWidget,
        }
    }

    /// Forward keystrokes to a ready terminal. Returns `Ok(false)` without
    /// sending anything when the terminal is unknown or not ready.
    pub fn send_input(&self, provisional_id: &str, data: &str, sink: &mut impl FrameSink) -> Result<bool, SendError> {
        let Some(authoritative_id) = self.authoritative_id_of(provisional_id) else {
            return Ok(false);
        };
        let frame = Frame::new(FrameType::PtyInput).with_content(data).with_terminal_id(authoritative_id);
        sink.send_frame(frame)?;
        Ok(true)
    }

    /// Forget a terminal locally. The server is not notified.
    pub fn remove(&mut self, provisional_id: &str) -> Option<TerminalEntry> {
        let entry = self.entries.remove(provisional_id)?;
        if let Some(authoritative_id) = entry.authoritative_id() {
            self.by_authoritative.remove(authoritative_id);
        }
        info!(provisional_id, "terminal removed");
        Some(entry)
    }

    /// Drop every terminal. Used when the session ends.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_authoritative.clear();
    }

    /// Fail every `creating` entry older than `timeout` as of `now`.
    pub fn expire_creating(&mut self, now: Instant, timeout: Duration) -> Vec<String> {
        let mut expired: Vec<String> = self
            .entries
            .values()
            .filter(|e| e.status == TerminalStatus::Creating && now.saturating_duration_since(e.created_at) >= timeout)
            .map(|e| e.provisional_id.clone())
            .collect();
        expired.sort();
        for id in &expired {
            self.on_error(id, CREATE_TIMEOUT_MESSAGE);
        }
        expired
    }

    // =========================================================================
    // Presentation hooks
    // =========================================================================

    /// Bind the widget that receives this terminal's output.
    pub fn attach(&mut self, provisional_id: &str, widget: Box<dyn TerminalWidget + Send>) -> Result<(), RegistryError> {
        let entry = self
            .entries
            .get_mut(provisional_id)
            .ok_or_else(|| RegistryError::UnknownTerminal(provisional_id.to_owned()))?;
        entry.widget = Some(widget);
        Ok(())
    }

    pub fn move_terminal(&mut self, provisional_id: &str, position: Point) -> Result<(), RegistryError> {
        let entry = self
            .entries
            .get_mut(provisional_id)
            .ok_or_else(|| RegistryError::UnknownTerminal(provisional_id.to_owned()))?;
        if position.is_finite() {
            entry.position = position;
        }
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    #[must_use]
    pub fn get(&self, provisional_id: &str) -> Option<&TerminalEntry> {
        self.entries.get(provisional_id)
    }

    /// All entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<&TerminalEntry> {
        let mut all: Vec<&TerminalEntry> = self.entries.values().collect();
        all.sort_by_key(|e| (e.created_at, e.seq));
        all
    }

    #[must_use]
    pub fn authoritative_id_of(&self, provisional_id: &str) -> Option<&str> {
        self.entries.get(provisional_id).and_then(TerminalEntry::authoritative_id)
    }

    #[must_use]
    pub fn provisional_id_of(&self, authoritative_id: &str) -> Option<&str> {
        self.by_authoritative.get(authoritative_id).map(String::as_str)
    }

    #[must_use]
    pub fn count_by_status(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for entry in self.entries.values() {
            match entry.status {
                TerminalStatus::Creating => counts.creating += 1,
                TerminalStatus::Ready { .. } => counts.ready += 1,
                TerminalStatus::Error { .. } => counts.error += 1,
            }
        }
        counts
    }

    #[must_use]
    pub fn has_creating(&self) -> bool {
        self.entries.values().any(|e| e.status == TerminalStatus::Creating)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
