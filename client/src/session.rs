//! Session glue: one connection plus the terminal registry it feeds.
//!
//! [`TerminalSession::handle`] is the single entry point for transport
//! events. It decodes frames through the connection manager and applies
//! them to the registry in arrival order, returning what changed so a UI or
//! CLI can react.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::time::{Duration, Instant};

use canvas::camera::Point;
use frames::{Frame, FrameType};
use tracing::{debug, info};

use crate::config::{ClientConfig, SessionIdentity};
use crate::error::{RegistryError, SendError};
use crate::net::connection::{CloseOutcome, ConnectionManager, ConnectionState};
use crate::net::transport::{Transport, TransportEvent};
use crate::state::registry::{Promotion, TerminalRegistry};
use crate::state::terminal::TerminalWidget;

const DEFAULT_CREATE_ERROR: &str = "terminal creation failed";

/// Something a session observer may want to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connection(ConnectionState),
    Reconnecting { attempt: u32, delay: Duration },
    /// Automatic retries are exhausted. Call `reconnect` to try again.
    GaveUp { attempts: u32 },
    TerminalReady { provisional_id: String, authoritative_id: String },
    TerminalFailed { provisional_id: String, message: String },
}

pub struct TerminalSession<T> {
    connection: ConnectionManager<T>,
    registry: TerminalRegistry,
}

impl<T: Transport> TerminalSession<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self { connection: ConnectionManager::new(transport, config), registry: TerminalRegistry::new() }
    }

    pub fn connect(&mut self, identity: SessionIdentity) -> Vec<SessionEvent> {
        if self.connection.connect(identity) { vec![SessionEvent::Connection(ConnectionState::Connecting)] } else { Vec::new() }
    }

    pub fn reconnect(&mut self) -> Vec<SessionEvent> {
        if self.connection.reconnect() { vec![SessionEvent::Connection(ConnectionState::Connecting)] } else { Vec::new() }
    }

    /// End the session: manual close plus discarding every terminal.
    pub fn teardown(&mut self) -> Vec<SessionEvent> {
        let was = self.connection.state();
        self.connection.teardown();
        let counts = self.registry.count_by_status();
        if counts.total() > 0 {
            info!(
                discarded = counts.total(),
                creating = counts.creating,
                ready = counts.ready,
                error = counts.error,
                "session torn down"
            );
        }
        self.registry.clear();
        if was == ConnectionState::Closed { Vec::new() } else { vec![SessionEvent::Connection(ConnectionState::Closed)] }
    }

    /// Apply one transport event.
    pub fn handle(&mut self, event: TransportEvent) -> Vec<SessionEvent> {
        match event {
            TransportEvent::Opened(socket) => {
                if self.connection.on_open(socket) {
                    vec![SessionEvent::Connection(ConnectionState::Open)]
                } else {
                    Vec::new()
                }
            }
            TransportEvent::Text(socket, text) => {
                self.connection.on_text(socket, &text).and_then(|frame| self.dispatch(frame)).into_iter().collect()
            }
            TransportEvent::Binary(socket, bytes) => {
                self.connection.on_binary(socket, &bytes).and_then(|frame| self.dispatch(frame)).into_iter().collect()
            }
            TransportEvent::Closing(socket) => {
                let before = self.connection.state();
                self.connection.on_closing(socket);
                let after = self.connection.state();
                if before == after { Vec::new() } else { vec![SessionEvent::Connection(after)] }
            }
            TransportEvent::Closed { socket, code } => match self.connection.on_closed(socket, code) {
                CloseOutcome::Stale => Vec::new(),
                CloseOutcome::Normal => vec![SessionEvent::Connection(ConnectionState::Closed)],
                CloseOutcome::Reconnecting { attempt, delay } => vec![
                    SessionEvent::Connection(ConnectionState::Closed),
                    SessionEvent::Reconnecting { attempt, delay },
                ],
                CloseOutcome::GaveUp { attempts } => {
                    vec![SessionEvent::Connection(ConnectionState::Closed), SessionEvent::GaveUp { attempts }]
                }
            },
            TransportEvent::Error(socket, message) => {
                self.connection.on_error(socket, &message);
                Vec::new()
            }
            TransportEvent::RetryDue(timer) => {
                if self.connection.on_retry_due(timer) {
                    vec![SessionEvent::Connection(ConnectionState::Connecting)]
                } else {
                    Vec::new()
                }
            }
        }
    }

    // =========================================================================
    // Terminal operations
    // =========================================================================

    pub fn create_terminal(&mut self) -> Result<String, RegistryError> {
        self.registry.request_create(&mut self.connection)
    }

    pub fn create_terminal_at(&mut self, position: Point) -> Result<String, RegistryError> {
        self.registry.request_create_at(&mut self.connection, position)
    }

    /// Create a terminal whose widget is already attached when the
    /// confirmation and first output arrive.
    pub fn create_terminal_with(
        &mut self,
        position: Point,
        widget: Box<dyn TerminalWidget + Send>,
    ) -> Result<String, RegistryError> {
        self.registry.request_create_with(&mut self.connection, position, Some(widget))
    }

    pub fn send_input(&mut self, provisional_id: &str, data: &str) -> Result<bool, SendError> {
        self.registry.send_input(provisional_id, data, &mut self.connection)
    }

    pub fn remove_terminal(&mut self, provisional_id: &str) -> bool {
        self.registry.remove(provisional_id).is_some()
    }

    pub fn attach(&mut self, provisional_id: &str, widget: Box<dyn TerminalWidget + Send>) -> Result<(), RegistryError> {
        self.registry.attach(provisional_id, widget)
    }

    /// Fail terminals stuck in `creating` past the configured timeout.
    /// Does nothing when no timeout is configured.
    pub fn expire_stale(&mut self, now: Instant) -> Vec<SessionEvent> {
        let Some(timeout) = self.connection.config().create_timeout else {
            return Vec::new();
        };
        self.registry
            .expire_creating(now, timeout)
            .into_iter()
            .map(|provisional_id| SessionEvent::TerminalFailed {
                provisional_id,
                message: crate::state::registry::CREATE_TIMEOUT_MESSAGE.to_owned(),
            })
            .collect()
    }

    #[must_use]
    pub fn connection(&self) -> &ConnectionManager<T> {
        &self.connection
    }

    #[must_use]
    pub fn registry(&self) -> &TerminalRegistry {
        &self.registry
    }

    #[cfg(test)]
    pub(crate) fn connection_mut(&mut self) -> &mut ConnectionManager<T> {
        &mut self.connection
    }

    fn dispatch(&mut self, frame: Frame) -> Option<SessionEvent> {
        match frame.kind {
            FrameType::TerminalCreated => {
                let provisional_id = frame.frontend_id?;
                let authoritative_id = frame.terminal_id?;
                (self.registry.on_created(&provisional_id, &authoritative_id) == Promotion::Promoted)
                    .then_some(SessionEvent::TerminalReady { provisional_id, authoritative_id })
            }
            FrameType::TerminalError => {
                let provisional_id = frame.frontend_id?;
                let message = frame.error.unwrap_or_else(|| DEFAULT_CREATE_ERROR.to_owned());
                self.registry
                    .on_error(&provisional_id, &message)
                    .then_some(SessionEvent::TerminalFailed { provisional_id, message })
            }
            FrameType::PtyOutput => {
                if let (Some(terminal_id), Some(content)) = (frame.terminal_id.as_deref(), frame.content.as_deref()) {
                    self.registry.on_output(terminal_id, content);
                }
                None
            }
            FrameType::CreateTerminal | FrameType::PtyInput => {
                debug!(kind = %frame.kind, "ignoring server-bound frame");
                None
            }
        }
    }
}
