//! Session client for the shared-terminal canvas.
//!
//! One realtime connection per collaboration session carries any number of
//! virtual terminals. This crate owns that connection, reconciles the two
//! terminal id namespaces, and routes PTY traffic to terminal widgets.
//!
//! LAYOUT
//! ======
//! | Module | Role |
//! |--------|------|
//! | `config` | Environment-driven settings and endpoint construction |
//! | `error` | Error enums shared across the crate |
//! | `net` | Connection state machine, transport seam, tokio driver |
//! | `state` | Terminal registry and per-terminal lifecycle |
//! | `session` | Glue that feeds inbound frames into the registry |
//!
//! The connection and registry are sans-IO: they react to events and issue
//! commands through the [`net::transport::Transport`] trait. The tokio driver in
//! [`net::driver`] is the only place that touches sockets or timers, so every
//! state mutation happens on the single task that owns the session.

pub mod config;
pub mod error;
pub mod net;
pub mod session;
pub mod state;

#[cfg(test)]
#[path = "testing.rs"]
pub(crate) mod testing;

pub use canvas::camera::Point;
pub use config::{ClientConfig, SessionIdentity};
pub use error::{ConfigError, HandleError, RegistryError, SendError, TransportError};
pub use net::connection::{CloseOutcome, ConnectionManager, ConnectionState, FrameSink};
pub use net::driver::{SessionDriver, SessionHandle};
pub use session::{SessionEvent, TerminalSession};
pub use state::registry::{Delivery, Promotion, StatusCounts, TerminalRegistry};
pub use state::terminal::{TerminalEntry, TerminalStatus, TerminalWidget};
