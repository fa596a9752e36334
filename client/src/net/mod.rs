//! Realtime connection for one collaboration session.
//!
//! SYSTEM CONTEXT
//! ==============
//! `transport` defines the seam between the state machine and real sockets,
//! `connection` owns the lifecycle and retry policy, and `driver` runs both
//! on tokio with `tokio-tungstenite` sockets.

pub mod connection;
pub mod driver;
pub mod transport;
