//! Client-side terminal state.
//!
//! SYSTEM CONTEXT
//! ==============
//! `terminal` defines one multiplexed terminal and its lifecycle, and
//! `registry` owns every terminal in the session along with the
//! provisional/authoritative id mapping.

pub mod registry;
pub mod terminal;
