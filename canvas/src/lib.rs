//! Viewport transform engine for the infinite terminal workspace.
//!
//! Terminals live on an unbounded 2-D workspace. This crate owns the single
//! pan/zoom transform that maps that workspace onto the visible element and
//! unifies the three input sources that mutate it (wheel, pinch, drag). The
//! host page wires DOM events into the engine and re-renders terminal widgets
//! whenever a subscriber is notified.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | [`engine::TransformEngine`]: gesture handling and viewport state |
//! | [`camera`] | [`camera::Viewport`], points, and coordinate conversions |
//! | [`input`] | Modifier keys, wheel deltas, platform, and the gesture state machine |
//! | [`subscribe`] | Synchronous change notification with re-entrant unsubscribe |
//! | [`web`] | `wasm-bindgen` binding over a DOM element |
//! | [`consts`] | Zoom limits and wheel scaling |

pub mod camera;
pub mod consts;
pub mod engine;
pub mod input;
pub mod subscribe;
pub mod web;
