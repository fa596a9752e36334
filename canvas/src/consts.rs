//! Shared numeric constants for the canvas crate.

// ── Zoom ────────────────────────────────────────────────────────

/// Smallest allowed zoom factor.
pub const MIN_ZOOM: f64 = 0.2;

/// Largest allowed zoom factor.
pub const MAX_ZOOM: f64 = 3.0;

/// Zoom factor at mount and after a reset.
pub const INITIAL_ZOOM: f64 = 1.0;

// ── Wheel ───────────────────────────────────────────────────────

/// Wheel pixels per unit of zoom change when ctrl-zooming.
pub const WHEEL_ZOOM_DIVISOR: f64 = 100.0;
