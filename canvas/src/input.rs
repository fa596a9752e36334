//! Input model: modifier keys, wheel deltas, platform, and the gesture state.
//!
//! `Modifiers` and `WheelDelta` capture a single wheel event. `Platform`
//! decides whether shift remaps vertical scrolling onto the horizontal axis.
//! `GestureState` tracks whether a pinch is in progress so wheel events that
//! browsers synthesize during a pinch do not fight it.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::camera::Point;

/// Keyboard modifier keys held during a wheel event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Ctrl key is held (also set by browsers for trackpad pinch-as-wheel).
    pub ctrl: bool,
    /// Shift key is held.
    pub shift: bool,
}

/// Wheel / trackpad scroll delta.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelDelta {
    /// Horizontal scroll amount in pixels.
    pub dx: f64,
    /// Vertical scroll amount in pixels (positive = down).
    pub dy: f64,
}

impl WheelDelta {
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.dx.is_finite() && self.dy.is_finite()
    }

    /// Pan vector for this delta.
    ///
    /// Off Apple platforms, shift turns a vertical wheel into horizontal
    /// panning. Apple trackpads already report horizontal motion natively.
    #[must_use]
    pub fn pan_vector(self, modifiers: Modifiers, platform: Platform) -> Point {
        if modifiers.shift && platform != Platform::AppleLike {
            Point::new(self.dy, 0.0)
        } else {
            Point::new(self.dx, self.dy)
        }
    }
}

/// Host platform family, as far as wheel handling is concerned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Platform {
    /// macOS and iOS.
    AppleLike,
    #[default]
    Other,
}

impl Platform {
    /// Classify a `navigator.platform` string.
    #[must_use]
    pub fn from_navigator(platform: &str) -> Self {
        const APPLE_MARKERS: [&str; 4] = ["Mac", "iPod", "iPhone", "iPad"];
        if APPLE_MARKERS.iter().any(|marker| platform.contains(marker)) {
            Self::AppleLike
        } else {
            Self::Other
        }
    }
}

/// Multi-touch gesture in progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GestureState {
    /// No pinch; wheel and drag events apply.
    #[default]
    Idle,
    /// A pinch is active; wheel events are ignored until it ends.
    Pinching,
}
