use crate::camera::{Point, Viewport, ViewportRect, clamp_zoom};
use crate::consts::WHEEL_ZOOM_DIVISOR;
use crate::input::{GestureState, Modifiers, Platform, WheelDelta};
use crate::subscribe::{Subscribers, Subscription};

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Gesture-to-viewport engine.
///
/// Holds the [`Viewport`] and turns wheel, pinch, and drag input into pan and
/// zoom changes. Every handler returns `true` when the viewport changed, and
/// in that case every subscriber has already been notified. Events with
/// non-finite components are dropped before they can touch the viewport.
///
/// Independent of the DOM so it can be tested without a browser; see
/// [`crate::web::CanvasViewport`] for the element binding.
pub struct TransformEngine {
    viewport: Viewport,
    gesture: GestureState,
    panning_locked: bool,
    element: ViewportRect,
    platform: Platform,
    subscribers: Subscribers,
}

impl Default for TransformEngine {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            gesture: GestureState::Idle,
            panning_locked: false,
            element: ViewportRect::default(),
            platform: Platform::Other,
            subscribers: Subscribers::new(),
        }
    }
}

impl TransformEngine {
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self { platform, ..Self::default() }
    }

    // --- Host inputs ---

    /// Update the size of the visible element. Wheel zoom centres on it.
    pub fn set_element_size(&mut self, rect: ViewportRect) {
        self.element = rect;
    }

    /// Temporarily suppress drag panning, e.g. while a terminal widget is
    /// being dragged. Takes effect on the next drag event.
    pub fn set_panning_locked(&mut self, locked: bool) {
        self.panning_locked = locked;
    }

    // --- Gestures ---

    /// Handle a wheel event.
    ///
    /// With ctrl held the wheel zooms about the element centre; otherwise it
    /// pans. Ignored while a pinch is active.
    pub fn on_wheel(&mut self, delta: WheelDelta, modifiers: Modifiers) -> bool {
        if self.gesture == GestureState::Pinching || !delta.is_finite() {
            return false;
        }

        if modifiers.ctrl {
            let new_zoom = clamp_zoom(self.viewport.zoom - delta.dy / WHEEL_ZOOM_DIVISOR);
            if new_zoom == self.viewport.zoom {
                return false;
            }
            self.viewport.zoom_about(self.element.center(), new_zoom);
            self.notify();
            return true;
        }

        self.pan_by(delta.pan_vector(modifiers, self.platform))
    }

    pub fn on_pinch_start(&mut self) {
        self.gesture = GestureState::Pinching;
    }

    pub fn on_pinch_end(&mut self) {
        self.gesture = GestureState::Idle;
    }

    /// Apply an absolute pinch scale about `origin` (element-local screen
    /// coordinates). The workspace point under `origin` stays put.
    pub fn on_pinch(&mut self, origin: Point, scale: f64) -> bool {
        if !origin.is_finite() || !scale.is_finite() || scale <= 0.0 {
            return false;
        }
        self.viewport.zoom_about(origin, clamp_zoom(scale));
        self.notify();
        true
    }

    /// Pan by a pointer drag delta in screen pixels.
    pub fn on_drag(&mut self, delta: Point) -> bool {
        if self.panning_locked {
            return false;
        }
        self.pan_by(delta)
    }

    /// Return to the initial viewport and notify.
    pub fn reset(&mut self) {
        self.viewport = Viewport::default();
        self.notify();
    }

    // --- Subscriptions ---

    /// Register a callback that runs synchronously after every change.
    pub fn subscribe(&self, callback: impl Fn(&Viewport) + 'static) -> Subscription {
        self.subscribers.subscribe(callback)
    }

    // --- Queries ---

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[must_use]
    pub fn gesture(&self) -> GestureState {
        self.gesture
    }

    #[must_use]
    pub fn is_panning_locked(&self) -> bool {
        self.panning_locked
    }

    /// Workspace point currently at the centre of `rect`.
    #[must_use]
    pub fn workspace_center(&self, rect: ViewportRect) -> Point {
        self.viewport.workspace_center(rect)
    }

    // --- Internals ---

    fn pan_by(&mut self, delta: Point) -> bool {
        if !delta.is_finite() || delta.is_zero() {
            return false;
        }
        self.viewport.pan = self.viewport.pan - delta / self.viewport.zoom;
        self.notify();
        true
    }

    fn notify(&self) {
        self.subscribers.notify(&self.viewport);
    }
}
