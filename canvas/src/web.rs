//! Browser binding: a [`TransformEngine`] attached to a DOM element.
//!
//! The host JavaScript forwards gesture callbacks (wheel, pinch, drag) to a
//! [`CanvasViewport`] and applies the resulting transform to the workspace
//! layer inside `subscribe` callbacks. Element size and offset are read from
//! the DOM at event time so resizes need no extra wiring.

#[cfg(test)]
#[path = "web_test.rs"]
mod web_test;

use wasm_bindgen::prelude::*;
use web_sys::{HtmlElement, WheelEvent};

use crate::camera::{Point, Viewport, ViewportRect};
use crate::engine::TransformEngine;
use crate::input::{Modifiers, Platform, WheelDelta};
use crate::subscribe::Subscription;

/// `TransformEngine` bound to the element that receives gestures.
#[wasm_bindgen]
pub struct CanvasViewport {
    element: HtmlElement,
    engine: TransformEngine,
}

#[wasm_bindgen]
impl CanvasViewport {
    #[wasm_bindgen(constructor)]
    pub fn new(element: HtmlElement) -> CanvasViewport {
        let engine = TransformEngine::new(detect_platform());
        CanvasViewport { element, engine }
    }

    /// Wheel handler. Prevents the page from scrolling underneath the canvas.
    pub fn on_wheel(&mut self, event: &WheelEvent) -> bool {
        event.prevent_default();
        self.engine.set_element_size(self.element_size());
        let delta = WheelDelta { dx: event.delta_x(), dy: event.delta_y() };
        let modifiers = Modifiers { ctrl: event.ctrl_key(), shift: event.shift_key() };
        self.engine.on_wheel(delta, modifiers)
    }

    pub fn on_pinch_start(&mut self) {
        self.engine.on_pinch_start();
    }

    /// Pinch handler. `client_x`/`client_y` are page client coordinates of the
    /// pinch origin; `scale` is the gesture's absolute scale.
    pub fn on_pinch(&mut self, client_x: f64, client_y: f64, scale: f64) -> bool {
        let bounds = self.element.get_bounding_client_rect();
        let origin = Point::new(client_x - bounds.left(), client_y - bounds.top());
        self.engine.on_pinch(origin, scale)
    }

    pub fn on_pinch_end(&mut self) {
        self.engine.on_pinch_end();
    }

    pub fn on_drag(&mut self, dx: f64, dy: f64) -> bool {
        self.engine.on_drag(Point::new(dx, dy))
    }

    pub fn set_panning_locked(&mut self, locked: bool) {
        self.engine.set_panning_locked(locked);
    }

    pub fn reset(&mut self) {
        self.engine.reset();
    }

    /// Call `callback(panX, panY, zoom, centerX, centerY)` after every
    /// viewport change, where `center*` is the workspace point at the middle
    /// of the element.
    ///
    /// Callbacks run while this `CanvasViewport` is still borrowed by the
    /// gesture handler, so a callback must not call back into it (getters
    /// included); wasm-bindgen rejects that as recursive use. Everything a
    /// re-render needs is in the arguments. `ViewportSubscription::unsubscribe`
    /// is safe to call from inside a callback.
    pub fn subscribe(&self, callback: js_sys::Function) -> ViewportSubscription {
        let element = self.element.clone();
        let inner = self.engine.subscribe(move |viewport: &Viewport| {
            let args: js_sys::Array =
                render_args(viewport, element_size(&element)).iter().map(|v| JsValue::from_f64(*v)).collect();
            if let Err(err) = callback.apply(&JsValue::NULL, &args) {
                web_sys::console::warn_2(&JsValue::from_str("viewport subscriber threw"), &err);
            }
        });
        ViewportSubscription { inner }
    }

    #[wasm_bindgen(getter)]
    pub fn pan_x(&self) -> f64 {
        self.engine.viewport().pan.x
    }

    #[wasm_bindgen(getter)]
    pub fn pan_y(&self) -> f64 {
        self.engine.viewport().pan.y
    }

    #[wasm_bindgen(getter)]
    pub fn zoom(&self) -> f64 {
        self.engine.viewport().zoom
    }

    /// Workspace x at the centre of the element; used to place new terminals.
    pub fn workspace_center_x(&self) -> f64 {
        self.engine.workspace_center(self.element_size()).x
    }

    /// Workspace y at the centre of the element.
    pub fn workspace_center_y(&self) -> f64 {
        self.engine.workspace_center(self.element_size()).y
    }

    fn element_size(&self) -> ViewportRect {
        element_size(&self.element)
    }
}

fn element_size(element: &HtmlElement) -> ViewportRect {
    ViewportRect::new(f64::from(element.client_width()), f64::from(element.client_height()))
}

/// Subscriber arguments: pan, zoom, then the workspace centre of `rect`.
fn render_args(viewport: &Viewport, rect: ViewportRect) -> [f64; 5] {
    let center = viewport.workspace_center(rect);
    [viewport.pan.x, viewport.pan.y, viewport.zoom, center.x, center.y]
}

/// JS-side handle for a viewport subscription.
///
/// Separate from `CanvasViewport` so it can be called from inside a
/// subscriber callback while the viewport is still dispatching.
#[wasm_bindgen]
pub struct ViewportSubscription {
    inner: Subscription,
}

#[wasm_bindgen]
impl ViewportSubscription {
    pub fn unsubscribe(&self) {
        self.inner.unsubscribe();
    }
}

fn detect_platform() -> Platform {
    let platform = web_sys::window()
        .map(|window| window.navigator().platform().unwrap_or_default())
        .unwrap_or_default();
    Platform::from_navigator(&platform)
}
