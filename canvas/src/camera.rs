#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use std::ops::{Add, Div, Mul, Sub};

use crate::consts::{INITIAL_ZOOM, MAX_ZOOM, MIN_ZOOM};

/// A point or vector in either screen or workspace space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Both components are finite (not NaN, not infinite).
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f64> for Point {
    type Output = Self;

    fn div(self, rhs: f64) -> Self {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

/// Size of the visible element in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportRect {
    pub width: f64,
    pub height: f64,
}

impl ViewportRect {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Geometric centre of the element, in element-local screen space.
    #[must_use]
    pub fn center(self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

/// Pan/zoom transform for the infinite workspace.
///
/// `pan` is the workspace-to-screen offset in CSS pixels and is unbounded.
/// `zoom` is a scale factor that always stays within
/// [`MIN_ZOOM`]..=[`MAX_ZOOM`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub pan: Point,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { pan: Point::ORIGIN, zoom: INITIAL_ZOOM }
    }
}

impl Viewport {
    /// Convert an element-local screen point to workspace coordinates.
    #[must_use]
    pub fn screen_to_workspace(&self, screen: Point) -> Point {
        (screen - self.pan) / self.zoom
    }

    /// Convert a workspace point to element-local screen coordinates.
    #[must_use]
    pub fn workspace_to_screen(&self, workspace: Point) -> Point {
        workspace * self.zoom + self.pan
    }

    /// Convert a screen-space distance to a workspace distance.
    #[must_use]
    pub fn screen_dist_to_workspace(&self, screen_dist: f64) -> f64 {
        screen_dist / self.zoom
    }

    /// Workspace point currently shown at the centre of `rect`.
    ///
    /// New terminals are placed here so they appear in the middle of the
    /// screen regardless of the current pan and zoom.
    #[must_use]
    pub fn workspace_center(&self, rect: ViewportRect) -> Point {
        self.screen_to_workspace(rect.center())
    }

    /// Rescale to `new_zoom` while keeping the workspace point under the
    /// screen point `fixed` in place.
    pub(crate) fn zoom_about(&mut self, fixed: Point, new_zoom: f64) {
        let offset = (fixed - self.pan) * (new_zoom / self.zoom);
        self.pan = fixed - offset;
        self.zoom = new_zoom;
    }
}

/// Clamp a zoom factor into the allowed range.
#[must_use]
pub fn clamp_zoom(zoom: f64) -> f64 {
    zoom.clamp(MIN_ZOOM, MAX_ZOOM)
}
