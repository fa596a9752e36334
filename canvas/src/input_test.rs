use super::*;

#[test]
fn platform_detects_apple_markers() {
    assert_eq!(Platform::from_navigator("MacIntel"), Platform::AppleLike);
    assert_eq!(Platform::from_navigator("iPhone"), Platform::AppleLike);
    assert_eq!(Platform::from_navigator("iPad"), Platform::AppleLike);
    assert_eq!(Platform::from_navigator("iPod touch"), Platform::AppleLike);
}

#[test]
fn platform_defaults_to_other() {
    assert_eq!(Platform::from_navigator("Win32"), Platform::Other);
    assert_eq!(Platform::from_navigator("Linux x86_64"), Platform::Other);
    assert_eq!(Platform::from_navigator(""), Platform::Other);
    assert_eq!(Platform::default(), Platform::Other);
}

#[test]
fn pan_vector_passes_through_without_shift() {
    let delta = WheelDelta { dx: 3.0, dy: 4.0 };
    let v = delta.pan_vector(Modifiers::default(), Platform::Other);
    assert_eq!(v, Point::new(3.0, 4.0));
}

#[test]
fn shift_remaps_vertical_to_horizontal_off_apple() {
    let delta = WheelDelta { dx: 3.0, dy: 4.0 };
    let shift = Modifiers { shift: true, ..Modifiers::default() };
    assert_eq!(delta.pan_vector(shift, Platform::Other), Point::new(4.0, 0.0));
}

#[test]
fn shift_does_not_remap_on_apple() {
    let delta = WheelDelta { dx: 3.0, dy: 4.0 };
    let shift = Modifiers { shift: true, ..Modifiers::default() };
    assert_eq!(delta.pan_vector(shift, Platform::AppleLike), Point::new(3.0, 4.0));
}

#[test]
fn wheel_delta_finiteness() {
    assert!(WheelDelta { dx: 0.0, dy: -1.0 }.is_finite());
    assert!(!WheelDelta { dx: f64::NAN, dy: 0.0 }.is_finite());
    assert!(!WheelDelta { dx: 0.0, dy: f64::NEG_INFINITY }.is_finite());
}

#[test]
fn gesture_state_defaults_to_idle() {
    assert_eq!(GestureState::default(), GestureState::Idle);
}
