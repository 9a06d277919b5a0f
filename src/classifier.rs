//! Swipe classification: thresholding and axis disambiguation.
//!
//! Both entry points are pure functions of a [`GestureState`] and the
//! effective [`SwipeConfig`]. Nothing is remembered between gestures.

use crate::config::SwipeConfig;
use crate::gesture::{GestureState, SwipeDirection};

/// Displacement below which a gesture on both axes is a tap, not a swipe.
pub const CLICK_SLOP: f64 = 5.0;

fn is_valid_swipe(
    velocity: f64,
    velocity_threshold: f64,
    directional_offset: f64,
    directional_offset_threshold: f64,
) -> bool {
    velocity.abs() > velocity_threshold && directional_offset.abs() < directional_offset_threshold
}

pub fn is_click(state: &GestureState) -> bool {
    state.dx.abs() < CLICK_SLOP && state.dy.abs() < CLICK_SLOP
}

fn is_valid_horizontal(state: &GestureState, cfg: &SwipeConfig) -> bool {
    is_valid_swipe(
        state.vx,
        cfg.velocity_threshold,
        state.dy,
        cfg.directional_offset_threshold,
    )
}

fn is_valid_vertical(state: &GestureState, cfg: &SwipeConfig) -> bool {
    is_valid_swipe(
        state.vy,
        cfg.velocity_threshold,
        state.dx,
        cfg.directional_offset_threshold,
    )
}

/// Direction before the per-direction enable flags are applied.
/// Horizontal is checked first and wins whenever it qualifies.
pub fn raw_direction(state: &GestureState, cfg: &SwipeConfig) -> Option<SwipeDirection> {
    if is_valid_horizontal(state, cfg) {
        Some(if state.dx > 0.0 {
            SwipeDirection::Right
        } else {
            SwipeDirection::Left
        })
    } else if is_valid_vertical(state, cfg) {
        Some(if state.dy > 0.0 {
            SwipeDirection::Down
        } else {
            SwipeDirection::Up
        })
    } else {
        None
    }
}

/// Classify a gesture. A disabled direction yields `None`; the other axis is
/// not re-evaluated in that case.
pub fn classify(state: &GestureState, cfg: &SwipeConfig) -> Option<SwipeDirection> {
    raw_direction(state, cfg).filter(|d| cfg.detects(*d))
}

/// Whether an in-progress drag should be claimed: one finger, moved past the
/// tap slop, and currently classifying as an enabled direction.
pub fn should_claim(touches: usize, state: &GestureState, cfg: &SwipeConfig) -> bool {
    touches == 1 && !is_click(state) && classify(state, cfg).is_some()
}
