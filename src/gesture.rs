//! Gesture-state records and swipe directions.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

impl SwipeDirection {
    pub const ALL: [SwipeDirection; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    /// Stable slot used for handler lookup.
    pub fn index(self) -> usize {
        match self {
            Self::Up => 0,
            Self::Down => 1,
            Self::Left => 2,
            Self::Right => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    /// Profile binding key, e.g. `swipe.left`.
    pub fn binding_key(self) -> &'static str {
        match self {
            Self::Up => "swipe.up",
            Self::Down => "swipe.down",
            Self::Left => "swipe.left",
            Self::Right => "swipe.right",
        }
    }
}

impl fmt::Display for SwipeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one in-progress or just-finished drag, as reported by the
/// capture side. Displacements are cumulative since the gesture started;
/// velocities are instantaneous, in units per millisecond.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GestureState {
    pub dx: f64,
    pub dy: f64,
    pub vx: f64,
    pub vy: f64,
    pub touch_count: usize,
}

#[derive(Debug, Error, PartialEq)]
pub enum GestureStateError {
    #[error("gesture state must be an object")]
    NotAnObject,
    #[error("gesture state is missing field '{0}'")]
    MissingField(&'static str),
    #[error("gesture field '{0}' is not a number")]
    NotANumber(&'static str),
}

impl GestureState {
    pub fn new(dx: f64, dy: f64, vx: f64, vy: f64) -> Self {
        Self {
            dx,
            dy,
            vx,
            vy,
            touch_count: 1,
        }
    }

    /// Decode a gesture posted over IPC. Every field is required; a missing
    /// or non-numeric field is rejected instead of defaulting to zero.
    pub fn from_json(v: &serde_json::Value) -> Result<Self, GestureStateError> {
        let obj = v.as_object().ok_or(GestureStateError::NotAnObject)?;
        let num = |key: &'static str| -> Result<f64, GestureStateError> {
            obj.get(key)
                .ok_or(GestureStateError::MissingField(key))?
                .as_f64()
                .ok_or(GestureStateError::NotANumber(key))
        };
        let (dx, dy, vx, vy) = (num("dx")?, num("dy")?, num("vx")?, num("vy")?);
        let touches = obj
            .get("touch_count")
            .ok_or(GestureStateError::MissingField("touch_count"))?
            .as_u64()
            .ok_or(GestureStateError::NotANumber("touch_count"))?;
        Ok(Self {
            dx,
            dy,
            vx,
            vy,
            touch_count: touches as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn direction_slots_are_distinct() {
        let mut seen = [false; 4];
        for d in SwipeDirection::ALL {
            assert!(!seen[d.index()], "{d} shares a slot");
            seen[d.index()] = true;
        }
    }

    #[test]
    fn gesture_from_json_reads_all_fields() {
        let g = GestureState::from_json(&json!({
            "dx": -20, "dy": 2.5, "vx": -0.8, "vy": 0.05, "touch_count": 1
        }))
        .unwrap();
        assert_eq!(
            g,
            GestureState {
                dx: -20.0,
                dy: 2.5,
                vx: -0.8,
                vy: 0.05,
                touch_count: 1
            }
        );
    }

    #[test]
    fn gesture_from_json_fails_fast_on_missing_field() {
        let err = GestureState::from_json(&json!({
            "dx": 1, "dy": 2, "vx": 0.5, "touch_count": 1
        }))
        .unwrap_err();
        assert_eq!(err, GestureStateError::MissingField("vy"));
    }

    #[test]
    fn gesture_from_json_rejects_non_numbers() {
        let err = GestureState::from_json(&json!({
            "dx": "far", "dy": 2, "vx": 0.5, "vy": 0.1, "touch_count": 1
        }))
        .unwrap_err();
        assert_eq!(err, GestureStateError::NotANumber("dx"));
        assert_eq!(
            GestureState::from_json(&json!([1, 2])).unwrap_err(),
            GestureStateError::NotAnObject
        );
    }
}
