//! Swipe thresholds: defaults, caller overrides and the resolved snapshot.

use serde::Serialize;
use std::sync::{Arc, RwLock};

use crate::gesture::SwipeDirection;

pub const DEFAULT_VELOCITY_THRESHOLD: f64 = 0.3;
pub const DEFAULT_DIRECTIONAL_OFFSET_THRESHOLD: f64 = 80.0;

/// Effective configuration. Every field is always populated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SwipeConfig {
    /// Minimum instantaneous speed for a swipe.
    pub velocity_threshold: f64,
    /// Maximum displacement allowed on the perpendicular axis.
    pub directional_offset_threshold: f64,
    pub detect_swipe_up: bool,
    pub detect_swipe_down: bool,
    pub detect_swipe_left: bool,
    pub detect_swipe_right: bool,
}

impl Default for SwipeConfig {
    fn default() -> Self {
        Self {
            velocity_threshold: DEFAULT_VELOCITY_THRESHOLD,
            directional_offset_threshold: DEFAULT_DIRECTIONAL_OFFSET_THRESHOLD,
            detect_swipe_up: true,
            detect_swipe_down: true,
            detect_swipe_left: true,
            detect_swipe_right: true,
        }
    }
}

impl SwipeConfig {
    pub fn detects(&self, direction: SwipeDirection) -> bool {
        match direction {
            SwipeDirection::Up => self.detect_swipe_up,
            SwipeDirection::Down => self.detect_swipe_down,
            SwipeDirection::Left => self.detect_swipe_left,
            SwipeDirection::Right => self.detect_swipe_right,
        }
    }
}

/// Caller-supplied subset of [`SwipeConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SwipeOverrides {
    pub velocity_threshold: Option<f64>,
    pub directional_offset_threshold: Option<f64>,
    pub detect_swipe_up: Option<bool>,
    pub detect_swipe_down: Option<bool>,
    pub detect_swipe_left: Option<bool>,
    pub detect_swipe_right: Option<bool>,
}

// (snake_case, camelCase) spellings accepted for each key.
const VELOCITY_KEYS: [&str; 2] = ["velocity_threshold", "velocityThreshold"];
const OFFSET_KEYS: [&str; 2] = ["directional_offset_threshold", "directionalOffsetThreshold"];
const UP_KEYS: [&str; 2] = ["detect_swipe_up", "detectSwipeUp"];
const DOWN_KEYS: [&str; 2] = ["detect_swipe_down", "detectSwipeDown"];
const LEFT_KEYS: [&str; 2] = ["detect_swipe_left", "detectSwipeLeft"];
const RIGHT_KEYS: [&str; 2] = ["detect_swipe_right", "detectSwipeRight"];

impl SwipeOverrides {
    /// Read overrides from a TOML table. Unknown keys and values of the wrong
    /// type are skipped, so the default stays in effect for them.
    pub fn from_toml(v: &toml::Value) -> Self {
        let Some(table) = v.as_table() else {
            return Self::default();
        };
        let float = |keys: [&str; 2]| {
            keys.iter()
                .find_map(|k| match table.get(*k) {
                    Some(toml::Value::Float(f)) => Some(*f),
                    Some(toml::Value::Integer(i)) => Some(*i as f64),
                    _ => None,
                })
        };
        let flag = |keys: [&str; 2]| keys.iter().find_map(|k| table.get(*k)?.as_bool());
        Self {
            velocity_threshold: float(VELOCITY_KEYS),
            directional_offset_threshold: float(OFFSET_KEYS),
            detect_swipe_up: flag(UP_KEYS),
            detect_swipe_down: flag(DOWN_KEYS),
            detect_swipe_left: flag(LEFT_KEYS),
            detect_swipe_right: flag(RIGHT_KEYS),
        }
    }

    /// JSON counterpart of [`SwipeOverrides::from_toml`], same leniency.
    pub fn from_json(v: &serde_json::Value) -> Self {
        let Some(obj) = v.as_object() else {
            return Self::default();
        };
        let float = |keys: [&str; 2]| keys.iter().find_map(|k| obj.get(*k)?.as_f64());
        let flag = |keys: [&str; 2]| keys.iter().find_map(|k| obj.get(*k)?.as_bool());
        Self {
            velocity_threshold: float(VELOCITY_KEYS),
            directional_offset_threshold: float(OFFSET_KEYS),
            detect_swipe_up: flag(UP_KEYS),
            detect_swipe_down: flag(DOWN_KEYS),
            detect_swipe_left: flag(LEFT_KEYS),
            detect_swipe_right: flag(RIGHT_KEYS),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Merge `overrides` onto the defaults. Always starts from the defaults, so
/// nothing from an earlier resolution leaks into this one.
pub fn resolve(overrides: &SwipeOverrides) -> SwipeConfig {
    let d = SwipeConfig::default();
    SwipeConfig {
        velocity_threshold: overrides.velocity_threshold.unwrap_or(d.velocity_threshold),
        directional_offset_threshold: overrides
            .directional_offset_threshold
            .unwrap_or(d.directional_offset_threshold),
        detect_swipe_up: overrides.detect_swipe_up.unwrap_or(d.detect_swipe_up),
        detect_swipe_down: overrides.detect_swipe_down.unwrap_or(d.detect_swipe_down),
        detect_swipe_left: overrides.detect_swipe_left.unwrap_or(d.detect_swipe_left),
        detect_swipe_right: overrides.detect_swipe_right.unwrap_or(d.detect_swipe_right),
    }
}

/// Effective configuration shared between the gesture thread and whoever
/// applies profile changes. Readers copy a whole snapshot out; writers swap a
/// whole snapshot in.
#[derive(Debug, Clone, Default)]
pub struct SharedSwipeConfig {
    inner: Arc<RwLock<SwipeConfig>>,
}

impl SharedSwipeConfig {
    pub fn new(config: SwipeConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    pub fn from_overrides(overrides: &SwipeOverrides) -> Self {
        Self::new(resolve(overrides))
    }

    pub fn snapshot(&self) -> SwipeConfig {
        match self.inner.read() {
            Ok(g) => *g,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn replace(&self, config: SwipeConfig) {
        match self.inner.write() {
            Ok(mut g) => *g = config,
            Err(poisoned) => *poisoned.into_inner() = config,
        }
    }

    /// Re-resolve from the defaults and `overrides`, then swap it in.
    pub fn apply(&self, overrides: &SwipeOverrides) -> SwipeConfig {
        let config = resolve(overrides);
        self.replace(config);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn empty_overrides_resolve_to_defaults() {
        let c = resolve(&SwipeOverrides::default());
        assert_eq!(c, SwipeConfig::default());
        assert_eq!(c.velocity_threshold, 0.3);
        assert_eq!(c.directional_offset_threshold, 80.0);
        assert!(SwipeDirection::ALL.iter().all(|d| c.detects(*d)));
    }

    #[test]
    fn override_wins_per_key() {
        let c = resolve(&SwipeOverrides {
            velocity_threshold: Some(0.5),
            detect_swipe_down: Some(false),
            ..Default::default()
        });
        assert_eq!(c.velocity_threshold, 0.5);
        assert_eq!(c.directional_offset_threshold, 80.0);
        assert!(!c.detect_swipe_down);
        assert!(c.detect_swipe_up);
    }

    #[test]
    fn resolution_is_not_cumulative() {
        let shared = SharedSwipeConfig::default();
        shared.apply(&SwipeOverrides {
            velocity_threshold: Some(0.5),
            ..Default::default()
        });
        assert_eq!(shared.snapshot().velocity_threshold, 0.5);
        shared.apply(&SwipeOverrides::default());
        assert_eq!(shared.snapshot().velocity_threshold, 0.3);
    }

    #[test]
    fn toml_reader_ignores_unknown_keys_and_bad_types() {
        let v: toml::Value = toml::from_str(
            r#"
            velocity_threshold = "fast"
            directional_offset_threshold = 120
            detectSwipeLeft = false
            detect_swipe_up = 1
            shake_to_undo = true
            "#,
        )
        .unwrap();
        let o = SwipeOverrides::from_toml(&v);
        assert_eq!(
            o,
            SwipeOverrides {
                directional_offset_threshold: Some(120.0),
                detect_swipe_left: Some(false),
                ..Default::default()
            }
        );
    }

    #[test]
    fn json_reader_accepts_camel_case() {
        let o = SwipeOverrides::from_json(&json!({
            "velocityThreshold": 0.7,
            "detectSwipeRight": false,
            "detectSwipeUp": "no"
        }));
        let c = resolve(&o);
        assert_eq!(c.velocity_threshold, 0.7);
        assert!(!c.detect_swipe_right);
        assert!(c.detect_swipe_up);
        assert!(SwipeOverrides::from_json(&json!(null)).is_empty());
    }
}
