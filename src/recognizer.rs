//! Swipe recognizer: one configuration snapshot plus one handler set, wired
//! into the [`PanHandlers`] contract.

use anyhow::Result;
use log::{debug, info};

use crate::classifier;
use crate::config::{SharedSwipeConfig, SwipeConfig, SwipeOverrides};
use crate::dispatch::SwipeHandlers;
use crate::gesture::{GestureState, SwipeDirection};
use crate::responder::{PanHandlers, TouchEvent};

#[derive(Debug)]
pub struct GestureRecognizer {
    config: SharedSwipeConfig,
    handlers: SwipeHandlers,
}

impl GestureRecognizer {
    pub fn new(overrides: &SwipeOverrides, handlers: SwipeHandlers) -> Self {
        Self::with_shared_config(SharedSwipeConfig::from_overrides(overrides), handlers)
    }

    /// Use a configuration that someone else may replace while gestures run.
    pub fn with_shared_config(config: SharedSwipeConfig, handlers: SwipeHandlers) -> Self {
        Self { config, handlers }
    }

    /// Replace the effective configuration with defaults + `overrides`.
    pub fn set_overrides(&self, overrides: &SwipeOverrides) {
        let c = self.config.apply(overrides);
        debug!("recognizer: configuration now {c:?}");
    }

    pub fn config(&self) -> SwipeConfig {
        self.config.snapshot()
    }

    pub fn config_handle(&self) -> SharedSwipeConfig {
        self.config.clone()
    }

    pub fn should_claim(&self, event: &TouchEvent, state: &GestureState) -> bool {
        classifier::should_claim(event.touches, state, &self.config.snapshot())
    }

    pub fn classify(&self, state: &GestureState) -> Option<SwipeDirection> {
        classifier::classify(state, &self.config.snapshot())
    }

    /// Classify a finished gesture and run the matching handlers.
    pub fn finish(&mut self, state: &GestureState) -> Result<Option<SwipeDirection>> {
        let direction = self.classify(state);
        match direction {
            Some(d) => info!("swipe {d} (dx={:.1}, dy={:.1})", state.dx, state.dy),
            None => debug!("gesture ended without a swipe"),
        }
        self.handlers.dispatch(direction, state)?;
        Ok(direction)
    }
}

impl PanHandlers for GestureRecognizer {
    fn on_start_should_set(&mut self, event: &TouchEvent, state: &GestureState) -> bool {
        self.should_claim(event, state)
    }

    fn on_move_should_set(&mut self, event: &TouchEvent, state: &GestureState) -> bool {
        self.should_claim(event, state)
    }

    fn on_release(&mut self, _event: &TouchEvent, state: &GestureState) -> Result<()> {
        self.finish(state).map(|_| ())
    }

    fn on_terminate(&mut self, _event: &TouchEvent, state: &GestureState) -> Result<()> {
        self.finish(state).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::{PanSession, PanTransition};
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    fn recording() -> (Arc<Mutex<Vec<String>>>, SwipeHandlers) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = log.clone();
        let l = log.clone();
        let handlers = SwipeHandlers::new()
            .on_swipe(move |d, _| {
                a.lock().unwrap().push(format!("any:{d}"));
                Ok(())
            })
            .on_swipe_left(move |_| {
                l.lock().unwrap().push("left".into());
                Ok(())
            });
        (log, handlers)
    }

    #[test]
    fn release_fans_out_generic_then_specific() {
        let (log, handlers) = recording();
        let mut r = GestureRecognizer::new(&SwipeOverrides::default(), handlers);
        let g = GestureState::new(-20.0, 2.0, -0.8, 0.05);
        r.on_release(&TouchEvent::new(0), &g).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["any:left", "left"]);
    }

    #[test]
    fn terminate_is_classified_like_release() {
        let (log, handlers) = recording();
        let mut r = GestureRecognizer::new(&SwipeOverrides::default(), handlers);
        let g = GestureState::new(-20.0, 2.0, -0.8, 0.05);
        r.on_terminate(&TouchEvent::new(1), &g).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["any:left", "left"]);
    }

    #[test]
    fn disabled_direction_dispatches_nothing() {
        let (log, handlers) = recording();
        let mut r = GestureRecognizer::new(
            &SwipeOverrides {
                detect_swipe_left: Some(false),
                ..Default::default()
            },
            handlers,
        );
        let g = GestureState::new(-20.0, 2.0, -0.8, 0.05);
        assert_eq!(r.finish(&g).unwrap(), None);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn set_overrides_reverts_removed_keys_to_default() {
        let r = GestureRecognizer::new(
            &SwipeOverrides {
                velocity_threshold: Some(0.5),
                ..Default::default()
            },
            SwipeHandlers::new(),
        );
        assert_eq!(r.config().velocity_threshold, 0.5);
        r.set_overrides(&SwipeOverrides::default());
        assert_eq!(r.config().velocity_threshold, 0.3);
    }

    #[test]
    fn shared_config_change_is_seen_mid_drag() {
        let r = GestureRecognizer::new(&SwipeOverrides::default(), SwipeHandlers::new());
        let handle = r.config_handle();
        let g = GestureState::new(-20.0, 2.0, -0.8, 0.05);
        assert!(r.should_claim(&TouchEvent::new(1), &g));
        handle.apply(&SwipeOverrides {
            velocity_threshold: Some(1.0),
            ..Default::default()
        });
        assert!(!r.should_claim(&TouchEvent::new(1), &g));
    }

    #[test]
    fn session_drives_full_swipe() {
        let (log, handlers) = recording();
        let mut r = GestureRecognizer::new(&SwipeOverrides::default(), handlers);
        let mut s = PanSession::new();
        let frames = [
            (1, GestureState::new(0.0, 0.0, 0.0, 0.0)),
            (1, GestureState::new(-3.0, 0.0, -0.4, 0.0)),
            (1, GestureState::new(-12.0, 1.0, -0.7, 0.0)),
            (1, GestureState::new(-25.0, 2.0, -0.9, 0.05)),
        ];
        let mut transitions = Vec::new();
        for (touches, g) in frames {
            let g = GestureState {
                touch_count: touches,
                ..g
            };
            transitions.push(s.feed(&mut r, &TouchEvent::new(touches), &g).unwrap());
        }
        let end = GestureState {
            touch_count: 0,
            ..GestureState::new(-25.0, 2.0, -0.9, 0.05)
        };
        transitions.push(s.feed(&mut r, &TouchEvent::new(0), &end).unwrap());
        assert_eq!(
            transitions,
            vec![
                PanTransition::Tracking,
                PanTransition::Tracking,
                PanTransition::Claimed,
                PanTransition::Holding,
                PanTransition::Released,
            ]
        );
        assert_eq!(*log.lock().unwrap(), vec!["any:left", "left"]);
    }
}
