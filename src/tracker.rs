//! Per-slot touch tracking and gesture-state snapshots.

use std::time::Instant;

use crate::gesture::GestureState;

const SLOT_COUNT: usize = 10;

/// Points per millimetre: one point is 1/160 inch.
pub const POINTS_PER_MM: f64 = 160.0 / 25.4;

/// Extent an axis is stretched to when the device reports no resolution.
pub const FALLBACK_EXTENT_POINTS: f64 = 640.0;

/// Linear map from raw axis values to points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisScale {
    min: f64,
    points_per_unit: f64,
}

impl Default for AxisScale {
    fn default() -> Self {
        Self {
            min: 0.0,
            points_per_unit: 1.0,
        }
    }
}

impl AxisScale {
    /// Scale for an axis with the given range and resolution (units per mm).
    /// A non-positive resolution falls back to stretching the range over
    /// [`FALLBACK_EXTENT_POINTS`].
    pub fn from_axis(min: i32, max: i32, resolution: i32) -> Self {
        let points_per_unit = if resolution > 0 {
            POINTS_PER_MM / f64::from(resolution)
        } else {
            let span = f64::from(max.saturating_sub(min).max(1));
            FALLBACK_EXTENT_POINTS / span
        };
        Self {
            min: f64::from(min),
            points_per_unit,
        }
    }

    pub fn to_points(self, raw: i32) -> f64 {
        (f64::from(raw) - self.min) * self.points_per_unit
    }
}

#[derive(Debug, Clone, Default)]
struct SlotState {
    tracking_id: i32, // -1 = inactive
    x: f64,
    y: f64,
    // a slot only contributes once both axes have been reported at least once
    seen_x: bool,
    seen_y: bool,
    active: bool,
}

#[derive(Debug, Clone)]
pub struct FrameSummary {
    pub active_count: usize,
    pub centroid: (f64, f64),
    pub gesture: GestureState,
}

/// Turns ABS_MT slot updates into one [`GestureState`] per SYN_REPORT.
///
/// Positions are converted to points through the per-axis [`AxisScale`], so
/// `dx`/`dy` are points and `vx`/`vy` are points per millisecond.
#[derive(Debug)]
pub struct Tracker {
    slots: Vec<SlotState>,
    cur_slot: usize,
    x_scale: AxisScale,
    y_scale: AxisScale,
    smoothing: f64,
    origin: Option<(f64, f64)>,
    last_centroid: (f64, f64),
    last_count: usize,
    last_ms: u128,
    velocity: (f64, f64),
    last_gesture: GestureState,
    start_instant: Instant,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Tracker {
    /// `smoothing` is the EMA weight of the newest velocity sample, in (0, 1].
    pub fn new(smoothing: f64) -> Self {
        Self {
            slots: vec![SlotState::default(); SLOT_COUNT],
            cur_slot: 0,
            x_scale: AxisScale::default(),
            y_scale: AxisScale::default(),
            smoothing: smoothing.clamp(f64::EPSILON, 1.0),
            origin: None,
            last_centroid: (0.0, 0.0),
            last_count: 0,
            last_ms: 0,
            velocity: (0.0, 0.0),
            last_gesture: GestureState::default(),
            start_instant: Instant::now(),
        }
    }

    pub fn set_axis_scales(&mut self, x: AxisScale, y: AxisScale) {
        self.x_scale = x;
        self.y_scale = y;
    }

    pub fn set_smoothing(&mut self, smoothing: f64) {
        self.smoothing = smoothing.clamp(f64::EPSILON, 1.0);
    }

    pub fn now_ms(&self) -> u128 {
        self.start_instant.elapsed().as_millis()
    }

    pub fn on_slot(&mut self, slot: i32) {
        self.cur_slot = slot.clamp(0, SLOT_COUNT as i32 - 1) as usize;
    }

    pub fn on_tracking_id(&mut self, tracking_id: i32) {
        let s = &mut self.slots[self.cur_slot];
        if tracking_id < 0 {
            s.tracking_id = -1;
            s.active = false;
        } else {
            // the kernel omits unchanged coordinates, so keep the last ones
            s.tracking_id = tracking_id;
            s.active = true;
        }
    }

    pub fn on_pos_x(&mut self, raw: i32) {
        let x = self.x_scale.to_points(raw);
        let s = &mut self.slots[self.cur_slot];
        s.x = x;
        s.seen_x = true;
    }

    pub fn on_pos_y(&mut self, raw: i32) {
        let y = self.y_scale.to_points(raw);
        let s = &mut self.slots[self.cur_slot];
        s.y = y;
        s.seen_y = true;
    }

    pub fn on_syn_report(&mut self) -> FrameSummary {
        let now = self.now_ms();
        self.on_syn_report_at(now)
    }

    pub fn on_syn_report_at(&mut self, now_ms: u128) -> FrameSummary {
        let act: Vec<&SlotState> = self
            .slots
            .iter()
            .filter(|s| s.active && s.tracking_id >= 0 && s.seen_x && s.seen_y)
            .collect();
        let count = act.len();

        if count == 0 {
            // lift-off frame carries the final values of the gesture
            let released = GestureState {
                touch_count: 0,
                ..self.last_gesture
            };
            self.origin = None;
            self.last_count = 0;
            self.velocity = (0.0, 0.0);
            self.last_gesture = GestureState::default();
            return FrameSummary {
                active_count: 0,
                centroid: self.last_centroid,
                gesture: released,
            };
        }

        let n = count as f64;
        let centroid = (
            act.iter().map(|s| s.x).sum::<f64>() / n,
            act.iter().map(|s| s.y).sum::<f64>() / n,
        );

        let origin = match self.origin {
            None => {
                self.velocity = (0.0, 0.0);
                centroid
            }
            Some(o) if count != self.last_count => {
                // a finger landed or lifted: shift the origin so dx/dy stay continuous
                (
                    o.0 + centroid.0 - self.last_centroid.0,
                    o.1 + centroid.1 - self.last_centroid.1,
                )
            }
            Some(o) => {
                let dt = now_ms.saturating_sub(self.last_ms);
                if dt > 0 {
                    let dt = dt as f64;
                    let inst = (
                        (centroid.0 - self.last_centroid.0) / dt,
                        (centroid.1 - self.last_centroid.1) / dt,
                    );
                    let a = self.smoothing;
                    self.velocity = (
                        a * inst.0 + (1.0 - a) * self.velocity.0,
                        a * inst.1 + (1.0 - a) * self.velocity.1,
                    );
                }
                o
            }
        };

        self.origin = Some(origin);
        self.last_centroid = centroid;
        self.last_count = count;
        self.last_ms = now_ms;

        let gesture = GestureState {
            dx: centroid.0 - origin.0,
            dy: centroid.1 - origin.1,
            vx: self.velocity.0,
            vy: self.velocity.1,
            touch_count: count,
        };
        self.last_gesture = gesture;

        FrameSummary {
            active_count: count,
            centroid,
            gesture,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SwipeOverrides;
    use crate::dispatch::SwipeHandlers;
    use crate::recognizer::GestureRecognizer;
    use crate::responder::{PanSession, PanTransition, TouchEvent};
    use std::sync::{Arc, Mutex};

    // 30 units per mm, a common touchpad resolution
    fn touchpad() -> Tracker {
        let mut t = Tracker::new(0.6);
        let scale = AxisScale::from_axis(0, 3000, 30);
        t.set_axis_scales(scale, scale);
        t
    }

    /// Feed `xs` as single-finger frames `step_ms` apart, then lift.
    fn swipe_through(xs: &[i32], step_ms: u128) -> (Vec<PanTransition>, Vec<String>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let f = fired.clone();
        let handlers = SwipeHandlers::new().on_swipe(move |d, _| {
            f.lock().unwrap().push(d.to_string());
            Ok(())
        });
        let mut recognizer = GestureRecognizer::new(&SwipeOverrides::default(), handlers);
        let mut session = PanSession::new();
        let mut t = touchpad();
        let mut out = Vec::new();

        t.on_slot(0);
        t.on_tracking_id(1);
        t.on_pos_y(1000);
        let mut now = 0;
        for &x in xs {
            t.on_pos_x(x);
            let frame = t.on_syn_report_at(now);
            let ev = TouchEvent::new(frame.active_count);
            out.push(session.feed(&mut recognizer, &ev, &frame.gesture).unwrap());
            now += step_ms;
        }
        t.on_tracking_id(-1);
        let frame = t.on_syn_report_at(now);
        let ev = TouchEvent::new(frame.active_count);
        out.push(session.feed(&mut recognizer, &ev, &frame.gesture).unwrap());

        let fired = fired.lock().unwrap().clone();
        (out, fired)
    }

    #[test]
    fn axis_scale_uses_resolution() {
        let s = AxisScale::from_axis(0, 3000, 30);
        assert!((s.to_points(30) - POINTS_PER_MM).abs() < 1e-9);
    }

    #[test]
    fn axis_scale_without_resolution_stretches_range() {
        let s = AxisScale::from_axis(-100, 1500, 0);
        assert!(s.to_points(-100).abs() < 1e-9);
        assert!((s.to_points(1500) - FALLBACK_EXTENT_POINTS).abs() < 1e-9);
    }

    #[test]
    fn jittery_tap_on_touchpad_is_never_claimed() {
        let (transitions, fired) = swipe_through(&[1500, 1503, 1506], 7);
        assert!(!transitions.contains(&PanTransition::Claimed));
        assert_eq!(transitions.last(), Some(&PanTransition::Abandoned));
        assert!(fired.is_empty());
    }

    #[test]
    fn real_touchpad_swipe_is_claimed_and_released() {
        let xs: Vec<i32> = (0..10).map(|i| 1000 + 30 * i).collect();
        let (transitions, fired) = swipe_through(&xs, 5);
        assert!(transitions.contains(&PanTransition::Claimed));
        assert_eq!(transitions.last(), Some(&PanTransition::Released));
        assert_eq!(fired, vec!["right".to_string()]);
    }

    fn touch(t: &mut Tracker, slot: i32, id: i32, x: i32, y: i32) {
        t.on_slot(slot);
        t.on_tracking_id(id);
        t.on_pos_x(x);
        t.on_pos_y(y);
    }

    fn move_to(t: &mut Tracker, slot: i32, x: i32, y: i32) {
        t.on_slot(slot);
        t.on_pos_x(x);
        t.on_pos_y(y);
    }

    #[test]
    fn single_finger_drag_reports_displacement_and_velocity() {
        let mut t = Tracker::new(1.0);
        touch(&mut t, 0, 7, 500, 300);
        let f = t.on_syn_report_at(0);
        assert_eq!(f.active_count, 1);
        assert_eq!(f.gesture.dx, 0.0);

        move_to(&mut t, 0, 480, 302);
        t.on_syn_report_at(10);
        move_to(&mut t, 0, 460, 304);
        let f = t.on_syn_report_at(20);
        assert_eq!(f.gesture.dx, -40.0);
        assert_eq!(f.gesture.dy, 4.0);
        assert_eq!(f.gesture.vx, -2.0);
        assert_eq!(f.gesture.vy, 0.2);
        assert_eq!(f.gesture.touch_count, 1);
    }

    #[test]
    fn lift_off_frame_keeps_final_values() {
        let mut t = Tracker::new(1.0);
        touch(&mut t, 0, 1, 100, 100);
        t.on_syn_report_at(0);
        move_to(&mut t, 0, 100, 160);
        t.on_syn_report_at(20);
        t.on_slot(0);
        t.on_tracking_id(-1);
        let f = t.on_syn_report_at(25);
        assert_eq!(f.active_count, 0);
        assert_eq!(f.gesture.touch_count, 0);
        assert_eq!(f.gesture.dy, 60.0);
        assert_eq!(f.gesture.vy, 3.0);

        // the next empty frame is blank
        let f = t.on_syn_report_at(30);
        assert_eq!(f.gesture, GestureState::default());
    }

    #[test]
    fn second_finger_does_not_jump_displacement() {
        let mut t = Tracker::new(1.0);
        touch(&mut t, 0, 1, 100, 100);
        t.on_syn_report_at(0);
        move_to(&mut t, 0, 110, 100);
        t.on_syn_report_at(10);
        touch(&mut t, 1, 2, 900, 100);
        let f = t.on_syn_report_at(20);
        assert_eq!(f.active_count, 2);
        assert_eq!(f.gesture.dx, 10.0);
        assert_eq!(f.gesture.touch_count, 2);
    }

    #[test]
    fn smoothing_blends_velocity_samples() {
        let mut t = Tracker::new(0.5);
        touch(&mut t, 0, 1, 0, 0);
        t.on_syn_report_at(0);
        move_to(&mut t, 0, 10, 0);
        let f = t.on_syn_report_at(10);
        assert_eq!(f.gesture.vx, 0.5);
        move_to(&mut t, 0, 20, 0);
        let f = t.on_syn_report_at(20);
        assert_eq!(f.gesture.vx, 0.75);
    }

    #[test]
    fn new_touch_reuses_unchanged_coordinates() {
        let mut t = Tracker::new(1.0);
        touch(&mut t, 0, 1, 40, 50);
        t.on_syn_report_at(0);
        t.on_tracking_id(-1);
        t.on_syn_report_at(5);
        t.on_tracking_id(2);
        let f = t.on_syn_report_at(10);
        assert_eq!(f.active_count, 1);
        assert_eq!(f.centroid, (40.0, 50.0));
    }
}
