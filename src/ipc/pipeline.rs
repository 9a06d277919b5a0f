use anyhow::Result;
use log::{debug, error, info, warn};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::{thread, time::Duration};

use evdev::{AbsoluteAxisCode, Device, EventType, SynchronizationCode};

use super::bindings;
use super::server::DaemonEvent;
use crate::actions::ActionSink;
use crate::config::SharedSwipeConfig;
use crate::input;
use crate::profile::{Profile, Tracking};
use crate::recognizer::GestureRecognizer;
use crate::responder::{PanSession, PanTransition, TouchEvent};
use crate::tracker::{AxisScale, Tracker};

fn idle_until(stop: &AtomicBool) {
    while !stop.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(200));
    }
}

fn current_smoothing(profile: &Mutex<Profile>) -> f64 {
    match profile.lock() {
        Ok(p) => p.tracking.smooth_ema,
        Err(_) => Tracking::default().smooth_ema,
    }
}

/// Raw-to-point scales for the MT position axes, from the device's absinfo.
fn axis_scales(dev: &Device) -> (AxisScale, AxisScale) {
    let mut x = AxisScale::default();
    let mut y = AxisScale::default();
    match dev.get_absinfo() {
        Ok(axes) => {
            for (code, info) in axes {
                let scale = AxisScale::from_axis(info.minimum(), info.maximum(), info.resolution());
                if code == AbsoluteAxisCode::ABS_MT_POSITION_X {
                    x = scale;
                } else if code == AbsoluteAxisCode::ABS_MT_POSITION_Y {
                    y = scale;
                }
            }
        }
        Err(e) => warn!("reading axis ranges failed, using raw units: {e}"),
    }
    (x, y)
}

/// One opened touch device with its own slot state.
struct TouchSource {
    dev: Device,
    tracker: Tracker,
    label: String,
}

fn open_sources(smoothing: f64) -> Vec<TouchSource> {
    let mut out = Vec::new();
    for d in input::discover_touch_devices() {
        match Device::open(&d.path) {
            Ok(mut dev) => {
                if let Err(e) = dev.set_nonblocking(true) {
                    warn!("failed to make {} non-blocking: {e}", d.path.display());
                    continue;
                }
                let (x, y) = axis_scales(&dev);
                let mut tracker = Tracker::new(smoothing);
                tracker.set_axis_scales(x, y);
                info!("tracking {}", d.describe());
                out.push(TouchSource {
                    dev,
                    tracker,
                    label: d.describe(),
                });
            }
            Err(e) => warn!("failed to open {}: {e}", d.path.display()),
        }
    }
    out
}

fn sink_or_noop(res: Result<ActionSink>) -> ActionSink {
    match res {
        Ok(sink) => sink,
        Err(e) => {
            warn!("uinput unavailable, actions disabled: {e:#}");
            ActionSink::noop()
        }
    }
}

/// Remove the entries at `lost` (indices into `items`).
fn drop_lost<T>(items: &mut Vec<T>, lost: &[usize]) {
    let mut idx = 0;
    items.retain(|_| {
        let keep = !lost.contains(&idx);
        idx += 1;
        keep
    });
}

fn set_grab(sources: &mut [TouchSource], grab: bool) {
    for s in sources.iter_mut() {
        let res = if grab { s.dev.grab() } else { s.dev.ungrab() };
        if let Err(e) = res {
            warn!("{} {} failed: {e}", if grab { "grab" } else { "ungrab" }, s.label);
        }
    }
}

pub fn run_pipeline(
    profile: Arc<Mutex<Profile>>,
    swipe: SharedSwipeConfig,
    tx_evt: Sender<DaemonEvent>,
    stop: Arc<AtomicBool>,
) -> Result<()> {
    let mut sources = open_sources(current_smoothing(&profile));
    if sources.is_empty() {
        warn!("no usable multitouch devices; pipeline idle");
        idle_until(&stop);
        return Ok(());
    }

    let sink = sink_or_noop(ActionSink::new());
    let handlers = bindings::handlers_for(profile.clone(), Arc::new(Mutex::new(sink)), tx_evt);
    let mut recognizer = GestureRecognizer::with_shared_config(swipe, handlers);
    let mut session = PanSession::new();
    let mut grabbed = false;

    while !stop.load(Ordering::Relaxed) {
        let mut any_event = false;
        let mut lost: Vec<usize> = Vec::new();

        for (idx, src) in sources.iter_mut().enumerate() {
            let events = match src.dev.fetch_events() {
                Ok(events) => events,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => {
                    error!("reading {} failed, dropping it: {e}", src.label);
                    lost.push(idx);
                    continue;
                }
            };
            let tracker = &mut src.tracker;
            for ev in events {
                any_event = true;
                if ev.event_type() == EventType::ABSOLUTE {
                    match ev.code() {
                        c if c == AbsoluteAxisCode::ABS_MT_SLOT.0 => tracker.on_slot(ev.value()),
                        c if c == AbsoluteAxisCode::ABS_MT_TRACKING_ID.0 => {
                            tracker.on_tracking_id(ev.value())
                        }
                        c if c == AbsoluteAxisCode::ABS_MT_POSITION_X.0 => {
                            tracker.on_pos_x(ev.value())
                        }
                        c if c == AbsoluteAxisCode::ABS_MT_POSITION_Y.0 => {
                            tracker.on_pos_y(ev.value())
                        }
                        _ => {}
                    }
                } else if ev.event_type() == EventType::SYNCHRONIZATION
                    && ev.code() == SynchronizationCode::SYN_REPORT.0
                {
                    let frame = tracker.on_syn_report();
                    let event = TouchEvent::new(frame.active_count);
                    match session.feed(&mut recognizer, &event, &frame.gesture) {
                        Ok(PanTransition::Claimed) => debug!(
                            "claimed swipe at ({:.0}, {:.0}) dx={:.1} dy={:.1}",
                            frame.centroid.0, frame.centroid.1, frame.gesture.dx, frame.gesture.dy
                        ),
                        Ok(_) => {}
                        Err(e) => error!("swipe handler failed: {e}"),
                    }
                    if frame.active_count == 0 {
                        // between gestures: pick up tracking changes from a reload
                        tracker.set_smoothing(current_smoothing(&profile));
                    }
                }
            }
        }

        if !lost.is_empty() {
            if let Err(e) = session.terminate(&mut recognizer) {
                error!("swipe handler failed: {e}");
            }
            drop_lost(&mut sources, &lost);
            if sources.is_empty() {
                warn!("all touch devices are gone; pipeline idle");
                idle_until(&stop);
                return Ok(());
            }
        }

        // apply grab/ungrab once per pass: a claimed swipe is ours alone
        let want_grab = session.is_claimed();
        if want_grab != grabbed {
            set_grab(&mut sources, want_grab);
            grabbed = want_grab;
        }

        if !any_event {
            thread::sleep(Duration::from_millis(4));
        }
    }

    if let Err(e) = session.terminate(&mut recognizer) {
        error!("swipe handler failed: {e}");
    }
    if grabbed {
        set_grab(&mut sources, false);
    }
    info!("gesture pipeline stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use pretty_assertions::assert_eq;

    #[test]
    fn failed_devices_are_dropped_once() {
        let mut devs = vec!["touchpad", "screen", "pen"];
        drop_lost(&mut devs, &[0, 2]);
        assert_eq!(devs, vec!["screen"]);

        drop_lost(&mut devs, &[0]);
        assert!(devs.is_empty());
    }

    #[test]
    fn missing_uinput_falls_back_to_noop_sink() {
        let sink = sink_or_noop(Err(anyhow!("permission denied: /dev/uinput")));
        assert!(sink.is_enabled());
        assert_eq!(format!("{sink:?}"), "ActionSink { enabled: true, uinput: false }");
    }
}
