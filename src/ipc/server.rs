use anyhow::{Result, anyhow};
use log::{error, info, warn};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::{
    io::{BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc::{Sender, channel},
    },
    thread,
    time::Duration,
};

use super::pipeline::run_pipeline;
use super::runtime::socket_path;
use crate::classifier;
use crate::config::{SharedSwipeConfig, SwipeOverrides, resolve};
use crate::gesture::{GestureState, SwipeDirection};
use crate::profile::{DaemonConfigState, Profile};
use crate::watcher::ProfileWatcher;

const WATCH_DEBOUNCE_MS: u64 = 300;

pub fn run_daemon() -> Result<()> {
    let sock = socket_path()?;
    if sock.exists() {
        let _ = std::fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    info!("daemon: listening on {}", sock.display());

    let mut state = DaemonState::new()?;
    info!(
        "daemon: active profile '{}', swipe config {:?}",
        state.cfg.active_name,
        state.swipe.snapshot()
    );

    let (tx_req, rx_req) = channel::<IpcMsg>();
    let (tx_evt, rx_evt) = channel::<DaemonEvent>();

    watch_signals(tx_req.clone())?;

    let mut watcher = match ProfileWatcher::new(
        &[state.cfg.profiles_dir.clone(), state.cfg.active_ptr.clone()],
        WATCH_DEBOUNCE_MS,
    ) {
        Ok(w) => Some(w),
        Err(e) => {
            warn!("profile watching disabled: {e:#}");
            None
        }
    };

    let mut gesture_thread =
        GestureThread::start(state.cfg.profile.clone(), state.swipe.clone(), tx_evt)?;

    listener.set_nonblocking(true)?;
    loop {
        if let Ok((stream, _)) = listener.accept() {
            let tx = tx_req.clone();
            let st_snapshot = state.clone_shallow();
            thread::spawn(move || {
                if let Err(e) = handle_client(stream, st_snapshot, tx) {
                    error!("ipc client error: {e}");
                }
            });
        }

        while let Ok(DaemonEvent::Swipe(d)) = rx_evt.try_recv() {
            info!("[gesture] swipe {d}");
        }

        if watcher.as_mut().and_then(|w| w.poll_changes()).is_some() {
            let _ = tx_req.send(IpcMsg::Resync);
        }

        while let Ok(msg) = rx_req.try_recv() {
            match msg {
                IpcMsg::Reload => match state.cfg.reload() {
                    Ok(()) => {
                        gesture_thread.update_profile(state.cfg.profile.clone());
                        info!("profile reloaded");
                    }
                    Err(e) => error!("reload failed: {e}"),
                },
                IpcMsg::Resync => match state.cfg.sync_from_disk() {
                    Ok(()) => {
                        gesture_thread.update_profile(state.cfg.profile.clone());
                        info!("profile '{}' changed on disk; reloaded", state.cfg.active_name);
                    }
                    Err(e) => warn!("profile changed on disk but is invalid, keeping last good: {e}"),
                },
                IpcMsg::UseProfile(name) => match state.cfg.set_active(&name) {
                    Ok(()) => {
                        gesture_thread.update_profile(state.cfg.profile.clone());
                        info!(
                            "switched active profile to {} ({})",
                            state.cfg.active_name,
                            state.cfg.profile.display_name(&state.cfg.active_name)
                        );
                    }
                    Err(e) => error!("use profile failed: {e}"),
                },
                IpcMsg::Shutdown => {
                    info!("daemon: shutting down");
                    gesture_thread.stop();
                    let _ = std::fs::remove_file(&sock);
                    return Ok(());
                }
            }
        }

        thread::sleep(Duration::from_millis(5));
    }
}

fn watch_signals(tx: Sender<IpcMsg>) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!("daemon: received signal {sig}");
            let _ = tx.send(IpcMsg::Shutdown);
        }
    });
    Ok(())
}

fn handle_client(mut stream: UnixStream, st: DaemonState, tx_req: Sender<IpcMsg>) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }
    let req: serde_json::Value = serde_json::from_str(&line)?;
    let (resp, msg) = respond(&req, &st);
    writeln!(stream, "{resp}")?;
    // reply first: a shutdown may end the process right after
    if let Some(msg) = msg {
        let _ = tx_req.send(msg);
    }
    Ok(())
}

/// Build the reply for one request, plus any message for the main loop.
fn respond(req: &serde_json::Value, st: &DaemonState) -> (serde_json::Value, Option<IpcMsg>) {
    let op = req.get("op").and_then(|v| v.as_str()).unwrap_or("");
    let resp = match op {
        "status" => serde_json::json!({"ok": true, "data": {
            "active_profile": st.cfg.active_name,
            "profile_name": st.cfg.profile.display_name(&st.cfg.active_name),
            "swipe": st.swipe.snapshot(),
            "socket": socket_path().ok(),
            "devices": st.cfg.detected_devices,
        }}),
        "reload" => {
            let resp = serde_json::json!({"ok": true, "data": {"active_profile": st.cfg.active_name}});
            return (resp, Some(IpcMsg::Reload));
        }
        "use" => {
            let name = req.get("profile").and_then(|v| v.as_str()).unwrap_or("");
            let resp = serde_json::json!({"ok": true, "data": {"active_profile": name}});
            return (resp, Some(IpcMsg::UseProfile(name.to_string())));
        }
        "list" => {
            let list = st.cfg.list_profiles();
            serde_json::json!({"ok": true, "data": {"profiles": list, "active": st.cfg.active_name}})
        }
        "doctor" => {
            let report = st.cfg.doctor_report();
            serde_json::json!({"ok": true, "data": report})
        }
        "check" => match req.get("gesture").map(GestureState::from_json) {
            Some(Ok(g)) => {
                let overrides = req
                    .get("overrides")
                    .map(SwipeOverrides::from_json)
                    .unwrap_or_default();
                check_report(&g, &st.swipe, &overrides)
            }
            Some(Err(e)) => serde_json::json!({"ok": false, "error": e.to_string()}),
            None => serde_json::json!({"ok": false, "error": "check needs a 'gesture' object"}),
        },
        "shutdown" => {
            let resp = serde_json::json!({"ok": true, "data": "shutting down"});
            return (resp, Some(IpcMsg::Shutdown));
        }
        _ => serde_json::json!({"ok": false, "error": format!("unknown op: {op}")}),
    };
    (resp, None)
}

/// Claim decision and classification of one gesture. Empty `overrides` use the
/// effective config; otherwise they are resolved on top of the defaults.
pub fn check_report(
    g: &GestureState,
    swipe: &SharedSwipeConfig,
    overrides: &SwipeOverrides,
) -> serde_json::Value {
    let cfg = if overrides.is_empty() {
        swipe.snapshot()
    } else {
        resolve(overrides)
    };
    serde_json::json!({"ok": true, "data": {
        "claim": classifier::should_claim(g.touch_count, g, &cfg),
        "direction": classifier::classify(g, &cfg),
        "config": cfg,
    }})
}

#[derive(Debug)]
struct DaemonState {
    cfg: DaemonConfigState,
    swipe: SharedSwipeConfig,
}

impl DaemonState {
    fn new() -> Result<Self> {
        let cfg = DaemonConfigState::load_or_install_default()?;
        let swipe = SharedSwipeConfig::from_overrides(&cfg.profile.swipe);
        Ok(Self { cfg, swipe })
    }

    fn clone_shallow(&self) -> Self {
        Self {
            cfg: self.cfg.clone(),
            swipe: self.swipe.clone(),
        }
    }
}

enum IpcMsg {
    Reload,
    Resync,
    UseProfile(String),
    Shutdown,
}

pub enum DaemonEvent {
    Swipe(SwipeDirection),
}

struct GestureThread {
    profile: Arc<Mutex<Profile>>,
    swipe: SharedSwipeConfig,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl GestureThread {
    fn start(
        profile: Profile,
        swipe: SharedSwipeConfig,
        tx_evt: Sender<DaemonEvent>,
    ) -> Result<Self> {
        let profile_arc = Arc::new(Mutex::new(profile));
        let stop = Arc::new(AtomicBool::new(false));
        let (prof, cfg, flag) = (profile_arc.clone(), swipe.clone(), stop.clone());
        let handle = thread::Builder::new()
            .name("swipectl-gestures".into())
            .spawn(move || {
                if let Err(e) = run_pipeline(prof, cfg, tx_evt, flag) {
                    error!("gesture pipeline failed: {e}");
                }
            })
            .map_err(|e| anyhow!("failed to spawn gesture thread: {e}"))?;
        Ok(Self {
            profile: profile_arc,
            swipe,
            stop,
            handle: Some(handle),
        })
    }

    /// Swap in a new profile: the swipe config is re-resolved from scratch and
    /// bindings are picked up on the next dispatch.
    fn update_profile(&mut self, new_profile: Profile) {
        self.swipe.apply(&new_profile.swipe);
        if let Ok(mut p) = self.profile.lock() {
            *p = new_profile;
        }
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

pub fn client_request(req: serde_json::Value) -> Result<serde_json::Value> {
    let sock = socket_path()?;
    if !sock.exists() {
        return Err(anyhow!(
            "swipectl daemon is not running (socket missing at {})",
            sock.display()
        ));
    }
    let mut stream = UnixStream::connect(sock)?;
    let line = serde_json::to_string(&req)? + "\n";
    stream.write_all(line.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    let v: serde_json::Value = serde_json::from_str(&resp)?;
    Ok(v)
}
