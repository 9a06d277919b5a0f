use anyhow::{Result, anyhow};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use super::server::DaemonEvent;
use crate::actions::{Action, ActionSink};
use crate::dispatch::SwipeHandlers;
use crate::gesture::SwipeDirection;
use crate::profile::{ANY_SWIPE_BINDING, Profile};

/// Handlers that look up the current profile's binding at dispatch time, so a
/// reloaded profile takes effect on the next swipe.
pub fn handlers_for(
    profile: Arc<Mutex<Profile>>,
    sink: Arc<Mutex<ActionSink>>,
    tx_evt: Sender<DaemonEvent>,
) -> SwipeHandlers {
    let mut handlers = {
        let profile = profile.clone();
        let sink = sink.clone();
        SwipeHandlers::new().on_swipe(move |direction, _state| {
            let _ = tx_evt.send(DaemonEvent::Swipe(direction));
            perform_binding(ANY_SWIPE_BINDING, &profile, &sink)
        })
    };
    for direction in SwipeDirection::ALL {
        let profile = profile.clone();
        let sink = sink.clone();
        handlers = handlers.on(direction, move |_state| {
            perform_binding(direction.binding_key(), &profile, &sink)
        });
    }
    handlers
}

pub fn perform_binding(
    key: &str,
    profile: &Arc<Mutex<Profile>>,
    sink: &Arc<Mutex<ActionSink>>,
) -> Result<()> {
    let (action, allow_commands) = {
        let p = profile
            .lock()
            .map_err(|_| anyhow!("profile lock poisoned"))?;
        let Some(binding) = p.binding(key) else {
            return Ok(());
        };
        let action: Action = binding
            .parse()
            .map_err(|e| anyhow!("binding '{key}' -> '{binding}': {e}"))?;
        (action, p.meta.allow_commands)
    };

    if matches!(action, Action::Command(_)) && !allow_commands {
        return Err(anyhow!("binding '{key}' uses cmd: but allow_commands=false"));
    }
    let mut sink = sink.lock().map_err(|_| anyhow!("action sink lock poisoned"))?;
    sink.perform(&action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::GestureState;
    use crate::profile::parse_profile;

    fn shared(txt: &str) -> Arc<Mutex<Profile>> {
        Arc::new(Mutex::new(parse_profile(txt).unwrap()))
    }

    #[test]
    fn unbound_swipe_is_a_no_op() {
        let profile = shared("");
        let sink = Arc::new(Mutex::new(ActionSink::noop()));
        assert!(perform_binding("swipe.up", &profile, &sink).is_ok());
    }

    #[test]
    fn toggle_binding_reaches_the_sink() {
        let profile = shared("[bindings]\nswipe.down = \"toggle\"\n");
        let sink = Arc::new(Mutex::new(ActionSink::noop()));
        let (tx, rx) = std::sync::mpsc::channel();
        let mut handlers = handlers_for(profile, sink.clone(), tx);

        handlers
            .dispatch(Some(SwipeDirection::Down), &GestureState::default())
            .unwrap();
        assert!(!sink.lock().unwrap().is_enabled());
        assert!(matches!(
            rx.try_recv(),
            Ok(DaemonEvent::Swipe(SwipeDirection::Down))
        ));
    }

    #[test]
    fn reloaded_profile_is_used_on_next_swipe() {
        let profile = shared("");
        let sink = Arc::new(Mutex::new(ActionSink::noop()));
        let (tx, _rx) = std::sync::mpsc::channel();
        let mut handlers = handlers_for(profile.clone(), sink.clone(), tx);

        *profile.lock().unwrap() = parse_profile("[bindings]\nswipe.any = \"toggle\"\n").unwrap();
        handlers
            .dispatch(Some(SwipeDirection::Left), &GestureState::default())
            .unwrap();
        assert!(!sink.lock().unwrap().is_enabled());
    }
}
