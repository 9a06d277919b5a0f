//! Callback contract between a touch capture source and a gesture handler,
//! plus a small driver that enforces the capture-side lifecycle.

use anyhow::Result;
use log::debug;

use crate::gesture::GestureState;

/// Raw event data handed to the claim checks. Only the active touch count is
/// of interest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TouchEvent {
    pub touches: usize,
}

impl TouchEvent {
    pub fn new(touches: usize) -> Self {
        Self { touches }
    }
}

/// Handlers a capture source calls during one touch sequence.
pub trait PanHandlers {
    /// A touch sequence started. Return `true` to claim it.
    fn on_start_should_set(&mut self, event: &TouchEvent, state: &GestureState) -> bool;
    /// The sequence moved and is not claimed yet. Return `true` to claim it.
    fn on_move_should_set(&mut self, event: &TouchEvent, state: &GestureState) -> bool;
    /// The claimed sequence ended normally.
    fn on_release(&mut self, event: &TouchEvent, state: &GestureState) -> Result<()>;
    /// The claimed sequence was taken away before it ended.
    fn on_terminate(&mut self, event: &TouchEvent, state: &GestureState) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Tracking,
    Claimed,
}

/// What a frame did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanTransition {
    /// No touch, nothing in progress.
    Idle,
    /// Touching but not claimed (yet).
    Tracking,
    /// Claimed on this frame.
    Claimed,
    /// Still claimed, waiting for the end.
    Holding,
    /// Unclaimed sequence ended; no end handler ran.
    Abandoned,
    /// Claimed sequence ended; `on_release` ran.
    Released,
    /// Claimed sequence was cut short; `on_terminate` ran.
    Terminated,
}

/// Drives [`PanHandlers`] from a stream of per-frame gesture states.
///
/// Claim checks run on the first touching frame and on every later frame until
/// one of them succeeds. `on_release`/`on_terminate` run only for a claimed
/// sequence, at most once.
#[derive(Debug, Default)]
pub struct PanSession {
    phase: Phase,
    last: GestureState,
}

impl PanSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_claimed(&self) -> bool {
        self.phase == Phase::Claimed
    }

    /// Feed one frame. A frame with zero touches ends the sequence.
    pub fn feed<H: PanHandlers>(
        &mut self,
        handlers: &mut H,
        event: &TouchEvent,
        state: &GestureState,
    ) -> Result<PanTransition> {
        let touching = event.touches > 0;
        match (self.phase, touching) {
            (Phase::Idle, false) => Ok(PanTransition::Idle),
            (Phase::Idle, true) => {
                self.last = *state;
                if handlers.on_start_should_set(event, state) {
                    self.phase = Phase::Claimed;
                    debug!("pan: claimed on start");
                    Ok(PanTransition::Claimed)
                } else {
                    self.phase = Phase::Tracking;
                    Ok(PanTransition::Tracking)
                }
            }
            (Phase::Tracking, true) => {
                self.last = *state;
                if handlers.on_move_should_set(event, state) {
                    self.phase = Phase::Claimed;
                    debug!("pan: claimed on move");
                    Ok(PanTransition::Claimed)
                } else {
                    Ok(PanTransition::Tracking)
                }
            }
            (Phase::Tracking, false) => {
                self.reset();
                Ok(PanTransition::Abandoned)
            }
            (Phase::Claimed, true) => {
                self.last = *state;
                Ok(PanTransition::Holding)
            }
            (Phase::Claimed, false) => {
                self.reset();
                handlers.on_release(event, state)?;
                Ok(PanTransition::Released)
            }
        }
    }

    /// Cut the current sequence short. Runs `on_terminate` with the last seen
    /// state if the sequence was claimed.
    pub fn terminate<H: PanHandlers>(&mut self, handlers: &mut H) -> Result<PanTransition> {
        let phase = self.phase;
        let last = self.last;
        self.reset();
        match phase {
            Phase::Claimed => {
                handlers.on_terminate(&TouchEvent::new(last.touch_count), &last)?;
                Ok(PanTransition::Terminated)
            }
            Phase::Tracking => Ok(PanTransition::Abandoned),
            Phase::Idle => Ok(PanTransition::Idle),
        }
    }

    fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.last = GestureState::default();
    }
}
