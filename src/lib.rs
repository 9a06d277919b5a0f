//! Single-finger swipe recognition.
//!
//! A [`GestureRecognizer`] owns one effective [`SwipeConfig`] and a set of
//! [`SwipeHandlers`]. A capture source feeds it [`GestureState`] records
//! through the [`PanHandlers`] contract: claim checks while the finger moves,
//! then one release (or terminate) that classifies the gesture and fans the
//! direction out to the handlers.
//!
//! ```
//! use swipectl::{GestureRecognizer, GestureState, PanHandlers, SwipeHandlers, SwipeOverrides, TouchEvent};
//!
//! let handlers = SwipeHandlers::new().on_swipe_left(|g| {
//!     println!("left swipe, dx = {}", g.dx);
//!     Ok(())
//! });
//! let mut recognizer = GestureRecognizer::new(&SwipeOverrides::default(), handlers);
//! let g = GestureState::new(-20.0, 2.0, -0.8, 0.05);
//! assert!(recognizer.on_move_should_set(&TouchEvent::new(1), &g));
//! recognizer.on_release(&TouchEvent::new(0), &g).unwrap();
//! ```
//!
//! The rest of the crate is the `swipectl` daemon: evdev touch tracking,
//! TOML profiles, uinput actions and a Unix-socket control protocol.

pub mod actions;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod gesture;
pub mod input;
pub mod ipc;
pub mod logging;
pub mod profile;
pub mod recognizer;
pub mod responder;
pub mod tracker;
pub mod watcher;

pub use classifier::{classify, should_claim};
pub use config::{SharedSwipeConfig, SwipeConfig, SwipeOverrides, resolve};
pub use dispatch::SwipeHandlers;
pub use gesture::{GestureState, SwipeDirection};
pub use recognizer::GestureRecognizer;
pub use responder::{PanHandlers, PanSession, PanTransition, TouchEvent};
