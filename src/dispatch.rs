//! Fan a classified swipe out to caller callbacks.

use anyhow::Result;
use std::fmt;

use crate::gesture::{GestureState, SwipeDirection};

pub type SwipeHandler = Box<dyn FnMut(&GestureState) -> Result<()> + Send>;
pub type AnySwipeHandler = Box<dyn FnMut(SwipeDirection, &GestureState) -> Result<()> + Send>;

/// Optional callbacks: one for any swipe plus one per direction.
#[derive(Default)]
pub struct SwipeHandlers {
    any: Option<AnySwipeHandler>,
    by_direction: [Option<SwipeHandler>; 4],
}

impl fmt::Debug for SwipeHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered: Vec<&str> = SwipeDirection::ALL
            .iter()
            .filter(|d| self.is_registered(**d))
            .map(|d| d.as_str())
            .collect();
        f.debug_struct("SwipeHandlers")
            .field("any", &self.any.is_some())
            .field("directions", &registered)
            .finish()
    }
}

impl SwipeHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_swipe<F>(mut self, f: F) -> Self
    where
        F: FnMut(SwipeDirection, &GestureState) -> Result<()> + Send + 'static,
    {
        self.any = Some(Box::new(f));
        self
    }

    pub fn on<F>(mut self, direction: SwipeDirection, f: F) -> Self
    where
        F: FnMut(&GestureState) -> Result<()> + Send + 'static,
    {
        self.by_direction[direction.index()] = Some(Box::new(f));
        self
    }

    pub fn on_swipe_up<F>(self, f: F) -> Self
    where
        F: FnMut(&GestureState) -> Result<()> + Send + 'static,
    {
        self.on(SwipeDirection::Up, f)
    }

    pub fn on_swipe_down<F>(self, f: F) -> Self
    where
        F: FnMut(&GestureState) -> Result<()> + Send + 'static,
    {
        self.on(SwipeDirection::Down, f)
    }

    pub fn on_swipe_left<F>(self, f: F) -> Self
    where
        F: FnMut(&GestureState) -> Result<()> + Send + 'static,
    {
        self.on(SwipeDirection::Left, f)
    }

    pub fn on_swipe_right<F>(self, f: F) -> Self
    where
        F: FnMut(&GestureState) -> Result<()> + Send + 'static,
    {
        self.on(SwipeDirection::Right, f)
    }

    pub fn is_registered(&self, direction: SwipeDirection) -> bool {
        self.by_direction[direction.index()].is_some()
    }

    /// Invoke the generic handler, then the one for `direction`. Nothing runs
    /// for `None`. The first handler error is returned as-is and stops the
    /// fan-out.
    pub fn dispatch(&mut self, direction: Option<SwipeDirection>, state: &GestureState) -> Result<()> {
        let Some(direction) = direction else {
            return Ok(());
        };
        if let Some(any) = self.any.as_mut() {
            any(direction, state)?;
        }
        if let Some(handler) = self.by_direction[direction.index()].as_mut() {
            handler(state)?;
        }
        Ok(())
    }
}
