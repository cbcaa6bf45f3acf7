//! Hides the pointer after a period without interaction.

use std::time::Duration;

use tracing::{debug, warn};

use crate::{
    render::RenderTargets,
    timer::{Activity, TimerHandle, TimerQueue},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Visible,
    Hidden,
}

/// Two-state debounce with a single timer; every re-arm cancels the previous one.
#[derive(Debug)]
pub struct IdleCursorMonitor {
    timeout: Duration,
    state: CursorState,
    handle: Option<TimerHandle>,
}

impl IdleCursorMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            state: CursorState::Visible,
            handle: None,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Arm the first timeout; the cursor starts visible.
    pub fn start(&mut self, timers: &mut TimerQueue<Activity>) {
        self.rearm(timers);
    }

    pub fn on_interaction(
        &mut self,
        timers: &mut TimerQueue<Activity>,
        target: &mut dyn RenderTargets,
    ) {
        if self.state == CursorState::Hidden {
            match target.set_cursor_visible(true) {
                Ok(()) => debug!("cursor shown"),
                Err(e) => warn!("cannot show cursor: {e}"),
            }
            self.state = CursorState::Visible;
        }
        self.rearm(timers);
    }

    pub fn on_timeout(&mut self, target: &mut dyn RenderTargets) {
        self.handle = None;
        if self.state == CursorState::Visible {
            match target.set_cursor_visible(false) {
                Ok(()) => debug!("cursor hidden after {:?} idle", self.timeout),
                Err(e) => warn!("cannot hide cursor: {e}"),
            }
            self.state = CursorState::Hidden;
        }
    }

    fn rearm(&mut self, timers: &mut TimerQueue<Activity>) {
        if let Some(prev) = self.handle.take() {
            timers.cancel(prev);
        }
        self.handle = Some(timers.schedule_after(self.timeout, Activity::IdleTimeout));
    }
}
