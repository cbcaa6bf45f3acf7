//! Scrolling alert/status banner.
//!
//! The animator only moves the offset; the banner text itself is published
//! with each cycle's artifacts. New text mid-scroll needs no resync: the next
//! tick continues from wherever the offset is.

use tracing::{trace, warn};

use crate::{
    config::TickerConfig,
    render::{RenderTargets, TargetError},
    timer::{Activity, TimerHandle, TimerQueue},
};

#[derive(Debug, Clone)]
pub struct TickerAnimator {
    offset: f32,
    config: TickerConfig,
    handle: Option<TimerHandle>,
}

impl TickerAnimator {
    pub fn new(config: TickerConfig) -> Self {
        Self {
            offset: config.start_x,
            config,
            handle: None,
        }
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Move one step left, looping back to the right edge once the text is off screen.
    pub fn advance(&mut self) -> f32 {
        if self.offset < self.config.wrap_at {
            self.offset = self.config.start_x;
        } else {
            self.offset -= self.config.step;
        }
        self.offset
    }

    /// One animation frame. Target errors never stop the animation: a torn
    /// down target is expected and ignored, anything else is logged.
    pub fn tick(&mut self, target: &mut dyn RenderTargets) {
        self.handle = None;
        let offset = self.advance();

        match target.set_banner_offset(offset) {
            Ok(()) => {}
            Err(TargetError::Gone) => trace!("banner target gone; skipping frame"),
            Err(e) => warn!("ticker frame failed: {e}"),
        }
    }

    pub fn arm(&mut self, timers: &mut TimerQueue<Activity>, delay: std::time::Duration) {
        if let Some(prev) = self.handle.take() {
            timers.cancel(prev);
        }
        self.handle = Some(timers.schedule_after(delay, Activity::TickerTick));
    }
}
