//! Refresh cycle state machine.
//!
//! ```text
//! UNCONFIGURED -> FETCHING -> PUBLISHED | FAILED -> (timer) -> FETCHING
//! ```
//!
//! At most one fetch is ever outstanding. The next cycle's timer is armed
//! only once the current one resolves, so the interval is a minimum spacing
//! between cycle completions and starts, never an overlap.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{
    error::KioskResult,
    model::{Credentials, WeatherSnapshot},
    timer::{Activity, TimerHandle, TimerQueue},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Unconfigured,
    Fetching,
    Published,
    Failed,
}

#[derive(Debug)]
pub struct RefreshScheduler {
    state: SchedulerState,
    interval: Duration,
    credentials: Option<Credentials>,
    snapshot: Option<WeatherSnapshot>,
    handle: Option<TimerHandle>,
    /// A forced refresh arrived while a fetch was outstanding.
    rerun_requested: bool,
    cycles_started: u64,
}

impl RefreshScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            state: SchedulerState::Unconfigured,
            interval,
            credentials: None,
            snapshot: None,
            handle: None,
            rerun_requested: false,
            cycles_started: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_fetching(&self) -> bool {
        self.state == SchedulerState::Fetching
    }

    /// Last successfully fetched snapshot; kept across failed cycles.
    pub fn snapshot(&self) -> Option<&WeatherSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn cycles_started(&self) -> u64 {
        self.cycles_started
    }

    /// Install credentials for future cycles. Incomplete credentials are refused.
    pub fn configure(&mut self, credentials: Credentials) -> bool {
        if !credentials.is_complete() {
            warn!("refusing incomplete credentials");
            return false;
        }
        self.credentials = Some(credentials);
        true
    }

    /// Enter FETCHING and hand back the credentials to fetch with.
    ///
    /// Returns `None` while unconfigured, and also while a fetch is already
    /// outstanding: the request is then coalesced into one rerun after the
    /// outstanding fetch resolves.
    pub fn begin_cycle(&mut self, timers: &mut TimerQueue<Activity>) -> Option<Credentials> {
        let credentials = self.credentials.clone()?;

        if self.is_fetching() {
            debug!("refresh requested while fetching; coalesced");
            self.rerun_requested = true;
            return None;
        }

        if let Some(pending) = self.handle.take() {
            timers.cancel(pending);
        }

        self.state = SchedulerState::Fetching;
        self.cycles_started += 1;
        info!(cycle = self.cycles_started, "Triggering weather update cycle");
        Some(credentials)
    }

    /// The scheduled timer fired. Cancels the handle in case it is still queued.
    pub fn on_timer(&mut self, timers: &mut TimerQueue<Activity>) {
        if let Some(handle) = self.handle.take() {
            timers.cancel(handle);
        }
    }

    /// Resolve the outstanding cycle and arm the next one.
    ///
    /// Returns true when a fresh snapshot is ready to compose and publish;
    /// false when the cycle failed and the previous display must stay as it is.
    pub fn complete_cycle(
        &mut self,
        result: KioskResult<WeatherSnapshot>,
        timers: &mut TimerQueue<Activity>,
    ) -> bool {
        if !self.is_fetching() {
            warn!("fetch result arrived with no cycle outstanding; ignored");
            return false;
        }

        let published = match result {
            Ok(snapshot) => {
                self.state = SchedulerState::Published;
                self.snapshot = Some(snapshot);
                true
            }
            Err(e) => {
                self.state = SchedulerState::Failed;
                warn!(retryable = e.is_retryable(), "Weather update failed: {e}");
                false
            }
        };

        let delay = if std::mem::take(&mut self.rerun_requested) {
            Duration::ZERO
        } else {
            self.interval
        };
        self.handle = Some(timers.schedule_after(delay, Activity::Refresh));
        debug!(?delay, "next refresh armed");

        published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::KioskError,
        model::Location,
        provider::{ParseError, openweather::decode},
    };

    fn creds(key: &str) -> Credentials {
        Credentials {
            api_key: key.into(),
            location: Location::Coordinates {
                lat: "1".into(),
                lon: "2".into(),
            },
        }
    }

    fn snapshot(temp: f64) -> WeatherSnapshot {
        decode(&format!(r#"{{"current": {{"temp": {temp}}}}}"#)).expect("payload decodes")
    }

    #[test]
    fn unconfigured_scheduler_is_inert() {
        let mut timers = TimerQueue::new();
        let mut scheduler = RefreshScheduler::new(Duration::from_secs(600));

        assert!(scheduler.begin_cycle(&mut timers).is_none());
        assert_eq!(scheduler.state(), SchedulerState::Unconfigured);
        assert!(!scheduler.configure(Credentials {
            api_key: String::new(),
            ..creds("x")
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn only_one_fetch_outstanding() {
        let mut timers = TimerQueue::new();
        let mut scheduler = RefreshScheduler::new(Duration::from_secs(600));
        scheduler.configure(creds("KEY"));

        assert!(scheduler.begin_cycle(&mut timers).is_some());
        assert!(scheduler.begin_cycle(&mut timers).is_none());
        assert_eq!(scheduler.cycles_started(), 1);
        assert!(timers.is_empty(), "next cycle must not be armed while fetching");
    }

    #[tokio::test(start_paused = true)]
    async fn success_publishes_and_arms_interval() {
        let mut timers = TimerQueue::new();
        let mut scheduler = RefreshScheduler::new(Duration::from_secs(600));
        scheduler.configure(creds("KEY"));
        scheduler.begin_cycle(&mut timers);

        assert!(scheduler.complete_cycle(Ok(snapshot(70.0)), &mut timers));
        assert_eq!(scheduler.state(), SchedulerState::Published);

        let deadline = timers.next_deadline().expect("next cycle armed");
        assert_eq!(deadline - tokio::time::Instant::now(), Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_previous_snapshot_and_same_interval() {
        let mut timers = TimerQueue::new();
        let mut scheduler = RefreshScheduler::new(Duration::from_secs(600));
        scheduler.configure(creds("KEY"));

        scheduler.begin_cycle(&mut timers);
        scheduler.complete_cycle(Ok(snapshot(70.0)), &mut timers);

        tokio::time::advance(Duration::from_secs(600)).await;
        let fired = timers.pop_due(tokio::time::Instant::now());
        assert_eq!(fired.len(), 1);
        scheduler.on_timer(&mut timers);

        scheduler.begin_cycle(&mut timers);
        let published = scheduler.complete_cycle(
            Err(KioskError::ProviderDataError(ParseError::MissingCurrent)),
            &mut timers,
        );

        assert!(!published);
        assert_eq!(scheduler.state(), SchedulerState::Failed);
        assert_eq!(scheduler.snapshot().map(|s| s.current.temperature), Some(70.0));
        assert_eq!(timers.len(), 1);
        let deadline = timers.next_deadline().expect("retry armed");
        assert_eq!(deadline - tokio::time::Instant::now(), Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn early_timer_notice_leaves_nothing_queued() {
        let mut timers = TimerQueue::new();
        let mut scheduler = RefreshScheduler::new(Duration::from_secs(600));
        scheduler.configure(creds("KEY"));
        scheduler.begin_cycle(&mut timers);
        scheduler.complete_cycle(Ok(snapshot(1.0)), &mut timers);

        scheduler.on_timer(&mut timers);

        assert!(timers.is_empty());
        assert!(scheduler.begin_cycle(&mut timers).is_some());
        scheduler.complete_cycle(Ok(snapshot(2.0)), &mut timers);
        assert_eq!(timers.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn forced_cycle_replaces_pending_timer() {
        let mut timers = TimerQueue::new();
        let mut scheduler = RefreshScheduler::new(Duration::from_secs(600));
        scheduler.configure(creds("KEY"));
        scheduler.begin_cycle(&mut timers);
        scheduler.complete_cycle(Ok(snapshot(1.0)), &mut timers);
        assert_eq!(timers.len(), 1);

        scheduler.configure(creds("NEW"));
        assert!(scheduler.begin_cycle(&mut timers).is_some());
        assert!(timers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn coalesced_force_reruns_right_after_completion() {
        let mut timers = TimerQueue::new();
        let mut scheduler = RefreshScheduler::new(Duration::from_secs(600));
        scheduler.configure(creds("KEY"));
        scheduler.begin_cycle(&mut timers);

        scheduler.configure(creds("NEW"));
        assert!(scheduler.begin_cycle(&mut timers).is_none());

        scheduler.complete_cycle(Ok(snapshot(1.0)), &mut timers);
        assert_eq!(timers.next_deadline(), Some(tokio::time::Instant::now()));
    }
}
