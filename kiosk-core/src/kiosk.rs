//! The single-threaded event loop.
//!
//! Refresh cycles, ticker frames, idle checks and UI events all run to
//! completion on one task. The only blocking work, the provider fetch and the
//! setup geocode, is spawned as a worker whose result comes back through a
//! channel, so ticker and idle timers keep their cadence while it runs.

use std::sync::Arc;

use chrono::Local;
use tokio::{
    sync::{mpsc, oneshot},
    time::{Instant, sleep_until},
};
use tracing::{error, info, warn};

use crate::{
    compose::Composer,
    config::KioskConfig,
    error::{KioskError, KioskResult},
    fonts::FontSet,
    gate::{
        self, ConfigurationGate, GateDecision, ResolvedSetup, SetupPrefill, SetupSubmission,
        SubmitOutcome,
    },
    icons::IconCache,
    idle::IdleCursorMonitor,
    model::WeatherSnapshot,
    provider::{Geocoder, WeatherProvider},
    render::{FORECAST_DAYS, RenderTargets, forecast_cell_at},
    scheduler::RefreshScheduler,
    settings::{SettingsStore, keys},
    ticker::TickerAnimator,
    timer::{Activity, TimerQueue},
};

/// The modal setup form. `open` must not block; the form answers later with
/// [`KioskEvent::SetupSubmitted`] or [`KioskEvent::SetupCancelled`].
pub trait SetupCollaborator {
    fn open(&mut self, prefill: SetupPrefill);
}

/// Events delivered to the loop from the outside.
#[derive(Debug)]
pub enum KioskEvent {
    /// Any key press or touch.
    Interaction,
    /// Pointer moved; also counts as an interaction.
    Pointer { x: i32, y: i32 },
    OpenSetup,
    SetupSubmitted {
        submission: SetupSubmission,
        reply: oneshot::Sender<KioskResult<SubmitOutcome>>,
    },
    SetupCancelled,
    Shutdown,
}

/// Results of spawned workers.
#[derive(Debug)]
enum Completion {
    Fetch(KioskResult<WeatherSnapshot>),
    Setup {
        result: KioskResult<ResolvedSetup>,
        reply: oneshot::Sender<KioskResult<SubmitOutcome>>,
    },
}

/// Everything the loop needs, constructed once at process start.
pub struct KioskContext {
    pub config: KioskConfig,
    pub settings: Box<dyn SettingsStore>,
    pub provider: Arc<dyn WeatherProvider>,
    pub geocoder: Arc<dyn Geocoder>,
    pub icons: IconCache,
    pub fonts: FontSet,
    pub targets: Box<dyn RenderTargets>,
    pub setup: Box<dyn SetupCollaborator>,
}

pub struct Kiosk {
    config: KioskConfig,
    settings: Box<dyn SettingsStore>,
    provider: Arc<dyn WeatherProvider>,
    targets: Box<dyn RenderTargets>,
    setup: Box<dyn SetupCollaborator>,
    gate: ConfigurationGate,
    scheduler: RefreshScheduler,
    composer: Composer,
    ticker: TickerAnimator,
    idle: IdleCursorMonitor,
    timers: TimerQueue<Activity>,
    tooltips: Option<[String; FORECAST_DAYS]>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl Kiosk {
    pub fn new(ctx: KioskContext) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        Self {
            scheduler: RefreshScheduler::new(ctx.config.refresh_interval()),
            composer: Composer::new(ctx.icons, ctx.fonts, ctx.config.units),
            ticker: TickerAnimator::new(ctx.config.ticker.clone()),
            idle: IdleCursorMonitor::new(ctx.config.idle_timeout()),
            gate: ConfigurationGate::new(ctx.geocoder),
            timers: TimerQueue::new(),
            tooltips: None,
            config: ctx.config,
            settings: ctx.settings,
            provider: ctx.provider,
            targets: ctx.targets,
            setup: ctx.setup,
            completions_tx,
            completions_rx,
        }
    }

    /// Run until [`KioskEvent::Shutdown`] arrives or every event sender is dropped.
    pub async fn run(mut self, mut events: mpsc::Receiver<KioskEvent>) -> KioskResult<()> {
        self.startup();

        loop {
            let deadline = self.timers.next_deadline();

            tokio::select! {
                _ = sleep_until_deadline(deadline) => self.fire_due_timers(),
                Some(done) = self.completions_rx.recv() => self.on_completion(done),
                event = events.recv() => match event {
                    None | Some(KioskEvent::Shutdown) => break,
                    Some(event) => self.on_event(event),
                },
            }
        }

        info!(cycles = self.scheduler.cycles_started(), "kiosk loop stopped");
        Ok(())
    }

    fn startup(&mut self) {
        let ticker_interval = self.config.ticker_interval();
        self.ticker.arm(&mut self.timers, ticker_interval);
        self.idle.start(&mut self.timers);

        match self.gate.startup(self.settings.as_ref()) {
            GateDecision::Ready(credentials) => {
                self.scheduler.configure(credentials);
                self.start_cycle();
            }
            GateDecision::NeedsSetup(prefill) => {
                info!("Opening setup.");
                self.setup.open(prefill);
            }
        }
    }

    fn fire_due_timers(&mut self) {
        for (_, activity) in self.timers.pop_due(Instant::now()) {
            match activity {
                Activity::Refresh => {
                    self.scheduler.on_timer(&mut self.timers);
                    self.start_cycle();
                }
                Activity::TickerTick => {
                    self.ticker.tick(self.targets.as_mut());
                    let interval = self.config.ticker_interval();
                    self.ticker.arm(&mut self.timers, interval);
                }
                Activity::IdleTimeout => self.idle.on_timeout(self.targets.as_mut()),
            }
        }
    }

    fn start_cycle(&mut self) {
        let Some(credentials) = self.scheduler.begin_cycle(&mut self.timers) else {
            return;
        };

        let provider = Arc::clone(&self.provider);
        let tx = self.completions_tx.clone();
        let limit = self.config.fetch_timeout();

        tokio::spawn(async move {
            let result = match tokio::time::timeout(limit, provider.fetch(&credentials)).await {
                Ok(result) => result,
                Err(_) => Err(KioskError::NetworkFailure(format!(
                    "fetch timed out after {limit:?}"
                ))),
            };
            // The loop owns the receiver; a send error only means it already stopped.
            let _ = tx.send(Completion::Fetch(result));
        });
    }

    fn on_completion(&mut self, done: Completion) {
        match done {
            Completion::Fetch(result) => self.finish_cycle(result),
            Completion::Setup { result, reply } => self.finish_setup(result, reply),
        }
    }

    fn finish_cycle(&mut self, result: KioskResult<WeatherSnapshot>) {
        if !self.scheduler.complete_cycle(result, &mut self.timers) {
            return;
        }
        let (Some(snapshot), Some(credentials)) =
            (self.scheduler.snapshot(), self.scheduler.credentials())
        else {
            return;
        };

        let artifacts = self.composer.compose(snapshot, credentials, &Local::now());

        match self.targets.publish(&artifacts) {
            Ok(()) => info!("Render complete."),
            Err(e) => error!("publish failed: {e}"),
        }

        self.tooltips = Some(artifacts.forecast.map(|cell| cell.tooltip));
    }

    fn on_event(&mut self, event: KioskEvent) {
        match event {
            KioskEvent::Interaction => {
                self.idle
                    .on_interaction(&mut self.timers, self.targets.as_mut())
            }
            KioskEvent::Pointer { x, y } => {
                self.idle.on_interaction(&mut self.timers, self.targets.as_mut());
                self.hover(x, y);
            }
            KioskEvent::OpenSetup => {
                let prefill = self
                    .gate
                    .current()
                    .map(|c| SetupPrefill {
                        api_key: c.api_key.clone(),
                        zip_code: self.settings.get(keys::ZIP_CODE).unwrap_or_default(),
                    })
                    .unwrap_or_default();
                info!("Opening setup.");
                self.setup.open(prefill);
            }
            KioskEvent::SetupSubmitted { submission, reply } => {
                let geocoder = self.gate.geocoder();
                let tx = self.completions_tx.clone();
                tokio::spawn(async move {
                    let result = gate::resolve(geocoder.as_ref(), submission).await;
                    let _ = tx.send(Completion::Setup { result, reply });
                });
            }
            KioskEvent::SetupCancelled => info!("setup cancelled"),
            KioskEvent::Shutdown => {}
        }
    }

    fn finish_setup(
        &mut self,
        result: KioskResult<ResolvedSetup>,
        reply: oneshot::Sender<KioskResult<SubmitOutcome>>,
    ) {
        let outcome =
            result.and_then(|resolved| self.gate.accept(self.settings.as_mut(), resolved));

        match &outcome {
            Ok(accepted) => {
                self.scheduler.configure(accepted.credentials.clone());
                if accepted.changed {
                    self.start_cycle();
                }
            }
            Err(e) => warn!("setup rejected: {e}"),
        }

        if reply.send(outcome).is_err() {
            warn!("setup form closed before it saw the result");
        }
    }

    fn hover(&mut self, x: i32, y: i32) {
        let text = self
            .tooltips
            .as_ref()
            .zip(forecast_cell_at(x, y))
            .map(|(tips, idx)| tips[idx].as_str());

        if let Err(e) = self.targets.show_tooltip(text) {
            warn!("tooltip update failed: {e}");
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
