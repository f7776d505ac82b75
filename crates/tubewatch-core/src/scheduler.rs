//! The detection scheduler: one task that owns the detector and reacts to
//! navigation, timers and requests.

use std::future::pending;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tubewatch_api::TitleLookup;
use tubewatch_detect::{AdClassifier, AdWatchHook, PageReader};

use crate::ad_watch::AdWatch;
use crate::config::Timings;
use crate::debug_log::{DebugEvent, SharedEventLog, SkipReason};
use crate::detection::{Detector, PassOutcome, PendingLookup};
use crate::error::CoreError;
use crate::messages::DetectorMessage;
use crate::models::{Identity, VideoRecord};
use crate::notify::Notifier;

/// What the scheduler is currently waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    /// A detection pass is armed.
    Debouncing,
    /// A title lookup is in flight.
    Detecting,
    /// Polling for an ad to finish.
    AdWatching,
}

enum Command {
    Navigated,
    CurrentVideo {
        reply: oneshot::Sender<Option<VideoRecord>>,
    },
    Shutdown,
}

/// Cloneable handle to a running scheduler.
#[derive(Clone)]
pub struct DetectorHandle {
    tx: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SchedulerState>,
    notifier: Notifier,
    events: SharedEventLog,
}

impl DetectorHandle {
    /// Report an in-app navigation.
    pub fn navigated(&self) {
        let _ = self.tx.send(Command::Navigated);
    }

    /// The current record (`GET_CURRENT_VIDEO`).
    pub async fn current_video(&self) -> Result<Option<VideoRecord>, CoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::CurrentVideo { reply })
            .map_err(|_| CoreError::Stopped)?;
        rx.await.map_err(|_| CoreError::Stopped)
    }

    /// Answer an inbound message; only requests produce a reply.
    pub async fn handle_message(
        &self,
        message: DetectorMessage,
    ) -> Result<Option<DetectorMessage>, CoreError> {
        match message {
            DetectorMessage::GetCurrentVideo => {
                Ok(Some(DetectorMessage::response(self.current_video().await?)))
            }
            _ => Ok(None),
        }
    }

    /// Receive every `VIDEO_DETECTED` message from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DetectorMessage> {
        self.notifier.subscribe()
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn watch_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    pub fn events(&self) -> &SharedEventLog {
        &self.events
    }

    /// Stop the scheduler, cancelling every timer and any in-flight lookup.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }
}

struct InFlight {
    pending: PendingLookup,
    handle: JoinHandle<Option<Identity>>,
}

struct Scheduler<L> {
    detector: Detector<L>,
    page: Arc<dyn PageReader>,
    timings: Timings,
    classifier: AdClassifier,
    ad_watch: Arc<AdWatch>,
    rx: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<SchedulerState>,
    last_url: String,
    debounce: Option<Instant>,
    ad_poll: Option<Interval>,
    ad_ceiling: Option<Instant>,
    settle: Option<Instant>,
    in_flight: Option<InFlight>,
}

/// Start the scheduler on the current tokio runtime.
///
/// A first pass is armed straight away for the page as it is now.
pub fn spawn<L: TitleLookup + 'static>(
    detector: Detector<L>,
    page: Arc<dyn PageReader>,
    timings: Timings,
) -> (DetectorHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);

    let handle = DetectorHandle {
        tx,
        state: state_rx,
        notifier: detector.notifier().clone(),
        events: Arc::clone(detector.events()),
    };

    let scheduler = Scheduler {
        classifier: detector.identity().durations().classifier().clone(),
        ad_watch: Arc::clone(detector.identity().ad_watch()),
        last_url: page.current_url(),
        detector,
        page,
        timings,
        rx,
        state_tx,
        debounce: None,
        ad_poll: None,
        ad_ceiling: None,
        settle: None,
        in_flight: None,
    };

    (handle, tokio::spawn(scheduler.run()))
}

impl<L: TitleLookup + 'static> Scheduler<L> {
    async fn run(mut self) {
        info!(url = %self.last_url, "Detector started");
        let period = self.timings.url_poll;
        let mut url_poll = interval_at(Instant::now() + period, period);
        url_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.arm_debounce();

        loop {
            self.publish_state();
            tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    Some(Command::Navigated) => {
                        self.last_url = self.page.current_url();
                        self.on_navigation();
                    }
                    Some(Command::CurrentVideo { reply }) => {
                        let _ = reply.send(self.detector.current().cloned());
                    }
                    Some(Command::Shutdown) | None => break,
                },
                _ = url_poll.tick() => {
                    let url = self.page.current_url();
                    if url != self.last_url {
                        self.last_url = url;
                        self.on_navigation();
                    }
                }
                _ = sleep_opt(self.debounce), if self.in_flight.is_none() => {
                    self.debounce = None;
                    self.start_pass();
                }
                joined = join_opt(&mut self.in_flight) => self.finish_lookup(joined),
                _ = tick_opt(&mut self.ad_poll) => self.check_ad(),
                _ = sleep_opt(self.settle) => {
                    self.settle = None;
                    debug!("Player settled after ad");
                    self.arm_debounce();
                }
                _ = sleep_opt(self.ad_ceiling) => self.expire_ad_watch(),
            }
        }

        self.teardown();
    }

    fn on_navigation(&mut self) {
        debug!(url = %self.last_url, "Navigation");
        self.log(DebugEvent::Navigation {
            url: self.last_url.clone(),
        });
        self.arm_debounce();
    }

    fn arm_debounce(&mut self) {
        self.debounce = Some(Instant::now() + self.timings.debounce);
    }

    fn start_pass(&mut self) {
        let now = Instant::now();
        match self.detector.plan(self.page.as_ref(), now) {
            PassOutcome::Skipped(SkipReason::RateLimited) => {
                // Keep the navigation: run once the gate opens.
                if let Some(wait) = self.detector.rate_gate_remaining(now) {
                    self.debounce = Some(now + wait);
                }
            }
            PassOutcome::Lookup(pending) => {
                let identity = Arc::clone(self.detector.identity());
                let page = Arc::clone(&self.page);
                let video_id = pending.video_id.clone();
                let handle = tokio::spawn(async move {
                    identity.resolve_identity(page.as_ref(), &video_id).await
                });
                self.in_flight = Some(InFlight { pending, handle });
            }
            _ => self.after_pass(),
        }
    }

    fn finish_lookup(&mut self, joined: Result<Option<Identity>, JoinError>) {
        let Some(in_flight) = self.in_flight.take() else {
            return;
        };
        let identity = joined.unwrap_or_else(|e| {
            warn!(error = %e, "Identity task failed");
            None
        });
        self.detector
            .apply(self.page.as_ref(), in_flight.pending, identity, Instant::now());
        self.after_pass();
    }

    /// Enter ad watching when the pass left the ad watch armed.
    fn after_pass(&mut self) {
        if !self.ad_watch.is_active() || self.ad_poll.is_some() || self.settle.is_some() {
            return;
        }
        let now = Instant::now();
        let period = self.timings.ad_poll;
        let mut poll = interval_at(now + period, period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ad_poll = Some(poll);
        self.ad_ceiling = Some(now + self.timings.ad_ceiling);

        let signal = self.classifier.classify(self.page.as_ref());
        info!(?signal, "Waiting for ad to finish");
        self.log(DebugEvent::AdWatchArmed { signal });
    }

    fn check_ad(&mut self) {
        if self.classifier.is_ad_active(self.page.as_ref()) {
            debug!("Ad still playing");
            return;
        }
        info!("Ad finished, re-detecting");
        self.stop_ad_watch();
        self.settle = Some(Instant::now() + self.timings.ad_settle);
        self.log(DebugEvent::AdWatchCleared);
    }

    fn expire_ad_watch(&mut self) {
        warn!("Ad watch ceiling reached, giving up");
        self.stop_ad_watch();
        self.log(DebugEvent::AdWatchExpired);
    }

    fn stop_ad_watch(&mut self) {
        self.ad_poll = None;
        self.ad_ceiling = None;
        self.ad_watch.clear();
    }

    fn state(&self) -> SchedulerState {
        if self.in_flight.is_some() {
            SchedulerState::Detecting
        } else if self.ad_poll.is_some() || self.settle.is_some() {
            SchedulerState::AdWatching
        } else if self.debounce.is_some() {
            SchedulerState::Debouncing
        } else {
            SchedulerState::Idle
        }
    }

    fn publish_state(&self) {
        let next = self.state();
        self.state_tx.send_if_modified(|state| {
            let changed = *state != next;
            *state = next;
            changed
        });
    }

    fn teardown(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.handle.abort();
        }
        self.debounce = None;
        self.settle = None;
        self.stop_ad_watch();
        self.publish_state();
        info!("Detector stopped");
    }

    fn log(&self, event: DebugEvent) {
        self.detector
            .events()
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

async fn sleep_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

async fn tick_opt(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

async fn join_opt(in_flight: &mut Option<InFlight>) -> Result<Option<Identity>, JoinError> {
    match in_flight {
        Some(in_flight) => (&mut in_flight.handle).await,
        None => pending().await,
    }
}
