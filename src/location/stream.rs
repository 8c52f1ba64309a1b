//! Location stream: accuracy-filtered positions with retry/backoff
//!
//! A single driver task owns the provider while the stream runs. It filters
//! every raw fix, feeds the [`RetryTracker`], and pushes [`StreamEvent`]s onto
//! one ordered channel read through [`LocationStream::next_event`].

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::backoff::{RetryTracker, StreamState, Transition};
use super::error::LocationError;
use super::filter::{AccuracyFilter, FixVerdict};
use super::provider::{AccuracyMode, LocationProvider, PermissionState, SubscriptionHandle};
use crate::core::config::LocationConfig;
use crate::core::types::{LocationFix, Position};

/// Everything the stream reports, in delivery order
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Position(Position),
    StateChanged { from: StreamState, to: StreamState },
    Error(LocationError),
    /// A previously surfaced error no longer applies
    ErrorCleared,
}

/// Latest counters, readable at any time without consuming events
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StreamStatus {
    pub state: StreamState,
    pub accepted: u64,
    pub rejected: u64,
    pub missing: u64,
    pub consecutive_rejections: u32,
    pub retries: u32,
}

impl StreamStatus {
    fn idle() -> Self {
        Self {
            state: StreamState::Idle,
            accepted: 0,
            rejected: 0,
            missing: 0,
            consecutive_rejections: 0,
            retries: 0,
        }
    }

    fn from_tracker(tracker: &RetryTracker) -> Self {
        Self {
            state: tracker.state(),
            accepted: tracker.accepted(),
            rejected: tracker.rejected(),
            missing: tracker.missing(),
            consecutive_rejections: tracker.consecutive_rejections(),
            retries: tracker.retries(),
        }
    }
}

struct RunningDriver<P> {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<P>,
}

/// Accuracy-filtered position stream over a [`LocationProvider`]
pub struct LocationStream<P: LocationProvider> {
    config: LocationConfig,
    provider: Option<P>,
    driver: Option<RunningDriver<P>>,
    events: Option<mpsc::UnboundedReceiver<StreamEvent>>,
    status_tx: Arc<watch::Sender<StreamStatus>>,
    status_rx: watch::Receiver<StreamStatus>,
}

impl<P: LocationProvider> LocationStream<P> {
    pub fn new(provider: P, config: LocationConfig) -> Self {
        let (status_tx, status_rx) = watch::channel(StreamStatus::idle());
        Self {
            config,
            provider: Some(provider),
            driver: None,
            events: None,
            status_tx: Arc::new(status_tx),
            status_rx,
        }
    }

    pub fn config(&self) -> &LocationConfig {
        &self.config
    }

    pub fn state(&self) -> StreamState {
        self.status_rx.borrow().state
    }

    pub fn status(&self) -> StreamStatus {
        *self.status_rx.borrow()
    }

    /// Receiver that sees every status update
    pub fn watch_status(&self) -> watch::Receiver<StreamStatus> {
        self.status_rx.clone()
    }

    pub fn is_running(&self) -> bool {
        self.driver.is_some()
    }

    /// Provider access while the stream is not running
    pub fn provider(&self) -> Option<&P> {
        self.provider.as_ref()
    }

    /// Permission handshake, then spawn the driver.
    ///
    /// Permission and services failures are delivered as events and leave
    /// the stream in `Failed` without a driver. Calling this while running is
    /// a no-op. Must be called inside a tokio runtime.
    pub fn start(&mut self) -> StreamState {
        if self.driver.is_some() {
            return self.state();
        }
        let Some(mut provider) = self.provider.take() else {
            return self.state();
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.events = Some(events_rx);

        let mut tracker = RetryTracker::new(&self.config);
        let from = tracker.state();
        tracker.await_permission();
        let _ = events_tx.send(StreamEvent::StateChanged {
            from,
            to: StreamState::AwaitingPermission,
        });
        self.status_tx.send_replace(StreamStatus::from_tracker(&tracker));

        if let Err(err) = check_access(&mut provider) {
            tracing::warn!("Location stream cannot start: {}", err);
            tracker.fail();
            let _ = events_tx.send(StreamEvent::StateChanged {
                from: StreamState::AwaitingPermission,
                to: StreamState::Failed,
            });
            let _ = events_tx.send(StreamEvent::Error(err));
            self.status_tx.send_replace(StreamStatus::from_tracker(&tracker));
            self.provider = Some(provider);
            return StreamState::Failed;
        }

        provider.set_accuracy_mode(AccuracyMode::Precise);
        tracker.activate();
        let _ = events_tx.send(StreamEvent::StateChanged {
            from: StreamState::AwaitingPermission,
            to: StreamState::Active,
        });
        self.status_tx.send_replace(StreamStatus::from_tracker(&tracker));
        tracing::info!("Location stream active");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let driver = Driver {
            provider,
            tracker,
            filter: AccuracyFilter::new(&self.config),
            fix_timeout: Duration::from_millis(self.config.fix_timeout_ms),
            events: events_tx,
            status: Arc::clone(&self.status_tx),
            subscription: None,
        };
        self.driver = Some(RunningDriver {
            shutdown: shutdown_tx,
            handle: tokio::spawn(driver.run(shutdown_rx)),
        });
        StreamState::Active
    }

    /// Next event in order. `None` once stopped, or after a failed start has
    /// been fully drained.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.as_mut()?.recv().await
    }

    /// Already-queued event, without waiting
    pub fn try_next_event(&mut self) -> Option<StreamEvent> {
        self.events.as_mut()?.try_recv().ok()
    }

    /// Stop the driver and drop anything not yet delivered.
    ///
    /// When this returns the provider is unsubscribed, pending backoff timers
    /// are gone and no further event will be yielded. Idempotent.
    pub async fn stop(&mut self) {
        self.events = None;

        if let Some(running) = self.driver.take() {
            let _ = running.shutdown.send(());
            match running.handle.await {
                Ok(provider) => self.provider = Some(provider),
                Err(e) => tracing::error!("Location driver ended abnormally: {}", e),
            }
            tracing::info!("Location stream stopped");
        }

        let from = self.state();
        if from != StreamState::Idle {
            tracing::debug!("Stream {:?} -> Idle", from);
        }
        self.status_tx.send_replace(StreamStatus::idle());
    }
}

impl<P: LocationProvider> Drop for LocationStream<P> {
    fn drop(&mut self) {
        if let Some(running) = self.driver.take() {
            running.handle.abort();
        }
    }
}

fn check_access<P: LocationProvider>(provider: &mut P) -> Result<(), LocationError> {
    let permission = match provider.permission_state() {
        PermissionState::NotDetermined => provider.request_permission(),
        state => state,
    };
    match permission {
        PermissionState::Granted => {}
        PermissionState::Restricted => return Err(LocationError::PermissionRestricted),
        PermissionState::Denied | PermissionState::NotDetermined => return Err(LocationError::PermissionDenied),
    }
    if !provider.services_enabled() {
        return Err(LocationError::LocationServicesDisabled);
    }
    Ok(())
}

struct Driver<P> {
    provider: P,
    tracker: RetryTracker,
    filter: AccuracyFilter,
    fix_timeout: Duration,
    events: mpsc::UnboundedSender<StreamEvent>,
    status: Arc<watch::Sender<StreamStatus>>,
    subscription: Option<SubscriptionHandle>,
}

impl<P: LocationProvider> Driver<P> {
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) -> P {
        let (fix_tx, mut fix_rx) = mpsc::unbounded_channel();
        self.subscription = Some(self.provider.subscribe(fix_tx.clone()));
        let mut deadline = self.next_deadline();

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                Some(fix) = fix_rx.recv() => {
                    let was_degraded = self.tracker.state() == StreamState::Degraded;
                    let changed = self.on_fix(fix);
                    // While degraded the backoff clock keeps running across
                    // rejected fixes
                    if changed || !was_degraded {
                        deadline = self.next_deadline();
                    }
                }
                _ = wait_until(deadline) => {
                    self.on_timeout(&fix_tx);
                    deadline = self.next_deadline();
                }
            }
            self.status.send_replace(StreamStatus::from_tracker(&self.tracker));
        }

        if let Some(handle) = self.subscription.take() {
            self.provider.unsubscribe(handle);
        }
        self.provider
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.tracker
            .current_timeout(self.fix_timeout)
            .map(|timeout| Instant::now() + timeout)
    }

    /// Returns whether the stream state changed
    fn on_fix(&mut self, fix: LocationFix) -> bool {
        let relaxed = self.tracker.is_relaxed();
        match self.filter.evaluate(&fix, relaxed) {
            FixVerdict::Accepted(position) => {
                let transition = self.tracker.record_accepted();
                let changed = self.apply(transition);
                tracing::trace!(
                    "Accepted fix ({:.5}, {:.5}) ±{:.0} m",
                    position.coordinate.lat,
                    position.coordinate.lon,
                    position.horizontal_accuracy_m
                );
                self.emit(StreamEvent::Position(position));
                changed
            }
            FixVerdict::Rejected(reason) => {
                tracing::debug!("Rejected fix: {:?}", reason);
                let transition = self.tracker.record_rejection(reason);
                self.apply(transition)
            }
        }
    }

    fn on_timeout(&mut self, sink: &mpsc::UnboundedSender<LocationFix>) {
        let transition = self.tracker.record_timeout();
        if let Transition::Retry { attempt, next_delay } = transition {
            tracing::debug!("Retry {} (next in {:?}), resubscribing", attempt, next_delay);
            if let Some(handle) = self.subscription.take() {
                self.provider.unsubscribe(handle);
            }
            self.subscription = Some(self.provider.subscribe(sink.clone()));
            return;
        }
        self.apply(transition);
    }

    fn apply(&mut self, transition: Transition) -> bool {
        match transition {
            Transition::Stay | Transition::Retry { .. } => false,
            Transition::Degraded => {
                tracing::warn!(
                    "Signal degraded after {} rejections, relaxing to {:.0} m",
                    self.tracker.consecutive_rejections(),
                    self.filter.relaxed_threshold_m
                );
                self.provider.set_accuracy_mode(AccuracyMode::Coarse);
                self.emit(StreamEvent::StateChanged {
                    from: StreamState::Active,
                    to: StreamState::Degraded,
                });
                true
            }
            Transition::Failed(err) => {
                tracing::warn!("Retry budget exhausted: {}", err);
                self.emit(StreamEvent::StateChanged {
                    from: StreamState::Degraded,
                    to: StreamState::Failed,
                });
                self.emit(StreamEvent::Error(err));
                true
            }
            Transition::Recovered { from, error_cleared } => {
                tracing::info!("Location recovered from {:?}", from);
                self.provider.set_accuracy_mode(AccuracyMode::Precise);
                self.emit(StreamEvent::StateChanged {
                    from,
                    to: StreamState::Active,
                });
                if error_cleared {
                    self.emit(StreamEvent::ErrorCleared);
                }
                true
            }
        }
    }

    fn emit(&self, event: StreamEvent) {
        // The receiver only goes away during stop(), which also shuts us down
        let _ = self.events.send(event);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
