//! Retry/backoff state machine for the location stream
//!
//! Pure bookkeeping: no timers or I/O here. The stream driver feeds it
//! accepted fixes, rejections and timer expiries, and acts on the returned
//! transitions.
//!
//! ```text
//! Idle → AwaitingPermission → Active ⇄ Degraded → Failed
//!                               ↑__________________|   (any accepted fix)
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::LocationError;
use super::filter::RejectReason;
use crate::core::config::LocationConfig;

/// Stream lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamState {
    Idle,
    AwaitingPermission,
    Active,
    Degraded,
    Failed,
}

/// Exponential backoff: initial × 2^attempt, capped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    pub fn from_config(config: &LocationConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

/// What the driver has to do after feeding the tracker
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Nothing changed
    Stay,
    /// Active → Degraded: relax the filter and switch to coarse positioning
    Degraded,
    /// Still degraded; retry the provider and wait `next_delay`
    Retry { attempt: u32, next_delay: Duration },
    /// Retry budget spent; surface this error
    Failed(LocationError),
    /// Back to Active from Degraded/Failed
    Recovered { from: StreamState, error_cleared: bool },
}

/// Counters and state for the retry policy
#[derive(Debug, Clone)]
pub struct RetryTracker {
    state: StreamState,
    policy: BackoffPolicy,
    degrade_after: u32,
    max_retries: u32,
    consecutive_rejections: u32,
    retries: u32,
    last_rejection: Option<RejectReason>,
    error_surfaced: bool,
    accepted: u64,
    rejected: u64,
    missing: u64,
}

impl RetryTracker {
    pub fn new(config: &LocationConfig) -> Self {
        Self {
            state: StreamState::Idle,
            policy: BackoffPolicy::from_config(config),
            degrade_after: config.degrade_after_rejections.max(1),
            max_retries: config.max_retries,
            consecutive_rejections: 0,
            retries: 0,
            last_rejection: None,
            error_surfaced: false,
            accepted: 0,
            rejected: 0,
            missing: 0,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Relaxed threshold applies until a fix gets through again
    pub fn is_relaxed(&self) -> bool {
        matches!(self.state, StreamState::Degraded | StreamState::Failed)
    }

    pub fn consecutive_rejections(&self) -> u32 {
        self.consecutive_rejections
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn missing(&self) -> u64 {
        self.missing
    }

    pub fn error_surfaced(&self) -> bool {
        self.error_surfaced
    }

    pub fn await_permission(&mut self) {
        self.state = StreamState::AwaitingPermission;
    }

    /// Permission granted and subscribed
    pub fn activate(&mut self) {
        self.state = StreamState::Active;
        self.consecutive_rejections = 0;
        self.retries = 0;
    }

    /// Permission or services failure; the error goes out immediately
    pub fn fail(&mut self) {
        self.state = StreamState::Failed;
        self.error_surfaced = true;
    }

    pub fn stop(&mut self) {
        self.state = StreamState::Idle;
        self.consecutive_rejections = 0;
        self.retries = 0;
        self.error_surfaced = false;
    }

    /// How long the driver should wait before calling
    /// [`RetryTracker::record_timeout`]
    pub fn current_timeout(&self, fix_timeout: Duration) -> Option<Duration> {
        match self.state {
            StreamState::Active => Some(fix_timeout),
            StreamState::Degraded => Some(self.policy.delay(self.retries)),
            _ => None,
        }
    }

    pub fn record_accepted(&mut self) -> Transition {
        self.accepted += 1;
        self.consecutive_rejections = 0;
        self.retries = 0;
        self.last_rejection = None;

        match self.state {
            StreamState::Degraded | StreamState::Failed => {
                let from = self.state;
                let error_cleared = self.error_surfaced;
                self.state = StreamState::Active;
                self.error_surfaced = false;
                Transition::Recovered { from, error_cleared }
            }
            _ => Transition::Stay,
        }
    }

    /// A filtered fix. Counts toward degradation while Active.
    pub fn record_rejection(&mut self, reason: RejectReason) -> Transition {
        if reason == RejectReason::Missing {
            self.missing += 1;
        } else {
            self.rejected += 1;
        }
        self.consecutive_rejections = self.consecutive_rejections.saturating_add(1);
        self.last_rejection = Some(reason);

        if self.state == StreamState::Active && self.consecutive_rejections >= self.degrade_after {
            self.state = StreamState::Degraded;
            self.retries = 0;
            return Transition::Degraded;
        }
        Transition::Stay
    }

    /// The current timeout elapsed with no accepted fix
    pub fn record_timeout(&mut self) -> Transition {
        match self.state {
            StreamState::Active => self.record_rejection(RejectReason::Missing),
            StreamState::Degraded => {
                self.retries += 1;
                if self.retries > self.max_retries {
                    self.state = StreamState::Failed;
                    self.error_surfaced = true;
                    Transition::Failed(self.failure_error())
                } else {
                    Transition::Retry {
                        attempt: self.retries,
                        next_delay: self.policy.delay(self.retries),
                    }
                }
            }
            _ => Transition::Stay,
        }
    }

    fn failure_error(&self) -> LocationError {
        match self.last_rejection {
            Some(RejectReason::TooInaccurate { accuracy_m, threshold_m }) => {
                LocationError::AccuracyTooLow { accuracy_m, threshold_m }
            }
            _ => LocationError::LocationUnavailable {
                attempts: self.retries.saturating_sub(1),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> RetryTracker {
        let mut t = RetryTracker::new(&LocationConfig::default());
        t.activate();
        t
    }

    fn too_inaccurate() -> RejectReason {
        RejectReason::TooInaccurate {
            accuracy_m: 600.0,
            threshold_m: 500.0,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = BackoffPolicy::from_config(&LocationConfig::default());
        let secs: Vec<u64> = (0..8).map(|a| policy.delay(a).as_secs()).collect();
        assert_eq!(secs, vec![1, 2, 4, 8, 16, 30, 30, 30]);
        assert_eq!(policy.delay(200), Duration::from_secs(30));
    }

    #[test]
    fn test_degrades_after_consecutive_rejections() {
        let mut t = tracker();
        for _ in 0..4 {
            assert_eq!(t.record_rejection(too_inaccurate()), Transition::Stay);
        }
        assert_eq!(t.record_rejection(too_inaccurate()), Transition::Degraded);
        assert_eq!(t.state(), StreamState::Degraded);
        assert!(t.is_relaxed());
    }

    #[test]
    fn test_accepted_fix_resets_counter() {
        let mut t = tracker();
        for _ in 0..4 {
            t.record_rejection(RejectReason::NegativeAccuracy);
        }
        assert_eq!(t.record_accepted(), Transition::Stay);
        assert_eq!(t.consecutive_rejections(), 0);
        for _ in 0..4 {
            assert_eq!(t.record_rejection(RejectReason::NegativeAccuracy), Transition::Stay);
        }
        assert_eq!(t.state(), StreamState::Active);
    }

    #[test]
    fn test_missing_fixes_count_as_rejections() {
        let mut t = tracker();
        for _ in 0..4 {
            t.record_timeout();
        }
        assert_eq!(t.record_timeout(), Transition::Degraded);
        assert_eq!(t.missing(), 5);
        assert_eq!(t.rejected(), 0);
    }

    #[test]
    fn test_retry_budget_then_failure() {
        let mut t = tracker();
        for _ in 0..5 {
            t.record_rejection(too_inaccurate());
        }
        assert_eq!(t.current_timeout(Duration::from_secs(10)), Some(Duration::from_secs(1)));

        for attempt in 1..=6 {
            match t.record_timeout() {
                Transition::Retry { attempt: a, .. } => assert_eq!(a, attempt),
                other => panic!("expected retry, got {:?}", other),
            }
        }
        assert_eq!(
            t.record_timeout(),
            Transition::Failed(LocationError::AccuracyTooLow {
                accuracy_m: 600.0,
                threshold_m: 500.0
            })
        );
        assert_eq!(t.state(), StreamState::Failed);
        assert_eq!(t.current_timeout(Duration::from_secs(10)), None);
    }

    #[test]
    fn test_silence_fails_as_unavailable() {
        let mut t = RetryTracker::new(&LocationConfig {
            degrade_after_rejections: 1,
            max_retries: 1,
            ..LocationConfig::default()
        });
        t.activate();
        assert_eq!(t.record_timeout(), Transition::Degraded);
        assert!(matches!(t.record_timeout(), Transition::Retry { attempt: 1, .. }));
        assert_eq!(
            t.record_timeout(),
            Transition::Failed(LocationError::LocationUnavailable { attempts: 1 })
        );
    }

    #[test]
    fn test_recovery_clears_error() {
        let mut t = RetryTracker::new(&LocationConfig {
            degrade_after_rejections: 1,
            max_retries: 0,
            ..LocationConfig::default()
        });
        t.activate();
        t.record_timeout();
        assert!(matches!(t.record_timeout(), Transition::Failed(_)));
        assert!(t.error_surfaced());

        assert_eq!(
            t.record_accepted(),
            Transition::Recovered {
                from: StreamState::Failed,
                error_cleared: true
            }
        );
        assert_eq!(t.state(), StreamState::Active);
        assert!(!t.is_relaxed());
    }

    #[test]
    fn test_recovery_from_degraded_without_error() {
        let mut t = tracker();
        for _ in 0..5 {
            t.record_rejection(too_inaccurate());
        }
        assert_eq!(
            t.record_accepted(),
            Transition::Recovered {
                from: StreamState::Degraded,
                error_cleared: false
            }
        );
    }

    #[test]
    fn test_rejections_while_degraded_do_not_advance_retries() {
        let mut t = tracker();
        for _ in 0..10 {
            t.record_rejection(too_inaccurate());
        }
        assert_eq!(t.state(), StreamState::Degraded);
        assert_eq!(t.retries(), 0);
        assert_eq!(t.rejected(), 10);
    }
}
