//! Platform location capability
//!
//! The stream only talks to the platform through [`LocationProvider`]. Fixes
//! are pushed into an unbounded channel handed over at subscription time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::core::types::LocationFix;

/// OS authorization for location access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionState {
    NotDetermined,
    Granted,
    Denied,
    Restricted,
}

/// Positioning mode requested from the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccuracyMode {
    /// Full GPS accuracy
    Precise,
    /// Cell/Wi-Fi positioning, used while the signal is degraded
    Coarse,
}

/// Identifies one active subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub Uuid);

impl SubscriptionHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Source of raw location fixes
pub trait LocationProvider: Send + 'static {
    fn permission_state(&self) -> PermissionState;

    /// Ask the user for access. Returns the state after the prompt.
    fn request_permission(&mut self) -> PermissionState;

    fn services_enabled(&self) -> bool;

    fn set_accuracy_mode(&mut self, mode: AccuracyMode);

    /// Start delivering fixes into `sink` until unsubscribed
    fn subscribe(&mut self, sink: UnboundedSender<LocationFix>) -> SubscriptionHandle;

    fn unsubscribe(&mut self, handle: SubscriptionHandle);
}

/// One scripted fix, delivered `delay` after the previous one
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScriptedFix {
    #[serde(with = "millis")]
    pub delay: Duration,
    pub fix: LocationFix,
}

impl ScriptedFix {
    pub fn new(delay: Duration, fix: LocationFix) -> Self {
        Self { delay, fix }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Observable side of a [`ScriptedProvider`], kept after the provider moves
/// into a stream
#[derive(Debug, Clone, Default)]
pub struct ProviderProbe {
    subscribes: Arc<AtomicUsize>,
    unsubscribes: Arc<AtomicUsize>,
    delivered: Arc<AtomicUsize>,
    modes: Arc<Mutex<Vec<AccuracyMode>>>,
}

impl ProviderProbe {
    pub fn subscribe_count(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_count(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    /// Fixes handed to a sink so far
    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }

    /// Every mode change requested, in order
    pub fn mode_changes(&self) -> Vec<AccuracyMode> {
        self.modes.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

/// Deterministic provider replaying a fixed track on a tokio task.
///
/// The script is consumed once across subscriptions: resubscribing resumes
/// after the last delivered fix. `subscribe` must run inside a tokio runtime.
#[derive(Debug)]
pub struct ScriptedProvider {
    script: Arc<Vec<ScriptedFix>>,
    cursor: Arc<AtomicUsize>,
    permission: PermissionState,
    on_request: PermissionState,
    services_enabled: bool,
    mode: AccuracyMode,
    tasks: HashMap<SubscriptionHandle, JoinHandle<()>>,
    probe: ProviderProbe,
}

impl ScriptedProvider {
    /// Permission already granted, services on
    pub fn new(script: Vec<ScriptedFix>) -> Self {
        Self {
            script: Arc::new(script),
            cursor: Arc::new(AtomicUsize::new(0)),
            permission: PermissionState::Granted,
            on_request: PermissionState::Granted,
            services_enabled: true,
            mode: AccuracyMode::Precise,
            tasks: HashMap::new(),
            probe: ProviderProbe::default(),
        }
    }

    /// Every fix `interval` apart
    pub fn evenly_spaced(fixes: impl IntoIterator<Item = LocationFix>, interval: Duration) -> Self {
        Self::new(fixes.into_iter().map(|fix| ScriptedFix::new(interval, fix)).collect())
    }

    /// Never delivers anything
    pub fn silent() -> Self {
        Self::new(Vec::new())
    }

    pub fn with_permission(mut self, current: PermissionState, on_request: PermissionState) -> Self {
        self.permission = current;
        self.on_request = on_request;
        self
    }

    pub fn with_services_enabled(mut self, enabled: bool) -> Self {
        self.services_enabled = enabled;
        self
    }

    pub fn probe(&self) -> ProviderProbe {
        self.probe.clone()
    }

    pub fn accuracy_mode(&self) -> AccuracyMode {
        self.mode
    }

    pub fn remaining(&self) -> usize {
        self.script.len().saturating_sub(self.cursor.load(Ordering::SeqCst))
    }

    pub fn active_subscriptions(&self) -> usize {
        self.tasks.len()
    }
}

impl LocationProvider for ScriptedProvider {
    fn permission_state(&self) -> PermissionState {
        self.permission
    }

    fn request_permission(&mut self) -> PermissionState {
        if self.permission == PermissionState::NotDetermined {
            self.permission = self.on_request;
        }
        self.permission
    }

    fn services_enabled(&self) -> bool {
        self.services_enabled
    }

    fn set_accuracy_mode(&mut self, mode: AccuracyMode) {
        self.mode = mode;
        if let Ok(mut modes) = self.probe.modes.lock() {
            modes.push(mode);
        }
    }

    fn subscribe(&mut self, sink: UnboundedSender<LocationFix>) -> SubscriptionHandle {
        let handle = SubscriptionHandle::new();
        let script = Arc::clone(&self.script);
        let cursor = Arc::clone(&self.cursor);
        let delivered = Arc::clone(&self.probe.delivered);

        let task = tokio::spawn(async move {
            loop {
                let index = cursor.load(Ordering::SeqCst);
                let Some(next) = script.get(index) else { break };
                tokio::time::sleep(next.delay).await;
                cursor.store(index + 1, Ordering::SeqCst);
                if sink.send(next.fix).is_err() {
                    break;
                }
                delivered.fetch_add(1, Ordering::SeqCst);
            }
        });

        self.probe.subscribes.fetch_add(1, Ordering::SeqCst);
        self.tasks.insert(handle, task);
        handle
    }

    fn unsubscribe(&mut self, handle: SubscriptionHandle) {
        if let Some(task) = self.tasks.remove(&handle) {
            task.abort();
            self.probe.unsubscribes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Drop for ScriptedProvider {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn fix(i: i64) -> LocationFix {
        LocationFix::new(34.0 + i as f64 * 0.001, -118.0, 5.0, i)
    }

    #[test]
    fn test_permission_request() {
        let mut provider =
            ScriptedProvider::silent().with_permission(PermissionState::NotDetermined, PermissionState::Denied);
        assert_eq!(provider.permission_state(), PermissionState::NotDetermined);
        assert_eq!(provider.request_permission(), PermissionState::Denied);
        // Asking again does not re-prompt
        assert_eq!(provider.request_permission(), PermissionState::Denied);
    }

    #[test]
    fn test_mode_changes_are_recorded() {
        let mut provider = ScriptedProvider::silent();
        let probe = provider.probe();
        provider.set_accuracy_mode(AccuracyMode::Coarse);
        provider.set_accuracy_mode(AccuracyMode::Precise);
        assert_eq!(probe.mode_changes(), vec![AccuracyMode::Coarse, AccuracyMode::Precise]);
        assert_eq!(provider.accuracy_mode(), AccuracyMode::Precise);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replays_script_in_order() {
        let mut provider = ScriptedProvider::evenly_spaced((0..3).map(fix), Duration::from_secs(1));
        let (tx, mut rx) = mpsc::unbounded_channel();
        provider.subscribe(tx);

        for i in 0..3 {
            assert_eq!(rx.recv().await, Some(fix(i)));
        }
        assert_eq!(provider.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubscribe_resumes_script() {
        let mut provider = ScriptedProvider::evenly_spaced((0..4).map(fix), Duration::from_secs(1));
        let probe = provider.probe();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = provider.subscribe(tx);
        assert_eq!(rx.recv().await, Some(fix(0)));
        provider.unsubscribe(handle);
        assert_eq!(provider.active_subscriptions(), 0);

        let (tx, mut rx) = mpsc::unbounded_channel();
        provider.subscribe(tx);
        assert_eq!(rx.recv().await, Some(fix(1)));
        assert_eq!(probe.subscribe_count(), 2);
        assert_eq!(probe.unsubscribe_count(), 1);
    }

    #[test]
    fn test_scripted_fix_json() {
        let parsed: ScriptedFix = serde_json::from_str(
            r#"{"delay":250,"fix":{"lat":1.0,"lon":2.0,"horizontal_accuracy_m":5.0,"timestamp_ms":7}}"#,
        )
        .unwrap();
        assert_eq!(parsed.delay, Duration::from_millis(250));
        assert_eq!(parsed.fix.timestamp_ms, 7);
    }
}
