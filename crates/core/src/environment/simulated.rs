//! In-process host used by the CLI driver and by tests.
//!
//! Values are settable at runtime; setters that correspond to a native change
//! notification fire the installed listeners for that source.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::hardware::{BatteryStatus, TouchIndicators};
use super::reader::{
    ChangeSource, DARK_SCHEME_QUERY, EnvError, EnvironmentReader, IdleHost, IdleRequest,
    Listener, ListenerGuard, ObservedRegion, REDUCED_MOTION_QUERY, ResizeListener, SourceKind,
};
use crate::types::RegionBox;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Listener table shared between a source and the guards it hands out.
struct Registry<L> {
    next_id: u64,
    listeners: HashMap<u64, L>,
}

struct ListenerRegistry<L> {
    inner: Arc<Mutex<Registry<L>>>,
}

impl<L: Clone + Send + 'static> ListenerRegistry<L> {
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: HashMap::new(),
            })),
        }
    }

    fn add(&self, listener: L) -> ListenerGuard {
        let id = {
            let mut reg = lock(&self.inner);
            let id = reg.next_id;
            reg.next_id += 1;
            reg.listeners.insert(id, listener);
            id
        };
        let inner = Arc::clone(&self.inner);
        ListenerGuard::new(move || {
            lock(&inner).listeners.remove(&id);
        })
    }

    fn count(&self) -> usize {
        lock(&self.inner).listeners.len()
    }

    /// Clone listeners out so they run without the lock held.
    fn snapshot(&self) -> Vec<L> {
        lock(&self.inner).listeners.values().cloned().collect()
    }
}

impl<L> Clone for ListenerRegistry<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn all_sources() -> Vec<SourceKind> {
    SourceKind::ALL.to_vec()
}

fn default_true() -> bool {
    true
}

/// Static description of a simulated device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostProfile {
    pub viewport: RegionBox,
    #[serde(default)]
    pub touch: TouchIndicators,
    #[serde(default)]
    pub effective_connection_type: Option<String>,
    #[serde(default)]
    pub device_memory_gb: Option<f64>,
    #[serde(default = "default_true")]
    pub media_queries: bool,
    #[serde(default)]
    pub prefers_dark_scheme: bool,
    #[serde(default)]
    pub prefers_reduced_motion: bool,
    /// `None` when the host has no battery capability.
    #[serde(default)]
    pub battery: Option<BatteryStatus>,
    /// Battery read rejects instead of resolving.
    #[serde(default)]
    pub battery_fails: bool,
    /// Simulated latency of the battery read, in ms.
    #[serde(default)]
    pub battery_delay_ms: u64,
    /// Sources that support change notification.
    #[serde(default = "all_sources")]
    pub change_sources: Vec<SourceKind>,
    /// Sources whose listener install throws.
    #[serde(default)]
    pub failing_sources: Vec<SourceKind>,
}

impl HostProfile {
    /// A host exposing no optional capability at all.
    pub fn bare(width: f64, height: f64) -> Self {
        Self {
            viewport: RegionBox::new(width, height),
            touch: TouchIndicators::default(),
            effective_connection_type: None,
            device_memory_gb: None,
            media_queries: false,
            prefers_dark_scheme: false,
            prefers_reduced_motion: false,
            battery: None,
            battery_fails: false,
            battery_delay_ms: 0,
            change_sources: Vec::new(),
            failing_sources: Vec::new(),
        }
    }

    pub fn desktop() -> Self {
        Self {
            viewport: RegionBox::new(1440.0, 900.0),
            touch: TouchIndicators::default(),
            effective_connection_type: Some("4g".into()),
            device_memory_gb: Some(8.0),
            media_queries: true,
            prefers_dark_scheme: false,
            prefers_reduced_motion: false,
            battery: Some(BatteryStatus { level: 0.8, charging: true }),
            battery_fails: false,
            battery_delay_ms: 0,
            change_sources: all_sources(),
            failing_sources: Vec::new(),
        }
    }

    pub fn low_end_phone() -> Self {
        Self {
            viewport: RegionBox::new(360.0, 740.0),
            touch: TouchIndicators {
                touch_events: true,
                max_touch_points: Some(5),
                legacy_max_touch_points: None,
            },
            effective_connection_type: Some("2g".into()),
            device_memory_gb: Some(2.0),
            media_queries: true,
            prefers_dark_scheme: false,
            prefers_reduced_motion: false,
            battery: Some(BatteryStatus { level: 0.4, charging: false }),
            battery_fails: false,
            battery_delay_ms: 0,
            change_sources: all_sources(),
            failing_sources: Vec::new(),
        }
    }
}

struct SimulatedSource {
    kind: SourceKind,
    registry: ListenerRegistry<Listener>,
    fails: bool,
}

impl ChangeSource for SimulatedSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn install(&self, listener: Listener) -> Result<ListenerGuard, EnvError> {
        if self.fails {
            return Err(EnvError::ListenerInstall {
                kind: self.kind,
                reason: "host rejected listener".into(),
            });
        }
        Ok(self.registry.add(listener))
    }
}

/// Simulated host environment.
#[derive(Clone)]
pub struct SimulatedEnvironment {
    profile: Arc<Mutex<HostProfile>>,
    registries: Arc<HashMap<SourceKind, ListenerRegistry<Listener>>>,
}

impl SimulatedEnvironment {
    pub fn new(profile: HostProfile) -> Self {
        let registries = SourceKind::ALL
            .iter()
            .map(|&kind| (kind, ListenerRegistry::new()))
            .collect();
        Self {
            profile: Arc::new(Mutex::new(profile)),
            registries: Arc::new(registries),
        }
    }

    pub fn profile(&self) -> HostProfile {
        lock(&self.profile).clone()
    }

    /// Installed listeners on one source.
    pub fn listener_count(&self, kind: SourceKind) -> usize {
        self.registries.get(&kind).map_or(0, ListenerRegistry::count)
    }

    pub fn total_listeners(&self) -> usize {
        self.registries.values().map(ListenerRegistry::count).sum()
    }

    /// Fire the listeners of one source without changing any value.
    pub fn emit(&self, kind: SourceKind) {
        let listeners = self
            .registries
            .get(&kind)
            .map(ListenerRegistry::snapshot)
            .unwrap_or_default();
        for listener in listeners {
            listener();
        }
    }

    pub fn set_viewport(&self, width: f64, height: f64) {
        lock(&self.profile).viewport = RegionBox::new(width, height);
        self.emit(SourceKind::Viewport);
    }

    pub fn set_connection_type(&self, effective_type: Option<&str>) {
        lock(&self.profile).effective_connection_type = effective_type.map(str::to_owned);
        self.emit(SourceKind::Network);
    }

    pub fn set_dark_scheme(&self, dark: bool) {
        lock(&self.profile).prefers_dark_scheme = dark;
        self.emit(SourceKind::ColorScheme);
    }

    /// No native notification exists for these; the next pass picks them up.
    pub fn set_device_memory(&self, gb: Option<f64>) {
        lock(&self.profile).device_memory_gb = gb;
    }

    pub fn set_reduced_motion(&self, reduced: bool) {
        lock(&self.profile).prefers_reduced_motion = reduced;
    }

    pub fn set_battery(&self, battery: Option<BatteryStatus>, fails: bool) {
        let mut profile = lock(&self.profile);
        profile.battery = battery;
        profile.battery_fails = fails;
    }

    pub fn set_battery_delay(&self, delay: Duration) {
        lock(&self.profile).battery_delay_ms = delay.as_millis() as u64;
    }
}

#[async_trait::async_trait]
impl EnvironmentReader for SimulatedEnvironment {
    fn viewport(&self) -> RegionBox {
        lock(&self.profile).viewport
    }

    fn touch_indicators(&self) -> TouchIndicators {
        lock(&self.profile).touch
    }

    fn effective_connection_type(&self) -> Option<String> {
        lock(&self.profile).effective_connection_type.clone()
    }

    fn device_memory_gb(&self) -> Option<f64> {
        lock(&self.profile).device_memory_gb
    }

    fn media_query(&self, query: &str) -> Option<bool> {
        let profile = lock(&self.profile);
        if !profile.media_queries {
            return None;
        }
        match query {
            DARK_SCHEME_QUERY => Some(profile.prefers_dark_scheme),
            REDUCED_MOTION_QUERY => Some(profile.prefers_reduced_motion),
            _ => Some(false),
        }
    }

    async fn battery(&self) -> Result<Option<BatteryStatus>, EnvError> {
        let (delay, battery, fails) = {
            let profile = lock(&self.profile);
            (profile.battery_delay_ms, profile.battery, profile.battery_fails)
        };
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if fails {
            return Err(EnvError::BatteryRead("battery manager rejected".into()));
        }
        Ok(battery)
    }

    fn change_source(&self, kind: SourceKind) -> Option<Arc<dyn ChangeSource>> {
        let profile = lock(&self.profile);
        if !profile.change_sources.contains(&kind) {
            return None;
        }
        let registry = self.registries.get(&kind)?.clone();
        Some(Arc::new(SimulatedSource {
            kind,
            registry,
            fails: profile.failing_sources.contains(&kind),
        }))
    }
}

/// Simulated UI region for the container query engine.
#[derive(Clone)]
pub struct SimulatedRegion {
    size: Arc<Mutex<RegionBox>>,
    observers: ListenerRegistry<ResizeListener>,
    fail_observe: bool,
}

impl SimulatedRegion {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            size: Arc::new(Mutex::new(RegionBox::new(width, height))),
            observers: ListenerRegistry::new(),
            fail_observe: false,
        }
    }

    /// A region whose resize observer cannot be installed.
    pub fn without_observer(width: f64, height: f64) -> Self {
        Self {
            fail_observe: true,
            ..Self::new(width, height)
        }
    }

    pub fn resize(&self, width: f64, height: f64) {
        let size = RegionBox::new(width, height);
        *lock(&self.size) = size;
        for observer in self.observers.snapshot() {
            observer(size);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.count()
    }
}

impl ObservedRegion for SimulatedRegion {
    fn measure(&self) -> RegionBox {
        *lock(&self.size)
    }

    fn observe(&self, listener: ResizeListener) -> Result<ListenerGuard, EnvError> {
        if self.fail_observe {
            return Err(EnvError::Unsupported("resize observer".into()));
        }
        Ok(self.observers.add(listener))
    }
}

type IdleCallback = Box<dyn FnOnce() + Send>;

/// Simulated idle scheduler. Idle callbacks run only when `run_idle` is called.
#[derive(Clone)]
pub struct SimulatedIdleHost {
    supports_idle: bool,
    next_request: Arc<Mutex<u64>>,
    pending: Arc<Mutex<HashMap<u64, IdleCallback>>>,
    prefetched: Arc<Mutex<Vec<String>>>,
}

impl SimulatedIdleHost {
    pub fn new(supports_idle: bool) -> Self {
        Self {
            supports_idle,
            next_request: Arc::new(Mutex::new(0)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            prefetched: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Enter an idle period: run every pending idle callback.
    pub fn run_idle(&self) {
        let callbacks: Vec<IdleCallback> = lock(&self.pending).drain().map(|(_, cb)| cb).collect();
        for callback in callbacks {
            callback();
        }
    }

    pub fn pending_idle(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Addresses the host was asked to prefetch, in request order.
    pub fn prefetched(&self) -> Vec<String> {
        lock(&self.prefetched).clone()
    }
}

impl IdleHost for SimulatedIdleHost {
    fn request_idle(&self, callback: IdleCallback) -> Option<IdleRequest> {
        if !self.supports_idle {
            return None;
        }
        let id = {
            let mut next = lock(&self.next_request);
            *next += 1;
            *next
        };
        lock(&self.pending).insert(id, callback);
        Some(IdleRequest(id))
    }

    fn cancel_idle(&self, request: IdleRequest) {
        lock(&self.pending).remove(&request.0);
    }

    fn prefetch(&self, address: &str) {
        lock(&self.prefetched).push(address.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn listeners_fire_and_unregister() {
        let env = SimulatedEnvironment::new(HostProfile::desktop());
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let source = env.change_source(SourceKind::Network).unwrap();
        let guard = source
            .install(Arc::new(move || {
                h.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        assert_eq!(env.listener_count(SourceKind::Network), 1);

        env.set_connection_type(Some("3g"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        drop(guard);
        assert_eq!(env.listener_count(SourceKind::Network), 0);
        env.set_connection_type(Some("4g"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn bare_host_exposes_nothing() {
        let env = SimulatedEnvironment::new(HostProfile::bare(800.0, 600.0));
        assert!(env.media_query(DARK_SCHEME_QUERY).is_none());
        assert!(env.effective_connection_type().is_none());
        assert!(SourceKind::ALL.iter().all(|&k| env.change_source(k).is_none()));
    }

    #[test]
    fn failing_source_rejects_install() {
        let mut profile = HostProfile::desktop();
        profile.failing_sources = vec![SourceKind::ColorScheme];
        let env = SimulatedEnvironment::new(profile);
        let source = env.change_source(SourceKind::ColorScheme).unwrap();
        assert!(source.install(Arc::new(|| {})).is_err());
    }

    #[test]
    fn idle_host_cancel_drops_callback() {
        let host = SimulatedIdleHost::new(true);
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        let request = host
            .request_idle(Box::new(move || {
                r.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        host.cancel_idle(request);
        host.run_idle();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn host_profile_from_json_defaults() {
        let json = r#"{ "viewport": { "width": 1024, "height": 768 } }"#;
        let profile: HostProfile = serde_json::from_str(json).unwrap();
        assert!(profile.media_queries);
        assert_eq!(profile.change_sources.len(), 3);
        assert!(profile.battery.is_none());
    }
}
