use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::reader::{EnvironmentReader, ListenerGuard, SourceKind};
use crate::config::EngineCfg;
use crate::debounce::{self, Debouncer};
use crate::probe;
use crate::types::{DeviceProfile, DeviceSignal, ProfileState};

/// What asked for a recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Source(SourceKind),
    Refresh,
}

/// Re-runs the profile synthesizer whenever any supported change source fires.
///
/// Sources whose listener install fails are disabled for the lifetime of the
/// watcher and skipped by later subscriptions.
pub struct ChangeWatcher {
    env: Arc<dyn EnvironmentReader>,
    cfg: Arc<EngineCfg>,
    disabled: Arc<Mutex<HashSet<SourceKind>>>,
}

impl ChangeWatcher {
    pub fn new(env: Arc<dyn EnvironmentReader>, cfg: Arc<EngineCfg>) -> Self {
        Self {
            env,
            cfg,
            disabled: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Install listeners on every available source and start the synthesis task.
    /// Must be called from within a tokio runtime.
    pub fn subscribe(&self) -> ProfileHandle {
        let id = Uuid::new_v4();
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ProfileState::default());
        let token = CancellationToken::new();

        let mut guards = Vec::new();
        for kind in SourceKind::ALL {
            if self.is_disabled(kind) {
                tracing::debug!(subscription = %id, source = %kind, "source disabled this session, skipped");
                continue;
            }
            let Some(source) = self.env.change_source(kind) else {
                tracing::debug!(subscription = %id, source = %kind, "change source unsupported, skipped");
                continue;
            };
            let tx = trigger_tx.clone();
            let listener = Arc::new(move || {
                // Receiver is gone once the subscription is torn down.
                let _ = tx.send(Trigger::Source(kind));
            });
            match source.install(listener) {
                Ok(guard) => guards.push((kind, guard)),
                Err(e) => {
                    tracing::warn!(subscription = %id, source = %kind, error = %e, "listener install failed, source disabled");
                    self.disabled
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .insert(kind);
                }
            }
        }

        let active: Vec<SourceKind> = guards.iter().map(|(kind, _)| *kind).collect();
        tracing::info!(subscription = %id, sources = ?active, "device profile subscription started");

        let task = tokio::spawn(run(
            Arc::clone(&self.env),
            Arc::clone(&self.cfg),
            state_tx,
            trigger_rx,
            token.clone(),
        ));

        ProfileHandle {
            id,
            rx: state_rx,
            refresh_tx: trigger_tx,
            token,
            guards,
            task: Some(task),
        }
    }

    /// Sources disabled after a failed listener install.
    pub fn disabled_sources(&self) -> Vec<SourceKind> {
        let mut kinds: Vec<_> = self
            .disabled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .copied()
            .collect();
        kinds.sort();
        kinds
    }

    fn is_disabled(&self, kind: SourceKind) -> bool {
        self.disabled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&kind)
    }
}

/// A live subscription. Dropping it removes every installed listener and stops
/// the synthesis task.
pub struct ProfileHandle {
    id: Uuid,
    rx: watch::Receiver<ProfileState>,
    refresh_tx: mpsc::UnboundedSender<Trigger>,
    token: CancellationToken,
    guards: Vec<(SourceKind, ListenerGuard)>,
    task: Option<JoinHandle<()>>,
}

impl ProfileHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Latest published state.
    pub fn current(&self) -> ProfileState {
        *self.rx.borrow()
    }

    pub fn is_loading(&self) -> bool {
        self.rx.borrow().loading
    }

    /// Receiver notified on every recomputed snapshot.
    pub fn changed(&self) -> watch::Receiver<ProfileState> {
        self.rx.clone()
    }

    /// Sources with an installed listener.
    pub fn active_sources(&self) -> Vec<SourceKind> {
        self.guards.iter().map(|(kind, _)| *kind).collect()
    }

    /// Re-sample now, for changes the host cannot notify about.
    pub fn refresh(&self) {
        let _ = self.refresh_tx.send(Trigger::Refresh);
    }

    /// Remove every listener, stop the task and wait for it to exit.
    pub async fn unsubscribe(mut self) {
        self.guards.clear();
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        tracing::info!(subscription = %self.id, "device profile subscription ended");
    }
}

impl Drop for ProfileHandle {
    fn drop(&mut self) {
        self.guards.clear();
        self.token.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Synthesis loop. Each pass samples every probe; a pass only publishes if no newer
/// pass has already published.
async fn run(
    env: Arc<dyn EnvironmentReader>,
    cfg: Arc<EngineCfg>,
    tx: watch::Sender<ProfileState>,
    mut triggers: mpsc::UnboundedReceiver<Trigger>,
    token: CancellationToken,
) {
    let mut resize = Debouncer::new(cfg.resize_quiescence());
    let mut passes: JoinSet<(u64, DeviceSignal)> = JoinSet::new();
    let mut next_generation = 0u64;
    let mut published = 0u64;

    let mut start_pass = |passes: &mut JoinSet<(u64, DeviceSignal)>| {
        next_generation += 1;
        let generation = next_generation;
        let env = Arc::clone(&env);
        let cfg = Arc::clone(&cfg);
        passes.spawn(async move { (generation, probe::sample(env.as_ref(), &cfg).await) });
        generation
    };

    start_pass(&mut passes);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            Some(trigger) = triggers.recv() => match trigger {
                Trigger::Source(SourceKind::Viewport) => resize.push((), Instant::now()),
                trigger => {
                    let generation = start_pass(&mut passes);
                    tracing::debug!(?trigger, generation, "recompute requested");
                }
            },
            _ = debounce::until(resize.deadline()) => {
                if resize.fire(Instant::now()).is_some() {
                    let generation = start_pass(&mut passes);
                    tracing::debug!(generation, "viewport settled, recompute requested");
                    resize.complete();
                }
            }
            Some(joined) = passes.join_next() => match joined {
                Ok((generation, signal)) if generation > published => {
                    published = generation;
                    let profile = DeviceProfile::synthesize(signal);
                    tracing::debug!(
                        generation,
                        score = profile.performance.score,
                        tier = profile.performance.tier.as_str(),
                        "device profile published"
                    );
                    tx.send_replace(ProfileState { loading: false, profile, generation });
                }
                Ok((generation, _)) => {
                    tracing::debug!(generation, published, "superseded pass discarded");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "synthesis pass aborted");
                }
            },
        }
    }

    resize.cancel();
    passes.abort_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::hardware::NetworkTier;
    use crate::environment::simulated::{HostProfile, SimulatedEnvironment};
    use crate::types::{DeviceClass, PerformanceTier};
    use std::time::Duration;

    fn watcher(env: &SimulatedEnvironment) -> ChangeWatcher {
        ChangeWatcher::new(Arc::new(env.clone()), Arc::new(EngineCfg::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn first_pass_clears_loading() {
        let env = SimulatedEnvironment::new(HostProfile::desktop());
        let handle = watcher(&env).subscribe();
        assert!(handle.is_loading());

        let mut rx = handle.changed();
        rx.changed().await.unwrap();
        let state = handle.current();
        assert!(!state.loading);
        assert_eq!(state.generation, 1);
        assert_eq!(state.profile.performance.tier, PerformanceTier::High);
    }

    #[tokio::test(start_paused = true)]
    async fn network_change_recomputes() {
        let env = SimulatedEnvironment::new(HostProfile::desktop());
        let handle = watcher(&env).subscribe();
        let mut rx = handle.changed();
        rx.changed().await.unwrap();

        env.set_connection_type(Some("slow-2g"));
        rx.changed().await.unwrap();
        let state = handle.current();
        assert_eq!(state.generation, 2);
        assert_eq!(state.profile.signal.network_tier, NetworkTier::Slow);
    }

    #[tokio::test(start_paused = true)]
    async fn resize_burst_coalesces_into_one_pass() {
        let env = SimulatedEnvironment::new(HostProfile::desktop());
        let handle = watcher(&env).subscribe();
        let mut rx = handle.changed();
        rx.changed().await.unwrap();

        for width in [1200.0, 900.0, 700.0, 500.0, 400.0] {
            env.set_viewport(width, 800.0);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        rx.changed().await.unwrap();
        let state = handle.current();
        assert_eq!(state.generation, 2);
        assert_eq!(state.profile.signal.device_class, DeviceClass::Mobile);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!rx.has_changed().unwrap());
        assert_eq!(handle.current().generation, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_removes_every_listener() {
        let env = SimulatedEnvironment::new(HostProfile::desktop());
        let handle = watcher(&env).subscribe();
        assert_eq!(env.total_listeners(), 3);
        assert_eq!(handle.active_sources().len(), 3);

        handle.unsubscribe().await;
        assert_eq!(env.total_listeners(), 0);
        // Events after teardown go nowhere.
        env.set_viewport(320.0, 640.0);
        env.set_dark_scheme(true);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_removes_every_listener() {
        let env = SimulatedEnvironment::new(HostProfile::desktop());
        let handle = watcher(&env).subscribe();
        drop(handle);
        assert_eq!(env.total_listeners(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_install_disables_source_for_session() {
        let mut profile = HostProfile::desktop();
        profile.failing_sources = vec![SourceKind::Network];
        let env = SimulatedEnvironment::new(profile);
        let watcher = watcher(&env);

        let first = watcher.subscribe();
        assert_eq!(first.active_sources(), vec![SourceKind::ColorScheme, SourceKind::Viewport]);
        assert_eq!(watcher.disabled_sources(), vec![SourceKind::Network]);

        let second = watcher.subscribe();
        assert_eq!(second.active_sources().len(), 2);
        assert_eq!(env.listener_count(SourceKind::Network), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_pass_supersedes_slow_older_pass() {
        let env = SimulatedEnvironment::new(HostProfile::desktop());
        env.set_battery_delay(Duration::from_millis(500));
        let handle = watcher(&env).subscribe();
        let mut rx = handle.changed();

        // Let the first pass start its slow battery read.
        tokio::time::sleep(Duration::from_millis(10)).await;
        env.set_battery_delay(Duration::ZERO);
        env.set_connection_type(Some("3g"));

        rx.changed().await.unwrap();
        assert_eq!(handle.current().generation, 2);
        assert!(!handle.current().loading);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!rx.has_changed().unwrap());
        assert_eq!(handle.current().profile.signal.network_tier, NetworkTier::Medium);
    }

    #[tokio::test(start_paused = true)]
    async fn battery_failure_does_not_escape() {
        let env = SimulatedEnvironment::new(HostProfile::desktop());
        env.set_battery(None, true);
        let handle = watcher(&env).subscribe();
        let mut rx = handle.changed();
        rx.changed().await.unwrap();
        let battery = handle.current().profile.signal.battery;
        assert_eq!(battery.level, 1.0);
        assert!(battery.charging);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_picks_up_silent_changes() {
        let env = SimulatedEnvironment::new(HostProfile::desktop());
        let handle = watcher(&env).subscribe();
        let mut rx = handle.changed();
        rx.changed().await.unwrap();

        env.set_reduced_motion(true);
        handle.refresh();
        rx.changed().await.unwrap();
        assert!(!handle.current().profile.strategy.animations_enabled);
    }
}
