//! Container query engine: tracks the box of one UI region and classifies it
//! into small / medium / large.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::EngineCfg;
use crate::debounce::{self, Debouncer};
use crate::environment::reader::{ListenerGuard, ObservedRegion};
use crate::types::{ContainerSize, RegionBox, SizeTier};

pub fn classify(width: f64, cfg: &EngineCfg) -> SizeTier {
    if width >= cfg.container_large_min {
        SizeTier::Large
    } else if width >= cfg.container_medium_min {
        SizeTier::Medium
    } else {
        SizeTier::Small
    }
}

impl ContainerSize {
    pub fn from_box(region: RegionBox, cfg: &EngineCfg) -> Self {
        Self {
            width: region.width,
            height: region.height,
            tier: classify(region.width, cfg),
        }
    }
}

/// Per-tier values for component-local decisions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TierValues<T> {
    #[serde(default)]
    pub small: Option<T>,
    #[serde(default)]
    pub medium: Option<T>,
    #[serde(default)]
    pub large: Option<T>,
    #[serde(default)]
    pub default: Option<T>,
}

impl<T> TierValues<T> {
    /// Value for the container's tier, else `default`, else the small value.
    pub fn resolve(&self, size: &ContainerSize) -> Option<&T> {
        let exact = match size.tier {
            SizeTier::Small => self.small.as_ref(),
            SizeTier::Medium => self.medium.as_ref(),
            SizeTier::Large => self.large.as_ref(),
        };
        exact.or(self.default.as_ref()).or(self.small.as_ref())
    }
}

/// Observation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Detached,
    Observing,
}

struct Observation {
    rx: watch::Receiver<ContainerSize>,
    guard: Option<ListenerGuard>,
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns at most one observation. No callback or timer outlives `detach`.
pub struct ContainerQuery {
    cfg: Arc<EngineCfg>,
    window: Duration,
    observation: Option<Observation>,
}

impl ContainerQuery {
    pub fn new(cfg: Arc<EngineCfg>) -> Self {
        let window = cfg.container_quiescence();
        Self::with_window(cfg, window)
    }

    pub fn with_window(cfg: Arc<EngineCfg>, window: Duration) -> Self {
        Self {
            cfg,
            window,
            observation: None,
        }
    }

    /// Measure the region immediately and start observing it. An existing
    /// observation is detached first. Must be called from within a tokio runtime.
    pub fn attach(&mut self, region: Arc<dyn ObservedRegion>) -> ContainerSize {
        self.detach();

        let initial = ContainerSize::from_box(region.measure(), &self.cfg);
        let (size_tx, size_rx) = watch::channel(initial);
        let (box_tx, box_rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();

        let guard = match region.observe(Arc::new(move |b: RegionBox| {
            let _ = box_tx.send(b);
        })) {
            Ok(guard) => Some(guard),
            Err(e) => {
                tracing::debug!(error = %e, "resize observer unavailable, size stays at initial measurement");
                None
            }
        };

        let task = tokio::spawn(observe(
            box_rx,
            size_tx,
            self.window,
            Arc::clone(&self.cfg),
            token.clone(),
        ));

        tracing::debug!(width = initial.width, height = initial.height, tier = ?initial.tier, "container attached");
        self.observation = Some(Observation {
            rx: size_rx,
            guard,
            token,
            task,
        });
        initial
    }

    /// Disconnect the observer and cancel any pending debounce.
    pub fn detach(&mut self) {
        if let Some(observation) = self.observation.take() {
            observation.token.cancel();
            drop(observation.guard);
            observation.task.abort();
            tracing::debug!("container detached");
        }
    }

    pub fn state(&self) -> ContainerState {
        if self.observation.is_some() {
            ContainerState::Observing
        } else {
            ContainerState::Detached
        }
    }

    /// Current size; `None` while detached.
    pub fn size(&self) -> Option<ContainerSize> {
        self.observation.as_ref().map(|o| *o.rx.borrow())
    }

    pub fn changed(&self) -> Option<watch::Receiver<ContainerSize>> {
        self.observation.as_ref().map(|o| o.rx.clone())
    }

    /// Whether a resize observer is installed (false if the host refused one).
    pub fn is_observed(&self) -> bool {
        self.observation.as_ref().is_some_and(|o| o.guard.is_some())
    }

    pub fn resolve<'a, T>(&self, values: &'a TierValues<T>) -> Option<&'a T> {
        self.size().and_then(|size| values.resolve(&size))
    }
}

impl Drop for ContainerQuery {
    fn drop(&mut self) {
        self.detach();
    }
}

async fn observe(
    mut boxes: mpsc::UnboundedReceiver<RegionBox>,
    tx: watch::Sender<ContainerSize>,
    window: Duration,
    cfg: Arc<EngineCfg>,
    token: CancellationToken,
) {
    let mut pending = Debouncer::new(window);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            Some(b) = boxes.recv() => pending.push(b, Instant::now()),
            _ = debounce::until(pending.deadline()) => {
                let Some(b) = pending.fire(Instant::now()) else { continue };
                if token.is_cancelled() {
                    break;
                }
                let size = ContainerSize::from_box(b, &cfg);
                tx.send_if_modified(|current| {
                    if *current == size {
                        return false;
                    }
                    *current = size;
                    true
                });
                pending.complete();
            }
        }
    }
    pending.cancel();
}
