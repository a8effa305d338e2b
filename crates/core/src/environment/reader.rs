use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::hardware::{BatteryStatus, TouchIndicators};
use crate::types::RegionBox;

pub const DARK_SCHEME_QUERY: &str = "(prefers-color-scheme: dark)";
pub const REDUCED_MOTION_QUERY: &str = "(prefers-reduced-motion: reduce)";

/// Error raised at the host boundary. Never surfaced to the UI layer:
/// callers log it and fall back to a default.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvError {
    #[error("capability unsupported: {0}")]
    Unsupported(String),
    #[error("battery read failed: {0}")]
    BatteryRead(String),
    #[error("listener install failed on {kind}: {reason}")]
    ListenerInstall { kind: SourceKind, reason: String },
}

/// Host capability that can notify about changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Network,
    ColorScheme,
    Viewport,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [Self::Network, Self::ColorScheme, Self::Viewport];
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::ColorScheme => "color-scheme",
            Self::Viewport => "viewport",
        };
        f.write_str(name)
    }
}

/// Callback invoked by a change source.
pub type Listener = Arc<dyn Fn() + Send + Sync>;
/// Callback invoked by an observed region with its new box.
pub type ResizeListener = Arc<dyn Fn(RegionBox) + Send + Sync>;

/// Removes an installed listener when dropped.
#[must_use = "dropping the guard removes the listener"]
pub struct ListenerGuard {
    remove: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerGuard {
    pub fn new(remove: impl FnOnce() + Send + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    /// Remove the listener now.
    pub fn remove(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerGuard")
            .field("installed", &self.remove.is_some())
            .finish()
    }
}

/// One native change-notification source with a uniform install contract.
pub trait ChangeSource: Send + Sync {
    fn kind(&self) -> SourceKind;
    fn install(&self, listener: Listener) -> Result<ListenerGuard, EnvError>;
}

/// Read access to host capabilities. Every optional read returns `None` when the
/// host does not expose the capability.
#[async_trait::async_trait]
pub trait EnvironmentReader: Send + Sync {
    fn viewport(&self) -> RegionBox;
    fn touch_indicators(&self) -> TouchIndicators;
    fn effective_connection_type(&self) -> Option<String>;
    fn device_memory_gb(&self) -> Option<f64>;
    /// Evaluate a media query; `None` when media queries are unavailable.
    fn media_query(&self, query: &str) -> Option<bool>;
    /// `Ok(None)` when the battery capability is absent.
    async fn battery(&self) -> Result<Option<BatteryStatus>, EnvError>;
    fn change_source(&self, kind: SourceKind) -> Option<Arc<dyn ChangeSource>>;
}

/// A UI region whose box can be measured and observed.
pub trait ObservedRegion: Send + Sync {
    fn measure(&self) -> RegionBox;
    fn observe(&self, listener: ResizeListener) -> Result<ListenerGuard, EnvError>;
}

/// Opaque id of a pending idle-callback request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdleRequest(pub u64);

/// Host side of the idle prefetcher.
pub trait IdleHost: Send + Sync {
    /// Run `callback` when the host is idle. `None` when idle scheduling is unsupported.
    fn request_idle(&self, callback: Box<dyn FnOnce() + Send>) -> Option<IdleRequest>;
    fn cancel_idle(&self, request: IdleRequest);
    /// Ask the host to fetch and cache a resource at low priority.
    fn prefetch(&self, address: &str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn guard_removes_on_drop() {
        let removed = Arc::new(AtomicUsize::new(0));
        let r = removed.clone();
        {
            let _guard = ListenerGuard::new(move || {
                r.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(removed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn explicit_remove_runs_once() {
        let removed = Arc::new(AtomicUsize::new(0));
        let r = removed.clone();
        let guard = ListenerGuard::new(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        guard.remove();
        assert_eq!(removed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn source_kind_display() {
        assert_eq!(SourceKind::ColorScheme.to_string(), "color-scheme");
        let err = EnvError::ListenerInstall {
            kind: SourceKind::Network,
            reason: "denied".into(),
        };
        assert_eq!(err.to_string(), "listener install failed on network: denied");
    }
}
