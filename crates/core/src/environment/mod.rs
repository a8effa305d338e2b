//! Host environment seams: capability reads, change sources, observed regions,
//! idle scheduling, plus the change watcher built on top of them.

pub mod hardware;
pub mod reader;
pub mod simulated;
pub mod watcher;

pub use hardware::{BatteryStatus, NetworkTier, TouchIndicators};
pub use reader::{
    ChangeSource, EnvError, EnvironmentReader, IdleHost, IdleRequest, Listener, ListenerGuard,
    ObservedRegion, ResizeListener, SourceKind,
};
