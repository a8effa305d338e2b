//! Adaptive device profiling and responsive strategy engine.
//!
//! Probes sample host signals, the synthesizer turns them into a performance tier and a
//! rendering strategy, and the change watcher re-runs synthesis whenever the host reports a
//! change. The container query engine and idle prefetcher are independent observers with
//! their own lifecycles.

pub mod config;
pub mod container;
pub mod debounce;
pub mod environment;
pub mod prefetch;
pub mod probe;
pub mod profile;
pub mod types;

pub use config::EngineCfg;
pub use container::{ContainerQuery, ContainerState, TierValues};
pub use environment::watcher::{ChangeWatcher, ProfileHandle};
pub use prefetch::{IdlePrefetcher, PrefetchState};
pub use profile::classes::{VariantSet, class_tokens, select_variant};
pub use types::{
    ContainerSize, DeviceClass, DeviceProfile, DeviceSignal, ImageQuality, LazyLoadingStrategy,
    PerformanceProfile, PerformanceTier, ProfileState, RegionBox, SizeTier, StrategyBundle,
};
