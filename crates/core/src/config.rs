use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Environment variable prefix read by [`EngineCfg::from_env`].
pub const ENV_PREFIX: &str = "ADAPTIVE_";

/// All engine parameters. Defaults match the documented breakpoints and windows;
/// any key can be overridden from a key/value map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineCfg {
    // viewport classification (px, inclusive upper bounds)
    pub viewport_mobile_max: f64,
    pub viewport_tablet_max: f64,

    // memory probe
    pub default_memory_gb: f64,

    // change watcher
    pub resize_quiescence_ms: u64,

    // container query engine
    pub container_quiescence_ms: u64,
    pub container_medium_min: f64,
    pub container_large_min: f64,

    // idle prefetcher
    pub idle_fallback_ms: u64,
}

impl Default for EngineCfg {
    fn default() -> Self {
        Self {
            viewport_mobile_max: 480.0,
            viewport_tablet_max: 768.0,
            default_memory_gb: 4.0,
            resize_quiescence_ms: 250,
            container_quiescence_ms: 100,
            container_medium_min: 500.0,
            container_large_min: 900.0,
            idle_fallback_ms: 3000,
        }
    }
}

impl EngineCfg {
    /// Defaults overlaid with `ADAPTIVE_<KEY>` environment variables.
    pub fn from_env() -> Self {
        let map: HashMap<String, String> = std::env::vars()
            .filter_map(|(k, v)| {
                k.strip_prefix(ENV_PREFIX)
                    .map(|key| (key.to_ascii_lowercase(), v))
            })
            .collect();
        Self::from_map(&map)
    }

    /// Defaults overlaid with the given entries. Missing or unparseable keys keep the default.
    pub fn from_map(m: &HashMap<String, String>) -> Self {
        let d = Self::default();
        Self {
            viewport_mobile_max: get_or(m, "viewport_mobile_max", d.viewport_mobile_max),
            viewport_tablet_max: get_or(m, "viewport_tablet_max", d.viewport_tablet_max),
            default_memory_gb: get_or(m, "default_memory_gb", d.default_memory_gb),
            resize_quiescence_ms: get_or(m, "resize_quiescence_ms", d.resize_quiescence_ms),
            container_quiescence_ms: get_or(m, "container_quiescence_ms", d.container_quiescence_ms),
            container_medium_min: get_or(m, "container_medium_min", d.container_medium_min),
            container_large_min: get_or(m, "container_large_min", d.container_large_min),
            idle_fallback_ms: get_or(m, "idle_fallback_ms", d.idle_fallback_ms),
        }
    }

    pub fn to_entries(&self) -> Vec<(&str, String, &str)> {
        vec![
            ("viewport_mobile_max", self.viewport_mobile_max.to_string(), "Widest viewport classified as mobile (px)"),
            ("viewport_tablet_max", self.viewport_tablet_max.to_string(), "Widest viewport classified as tablet (px)"),
            ("default_memory_gb", self.default_memory_gb.to_string(), "Memory budget assumed when the host hides it"),
            ("resize_quiescence_ms", self.resize_quiescence_ms.to_string(), "Viewport resize debounce window ms"),
            ("container_quiescence_ms", self.container_quiescence_ms.to_string(), "Container resize debounce window ms"),
            ("container_medium_min", self.container_medium_min.to_string(), "Narrowest medium container (px)"),
            ("container_large_min", self.container_large_min.to_string(), "Narrowest large container (px)"),
            ("idle_fallback_ms", self.idle_fallback_ms.to_string(), "Prefetch delay when idle scheduling is unavailable"),
        ]
    }

    pub fn resize_quiescence(&self) -> Duration {
        Duration::from_millis(self.resize_quiescence_ms)
    }

    pub fn container_quiescence(&self) -> Duration {
        Duration::from_millis(self.container_quiescence_ms)
    }

    pub fn idle_fallback(&self) -> Duration {
        Duration::from_millis(self.idle_fallback_ms)
    }
}

fn get_or<T: std::str::FromStr>(map: &HashMap<String, String>, key: &str, default: T) -> T {
    map.get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
