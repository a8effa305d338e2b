use serde::{Deserialize, Serialize};

/// Battery status.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryStatus {
    /// Charge level, 0.0 – 1.0.
    pub level: f64,
    pub charging: bool,
}

impl BatteryStatus {
    /// Returns true if running on battery below the given level.
    pub fn is_low(&self, threshold: f64) -> bool {
        !self.charging && self.level < threshold
    }
}

impl Default for BatteryStatus {
    /// Full and charging: disables any battery-based throttling.
    fn default() -> Self {
        Self {
            level: 1.0,
            charging: true,
        }
    }
}

/// Network tier derived from the effective connection type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkTier {
    Slow,
    Medium,
    Fast,
}

impl NetworkTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Slow => "slow",
            Self::Medium => "medium",
            Self::Fast => "fast",
        }
    }
}

/// Raw touch indicators as the host exposes them. Any one being positive
/// means the device is touch capable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TouchIndicators {
    /// Host exposes touch-start events.
    #[serde(default)]
    pub touch_events: bool,
    #[serde(default)]
    pub max_touch_points: Option<u32>,
    /// Legacy vendor-prefixed touch-point count.
    #[serde(default)]
    pub legacy_max_touch_points: Option<u32>,
}

/// Battery level under which consumers may choose to throttle.
pub const BATTERY_LOW_THRESHOLD: f64 = 0.20;
