use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::environment::hardware::{BatteryStatus, NetworkTier};

/// Viewport-derived device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mobile => "mobile",
            Self::Tablet => "tablet",
            Self::Desktop => "desktop",
        }
    }
}

/// Immutable snapshot of every probed property, sampled in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceSignal {
    pub device_class: DeviceClass,
    pub touch_capable: bool,
    pub network_tier: NetworkTier,
    pub memory_budget_gb: f64,
    pub battery: BatteryStatus,
    pub prefers_dark_scheme: bool,
    pub prefers_reduced_motion: bool,
}

impl Default for DeviceSignal {
    /// The "assume capable" signal used before the first synthesis completes.
    fn default() -> Self {
        Self {
            device_class: DeviceClass::Desktop,
            touch_capable: false,
            network_tier: NetworkTier::Fast,
            memory_budget_gb: 4.0,
            battery: BatteryStatus::default(),
            prefers_dark_scheme: false,
            prefers_reduced_motion: false,
        }
    }
}

/// Performance tier. Ordered low < medium < high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    Low,
    Medium,
    High,
}

impl PerformanceTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Additive device score and the tier it maps to.
/// score = device class (1–3) + memory (1–3) + network (1–3), so 3..=9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceProfile {
    pub score: u8,
    pub tier: PerformanceTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageQuality {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LazyLoadingStrategy {
    Aggressive,
    Moderate,
    Minimal,
}

/// Rendering policy handed to the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyBundle {
    pub image_quality: ImageQuality,
    pub animations_enabled: bool,
    pub lazy_loading_strategy: LazyLoadingStrategy,
}

/// One full synthesis result: signal, score/tier and derived strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub signal: DeviceSignal,
    pub performance: PerformanceProfile,
    pub strategy: StrategyBundle,
    pub sampled_at: DateTime<Utc>,
}

/// What the UI layer observes: the latest profile plus a loading flag that stays
/// true until the first full synthesis (battery read included) has completed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileState {
    pub loading: bool,
    pub profile: DeviceProfile,
    /// Pass number that produced `profile`; 0 before the first pass.
    pub generation: u64,
}

impl Default for ProfileState {
    fn default() -> Self {
        let signal = DeviceSignal::default();
        Self {
            loading: true,
            profile: DeviceProfile::synthesize(signal),
            generation: 0,
        }
    }
}

/// Container size tier. Ordered small < medium < large.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeTier {
    Small,
    Medium,
    Large,
}

/// Pixel box of an observed region, in device-independent pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RegionBox {
    pub width: f64,
    pub height: f64,
}

impl RegionBox {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Measured size of an observed region with its tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContainerSize {
    pub width: f64,
    pub height: f64,
    pub tier: SizeTier,
}

impl ContainerSize {
    pub fn is_small(&self) -> bool {
        self.tier == SizeTier::Small
    }

    pub fn is_medium(&self) -> bool {
        self.tier == SizeTier::Medium
    }

    pub fn is_large(&self) -> bool {
        self.tier == SizeTier::Large
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_ordered() {
        assert!(PerformanceTier::Low < PerformanceTier::Medium);
        assert!(PerformanceTier::Medium < PerformanceTier::High);
        assert!(SizeTier::Small < SizeTier::Medium);
        assert!(SizeTier::Medium < SizeTier::Large);
    }

    #[test]
    fn initial_state_is_loading() {
        let state = ProfileState::default();
        assert!(state.loading);
        assert_eq!(state.generation, 0);
    }

    #[test]
    fn enums_serialize_snake_case() {
        let json = serde_json::to_string(&LazyLoadingStrategy::Aggressive).unwrap();
        assert_eq!(json, "\"aggressive\"");
        let json = serde_json::to_string(&DeviceClass::Tablet).unwrap();
        assert_eq!(json, "\"tablet\"");
    }
}
