use crate::environment::hardware::NetworkTier;
use crate::types::{DeviceClass, DeviceSignal, PerformanceTier};

/// Score at or above which the tier is High.
const HIGH_TIER_MIN: u8 = 8;
/// Score at or above which the tier is Medium.
const MEDIUM_TIER_MIN: u8 = 5;
/// Memory (GB) for the top memory score.
const MEMORY_HIGH_GB: f64 = 8.0;
/// Memory (GB) for the middle memory score.
const MEMORY_MEDIUM_GB: f64 = 4.0;

pub fn device_points(class: DeviceClass) -> u8 {
    match class {
        DeviceClass::Desktop => 3,
        DeviceClass::Tablet => 2,
        DeviceClass::Mobile => 1,
    }
}

pub fn memory_points(memory_gb: f64) -> u8 {
    if memory_gb >= MEMORY_HIGH_GB {
        3
    } else if memory_gb >= MEMORY_MEDIUM_GB {
        2
    } else {
        1
    }
}

pub fn network_points(tier: NetworkTier) -> u8 {
    match tier {
        NetworkTier::Fast => 3,
        NetworkTier::Medium => 2,
        NetworkTier::Slow => 1,
    }
}

/// Sum of the three sub-scores, always in 3..=9.
pub fn total(signal: &DeviceSignal) -> u8 {
    device_points(signal.device_class)
        + memory_points(signal.memory_budget_gb)
        + network_points(signal.network_tier)
}

/// Map a score to its tier.
pub fn tier(score: u8) -> PerformanceTier {
    if score >= HIGH_TIER_MIN {
        PerformanceTier::High
    } else if score >= MEDIUM_TIER_MIN {
        PerformanceTier::Medium
    } else {
        PerformanceTier::Low
    }
}
