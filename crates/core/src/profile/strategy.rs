use crate::environment::hardware::NetworkTier;
use crate::types::{ImageQuality, LazyLoadingStrategy, PerformanceTier, StrategyBundle};

pub fn image_quality(tier: PerformanceTier, network: NetworkTier) -> ImageQuality {
    if network == NetworkTier::Slow || tier == PerformanceTier::Low {
        ImageQuality::Low
    } else if network == NetworkTier::Medium && tier == PerformanceTier::Medium {
        ImageQuality::Medium
    } else {
        ImageQuality::High
    }
}

/// Reduced motion always wins over the tier.
pub fn animations_enabled(tier: PerformanceTier, prefers_reduced_motion: bool) -> bool {
    !prefers_reduced_motion && tier != PerformanceTier::Low
}

pub fn lazy_loading(tier: PerformanceTier, network: NetworkTier) -> LazyLoadingStrategy {
    if network == NetworkTier::Slow || tier == PerformanceTier::Low {
        LazyLoadingStrategy::Aggressive
    } else if network == NetworkTier::Medium || tier == PerformanceTier::Medium {
        LazyLoadingStrategy::Moderate
    } else {
        LazyLoadingStrategy::Minimal
    }
}

pub fn derive(
    tier: PerformanceTier,
    network: NetworkTier,
    prefers_reduced_motion: bool,
) -> StrategyBundle {
    StrategyBundle {
        image_quality: image_quality(tier, network),
        animations_enabled: animations_enabled(tier, prefers_reduced_motion),
        lazy_loading_strategy: lazy_loading(tier, network),
    }
}
