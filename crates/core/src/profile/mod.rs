//! Profile synthesizer: DeviceSignal → PerformanceProfile → StrategyBundle.

pub mod classes;
pub mod score;
pub mod strategy;

use chrono::Utc;

use crate::types::{DeviceProfile, DeviceSignal, PerformanceProfile, StrategyBundle};

impl PerformanceProfile {
    pub fn from_signal(signal: &DeviceSignal) -> Self {
        let score = score::total(signal);
        Self {
            score,
            tier: score::tier(score),
        }
    }
}

impl StrategyBundle {
    pub fn derive(performance: &PerformanceProfile, signal: &DeviceSignal) -> Self {
        strategy::derive(performance.tier, signal.network_tier, signal.prefers_reduced_motion)
    }
}

impl DeviceProfile {
    /// Full synthesis of one signal. Pure apart from the `sampled_at` stamp.
    pub fn synthesize(signal: DeviceSignal) -> Self {
        let performance = PerformanceProfile::from_signal(&signal);
        let strategy = StrategyBundle::derive(&performance, &signal);
        Self {
            signal,
            performance,
            strategy,
            sampled_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::hardware::NetworkTier;
    use crate::types::{DeviceClass, ImageQuality, LazyLoadingStrategy, PerformanceTier};

    fn signal(device_class: DeviceClass, memory: f64, network: NetworkTier) -> DeviceSignal {
        DeviceSignal {
            device_class,
            memory_budget_gb: memory,
            network_tier: network,
            ..DeviceSignal::default()
        }
    }

    #[test]
    fn high_end_desktop() {
        let p = DeviceProfile::synthesize(signal(DeviceClass::Desktop, 8.0, NetworkTier::Fast));
        assert_eq!(p.performance.score, 9);
        assert_eq!(p.performance.tier, PerformanceTier::High);
        assert_eq!(
            p.strategy,
            StrategyBundle {
                image_quality: ImageQuality::High,
                animations_enabled: true,
                lazy_loading_strategy: LazyLoadingStrategy::Minimal,
            }
        );
    }

    #[test]
    fn low_end_phone() {
        let p = DeviceProfile::synthesize(signal(DeviceClass::Mobile, 2.0, NetworkTier::Slow));
        assert_eq!(p.performance.score, 3);
        assert_eq!(p.performance.tier, PerformanceTier::Low);
        assert_eq!(
            p.strategy,
            StrategyBundle {
                image_quality: ImageQuality::Low,
                animations_enabled: false,
                lazy_loading_strategy: LazyLoadingStrategy::Aggressive,
            }
        );
    }

    #[test]
    fn synthesis_is_idempotent() {
        let s = signal(DeviceClass::Tablet, 4.0, NetworkTier::Medium);
        let a = DeviceProfile::synthesize(s);
        let b = DeviceProfile::synthesize(s);
        assert_eq!(a.performance, b.performance);
        assert_eq!(a.strategy, b.strategy);
        assert_eq!(a.signal, b.signal);
    }
}
