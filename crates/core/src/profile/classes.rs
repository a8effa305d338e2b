//! Consumer-facing helpers: styling tokens and asset-variant selection.

use serde::{Deserialize, Serialize};

use crate::types::{DeviceProfile, ImageQuality};

/// Space-separated styling tokens for a profile, always in the same order:
/// device, network, performance, touch, motion, color scheme.
pub fn class_tokens(profile: &DeviceProfile) -> String {
    let signal = &profile.signal;
    let touch = if signal.touch_capable { "touch" } else { "no-touch" };
    let motion = if signal.prefers_reduced_motion {
        "reduced-motion"
    } else {
        "full-motion"
    };
    let scheme = if signal.prefers_dark_scheme {
        "dark-scheme"
    } else {
        "light-scheme"
    };
    format!(
        "device-{} network-{} performance-{} {touch} {motion} {scheme}",
        signal.device_class.as_str(),
        signal.network_tier.as_str(),
        profile.performance.tier.as_str(),
    )
}

/// Asset variants keyed by quality. Any subset may be supplied.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VariantSet<T> {
    #[serde(default)]
    pub low: Option<T>,
    #[serde(default)]
    pub medium: Option<T>,
    #[serde(default)]
    pub high: Option<T>,
}

impl<T> VariantSet<T> {
    /// Best variant for `quality`, stepping down high → medium → low. If nothing at or
    /// below the requested quality exists, the lowest supplied variant above it is used.
    pub fn select(&self, quality: ImageQuality) -> Option<&T> {
        let at_or_below = match quality {
            ImageQuality::High => self.high.as_ref().or(self.medium.as_ref()).or(self.low.as_ref()),
            ImageQuality::Medium => self.medium.as_ref().or(self.low.as_ref()),
            ImageQuality::Low => self.low.as_ref(),
        };
        at_or_below
            .or(self.medium.as_ref())
            .or(self.high.as_ref())
    }
}

/// Free-function form used by UI glue that only has the quality at hand.
pub fn select_variant<T>(set: &VariantSet<T>, quality: ImageQuality) -> Option<&T> {
    set.select(quality)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::hardware::NetworkTier;
    use crate::types::{DeviceClass, DeviceSignal};

    fn set(low: Option<&'static str>, medium: Option<&'static str>, high: Option<&'static str>) -> VariantSet<&'static str> {
        VariantSet { low, medium, high }
    }

    #[test]
    fn tokens_for_low_end_phone() {
        let profile = DeviceProfile::synthesize(DeviceSignal {
            device_class: DeviceClass::Mobile,
            touch_capable: true,
            network_tier: NetworkTier::Slow,
            memory_budget_gb: 2.0,
            prefers_reduced_motion: true,
            prefers_dark_scheme: true,
            ..DeviceSignal::default()
        });
        assert_eq!(
            class_tokens(&profile),
            "device-mobile network-slow performance-low touch reduced-motion dark-scheme"
        );
    }

    #[test]
    fn tokens_for_default_signal() {
        let profile = DeviceProfile::synthesize(DeviceSignal::default());
        assert_eq!(
            class_tokens(&profile),
            "device-desktop network-fast performance-high no-touch full-motion light-scheme"
        );
    }

    #[test]
    fn high_falls_back_medium_then_low() {
        let full = set(Some("l.jpg"), Some("m.jpg"), Some("h.jpg"));
        assert_eq!(full.select(ImageQuality::High), Some(&"h.jpg"));
        let no_high = set(Some("l.jpg"), Some("m.jpg"), None);
        assert_eq!(no_high.select(ImageQuality::High), Some(&"m.jpg"));
        let only_low = set(Some("l.jpg"), None, None);
        assert_eq!(only_low.select(ImageQuality::High), Some(&"l.jpg"));
        assert_eq!(only_low.select(ImageQuality::Medium), Some(&"l.jpg"));
    }

    #[test]
    fn low_quality_never_picks_higher_when_low_exists() {
        let full = set(Some("l.jpg"), Some("m.jpg"), Some("h.jpg"));
        assert_eq!(select_variant(&full, ImageQuality::Low), Some(&"l.jpg"));
    }

    #[test]
    fn missing_low_uses_best_supplied() {
        let only_high = set(None, None, Some("h.jpg"));
        assert_eq!(only_high.select(ImageQuality::Low), Some(&"h.jpg"));
        let empty: VariantSet<&str> = VariantSet::default();
        assert_eq!(empty.select(ImageQuality::Medium), None);
    }
}
