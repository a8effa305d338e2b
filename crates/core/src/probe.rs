//! Signal probes. Each reads one host property and never fails: an absent
//! capability degrades to a documented default.

use crate::config::EngineCfg;
use crate::environment::hardware::{BatteryStatus, NetworkTier, TouchIndicators};
use crate::environment::reader::{DARK_SCHEME_QUERY, EnvironmentReader, REDUCED_MOTION_QUERY};
use crate::types::{DeviceClass, DeviceSignal};

/// Classify a viewport width: ≤ mobile max → mobile, ≤ tablet max → tablet, else desktop.
pub fn classify_viewport(width: f64, cfg: &EngineCfg) -> DeviceClass {
    if width <= cfg.viewport_mobile_max {
        DeviceClass::Mobile
    } else if width <= cfg.viewport_tablet_max {
        DeviceClass::Tablet
    } else {
        DeviceClass::Desktop
    }
}

pub fn device_class(env: &dyn EnvironmentReader, cfg: &EngineCfg) -> DeviceClass {
    classify_viewport(env.viewport().width, cfg)
}

pub fn is_touch(indicators: TouchIndicators) -> bool {
    indicators.touch_events
        || indicators.max_touch_points.is_some_and(|n| n > 0)
        || indicators.legacy_max_touch_points.is_some_and(|n| n > 0)
}

pub fn touch_capable(env: &dyn EnvironmentReader) -> bool {
    is_touch(env.touch_indicators())
}

/// `slow-2g`/`2g` → slow, `3g` → medium, anything else (or nothing) → fast.
pub fn classify_connection(effective_type: Option<&str>) -> NetworkTier {
    match effective_type {
        Some("slow-2g" | "2g") => NetworkTier::Slow,
        Some("3g") => NetworkTier::Medium,
        _ => NetworkTier::Fast,
    }
}

pub fn network_tier(env: &dyn EnvironmentReader) -> NetworkTier {
    classify_connection(env.effective_connection_type().as_deref())
}

pub fn memory_budget_gb(env: &dyn EnvironmentReader, cfg: &EngineCfg) -> f64 {
    env.device_memory_gb()
        .filter(|gb| gb.is_finite() && *gb > 0.0)
        .unwrap_or(cfg.default_memory_gb)
}

/// Battery read. Absence and rejection both yield full + charging.
pub async fn battery(env: &dyn EnvironmentReader) -> BatteryStatus {
    match env.battery().await {
        Ok(Some(status)) => BatteryStatus {
            level: status.level.clamp(0.0, 1.0),
            charging: status.charging,
        },
        Ok(None) => BatteryStatus::default(),
        Err(e) => {
            tracing::debug!(error = %e, "battery read failed, assuming full and charging");
            BatteryStatus::default()
        }
    }
}

pub fn prefers_dark_scheme(env: &dyn EnvironmentReader) -> bool {
    env.media_query(DARK_SCHEME_QUERY).unwrap_or(false)
}

pub fn prefers_reduced_motion(env: &dyn EnvironmentReader) -> bool {
    env.media_query(REDUCED_MOTION_QUERY).unwrap_or(false)
}

/// Sample every probe in one pass.
///
/// The synchronous probes are read together after the battery read resolves so the
/// whole signal reflects a single point in time.
pub async fn sample(env: &dyn EnvironmentReader, cfg: &EngineCfg) -> DeviceSignal {
    let battery = battery(env).await;
    DeviceSignal {
        device_class: device_class(env, cfg),
        touch_capable: touch_capable(env),
        network_tier: network_tier(env),
        memory_budget_gb: memory_budget_gb(env, cfg),
        battery,
        prefers_dark_scheme: prefers_dark_scheme(env),
        prefers_reduced_motion: prefers_reduced_motion(env),
    }
}
