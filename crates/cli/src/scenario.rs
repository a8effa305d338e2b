use std::path::Path;

use adaptive_core::RegionBox;
use adaptive_core::environment::hardware::BatteryStatus;
use adaptive_core::environment::simulated::{HostProfile, SimulatedEnvironment, SimulatedIdleHost, SimulatedRegion};
use anyhow::Context;
use serde::Deserialize;

/// A simulated device plus a timeline of host events.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub host: HostProfile,
    /// Region observed by the container query engine, if any.
    #[serde(default)]
    pub region: Option<RegionBox>,
    #[serde(default)]
    pub prefetch: Vec<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Wait { ms: u64 },
    Viewport { width: f64, height: f64 },
    Connection { effective_type: Option<String> },
    DarkScheme { enabled: bool },
    ReducedMotion { enabled: bool },
    Memory { gb: Option<f64> },
    Battery { level: f64, charging: bool },
    ResizeRegion { width: f64, height: f64 },
    /// Host enters an idle period.
    Idle,
    /// Re-sample without a native notification.
    Refresh,
}

impl Scenario {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing scenario {}", path.display()))
    }

    /// Desktop on wifi that drops to 2g, shrinks to phone width and turns on dark mode.
    pub fn builtin() -> Self {
        Self {
            host: HostProfile::desktop(),
            region: Some(RegionBox::new(960.0, 600.0)),
            prefetch: vec!["/assets/chat.js".into(), "/assets/diet-plan.js".into()],
            steps: vec![
                Step::Wait { ms: 50 },
                Step::Connection { effective_type: Some("2g".into()) },
                Step::Wait { ms: 50 },
                Step::Viewport { width: 700.0, height: 900.0 },
                Step::Wait { ms: 40 },
                Step::Viewport { width: 420.0, height: 900.0 },
                Step::ResizeRegion { width: 400.0, height: 600.0 },
                Step::Wait { ms: 400 },
                Step::DarkScheme { enabled: true },
                Step::Idle,
                Step::Wait { ms: 50 },
            ],
        }
    }
}

/// Host handles a scenario step acts on.
pub struct Hosts {
    pub env: SimulatedEnvironment,
    pub region: Option<SimulatedRegion>,
    pub idle: SimulatedIdleHost,
}

impl Hosts {
    pub fn new(scenario: &Scenario) -> Self {
        Self {
            env: SimulatedEnvironment::new(scenario.host.clone()),
            region: scenario.region.map(|b| SimulatedRegion::new(b.width, b.height)),
            idle: SimulatedIdleHost::new(true),
        }
    }

    /// Apply one step. Returns false for steps the caller handles (refresh).
    pub async fn apply(&self, step: &Step) -> bool {
        match step {
            Step::Wait { ms } => tokio::time::sleep(std::time::Duration::from_millis(*ms)).await,
            Step::Viewport { width, height } => self.env.set_viewport(*width, *height),
            Step::Connection { effective_type } => {
                self.env.set_connection_type(effective_type.as_deref())
            }
            Step::DarkScheme { enabled } => self.env.set_dark_scheme(*enabled),
            Step::ReducedMotion { enabled } => self.env.set_reduced_motion(*enabled),
            Step::Memory { gb } => self.env.set_device_memory(*gb),
            Step::Battery { level, charging } => self.env.set_battery(
                Some(BatteryStatus { level: *level, charging: *charging }),
                false,
            ),
            Step::ResizeRegion { width, height } => match &self.region {
                Some(region) => region.resize(*width, *height),
                None => tracing::warn!("scenario has no region, resize ignored"),
            },
            Step::Idle => self.idle.run_idle(),
            Step::Refresh => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_steps() {
        let json = r#"{
            "host": { "viewport": { "width": 1280, "height": 720 }, "effective_connection_type": "3g" },
            "steps": [
                { "action": "wait", "ms": 100 },
                { "action": "viewport", "width": 375, "height": 812 },
                { "action": "connection", "effective_type": null },
                { "action": "idle" }
            ]
        }"#;
        let scenario: Scenario = serde_json::from_str(json).unwrap();
        assert_eq!(scenario.steps.len(), 4);
        assert!(matches!(scenario.steps[1], Step::Viewport { width, .. } if width == 375.0));
        assert!(matches!(scenario.steps[2], Step::Connection { effective_type: None }));
        assert!(scenario.region.is_none());
    }

    #[test]
    fn builtin_has_region_and_prefetch() {
        let scenario = Scenario::builtin();
        assert!(scenario.region.is_some());
        assert_eq!(scenario.prefetch.len(), 2);
    }
}
