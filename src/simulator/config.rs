//! Simulation configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How the simulation surrenders control to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SimulationMode {
    /// Run to completion without yielding.
    FastForward,
    /// The caller drives with `step()`.
    StepByStep,
    /// Pause before executing any node listed in `breakpoints`.
    Breakpoints,
}

impl Default for SimulationMode {
    fn default() -> Self {
        SimulationMode::FastForward
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub mode: SimulationMode,
    /// Node ids to pause on in breakpoint mode; ignored otherwise.
    #[serde(default)]
    pub breakpoints: Vec<String>,
    /// Initial state snapshot. Keys here stand in for values real upstream
    /// systems would have produced.
    #[serde(default)]
    pub mock_state: Map<String, Value>,
    /// Graph-independent backstop on executed steps.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// Dollar cost per estimated token.
    #[serde(default = "default_cost_per_token")]
    pub cost_per_token: f64,
    /// A step is a bottleneck when its time or token estimate exceeds this
    /// multiple of the mean over all steps.
    #[serde(default = "default_bottleneck_threshold")]
    pub bottleneck_threshold: f64,
}

fn default_max_steps() -> u32 {
    500
}

fn default_cost_per_token() -> f64 {
    0.000_002
}

fn default_bottleneck_threshold() -> f64 {
    2.0
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            mode: SimulationMode::default(),
            breakpoints: vec![],
            mock_state: Map::new(),
            max_steps: default_max_steps(),
            cost_per_token: default_cost_per_token(),
            bottleneck_threshold: default_bottleneck_threshold(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: SimulationConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.mode, SimulationMode::FastForward);
        assert_eq!(config.max_steps, 500);
        assert!((config.bottleneck_threshold - 2.0).abs() < f64::EPSILON);
        assert!(config.breakpoints.is_empty());
    }

    #[test]
    fn test_mode_tags_are_kebab() {
        let v = serde_json::to_value(SimulationMode::StepByStep).unwrap();
        assert_eq!(v, "step-by-step");
    }
}
