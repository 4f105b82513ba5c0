//! Tunable parameters for the [solver](super::solver::GridPolicySolver) and the
//! [controller](super::controller::WaypointController).
//!
//! Every field has a default, so a TOML file only needs the values it overrides:
//!
//! ```toml
//! [solver]
//! iterations = 80
//!
//! [controller]
//! kp = 8.0
//!
//! [noise]
//! kind = "seeded"
//! magnitude = 0.1
//! seed = 7
//! ```

use super::{
    error::{Error, Result},
    noise::{NoNoise, UniformJitter, WaypointNoise},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Q-value iteration settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Number of synchronous Bellman backups per goal.
    /// Default: 50
    pub iterations: usize,

    /// Discount factor, in `(0, 1]`.
    /// Default: 0.99
    pub discount: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            iterations: 50,
            discount: 0.99,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(Error::Config("solver.iterations must be at least 1".into()));
        }
        if !(self.discount > 0.0 && self.discount <= 1.0) {
            return Err(Error::Config(format!(
                "solver.discount must be in (0, 1], got {}",
                self.discount
            )));
        }
        Ok(())
    }
}

/// PD gains, thresholds and stall detection for waypoint following.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Proportional gain on the position error.
    /// Default: 10.0
    pub kp: f64,

    /// Gain on the agent velocity. Negative values damp.
    /// Default: -1.0
    pub kd: f64,

    /// Distance at which a waypoint counts as reached (world units).
    /// Default: 0.1
    pub waypoint_threshold: f64,

    /// Goal displacement that triggers replanning (world units).
    /// Default: 0.001
    pub goal_tolerance: f64,

    /// Lower actuation bound, per axis.
    /// Default: -1.0
    pub action_low: f64,

    /// Upper actuation bound, per axis.
    /// Default: 1.0
    pub action_high: f64,

    /// Ticks without progress towards a waypoint before replanning from the agent's cell.
    /// Zero disables stall recovery.
    /// Default: 200
    pub stall_ticks: u32,

    /// Minimum decrease of the waypoint distance that counts as progress (world units).
    /// Default: 0.001
    pub stall_progress: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            kp: 10.0,
            kd: -1.0,
            waypoint_threshold: 0.1,
            goal_tolerance: 1e-3,
            action_low: -1.0,
            action_high: 1.0,
            stall_ticks: 200,
            stall_progress: 1e-3,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.kp.is_finite() || !self.kd.is_finite() {
            return Err(Error::Config("controller gains must be finite".into()));
        }
        if !(self.waypoint_threshold > 0.0 && self.waypoint_threshold.is_finite()) {
            return Err(Error::Config(format!(
                "controller.waypoint_threshold must be positive, got {}",
                self.waypoint_threshold
            )));
        }
        if !(self.goal_tolerance >= 0.0 && self.goal_tolerance.is_finite()) {
            return Err(Error::Config(format!(
                "controller.goal_tolerance must be non-negative, got {}",
                self.goal_tolerance
            )));
        }
        if !(self.action_low < self.action_high) {
            return Err(Error::Config(format!(
                "controller action range [{}, {}] is empty",
                self.action_low, self.action_high
            )));
        }
        if !(self.stall_progress >= 0.0 && self.stall_progress.is_finite()) {
            return Err(Error::Config(format!(
                "controller.stall_progress must be non-negative, got {}",
                self.stall_progress
            )));
        }
        Ok(())
    }
}

/// Source of the jitter applied to intermediate waypoints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoiseConfig {
    /// Waypoints sit exactly on cell centres.
    None,
    /// Jitter of up to `magnitude` per axis from an entropy-seeded generator.
    Uniform { magnitude: f64 },
    /// Jitter of up to `magnitude` per axis from a generator seeded with `seed`.
    Seeded { magnitude: f64, seed: u64 },
}

impl Default for NoiseConfig {
    fn default() -> Self {
        NoiseConfig::Uniform { magnitude: 0.2 }
    }
}

impl NoiseConfig {
    pub fn validate(&self) -> Result<()> {
        match self {
            NoiseConfig::None => Ok(()),
            NoiseConfig::Uniform { magnitude } | NoiseConfig::Seeded { magnitude, .. } => {
                if magnitude.is_finite() && *magnitude >= 0.0 {
                    Ok(())
                } else {
                    Err(Error::Config(format!(
                        "noise.magnitude must be non-negative, got {}",
                        magnitude
                    )))
                }
            }
        }
    }

    /// Builds the configured noise source.
    pub fn build(&self) -> Box<dyn WaypointNoise + Send> {
        match *self {
            NoiseConfig::None => Box::new(NoNoise),
            NoiseConfig::Uniform { magnitude } => Box::new(UniformJitter::from_entropy(magnitude)),
            NoiseConfig::Seeded { magnitude, seed } => {
                Box::new(UniformJitter::seeded(seed, magnitude))
            }
        }
    }
}

/// Complete configuration of a planner/controller pair.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub solver: SolverConfig,
    pub controller: ControllerConfig,
    pub noise: NoiseConfig,
}

impl PlannerConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: PlannerConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        self.solver.validate()?;
        self.controller.validate()?;
        self.noise.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PlannerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.solver.iterations, 50);
        assert_eq!(config.controller.kp, 10.0);
        assert_eq!(config.controller.kd, -1.0);
        assert_eq!(config.noise, NoiseConfig::Uniform { magnitude: 0.2 });
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = PlannerConfig::from_toml_str(
            r#"
            [solver]
            discount = 0.95

            [controller]
            waypoint_threshold = 0.2
            stall_ticks = 0

            [noise]
            kind = "seeded"
            magnitude = 0.1
            seed = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.solver.iterations, 50);
        assert_eq!(config.solver.discount, 0.95);
        assert_eq!(config.controller.waypoint_threshold, 0.2);
        assert_eq!(config.controller.stall_ticks, 0);
        assert_eq!(config.controller.kp, 10.0);
        assert_eq!(
            config.noise,
            NoiseConfig::Seeded {
                magnitude: 0.1,
                seed: 7
            }
        );
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(
            PlannerConfig::from_toml_str("").unwrap(),
            PlannerConfig::default()
        );
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(PlannerConfig::from_toml_str("[solver]\niterations = 0").is_err());
        assert!(PlannerConfig::from_toml_str("[solver]\ndiscount = 1.5").is_err());
        assert!(PlannerConfig::from_toml_str(
            "[controller]\naction_low = 1.0\naction_high = -1.0"
        )
        .is_err());
        let negative = "[noise]\nkind = \"uniform\"\nmagnitude = -0.1";
        assert!(PlannerConfig::from_toml_str(negative).is_err());
        assert!(matches!(
            PlannerConfig::from_toml_str("[solver]\niterations = \"many\""),
            Err(Error::Config(_))
        ));
    }
}
