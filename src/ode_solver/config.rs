use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, ResodeError};

/// Limits and scaling factors used by the [StepSizeController](super::step_control::StepSizeController).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepControlConfig {
    pub minimum_timestep: f64,
    pub maximum_timestep: f64,
    pub maximum_timestep_growth: f64,
    pub minimum_timestep_growth: f64,
    pub failure_timestep_shrink: f64,
}

impl Default for StepControlConfig {
    fn default() -> Self {
        Self {
            minimum_timestep: 1e-8,
            maximum_timestep: 1e8,
            maximum_timestep_growth: 3.0,
            minimum_timestep_growth: 0.75,
            failure_timestep_shrink: 0.5,
        }
    }
}

/// Settings for the [NewtonNonlinearSolver](crate::NewtonNonlinearSolver).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonConfig {
    pub tolerance: f64,
    pub maximum_iterations: usize,
    pub finite_difference_epsilon: f64,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            maximum_iterations: 20,
            finite_difference_epsilon: 1e-10,
        }
    }
}

/// Settings for the self-starting phase of multistep schemes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub timestep: f64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self { timestep: 1e-6 }
    }
}

/// Everything that configures a run apart from the residual, the scheme and the callbacks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorConfig {
    pub step_control: StepControlConfig,
    pub newton: NewtonConfig,
    pub bootstrap: BootstrapConfig,
    /// Shrink and retry the step after a Newton failure even when not stepping adaptively.
    pub newton_failure_reduce_step: bool,
}

fn check(option: &'static str, value: f64, valid: bool) -> Result<(), ResodeError> {
    if valid && !value.is_nan() {
        Ok(())
    } else {
        Err(ResodeError::from(ConfigurationError::InvalidOption { option, value }))
    }
}

impl IntegratorConfig {
    /// Check that every setting is in range.
    pub fn validate(&self) -> Result<(), ResodeError> {
        let sc = &self.step_control;
        check("minimum_timestep", sc.minimum_timestep, sc.minimum_timestep > 0.0)?;
        check(
            "maximum_timestep",
            sc.maximum_timestep,
            sc.maximum_timestep >= sc.minimum_timestep,
        )?;
        check(
            "maximum_timestep_growth",
            sc.maximum_timestep_growth,
            sc.maximum_timestep_growth >= 1.0,
        )?;
        check(
            "minimum_timestep_growth",
            sc.minimum_timestep_growth,
            sc.minimum_timestep_growth > 0.0 && sc.minimum_timestep_growth <= 1.0,
        )?;
        check(
            "failure_timestep_shrink",
            sc.failure_timestep_shrink,
            sc.failure_timestep_shrink > 0.0 && sc.failure_timestep_shrink < 1.0,
        )?;
        check("newton.tolerance", self.newton.tolerance, self.newton.tolerance > 0.0)?;
        check(
            "newton.maximum_iterations",
            self.newton.maximum_iterations as f64,
            self.newton.maximum_iterations > 0,
        )?;
        check(
            "newton.finite_difference_epsilon",
            self.newton.finite_difference_epsilon,
            self.newton.finite_difference_epsilon > 0.0,
        )?;
        check(
            "bootstrap.timestep",
            self.bootstrap.timestep,
            self.bootstrap.timestep > 0.0 && self.bootstrap.timestep.is_finite(),
        )?;
        Ok(())
    }
}
