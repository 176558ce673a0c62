use crate::{
    error::{OdeSolverError, ResodeError},
    ode_solver::config::StepControlConfig,
};

/// Chooses the next step size from a local truncation error estimate.
///
/// Every step size it returns lies in `[minimum_timestep, maximum_timestep]`. A step that would
/// need to be smaller than `minimum_timestep` is reported as [OdeSolverError::StepSizeUnderflow]
/// instead.
#[derive(Debug, Clone, Default)]
pub struct StepSizeController {
    config: StepControlConfig,
}

impl StepSizeController {
    pub fn new(config: StepControlConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StepControlConfig {
        &self.config
    }

    /// `(target / error)^(1 / (order + 1))`, capped at the maximum growth. A zero error gives the
    /// maximum growth; a non-finite error gives `None`.
    pub fn scaling_factor(&self, target_error: f64, error_norm: f64, order: usize) -> Option<f64> {
        if !error_norm.is_finite() {
            return None;
        }
        let factor = if error_norm == 0.0 {
            self.config.maximum_timestep_growth
        } else {
            (target_error / error_norm).powf(1.0 / (order as f64 + 1.0))
        };
        Some(factor.min(self.config.maximum_timestep_growth))
    }

    /// The step size to use after a step of size `dt` produced an error of `error_norm`.
    ///
    /// Returns [OdeSolverError::StepRejected] with the suggested retry step if the error is too
    /// large to accept the step.
    pub fn scale_timestep(
        &self,
        dt: f64,
        target_error: f64,
        error_norm: f64,
        order: usize,
    ) -> Result<f64, ResodeError> {
        let Some(factor) = self.scaling_factor(target_error, error_norm, order) else {
            let new_dt = self.shrink_after_failure(dt)?;
            return Err(ResodeError::from(OdeSolverError::StepRejected { new_dt }));
        };
        let new_dt = self.clamp(factor * dt)?;
        if factor < self.config.minimum_timestep_growth {
            return Err(ResodeError::from(OdeSolverError::StepRejected { new_dt }));
        }
        Ok(new_dt)
    }

    /// The step size to retry with after the nonlinear solve failed for a step of size `dt`.
    pub fn shrink_after_failure(&self, dt: f64) -> Result<f64, ResodeError> {
        self.clamp(dt * self.config.failure_timestep_shrink)
    }

    fn clamp(&self, new_dt: f64) -> Result<f64, ResodeError> {
        if new_dt.is_nan() || new_dt < self.config.minimum_timestep {
            return Err(ResodeError::from(OdeSolverError::StepSizeUnderflow {
                dt: new_dt,
                minimum: self.config.minimum_timestep,
            }));
        }
        Ok(new_dt.min(self.config.maximum_timestep))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn controller() -> StepSizeController {
        StepSizeController::new(StepControlConfig::default())
    }

    #[test]
    fn grows_and_shrinks_by_error_ratio() {
        let c = controller();
        // error 8x below target with order 2: factor 2
        assert_relative_eq!(c.scale_timestep(0.1, 8.0, 1.0, 2).unwrap(), 0.2, epsilon = 1e-12);
        // mild overshoot is accepted with a smaller step
        let dt = c.scale_timestep(0.1, 1.0, 1.5, 2).unwrap();
        assert!(dt < 0.1 && dt > 0.075);
    }

    #[test]
    fn zero_error_uses_maximum_growth() {
        assert_relative_eq!(controller().scale_timestep(0.1, 1e-4, 0.0, 2).unwrap(), 0.3, epsilon = 1e-12);
        assert_relative_eq!(controller().scale_timestep(0.1, 1.0, 1e-12, 2).unwrap(), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn large_error_rejects_step() {
        let err = controller().scale_timestep(0.1, 1.0, 1000.0, 2).unwrap_err();
        let new_dt = err.rejected_step().unwrap();
        assert_relative_eq!(new_dt, 0.01, epsilon = 1e-12);
    }

    #[test]
    fn non_finite_error_rejects_with_failure_shrink() {
        let err = controller()
            .scale_timestep(0.1, 1.0, f64::NAN, 2)
            .unwrap_err();
        assert_relative_eq!(err.rejected_step().unwrap(), 0.05, epsilon = 1e-12);
    }

    #[test]
    fn never_leaves_bounds() {
        let c = controller();
        for dt in [1e-8, 1e-5, 1.0, 1e7, 1e8] {
            for err in [0.0, 1e-12, 1e-4, 1.0, 1e6] {
                match c.scale_timestep(dt, 1e-4, err, 2) {
                    Ok(new_dt) => assert!((1e-8..=1e8).contains(&new_dt)),
                    Err(e) => match e.rejected_step() {
                        Some(new_dt) => assert!((1e-8..=1e8).contains(&new_dt)),
                        None => assert!(matches!(
                            e,
                            ResodeError::OdeSolverError(OdeSolverError::StepSizeUnderflow { .. })
                        )),
                    },
                }
            }
        }
        assert_eq!(c.scale_timestep(9e7, 1.0, 0.0, 2).unwrap(), 1e8);
    }

    #[test]
    fn underflow_is_fatal() {
        let err = controller().shrink_after_failure(1.5e-8).unwrap_err();
        assert!(matches!(
            err,
            ResodeError::OdeSolverError(OdeSolverError::StepSizeUnderflow { .. })
        ));
        assert_relative_eq!(controller().shrink_after_failure(0.1).unwrap(), 0.05, epsilon = 1e-12);
    }
}
