use log::{debug, error, warn};
use nalgebra::DVector;
use serde::Serialize;

use crate::{
    error::{ConfigurationError, IntegrationFailure, ResodeError},
    linear_solver::{LinearSolver, NalgebraLU},
    nonlinear_solver::{newton::NewtonNonlinearSolver, NonLinearSolver},
    ode_solver::{
        bootstrap::bootstrap,
        config::IntegratorConfig,
        history::{HistoryWindow, Trajectory},
        residual::ImplicitFormula,
        scheme::{SchemeDescriptor, SchemeSpec},
        step_control::StepSizeController,
        trapezoid::TrapezoidDerivativeCache,
    },
    op::{stage::StageOp, ImplicitResidual},
};

/// Called after every successful nonlinear solve with the history plus the speculative point;
/// returns the (possibly adjusted) point to continue with.
pub type PostStepCallback = Box<dyn FnMut(&HistoryWindow) -> (f64, DVector<f64>)>;

#[derive(Clone, Debug, Serialize, Default, PartialEq)]
pub struct IntegrationStatistics {
    pub number_of_steps: usize,
    pub number_of_error_test_failures: usize,
    pub number_of_nonlinear_solver_iterations: usize,
    pub number_of_nonlinear_solver_fails: usize,
    pub number_of_bootstrap_steps: usize,
}

/// Integrates a residual-form ODE `R(t, y, dy/dt) = 0` with one of the implicit schemes.
///
/// The integrator is adaptive if the scheme has an error estimator and a target error is set;
/// otherwise every step has the initial step size. Each call to [Integrator::integrate] starts
/// from scratch: the trajectory, derivative cache and statistics of previous runs are discarded.
pub struct Integrator<R: ImplicitResidual> {
    residual: R,
    scheme: SchemeDescriptor,
    target_error: Option<f64>,
    config: IntegratorConfig,
    controller: StepSizeController,
    solver: NewtonNonlinearSolver<Box<dyn LinearSolver>>,
    post_step: Option<PostStepCallback>,
    t0: f64,
    statistics: IntegrationStatistics,
}

impl<R: ImplicitResidual> Integrator<R> {
    /// Fails if `config` is out of range, see [IntegratorConfig::validate].
    pub fn new(
        residual: R,
        scheme: SchemeDescriptor,
        target_error: Option<f64>,
        config: IntegratorConfig,
    ) -> Result<Self, ResodeError> {
        config.validate()?;
        let solver = NewtonNonlinearSolver::new_with_config(
            Box::new(NalgebraLU::default()) as Box<dyn LinearSolver>,
            &config.newton,
        );
        Ok(Self {
            residual,
            scheme,
            target_error,
            controller: StepSizeController::new(config.step_control.clone()),
            config,
            solver,
            post_step: None,
            t0: 0.0,
            statistics: IntegrationStatistics::default(),
        })
    }

    pub fn set_linear_solver(&mut self, linear_solver: Box<dyn LinearSolver>) {
        self.solver = NewtonNonlinearSolver::new_with_config(linear_solver, &self.config.newton);
    }

    pub fn set_post_step(&mut self, callback: PostStepCallback) {
        self.post_step = Some(callback);
    }

    pub fn set_t0(&mut self, t0: f64) {
        self.t0 = t0;
    }

    pub fn t0(&self) -> f64 {
        self.t0
    }

    pub fn residual(&self) -> &R {
        &self.residual
    }

    pub fn scheme(&self) -> &SchemeDescriptor {
        &self.scheme
    }

    pub fn config(&self) -> &IntegratorConfig {
        &self.config
    }

    pub fn is_adaptive(&self) -> bool {
        self.scheme.has_estimator() && self.target_error.is_some()
    }

    /// Statistics of the most recent run.
    pub fn statistics(&self) -> &IntegrationStatistics {
        &self.statistics
    }

    /// Integrate from `(t0, y0)` until the last committed time is at least `horizon`, starting
    /// with step size `dt`. The last step is not shortened to land on `horizon`.
    pub fn integrate(
        &mut self,
        y0: DVector<f64>,
        horizon: f64,
        dt: f64,
    ) -> Result<Trajectory, IntegrationFailure> {
        let trajectory = Trajectory::new(self.t0, y0);
        self.integrate_from(trajectory, horizon, dt)
    }

    /// Continue from an existing history, e.g. one with hand-picked initial steps. The bootstrap
    /// only adds points if the history is shorter than the scheme needs.
    pub fn integrate_from(
        &mut self,
        mut trajectory: Trajectory,
        horizon: f64,
        dt: f64,
    ) -> Result<Trajectory, IntegrationFailure> {
        self.statistics = IntegrationStatistics::default();
        if let Err(e) = self.check_inputs(&trajectory, horizon, dt) {
            error!("Invalid integration inputs: {e}");
            return Err(IntegrationFailure::new(e, trajectory));
        }
        match self.run(&mut trajectory, horizon, dt) {
            Ok(()) => Ok(trajectory),
            Err(e) => {
                error!(
                    "Integration failed at t = {}: {e}",
                    trajectory.last_time()
                );
                Err(IntegrationFailure::new(e, trajectory))
            }
        }
    }

    fn check_inputs(
        &self,
        trajectory: &Trajectory,
        horizon: f64,
        dt: f64,
    ) -> Result<(), ResodeError> {
        let n = trajectory.last_value().len();
        if n == 0 {
            return Err(ResodeError::from(ConfigurationError::EmptyInitialValue));
        }
        if self.residual.nstates() != n {
            return Err(ResodeError::from(
                ConfigurationError::ResidualLengthMismatch {
                    expected: n,
                    found: self.residual.nstates(),
                },
            ));
        }
        let limits = &self.config.step_control;
        if !(limits.minimum_timestep..=limits.maximum_timestep).contains(&dt) {
            return Err(ResodeError::from(ConfigurationError::InvalidInitialStep {
                dt,
                minimum: limits.minimum_timestep,
                maximum: limits.maximum_timestep,
            }));
        }
        if !horizon.is_finite() {
            return Err(ResodeError::from(ConfigurationError::InvalidHorizon {
                t0: trajectory.times()[0],
                horizon,
            }));
        }
        Ok(())
    }

    fn run(
        &mut self,
        trajectory: &mut Trajectory,
        horizon: f64,
        mut dt: f64,
    ) -> Result<(), ResodeError> {
        if trajectory.last_time() >= horizon {
            return Ok(());
        }
        let adaptive = self.is_adaptive();
        let reduce_on_failure = adaptive || self.config.newton_failure_reduce_step;
        let Self {
            residual,
            scheme,
            target_error,
            config,
            controller,
            solver,
            post_step,
            statistics,
            ..
        } = self;
        let residual = &*residual;
        let scheme = &*scheme;

        if trajectory.len() < scheme.bootstrap_order {
            debug!(
                "Bootstrapping {} history points for {}",
                scheme.bootstrap_order - trajectory.len(),
                scheme.name
            );
            bootstrap(
                residual,
                trajectory,
                scheme.bootstrap_order,
                config.bootstrap.timestep,
                solver,
                statistics,
            )?;
        }

        let mut cache = match scheme.formula {
            ImplicitFormula::Trapezoid => Some(TrapezoidDerivativeCache::new()),
            _ => None,
        };

        while trajectory.last_time() < horizon {
            let t_next = trajectory.last_time() + dt;

            let previous_dydt = match cache.as_mut() {
                Some(cache) => {
                    cache.prepare(trajectory, residual, solver)?;
                    cache.latest()
                }
                None => None,
            };
            let solved = solve_step(residual, scheme, trajectory, t_next, previous_dydt, solver);
            statistics.number_of_nonlinear_solver_iterations += solver.niter();
            let y_next = match solved {
                Ok(y_next) => y_next,
                Err(e) if e.is_newton_failure() => {
                    statistics.number_of_nonlinear_solver_fails += 1;
                    if !reduce_on_failure {
                        return Err(e);
                    }
                    dt = controller.shrink_after_failure(dt)?;
                    warn!("Nonlinear solve failed at t = {t_next}, retrying with dt = {dt:e}: {e}");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let (t_next, y_next) = match post_step.as_mut() {
                Some(callback) => callback(&trajectory.window(t_next, &y_next)),
                None => (t_next, y_next),
            };

            if adaptive {
                if let (Some(estimator), Some(target)) = (scheme.estimator.as_ref(), *target_error) {
                    let window = trajectory.window(t_next, &y_next);
                    let error_norm = estimator.estimate(&window)?.norm();
                    match controller.scale_timestep(window.dt(0), target, error_norm, scheme.order()) {
                        Ok(new_dt) => dt = new_dt,
                        Err(e) => match e.rejected_step() {
                            Some(new_dt) => {
                                statistics.number_of_error_test_failures += 1;
                                warn!(
                                    "Step to t = {t_next} rejected with error {error_norm:e}, retrying with dt = {new_dt:e}"
                                );
                                dt = new_dt;
                                continue;
                            }
                            None => return Err(e),
                        },
                    }
                }
            }

            trajectory.commit(t_next, y_next)?;
            statistics.number_of_steps += 1;
            debug!("Accepted step to t = {t_next}, next dt = {dt:e}");
        }
        Ok(())
    }
}

fn solve_step<R, S>(
    residual: &R,
    scheme: &SchemeDescriptor,
    trajectory: &Trajectory,
    t_next: f64,
    previous_dydt: Option<&DVector<f64>>,
    solver: &mut S,
) -> Result<DVector<f64>, ResodeError>
where
    R: ImplicitResidual + ?Sized,
    S: NonLinearSolver,
{
    let op = StageOp::new(residual, scheme.formula, trajectory, t_next, previous_dydt)?;
    solver.solve(&op, trajectory.last_value())
}

/// Integrate `residual` from `(0, initial_value)` until at least `horizon` with the given scheme.
///
/// `target_error = None` selects fixed steps of `initial_step`; a scheme without an error
/// estimator ignores `target_error`. On failure the points committed so far are returned
/// inside the [IntegrationFailure].
///
/// A post-step callback, a replacement linear solver or a start time other than zero are set
/// through [IntegratorBuilder](crate::ode_solver::builder::IntegratorBuilder) instead.
pub fn integrate<R: ImplicitResidual>(
    residual: R,
    initial_value: DVector<f64>,
    horizon: f64,
    initial_step: f64,
    scheme: &SchemeSpec,
    target_error: Option<f64>,
    config: IntegratorConfig,
) -> Result<Trajectory, IntegrationFailure> {
    let integrator = scheme
        .descriptor()
        .and_then(|descriptor| Integrator::new(residual, descriptor, target_error, config));
    match integrator {
        Ok(mut integrator) => integrator.integrate(initial_value, horizon, initial_step),
        Err(e) => Err(IntegrationFailure::new(e, Trajectory::new(0.0, initial_value))),
    }
}
