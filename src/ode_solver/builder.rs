use std::rc::Rc;

use nalgebra::{DMatrix, DVector};

use crate::{
    error::ResodeError,
    linear_solver::LinearSolver,
    ode_solver::{
        config::{IntegratorConfig, StepControlConfig},
        explicit::PredictorPoint,
        history::HistoryWindow,
        integrator::{Integrator, PostStepCallback},
        scheme::{Bdf2MidpointWeight, DydtFunction, SchemeName, SchemeSpec},
    },
    op::{
        closure::{Closure, ClosureWithPartials},
        ImplicitResidual,
    },
};

/// Builder for integrators. Use methods to set parameters and then call one of the build methods when done.
pub struct IntegratorBuilder {
    scheme: String,
    dydt: Option<DydtFunction>,
    predictors: Option<(Vec<PredictorPoint>, Vec<PredictorPoint>)>,
    bdf2_weight: Bdf2MidpointWeight,
    target_error: Option<f64>,
    t0: f64,
    config: IntegratorConfig,
    linear_solver: Option<Box<dyn LinearSolver>>,
    post_step: Option<PostStepCallback>,
}

impl Default for IntegratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for integrators. Use methods to set parameters and then call one of the build methods when done.
///
/// # Example
///
/// ```rust
/// use resode::IntegratorBuilder;
/// use nalgebra::DVector;
///
/// let mut integrator = IntegratorBuilder::new()
///     .scheme("bdf2-mp")
///     .target_error(Some(1e-5))
///     .build_residual(
///         // dy/dt = -2y, written as R = dy/dt + 2y
///         |_t, y, dydt, r| {
///             r[0] = dydt[0] + 2.0 * y[0];
///         },
///         1,
///     )
///     .unwrap();
///
/// let trajectory = integrator
///     .integrate(DVector::from_element(1, 1.0), 1.0, 1e-3)
///     .unwrap();
/// let y = trajectory.last_value()[0];
/// let t = trajectory.last_time();
/// assert!((y - (-2.0 * t).exp()).abs() < 1e-3);
/// ```
impl IntegratorBuilder {
    /// Create a new builder with default parameters:
    /// - scheme = "bdf2"
    /// - target_error = None (fixed steps)
    /// - t0 = 0.0
    /// - Newton tolerance 1e-8, at most 20 iterations, finite difference epsilon 1e-10
    /// - bootstrap timestep 1e-6
    /// - nalgebra LU linear solver
    pub fn new() -> Self {
        Self {
            scheme: SchemeName::Bdf2.as_str().to_string(),
            dydt: None,
            predictors: None,
            bdf2_weight: Bdf2MidpointWeight::default(),
            target_error: None,
            t0: 0.0,
            config: IntegratorConfig::default(),
            linear_solver: None,
            post_step: None,
        }
    }

    /// Set the time stepping scheme by name, e.g. "bdf2-mp" or "imr ebdf3". The name is checked
    /// when the integrator is built.
    pub fn scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    /// Set the exact derivative `dy/dt = f(t, y)` used by some error estimators.
    pub fn exact_derivative(
        mut self,
        dydt: impl Fn(f64, &DVector<f64>) -> DVector<f64> + 'static,
    ) -> Self {
        self.dydt = Some(Rc::new(dydt));
        self
    }

    /// Set the predictor point sets of the two-predictor error estimator.
    pub fn predictors(mut self, p1: Vec<PredictorPoint>, p2: Vec<PredictorPoint>) -> Self {
        self.predictors = Some((p1, p2));
        self
    }

    pub fn bdf2_weight(mut self, weight: Bdf2MidpointWeight) -> Self {
        self.bdf2_weight = weight;
        self
    }

    /// Set the target local error per step. `None` selects fixed steps.
    pub fn target_error(mut self, target_error: Option<f64>) -> Self {
        self.target_error = target_error;
        self
    }

    /// Set the initial time.
    pub fn t0(mut self, t0: f64) -> Self {
        self.t0 = t0;
        self
    }

    pub fn newton_tol(mut self, tol: f64) -> Self {
        self.config.newton.tolerance = tol;
        self
    }

    pub fn newton_max_iter(mut self, max_iter: usize) -> Self {
        self.config.newton.maximum_iterations = max_iter;
        self
    }

    /// Set the step used by forward differences when the residual has no partial derivatives.
    pub fn jacobian_fd_eps(mut self, eps: f64) -> Self {
        self.config.newton.finite_difference_epsilon = eps;
        self
    }

    /// Set the step size of the implicit midpoint steps that create the initial history.
    pub fn bootstrap_timestep(mut self, dt: f64) -> Self {
        self.config.bootstrap.timestep = dt;
        self
    }

    /// Shrink and retry after a Newton failure even when stepping with fixed steps.
    pub fn newton_failure_reduce_step(mut self, reduce: bool) -> Self {
        self.config.newton_failure_reduce_step = reduce;
        self
    }

    pub fn step_control(mut self, step_control: StepControlConfig) -> Self {
        self.config.step_control = step_control;
        self
    }

    /// Replace all numerical settings at once, e.g. with a configuration loaded from a file.
    pub fn config(mut self, config: IntegratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn linear_solver(mut self, linear_solver: Box<dyn LinearSolver>) -> Self {
        self.linear_solver = Some(linear_solver);
        self
    }

    /// Set a callback that may adjust every solved point before it is checked and committed.
    pub fn post_step(
        mut self,
        callback: impl FnMut(&HistoryWindow) -> (f64, DVector<f64>) + 'static,
    ) -> Self {
        self.post_step = Some(Box::new(callback));
        self
    }

    fn scheme_spec(&self) -> Result<SchemeSpec, ResodeError> {
        let mut spec = SchemeSpec::new(self.scheme.parse()?).with_bdf2_weight(self.bdf2_weight);
        if let Some(dydt) = &self.dydt {
            let dydt = dydt.clone();
            spec = spec.with_exact_derivative(move |t, y| dydt(t, y));
        }
        if let Some((p1, p2)) = &self.predictors {
            spec = spec.with_predictors(p1.clone(), p2.clone());
        }
        Ok(spec)
    }

    /// Build an integrator for `residual`.
    pub fn build<R: ImplicitResidual>(self, residual: R) -> Result<Integrator<R>, ResodeError> {
        let descriptor = self.scheme_spec()?.descriptor()?;
        let mut integrator = Integrator::new(residual, descriptor, self.target_error, self.config)?;
        integrator.set_t0(self.t0);
        if let Some(linear_solver) = self.linear_solver {
            integrator.set_linear_solver(linear_solver);
        }
        if let Some(callback) = self.post_step {
            integrator.set_post_step(callback);
        }
        Ok(integrator)
    }

    /// Build an integrator for the residual `func(t, y, dydt, r)` with `nstates` states. The
    /// Jacobian is found by finite differences.
    pub fn build_residual<F>(
        self,
        func: F,
        nstates: usize,
    ) -> Result<Integrator<Closure<F>>, ResodeError>
    where
        F: Fn(f64, &DVector<f64>, &DVector<f64>, &mut DVector<f64>),
    {
        self.build(Closure::new(func, nstates))
    }

    /// Build an integrator for the residual `func(t, y, dydt, r)` with analytic partial derivatives
    /// `partials(t, y, dydt, dr_dy, dr_ddydt)`.
    pub fn build_residual_with_partials<F, G>(
        self,
        func: F,
        partials: G,
        nstates: usize,
    ) -> Result<Integrator<ClosureWithPartials<F, G>>, ResodeError>
    where
        F: Fn(f64, &DVector<f64>, &DVector<f64>, &mut DVector<f64>),
        G: Fn(f64, &DVector<f64>, &DVector<f64>, &mut DMatrix<f64>, &mut DMatrix<f64>),
    {
        self.build(ClosureWithPartials::new(func, partials, nstates))
    }
}
