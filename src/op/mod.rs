use nalgebra::{DMatrix, DVector};
use serde::Serialize;

pub mod closure;
pub mod nonlinear_closure;
pub mod stage;

/// A residual-form ODE `R(t, y, dy/dt) = 0`.
///
/// The residual maps `nstates` inputs to `nstates` outputs. Implementors may optionally provide
/// the partial derivatives `dR/dy` and `dR/d(dy/dt)`, which lets the integrator assemble an
/// analytic Jacobian for every scheme instead of finite differencing.
pub trait ImplicitResidual {
    /// Return the number of states (and residual components).
    fn nstates(&self) -> usize;

    /// Evaluate `R(t, y, dydt)` into `r`.
    fn call_inplace(&self, t: f64, y: &DVector<f64>, dydt: &DVector<f64>, r: &mut DVector<f64>);

    /// Evaluate `R(t, y, dydt)` and return the result.
    fn call(&self, t: f64, y: &DVector<f64>, dydt: &DVector<f64>) -> DVector<f64> {
        let mut r = DVector::zeros(self.nstates());
        self.call_inplace(t, y, dydt, &mut r);
        r
    }

    fn has_partials(&self) -> bool {
        false
    }

    /// Evaluate `dR/dy` and `dR/d(dydt)`, overwriting `dr_dy` and `dr_ddydt`. Only called if
    /// [Self::has_partials] returns true.
    fn partials_inplace(
        &self,
        _t: f64,
        _y: &DVector<f64>,
        _dydt: &DVector<f64>,
        _dr_dy: &mut DMatrix<f64>,
        _dr_ddydt: &mut DMatrix<f64>,
    ) {
    }

    /// Return statistics about the residual (e.g. how many times it was called)
    fn statistics(&self) -> OpStatistics {
        OpStatistics::default()
    }
}

impl<R: ImplicitResidual + ?Sized> ImplicitResidual for &R {
    fn nstates(&self) -> usize {
        (**self).nstates()
    }
    fn call_inplace(&self, t: f64, y: &DVector<f64>, dydt: &DVector<f64>, r: &mut DVector<f64>) {
        (**self).call_inplace(t, y, dydt, r)
    }
    fn has_partials(&self) -> bool {
        (**self).has_partials()
    }
    fn partials_inplace(
        &self,
        t: f64,
        y: &DVector<f64>,
        dydt: &DVector<f64>,
        dr_dy: &mut DMatrix<f64>,
        dr_ddydt: &mut DMatrix<f64>,
    ) {
        (**self).partials_inplace(t, y, dydt, dr_dy, dr_ddydt)
    }
    fn statistics(&self) -> OpStatistics {
        (**self).statistics()
    }
}

/// A square non-linear function `F: R^n -> R^n`, the problem solved by a
/// [NonLinearSolver](crate::nonlinear_solver::NonLinearSolver).
pub trait NonLinearOp {
    fn nstates(&self) -> usize;

    /// Compute `y = F(x)`.
    fn call_inplace(&self, x: &DVector<f64>, y: &mut DVector<f64>);

    fn call(&self, x: &DVector<f64>) -> DVector<f64> {
        let mut y = DVector::zeros(self.nstates());
        self.call_inplace(x, &mut y);
        y
    }

    /// Compute the analytic Jacobian `dF/dx` into `jac`, returning false if none is available,
    /// in which case the caller falls back to finite differences.
    fn jacobian_inplace(&self, _x: &DVector<f64>, _jac: &mut DMatrix<f64>) -> bool {
        false
    }
}

#[derive(Default, Clone, Debug, Serialize)]
pub struct OpStatistics {
    pub number_of_calls: usize,
    pub number_of_partial_evals: usize,
}

impl OpStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_call(&mut self) {
        self.number_of_calls += 1;
    }

    pub fn increment_partials(&mut self) {
        self.number_of_partial_evals += 1;
    }
}
