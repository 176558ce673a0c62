use std::cell::RefCell;

use nalgebra::{DMatrix, DVector};

use crate::{
    error::ResodeError,
    ode_solver::{
        history::Trajectory,
        residual::{ImplicitFormula, Stage},
    },
    op::{ImplicitResidual, NonLinearOp},
};

/// The non-linear problem for one implicit step: `G(y_next) = R(t*, y*, dydt*)`, where `t*`,
/// `y*` and `dydt*` are given by an [ImplicitFormula] applied to the committed history with
/// `y_next` appended at `t_next`.
pub struct StageOp<'a, R: ImplicitResidual + ?Sized> {
    residual: &'a R,
    history: &'a Trajectory,
    t_next: f64,
    stage: Stage<'a>,
    partials: RefCell<(DMatrix<f64>, DMatrix<f64>)>,
}

impl<'a, R: ImplicitResidual + ?Sized> StageOp<'a, R> {
    /// Fails if the history is too short for `formula`, or if the trapezoid rule is requested
    /// without `previous_dydt`.
    pub fn new(
        residual: &'a R,
        formula: ImplicitFormula,
        history: &'a Trajectory,
        t_next: f64,
        previous_dydt: Option<&'a DVector<f64>>,
    ) -> Result<Self, ResodeError> {
        let stage = formula.stage(&history.window(t_next, history.last_value()), previous_dydt)?;
        let n = residual.nstates();
        Ok(Self {
            residual,
            history,
            t_next,
            stage,
            partials: RefCell::new((DMatrix::zeros(n, n), DMatrix::zeros(n, n))),
        })
    }

    pub fn t_next(&self) -> f64 {
        self.t_next
    }
}

impl<R: ImplicitResidual + ?Sized> NonLinearOp for StageOp<'_, R> {
    fn nstates(&self) -> usize {
        self.residual.nstates()
    }

    fn call_inplace(&self, x: &DVector<f64>, y: &mut DVector<f64>) {
        let values = self.stage.evaluate(&self.history.window(self.t_next, x));
        self.residual
            .call_inplace(values.t, &values.y, &values.dydt, y);
    }

    // J = c_y dR/dy + c_dydt dR/d(dydt)
    fn jacobian_inplace(&self, x: &DVector<f64>, jac: &mut DMatrix<f64>) -> bool {
        if !self.residual.has_partials() {
            return false;
        }
        let values = self.stage.evaluate(&self.history.window(self.t_next, x));
        let mut partials = self.partials.borrow_mut();
        let (dr_dy, dr_ddydt) = &mut *partials;
        self.residual
            .partials_inplace(values.t, &values.y, &values.dydt, dr_dy, dr_ddydt);
        jac.copy_from(&(&*dr_dy * values.y_coeff + &*dr_ddydt * values.dydt_coeff));
        true
    }
}
