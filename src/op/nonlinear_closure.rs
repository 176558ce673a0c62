use nalgebra::{DMatrix, DVector};

use super::NonLinearOp;

/// A [NonLinearOp] defined by a closure `func(x, y)` that writes `F(x)` into `y`, with an
/// optional analytic Jacobian `jac(x, J)`.
pub struct NonLinearClosure<F, J = fn(&DVector<f64>, &mut DMatrix<f64>)>
where
    F: Fn(&DVector<f64>, &mut DVector<f64>),
    J: Fn(&DVector<f64>, &mut DMatrix<f64>),
{
    func: F,
    jacobian: Option<J>,
    nstates: usize,
}

impl<F> NonLinearClosure<F>
where
    F: Fn(&DVector<f64>, &mut DVector<f64>),
{
    pub fn new(func: F, nstates: usize) -> Self {
        Self {
            func,
            jacobian: None,
            nstates,
        }
    }
}

impl<F, J> NonLinearClosure<F, J>
where
    F: Fn(&DVector<f64>, &mut DVector<f64>),
    J: Fn(&DVector<f64>, &mut DMatrix<f64>),
{
    pub fn new_with_jacobian(func: F, jacobian: J, nstates: usize) -> Self {
        Self {
            func,
            jacobian: Some(jacobian),
            nstates,
        }
    }
}

impl<F, J> NonLinearOp for NonLinearClosure<F, J>
where
    F: Fn(&DVector<f64>, &mut DVector<f64>),
    J: Fn(&DVector<f64>, &mut DMatrix<f64>),
{
    fn nstates(&self) -> usize {
        self.nstates
    }
    fn call_inplace(&self, x: &DVector<f64>, y: &mut DVector<f64>) {
        (self.func)(x, y)
    }
    fn jacobian_inplace(&self, x: &DVector<f64>, jac: &mut DMatrix<f64>) -> bool {
        match self.jacobian.as_ref() {
            Some(j) => {
                j(x, jac);
                true
            }
            None => false,
        }
    }
}
