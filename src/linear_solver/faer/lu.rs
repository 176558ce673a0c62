use faer::{
    linalg::solvers::{FullPivLu, Solve},
    Col, Mat,
};
use nalgebra::{DMatrix, DVector};

use crate::{error::ResodeError, linear_solver::check_square, linear_solver_error, LinearSolver};

/// A [LinearSolver] that uses the LU decomposition in the [`faer`](https://github.com/sarah-ek/faer-rs) library to solve the linear system.
///
/// Full pivoting does not report singular matrices, so a solve that produces non-finite values
/// is reported as a failure.
#[derive(Default)]
pub struct LU {
    lu: Option<FullPivLu<f64>>,
}

impl LinearSolver for LU {
    fn set_linearisation(&mut self, jacobian: &DMatrix<f64>) -> Result<(), ResodeError> {
        check_square(jacobian)?;
        let matrix = Mat::from_fn(jacobian.nrows(), jacobian.ncols(), |i, j| jacobian[(i, j)]);
        self.lu = Some(matrix.full_piv_lu());
        Ok(())
    }

    fn solve_in_place(&self, x: &mut DVector<f64>) -> Result<(), ResodeError> {
        let lu = self
            .lu
            .as_ref()
            .ok_or(linear_solver_error!(LuNotInitialized))?;
        let mut col = Col::from_fn(x.len(), |i| x[i]);
        lu.solve_in_place(col.as_mut());
        for i in 0..x.len() {
            if !col[i].is_finite() {
                return Err(linear_solver_error!(LuSolveFailed));
            }
            x[i] = col[i];
        }
        Ok(())
    }
}
