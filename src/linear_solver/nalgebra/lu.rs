use nalgebra::{DMatrix, DVector, Dyn};

use crate::{error::ResodeError, linear_solver::check_square, linear_solver_error, LinearSolver};

/// A [LinearSolver] that uses the LU decomposition in the [`nalgebra` library](https://nalgebra.org/) to solve the linear system.
#[derive(Clone, Default)]
pub struct LU {
    lu: Option<nalgebra::LU<f64, Dyn, Dyn>>,
}

impl LinearSolver for LU {
    fn solve_in_place(&self, state: &mut DVector<f64>) -> Result<(), ResodeError> {
        let lu = self
            .lu
            .as_ref()
            .ok_or(linear_solver_error!(LuNotInitialized))?;
        match lu.solve_mut(state) {
            true if state.iter().all(|x| x.is_finite()) => Ok(()),
            _ => Err(linear_solver_error!(LuSolveFailed)),
        }
    }

    fn set_linearisation(&mut self, jacobian: &DMatrix<f64>) -> Result<(), ResodeError> {
        check_square(jacobian)?;
        self.lu = Some(jacobian.clone().lu());
        Ok(())
    }
}
