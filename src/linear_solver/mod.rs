use ::nalgebra::{DMatrix, DVector};

use crate::{error::ResodeError, linear_solver_error, LinearSolverError};

pub mod nalgebra;

#[cfg(feature = "faer")]
pub mod faer;

#[cfg(feature = "faer")]
pub use self::faer::lu::LU as FaerLU;
pub use self::nalgebra::lu::LU as NalgebraLU;

/// A solver for the dense linear problem `Ax = b`, where `A` is the Jacobian of the nonlinear
/// residual at the current Newton iterate.
pub trait LinearSolver {
    /// Set the matrix `A`, replacing any previous matrix and discarding its factorisation.
    fn set_linearisation(&mut self, jacobian: &DMatrix<f64>) -> Result<(), ResodeError>;

    /// Solve the problem `Ax = b` and return the solution `x`.
    /// Fails if [Self::set_linearisation] has not been called previously
    fn solve(&self, b: &DVector<f64>) -> Result<DVector<f64>, ResodeError> {
        let mut b = b.clone();
        self.solve_in_place(&mut b)?;
        Ok(b)
    }

    /// Solve `Ax = b` in place: `b` holds the right hand side on entry and the solution on exit.
    fn solve_in_place(&self, b: &mut DVector<f64>) -> Result<(), ResodeError>;
}

impl<L: LinearSolver + ?Sized> LinearSolver for Box<L> {
    fn set_linearisation(&mut self, jacobian: &DMatrix<f64>) -> Result<(), ResodeError> {
        (**self).set_linearisation(jacobian)
    }
    fn solve_in_place(&self, b: &mut DVector<f64>) -> Result<(), ResodeError> {
        (**self).solve_in_place(b)
    }
}

/// A [LinearSolver] that delegates to a user supplied function `f(A, b) -> Some(x)`, returning
/// `None` if the system cannot be solved.
pub struct LinearClosure<F>
where
    F: Fn(&DMatrix<f64>, &DVector<f64>) -> Option<DVector<f64>>,
{
    func: F,
    matrix: Option<DMatrix<f64>>,
}

impl<F> LinearClosure<F>
where
    F: Fn(&DMatrix<f64>, &DVector<f64>) -> Option<DVector<f64>>,
{
    pub fn new(func: F) -> Self {
        Self { func, matrix: None }
    }
}

impl<F> LinearSolver for LinearClosure<F>
where
    F: Fn(&DMatrix<f64>, &DVector<f64>) -> Option<DVector<f64>>,
{
    fn set_linearisation(&mut self, jacobian: &DMatrix<f64>) -> Result<(), ResodeError> {
        check_square(jacobian)?;
        self.matrix = Some(jacobian.clone());
        Ok(())
    }

    fn solve_in_place(&self, b: &mut DVector<f64>) -> Result<(), ResodeError> {
        let matrix = self
            .matrix
            .as_ref()
            .ok_or(linear_solver_error!(LuNotInitialized))?;
        match (self.func)(matrix, b) {
            Some(x) if x.len() == b.len() && x.iter().all(|v| v.is_finite()) => {
                b.copy_from(&x);
                Ok(())
            }
            _ => Err(linear_solver_error!(LuSolveFailed)),
        }
    }
}

pub(crate) fn check_square(jacobian: &DMatrix<f64>) -> Result<(), ResodeError> {
    if jacobian.nrows() != jacobian.ncols() {
        return Err(ResodeError::from(LinearSolverError::NotSquare {
            nrows: jacobian.nrows(),
            ncols: jacobian.ncols(),
        }));
    }
    Ok(())
}

pub struct LinearSolveSolution {
    pub x: DVector<f64>,
    pub b: DVector<f64>,
}

impl LinearSolveSolution {
    pub fn new(b: DVector<f64>, x: DVector<f64>) -> Self {
        Self { x, b }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::vector::VectorExt;

    pub fn linear_problem() -> (DMatrix<f64>, Vec<LinearSolveSolution>) {
        let jac = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 0.0, 2.0]);
        let solns = vec![
            LinearSolveSolution::new(
                DVector::from_vec(vec![4.0, 4.0]),
                DVector::from_vec(vec![1.0, 2.0]),
            ),
            LinearSolveSolution::new(
                DVector::from_vec(vec![2.0, 0.0]),
                DVector::from_vec(vec![1.0, 0.0]),
            ),
        ];
        (jac, solns)
    }

    pub fn test_linear_solver(mut solver: impl LinearSolver) {
        let (jac, solns) = linear_problem();
        solver.set_linearisation(&jac).unwrap();
        for soln in solns {
            let x = solver.solve(&soln.b).unwrap();
            x.assert_eq_st(&soln.x, 1e-12);
        }
    }

    pub fn test_singular_linear_solver(mut solver: impl LinearSolver) {
        let jac = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        solver.set_linearisation(&jac).unwrap();
        let err = solver.solve(&DVector::from_vec(vec![1.0, 1.0])).unwrap_err();
        assert!(matches!(
            err,
            ResodeError::LinearSolverError(LinearSolverError::LuSolveFailed)
        ));
    }

    #[test]
    fn test_lu_nalgebra() {
        test_linear_solver(NalgebraLU::default());
        test_singular_linear_solver(NalgebraLU::default());
    }

    #[cfg(feature = "faer")]
    #[test]
    fn test_lu_faer() {
        test_linear_solver(FaerLU::default());
        test_singular_linear_solver(FaerLU::default());
    }

    #[test]
    fn test_linear_closure() {
        test_linear_solver(LinearClosure::new(|a, b| a.clone().lu().solve(b)));
        test_singular_linear_solver(LinearClosure::new(|a, b| a.clone().lu().solve(b)));
    }

    #[test]
    fn test_boxed_solver() {
        let solver: Box<dyn LinearSolver> = Box::new(NalgebraLU::default());
        test_linear_solver(solver);
    }

    #[test]
    fn solve_before_linearisation_fails() {
        let solver = NalgebraLU::default();
        assert!(solver.solve(&DVector::zeros(2)).is_err());
    }

    #[test]
    fn rectangular_matrix_is_rejected() {
        let mut solver = NalgebraLU::default();
        assert!(solver.set_linearisation(&DMatrix::zeros(2, 3)).is_err());
    }
}
