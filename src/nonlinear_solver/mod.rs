use nalgebra::DVector;

use crate::{error::ResodeError, op::NonLinearOp};

pub struct NonLinearSolveSolution {
    pub x0: DVector<f64>,
    pub x: DVector<f64>,
}

impl NonLinearSolveSolution {
    pub fn new(x0: DVector<f64>, x: DVector<f64>) -> Self {
        Self { x0, x }
    }
}

/// A solver for the nonlinear problem `F(x) = 0`.
pub trait NonLinearSolver {
    /// Number of updates applied during the most recent solve.
    fn niter(&self) -> usize;

    /// Solve the problem `F(x) = 0` starting from `x`, and return the solution.
    fn solve<C: NonLinearOp + ?Sized>(
        &mut self,
        op: &C,
        x: &DVector<f64>,
    ) -> Result<DVector<f64>, ResodeError> {
        let mut x = x.clone();
        self.solve_in_place(op, &mut x)?;
        Ok(x)
    }

    /// Solve the problem `F(x) = 0` in place.
    fn solve_in_place<C: NonLinearOp + ?Sized>(
        &mut self,
        op: &C,
        x: &mut DVector<f64>,
    ) -> Result<(), ResodeError>;
}

pub mod convergence;
pub mod newton;

//tests
#[cfg(test)]
pub mod tests {
    use approx::assert_abs_diff_eq;
    use nalgebra::{DMatrix, DVector};

    use self::newton::NewtonNonlinearSolver;
    use super::*;
    use crate::{
        error::NonLinearSolverError,
        linear_solver::{LinearClosure, NalgebraLU},
        ode_solver::config::NewtonConfig,
        op::nonlinear_closure::NonLinearClosure,
        vector::VectorExt,
        ResodeError,
    };

    pub fn test_nonlinear_solver(
        mut solver: impl NonLinearSolver,
        op: &impl NonLinearOp,
        solns: Vec<NonLinearSolveSolution>,
        tol: f64,
    ) {
        for soln in solns {
            let x = solver.solve(op, &soln.x0).unwrap();
            x.assert_eq_st(&soln.x, tol);
        }
    }

    #[test]
    fn test_newton_scalar_sqrt2() {
        let op = NonLinearClosure::new(
            |x: &DVector<f64>, y: &mut DVector<f64>| y[0] = x[0] * x[0] - 2.0,
            1,
        );
        let solns = vec![NonLinearSolveSolution::new(
            DVector::from_element(1, 1.0),
            DVector::from_element(1, 2.0_f64.sqrt()),
        )];
        test_nonlinear_solver(
            NewtonNonlinearSolver::new(NalgebraLU::default()),
            &op,
            solns,
            1e-8,
        );
    }

    #[test]
    fn test_newton_coupled_system() {
        let op = NonLinearClosure::new(
            |x: &DVector<f64>, y: &mut DVector<f64>| {
                y[0] = x[0] * x[0] - 2.0;
                y[1] = x[1] - x[0] - 1.0;
            },
            2,
        );
        let solns = vec![NonLinearSolveSolution::new(
            DVector::from_vec(vec![1.0, 1.0]),
            DVector::from_vec(vec![2.0_f64.sqrt(), 2.0_f64.sqrt() + 1.0]),
        )];
        test_nonlinear_solver(
            NewtonNonlinearSolver::new(NalgebraLU::default()),
            &op,
            solns,
            1e-8,
        );
    }

    #[cfg(feature = "faer")]
    #[test]
    fn test_newton_faer_analytic_jacobian() {
        // 0 = 2 x * x - 8
        let op = NonLinearClosure::new_with_jacobian(
            |x: &DVector<f64>, y: &mut DVector<f64>| {
                y.copy_from(&(x.component_mul(x) * 2.0 - DVector::from_element(2, 8.0)))
            },
            |x: &DVector<f64>, jac: &mut DMatrix<f64>| {
                jac.fill(0.0);
                jac.set_diagonal(&(x * 4.0));
            },
            2,
        );
        let solns = vec![NonLinearSolveSolution::new(
            DVector::from_vec(vec![2.1, 2.1]),
            DVector::from_vec(vec![2.0, 2.0]),
        )];
        test_nonlinear_solver(
            NewtonNonlinearSolver::new(crate::FaerLU::default()),
            &op,
            solns,
            1e-8,
        );
    }

    #[test]
    fn test_newton_custom_linear_solve() {
        let op = NonLinearClosure::new(
            |x: &DVector<f64>, y: &mut DVector<f64>| {
                y[0] = x[0] * x[0] - 2.0;
                y[1] = x[1] - x[0] - 1.0;
            },
            2,
        );
        let ls = LinearClosure::new(|a: &DMatrix<f64>, b: &DVector<f64>| a.clone().lu().solve(b));
        let mut solver = NewtonNonlinearSolver::new(ls);
        let x = solver.solve(&op, &DVector::from_vec(vec![1.0, 1.0])).unwrap();
        assert_abs_diff_eq!(x[1], 2.0_f64.sqrt() + 1.0, epsilon = 1e-8);
    }

    #[test]
    fn converged_guess_takes_zero_iterations() {
        let op = NonLinearClosure::new(
            |x: &DVector<f64>, y: &mut DVector<f64>| y[0] = x[0] - 3.0,
            1,
        );
        let mut solver = NewtonNonlinearSolver::new(NalgebraLU::default());
        let x = solver.solve(&op, &DVector::from_element(1, 3.0)).unwrap();
        assert_eq!(x[0], 3.0);
        assert_eq!(solver.niter(), 0);
    }

    #[test]
    fn singular_jacobian_is_reported() {
        // F(x) = [x0 + x1 - 1, 2 x0 + 2 x1 - 3] has a constant singular Jacobian
        let op = NonLinearClosure::new_with_jacobian(
            |x: &DVector<f64>, y: &mut DVector<f64>| {
                y[0] = x[0] + x[1] - 1.0;
                y[1] = 2.0 * x[0] + 2.0 * x[1] - 3.0;
            },
            |_x: &DVector<f64>, jac: &mut DMatrix<f64>| {
                jac.copy_from(&DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 2.0, 2.0]))
            },
            2,
        );
        let mut solver = NewtonNonlinearSolver::new(NalgebraLU::default());
        let err = solver.solve(&op, &DVector::zeros(2)).unwrap_err();
        match err {
            ResodeError::NonLinearSolverError(NonLinearSolverError::SingularJacobian {
                jacobian,
                residual,
            }) => {
                assert_eq!(jacobian.nrows(), 2);
                assert_eq!(residual, DVector::from_vec(vec![-1.0, -3.0]));
            }
            e => panic!("unexpected error {e}"),
        }
    }

    #[test]
    fn scalar_zero_derivative_is_singular() {
        let op = NonLinearClosure::new_with_jacobian(
            |x: &DVector<f64>, y: &mut DVector<f64>| y[0] = x[0] * x[0] + 1.0,
            |x: &DVector<f64>, jac: &mut DMatrix<f64>| jac[(0, 0)] = 2.0 * x[0],
            1,
        );
        let mut solver = NewtonNonlinearSolver::new(NalgebraLU::default());
        let err = solver.solve(&op, &DVector::zeros(1)).unwrap_err();
        assert!(matches!(
            err,
            ResodeError::NonLinearSolverError(NonLinearSolverError::SingularJacobian { .. })
        ));
    }

    #[test]
    fn maximum_iterations_is_reported() {
        // x^2 + 1 has no real root, Newton wanders without converging
        let op = NonLinearClosure::new(
            |x: &DVector<f64>, y: &mut DVector<f64>| y[0] = x[0] * x[0] + 1.0,
            1,
        );
        let mut solver = NewtonNonlinearSolver::new_with_config(
            NalgebraLU::default(),
            &NewtonConfig {
                maximum_iterations: 5,
                ..Default::default()
            },
        );
        let err = solver.solve(&op, &DVector::from_element(1, 0.5)).unwrap_err();
        assert!(err.is_newton_failure());
        assert!(matches!(
            err,
            ResodeError::NonLinearSolverError(NonLinearSolverError::NewtonDidNotConverge {
                iterations: 5,
                ..
            })
        ));
    }

    #[test]
    fn wrong_state_length_is_reported() {
        let op = NonLinearClosure::new(
            |x: &DVector<f64>, y: &mut DVector<f64>| y[0] = x[0],
            1,
        );
        let mut solver = NewtonNonlinearSolver::new(NalgebraLU::default());
        assert!(solver.solve(&op, &DVector::zeros(3)).is_err());
    }
}
