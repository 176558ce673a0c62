use log::trace;
use nalgebra::{DMatrix, DVector};

use crate::{
    error::{NonLinearSolverError, ResodeError},
    jacobian::finite_difference_jacobian_inplace,
    nonlinear_solver::convergence::{Convergence, ConvergenceStatus},
    ode_solver::config::NewtonConfig,
    op::NonLinearOp,
    vector::VectorExt,
    LinearSolver, NonLinearSolver,
};

/// Newton's method for a square non-linear system `F(x) = 0`.
///
/// Every iteration checks `max|F(x)| < tol`, then recomputes the Jacobian (analytic if the
/// operator provides one, forward differences otherwise), solves `J dx = F(x)` and sets
/// `x = x - dx`. One dimensional systems are solved by scalar division instead of the linear
/// solver.
pub struct NewtonNonlinearSolver<Ls: LinearSolver> {
    linear_solver: Ls,
    convergence: Convergence,
    fd_eps: f64,
    jacobian: DMatrix<f64>,
    residual: DVector<f64>,
}

impl<Ls: LinearSolver> NewtonNonlinearSolver<Ls> {
    pub fn new(linear_solver: Ls) -> Self {
        Self::new_with_config(linear_solver, &NewtonConfig::default())
    }

    pub fn new_with_config(linear_solver: Ls, config: &NewtonConfig) -> Self {
        Self {
            linear_solver,
            convergence: Convergence::new(config.tolerance, config.maximum_iterations),
            fd_eps: config.finite_difference_epsilon,
            jacobian: DMatrix::zeros(0, 0),
            residual: DVector::zeros(0),
        }
    }

    fn singular(&self) -> ResodeError {
        ResodeError::from(NonLinearSolverError::SingularJacobian {
            jacobian: self.jacobian.clone(),
            residual: self.residual.clone(),
        })
    }

    /// Solve `J dx = r` for the current Jacobian and residual, leaving `dx` in `self.residual`.
    fn solve_linearised(&mut self) -> Result<(), ResodeError> {
        if self.jacobian.nrows() == 1 {
            let j = self.jacobian[(0, 0)];
            let dx = self.residual[0] / j;
            if j == 0.0 || !dx.is_finite() {
                return Err(self.singular());
            }
            self.residual[0] = dx;
            return Ok(());
        }
        let mut dx = self.residual.clone();
        let result = self
            .linear_solver
            .set_linearisation(&self.jacobian)
            .and_then(|_| self.linear_solver.solve_in_place(&mut dx));
        match result {
            Ok(()) if dx.is_all_finite() => {
                self.residual = dx;
                Ok(())
            }
            _ => Err(self.singular()),
        }
    }
}

impl<Ls: LinearSolver + Default> Default for NewtonNonlinearSolver<Ls> {
    fn default() -> Self {
        Self::new(Ls::default())
    }
}

impl<Ls: LinearSolver> NonLinearSolver for NewtonNonlinearSolver<Ls> {
    fn niter(&self) -> usize {
        self.convergence.niter()
    }

    fn solve_in_place<C: NonLinearOp + ?Sized>(
        &mut self,
        op: &C,
        xn: &mut DVector<f64>,
    ) -> Result<(), ResodeError> {
        let n = op.nstates();
        if xn.len() != n {
            return Err(ResodeError::from(NonLinearSolverError::WrongResidualLength {
                expected: n,
                found: xn.len(),
            }));
        }
        if self.jacobian.nrows() != n {
            self.jacobian = DMatrix::zeros(n, n);
        }
        self.residual = DVector::zeros(n);
        self.convergence.reset();
        loop {
            op.call_inplace(xn, &mut self.residual);
            let norm = self.residual.max_abs();
            match self.convergence.check_norm(norm) {
                ConvergenceStatus::Converged => return Ok(()),
                ConvergenceStatus::Continue => {}
                ConvergenceStatus::Diverged | ConvergenceStatus::MaximumIterations => {
                    return Err(ResodeError::from(
                        NonLinearSolverError::NewtonDidNotConverge {
                            iterations: self.convergence.niter(),
                            residual_norm: norm,
                        },
                    ));
                }
            }

            if !op.jacobian_inplace(xn, &mut self.jacobian) {
                finite_difference_jacobian_inplace(
                    op,
                    xn,
                    &self.residual,
                    self.fd_eps,
                    &mut self.jacobian,
                );
            }
            self.solve_linearised()?;
            // residual now holds dx
            *xn -= &self.residual;
            self.convergence.increment();
            trace!("  Newton update |dx| = {:.3e}", self.residual.max_abs());
        }
    }
}
