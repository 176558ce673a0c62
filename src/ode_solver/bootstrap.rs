use log::debug;

use crate::{
    error::ResodeError,
    nonlinear_solver::NonLinearSolver,
    ode_solver::{
        history::Trajectory, integrator::IntegrationStatistics, residual::ImplicitFormula,
    },
    op::{stage::StageOp, ImplicitResidual},
};

/// Extend `trajectory` with fixed implicit midpoint steps of size `dt` until it holds `npoints`
/// points. Any solver failure is returned as is.
pub fn bootstrap<R, S>(
    residual: &R,
    trajectory: &mut Trajectory,
    npoints: usize,
    dt: f64,
    solver: &mut S,
    statistics: &mut IntegrationStatistics,
) -> Result<(), ResodeError>
where
    R: ImplicitResidual + ?Sized,
    S: NonLinearSolver,
{
    while trajectory.len() < npoints {
        let t_next = trajectory.last_time() + dt;
        let y_next = {
            let op = StageOp::new(
                residual,
                ImplicitFormula::Midpoint,
                trajectory,
                t_next,
                None,
            )?;
            let result = solver.solve(&op, trajectory.last_value());
            statistics.number_of_nonlinear_solver_iterations += solver.niter();
            result?
        };
        trajectory.commit(t_next, y_next)?;
        statistics.number_of_bootstrap_steps += 1;
        debug!("Bootstrap step to t = {t_next:e}");
    }
    Ok(())
}
