use log::debug;
use nalgebra::DVector;

use crate::{
    error::{OdeSolverError, ResodeError},
    nonlinear_solver::NonLinearSolver,
    ode_solver::{history::Trajectory, residual::ImplicitFormula},
    op::{stage::StageOp, ImplicitResidual},
};

/// Relative tolerance of the midpoint time check in derivative recovery.
const MIDPOINT_TIME_TOL: f64 = 1e-10;

/// Derivatives of the solution reconstructed for the trapezoid rule, one per committed point
/// from the point where the cache was started onwards.
///
/// The first derivative is recovered by a private implicit midpoint step over the two newest
/// committed points. Every later derivative comes from inverting the trapezoid rule on the step
/// that committed it: `dy_{n+1} = (2 / dt_n)(y_{n+1} - y_n) - dy_n`. Entries are never
/// recomputed, so the cache belongs to exactly one integration run and refuses a history that
/// has shrunk since it was last prepared.
#[derive(Debug, Clone, Default)]
pub struct TrapezoidDerivativeCache {
    first_index: usize,
    dys: Vec<DVector<f64>>,
}

impl TrapezoidDerivativeCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn with_derivative(index: usize, dy: DVector<f64>) -> Self {
        Self {
            first_index: index,
            dys: vec![dy],
        }
    }

    pub fn len(&self) -> usize {
        self.dys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dys.is_empty()
    }

    /// Index into the history of the newest cached derivative.
    fn latest_index(&self) -> Option<usize> {
        self.dys.len().checked_sub(1).map(|i| self.first_index + i)
    }

    /// Bring the cache up to date with `history`, so that [Self::latest] is the derivative at the
    /// newest committed point.
    pub fn prepare<R, S>(
        &mut self,
        history: &Trajectory,
        residual: &R,
        solver: &mut S,
    ) -> Result<(), ResodeError>
    where
        R: ImplicitResidual + ?Sized,
        S: NonLinearSolver,
    {
        let newest = history.len() - 1;
        match self.latest_index() {
            None => {
                let dy = recover_derivative(history, residual, solver)?;
                self.first_index = newest;
                self.dys.push(dy);
            }
            Some(latest) if latest > newest => {
                return Err(ResodeError::from(OdeSolverError::HistoryRewritten {
                    expected: latest + 1,
                    found: history.len(),
                }));
            }
            Some(latest) => {
                let (ts, ys) = (history.times(), history.values());
                for i in latest + 1..=newest {
                    let dt = ts[i] - ts[i - 1];
                    let previous = &self.dys[self.dys.len() - 1];
                    let dy = (&ys[i] - &ys[i - 1]) * (2.0 / dt) - previous;
                    self.dys.push(dy);
                }
            }
        }
        Ok(())
    }

    /// The derivative at the newest committed point as of the last [Self::prepare].
    pub fn latest(&self) -> Option<&DVector<f64>> {
        self.dys.last()
    }
}

/// Recover the derivative at the newest committed point `t_n` by one implicit midpoint step of
/// size `2 (t_n - t_{n-1})` from `t_{n-1}`, whose midpoint is `t_n`.
fn recover_derivative<R, S>(
    history: &Trajectory,
    residual: &R,
    solver: &mut S,
) -> Result<DVector<f64>, ResodeError>
where
    R: ImplicitResidual + ?Sized,
    S: NonLinearSolver,
{
    let n = history.len();
    if n < 2 {
        return Err(ResodeError::from(OdeSolverError::NotEnoughHistory {
            required: 2,
            available: n,
        }));
    }
    let (t_start, y_start) = (history.times()[n - 2], &history.values()[n - 2]);
    let t_n = history.times()[n - 1];
    let dt = 2.0 * (t_n - t_start);

    let t_end = t_start + dt;
    let midpoint = 0.5 * (t_start + t_end);
    let mismatch = (midpoint - t_n).abs();
    if mismatch.is_nan() || mismatch > MIDPOINT_TIME_TOL * t_n.abs().max(1.0) {
        return Err(ResodeError::from(
            OdeSolverError::DerivativeRecoveryMismatch {
                expected: t_n,
                found: midpoint,
            },
        ));
    }

    let start = Trajectory::new(t_start, y_start.clone());
    let op = StageOp::new(residual, ImplicitFormula::Midpoint, &start, t_end, None)?;
    let y_end = solver.solve(&op, y_start)?;
    debug!("Recovered trapezoid derivative at t = {t_n}");
    Ok((y_end - y_start) / dt)
}
