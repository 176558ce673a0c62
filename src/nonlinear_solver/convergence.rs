use log::trace;

/// Tracks the residual norm of a Newton iteration against a fixed absolute tolerance and an
/// iteration cap.
#[derive(Clone, Debug)]
pub struct Convergence {
    tol: f64,
    max_iter: usize,
    niter: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceStatus {
    Converged,
    Continue,
    /// The residual contains NaN or infinite values.
    Diverged,
    MaximumIterations,
}

impl Convergence {
    pub fn new(tol: f64, max_iter: usize) -> Self {
        Self {
            tol,
            max_iter,
            niter: 0,
        }
    }
    pub fn niter(&self) -> usize {
        self.niter
    }
    pub fn reset(&mut self) {
        self.niter = 0;
    }

    /// Record that an update has been applied.
    pub fn increment(&mut self) {
        self.niter += 1;
    }

    /// Classify the max-norm of the residual at the current iterate.
    pub fn check_norm(&self, norm: f64) -> ConvergenceStatus {
        trace!("  Newton iteration {}, max|r| = {:.3e}", self.niter, norm);
        if norm.is_nan() || norm.is_infinite() {
            return ConvergenceStatus::Diverged;
        }
        if norm < self.tol {
            return ConvergenceStatus::Converged;
        }
        if self.niter >= self.max_iter {
            return ConvergenceStatus::MaximumIterations;
        }
        ConvergenceStatus::Continue
    }
}
