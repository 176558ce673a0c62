use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::ode_solver::history::Trajectory;

/// Custom error type for resode
///
/// This error type is used to wrap all possible errors that can occur when using resode
#[derive(Error, Debug)]
pub enum ResodeError {
    #[error("Linear solver error: {0}")]
    LinearSolverError(#[from] LinearSolverError),
    #[error("Non-linear solver error: {0}")]
    NonLinearSolverError(#[from] NonLinearSolverError),
    #[error("ODE solver error: {0}")]
    OdeSolverError(#[from] OdeSolverError),
    #[error("Configuration error: {0}")]
    ConfigurationError(#[from] ConfigurationError),
}

impl ResodeError {
    /// True if this error is a Newton convergence failure, which the integrator may recover
    /// from by shrinking the step.
    pub fn is_newton_failure(&self) -> bool {
        matches!(
            self,
            ResodeError::NonLinearSolverError(NonLinearSolverError::NewtonDidNotConverge { .. })
        )
    }

    /// The suggested step size if this error is a step rejection.
    pub fn rejected_step(&self) -> Option<f64> {
        match self {
            ResodeError::OdeSolverError(OdeSolverError::StepRejected { new_dt }) => Some(*new_dt),
            _ => None,
        }
    }
}

/// Possible errors that can occur when solving a linear problem
#[derive(Error, Debug)]
pub enum LinearSolverError {
    #[error("LU not initialized")]
    LuNotInitialized,
    #[error("LU solve failed")]
    LuSolveFailed,
    #[error("Matrix is not square ({nrows} x {ncols})")]
    NotSquare { nrows: usize, ncols: usize },
}

/// Possible errors that can occur when solving a non-linear problem
#[derive(Error, Debug)]
pub enum NonLinearSolverError {
    #[error("Newton did not converge after {iterations} iterations (max residual = {residual_norm:e})")]
    NewtonDidNotConverge {
        iterations: usize,
        residual_norm: f64,
    },
    #[error("Singular Jacobian in Newton iteration\njacobian = {jacobian}residual = {residual}")]
    SingularJacobian {
        jacobian: DMatrix<f64>,
        residual: DVector<f64>,
    },
    #[error("Wrong residual length, expected {expected}, found {found}")]
    WrongResidualLength { expected: usize, found: usize },
}

/// Possible errors that can occur when solving an ODE
#[derive(Debug, Error)]
pub enum OdeSolverError {
    #[error("Step rejected, retry with dt = {new_dt:e}")]
    StepRejected { new_dt: f64 },
    #[error("Tried to reduce dt to {dt:e} which is less than the minimum of {minimum:e}")]
    StepSizeUnderflow { dt: f64, minimum: f64 },
    #[error("Not enough history for this formula: need {required} points, have {available}")]
    NotEnoughHistory { required: usize, available: usize },
    #[error("Derivative recovery midpoint {found} does not match t = {expected}")]
    DerivativeRecoveryMismatch { expected: f64, found: f64 },
    #[error("History shrank from {expected} to {found} points, derivative cache is out of sync")]
    HistoryRewritten { expected: usize, found: usize },
    #[error("Predictor pair is degenerate at t = {time}")]
    DegeneratePredictor { time: f64 },
    #[error("Other error: {0}")]
    Other(String),
}

/// Possible errors detected while setting up an integration, before any step is taken
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Method '{0}' not recognised")]
    UnknownScheme(String),
    #[error("Method '{scheme}' requires parameter '{parameter}'")]
    MissingParameter {
        scheme: &'static str,
        parameter: &'static str,
    },
    #[error("Predictor {index} must have exactly three points including at least one value, found {found:?}")]
    InvalidPredictor { index: usize, found: String },
    #[error("Predictor point reaches back {depth} steps, at most {maximum} are supported")]
    PredictorTooDeep { depth: usize, maximum: usize },
    #[error("Initial step {dt:e} is outside the allowed range [{minimum:e}, {maximum:e}]")]
    InvalidInitialStep { dt: f64, minimum: f64, maximum: f64 },
    #[error("Horizon {horizon} must be finite and after the start time {t0}")]
    InvalidHorizon { t0: f64, horizon: f64 },
    #[error("Initial value must have at least one component")]
    EmptyInitialValue,
    #[error("Residual has {found} components but the state has {expected}")]
    ResidualLengthMismatch { expected: usize, found: usize },
    #[error("Invalid value {value:e} for option '{option}'")]
    InvalidOption { option: &'static str, value: f64 },
}

/// A fatal error during integration, together with every point committed before it occurred.
#[derive(Debug, Error)]
#[error("Integration stopped at t = {} after {} committed points: {error}", .trajectory.last_time(), .trajectory.len())]
pub struct IntegrationFailure {
    #[source]
    pub error: ResodeError,
    pub trajectory: Trajectory,
}

impl IntegrationFailure {
    pub fn new(error: ResodeError, trajectory: Trajectory) -> Self {
        Self { error, trajectory }
    }
    pub fn into_parts(self) -> (ResodeError, Trajectory) {
        (self.error, self.trajectory)
    }
}

#[macro_export]
macro_rules! linear_solver_error {
    ($variant:ident) => {
        $crate::error::ResodeError::from($crate::error::LinearSolverError::$variant)
    };
}

#[macro_export]
macro_rules! ode_solver_error {
    ($variant:ident) => {
        $crate::error::ResodeError::from($crate::error::OdeSolverError::$variant)
    };
    ($variant:ident, $($arg:tt)*) => {
        $crate::error::ResodeError::from($crate::error::OdeSolverError::$variant($($arg)*.to_string()))
    };
}
