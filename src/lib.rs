//! # Resode
//!
//! Resode integrates ordinary differential equations written in residual form `R(t, y, dy/dt) = 0`, which covers explicit
//! ODEs `dy/dt = f(t, y)` (with `R = dy/dt - f`) as well as implicit ones. Every scheme is implicit: each step solves a nonlinear
//! system for the new state with Newton's method.
//!
//! ## Solving ODEs
//!
//! The simplest way to set up an integration is the [IntegratorBuilder]. Choose a scheme by name ([IntegratorBuilder::scheme]),
//! a target local error for adaptive stepping ([IntegratorBuilder::target_error]) and any Newton or step control settings, then
//! call [IntegratorBuilder::build_residual] or [IntegratorBuilder::build_residual_with_partials] with your residual. For one-off
//! runs the free function [integrate] does the same in a single call.
//!
//! [Integrator::integrate] returns the [Trajectory] of every committed `(t, y)` point. If the integration fails part way, the
//! returned [IntegrationFailure] holds the error and the trajectory up to the failure.
//!
//! ## Schemes
//!
//! | name | formula | error estimator |
//! |---|---|---|
//! | `bdf1`, `bdf2`, `bdf3`, `bdf4` | backward differentiation | none (fixed steps) |
//! | `imr` | implicit midpoint | none |
//! | `trapezoid` (`tr`) | trapezoid rule | none |
//! | `bdf2-mp` | BDF2 | explicit midpoint predictor |
//! | `bdf2-ebdf3` | BDF2 | explicit BDF3 predictor |
//! | `imr-ebdf3` | implicit midpoint | explicit BDF3 predictor |
//! | `imr-w18` | implicit midpoint | two configurable quadratic predictors |
//! | `tr-ab` | trapezoid rule | Adams-Bashforth 2 with the exact derivative |
//!
//! Multistep schemes create the history they need with a few very small implicit midpoint steps before the first regular step.
//!
//! ## Jacobians and linear solvers
//!
//! Newton's method needs the Jacobian of each step's nonlinear system. If the residual provides the partial derivatives
//! `dR/dy` and `dR/d(dy/dt)` ([ImplicitResidual::partials_inplace]) the Jacobian is assembled analytically, otherwise it is
//! approximated by forward differences. The linear systems are solved with the [nalgebra](https://nalgebra.org) LU
//! decomposition ([NalgebraLU]) by default, or with [faer](https://github.com/sarah-ek/faer-rs) ([FaerLU]) when the `faer`
//! feature is enabled.

pub mod error;
pub mod jacobian;
pub mod linear_solver;
pub mod nonlinear_solver;
pub mod ode_solver;
pub mod op;
pub mod vector;

pub use error::{
    ConfigurationError, IntegrationFailure, LinearSolverError, NonLinearSolverError,
    OdeSolverError, ResodeError,
};

#[cfg(feature = "faer")]
pub use linear_solver::FaerLU;
pub use linear_solver::{LinearClosure, LinearSolver, NalgebraLU};

pub use nonlinear_solver::{newton::NewtonNonlinearSolver, NonLinearSolver};

pub use ode_solver::{
    builder::IntegratorBuilder,
    config::{BootstrapConfig, IntegratorConfig, NewtonConfig, StepControlConfig},
    explicit::PredictorPoint,
    history::{HistoryWindow, Trajectory},
    integrator::{integrate, IntegrationStatistics, Integrator, PostStepCallback},
    scheme::{Bdf2MidpointWeight, SchemeName, SchemeSpec},
    step_control::StepSizeController,
};

pub use op::{
    closure::{Closure, ClosureWithPartials},
    nonlinear_closure::NonLinearClosure,
    ImplicitResidual, NonLinearOp, OpStatistics,
};

pub use vector::VectorExt;
