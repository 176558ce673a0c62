use std::fmt;

use nalgebra::DVector;

use crate::{
    error::{OdeSolverError, ResodeError},
    ode_solver::{
        explicit::{ab2_step, ebdf3_step, emr_step, interpolate_dydt, Predictor},
        history::HistoryWindow,
        residual::bdf2_dydt,
        scheme::{Bdf2MidpointWeight, DydtFunction},
    },
};

/// Local truncation error estimators, each comparing the accepted implicit solution at the
/// speculative point of a window with an explicit predictor built from the same history.
#[derive(Clone)]
pub enum ErrorEstimator {
    /// BDF2 against the explicit midpoint rule, with the derivative at `t_n` from inverting BDF2
    /// one step back.
    Bdf2Midpoint(Bdf2MidpointWeight),
    /// Any second order method against explicit BDF3. The derivative at `t_n` comes from the
    /// exact derivative if given, otherwise from interpolating midpoint derivatives.
    ExplicitBdf3(Option<DydtFunction>),
    /// Trapezoid rule against Adams-Bashforth 2 using the exact derivative.
    TrapezoidAb2(DydtFunction),
    /// Implicit midpoint against two quadratic predictors whose difference cancels the unknown
    /// third derivative.
    TwoPredictor {
        predictors: [Predictor; 2],
        dydt: Option<DydtFunction>,
    },
}

impl ErrorEstimator {
    /// Number of points the window must hold, including the speculative one.
    pub fn history_points(&self) -> usize {
        match self {
            ErrorEstimator::Bdf2Midpoint(_) | ErrorEstimator::ExplicitBdf3(_) => 4,
            ErrorEstimator::TrapezoidAb2(_) => 3,
            ErrorEstimator::TwoPredictor { predictors, .. } => {
                predictors
                    .iter()
                    .map(|p| p.committed_points())
                    .max()
                    .unwrap_or(1)
                    + 1
            }
        }
    }

    pub fn estimate(&self, window: &HistoryWindow) -> Result<DVector<f64>, ResodeError> {
        window.require(self.history_points())?;
        let h = window.dt(0);
        let y_np1 = window.y(0);
        match self {
            ErrorEstimator::Bdf2Midpoint(weight) => {
                let previous = window.previous().ok_or_else(|| {
                    ResodeError::from(OdeSolverError::NotEnoughHistory {
                        required: 4,
                        available: window.len(),
                    })
                })?;
                let dy_n = bdf2_dydt(&previous);
                let predicted = emr_step(window, &dy_n);
                Ok((y_np1 - predicted) * weight.weight(h, window.dt(1)))
            }
            ErrorEstimator::ExplicitBdf3(dydt) => {
                let dy_n = match dydt {
                    Some(f) => f(window.t(1), window.y(1)),
                    None => interpolate_dydt(window),
                };
                Ok(y_np1 - ebdf3_step(window, &dy_n))
            }
            ErrorEstimator::TrapezoidAb2(f) => {
                let dy_n = f(window.t(1), window.y(1));
                let dy_nm1 = f(window.t(2), window.y(2));
                let predicted = ab2_step(window, &dy_n, &dy_nm1);
                Ok((y_np1 - predicted) / (3.0 * (1.0 + window.dt(1) / h)))
            }
            ErrorEstimator::TwoPredictor { predictors, dydt } => {
                two_predictor_estimate(window, predictors, dydt.as_deref())
            }
        }
    }
}

impl fmt::Debug for ErrorEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorEstimator::Bdf2Midpoint(weight) => {
                f.debug_tuple("Bdf2Midpoint").field(weight).finish()
            }
            ErrorEstimator::ExplicitBdf3(dydt) => f
                .debug_struct("ExplicitBdf3")
                .field("dydt", &dydt.is_some())
                .finish(),
            ErrorEstimator::TrapezoidAb2(_) => f.write_str("TrapezoidAb2"),
            ErrorEstimator::TwoPredictor { predictors, dydt } => f
                .debug_struct("TwoPredictor")
                .field("predictors", predictors)
                .field("dydt", &dydt.is_some())
                .finish(),
        }
    }
}

// With d_i = y_{n+1} - P_i = E - a_i q the unknown q = y'''/6 cancels:
// E = d1 + a1 (d1 - d2) / (a2 - a1)
fn two_predictor_estimate(
    window: &HistoryWindow,
    predictors: &[Predictor; 2],
    dydt: Option<&dyn Fn(f64, &DVector<f64>) -> DVector<f64>>,
) -> Result<DVector<f64>, ResodeError> {
    let mut d = Vec::with_capacity(2);
    let mut a = Vec::with_capacity(2);
    for p in predictors {
        let weights = p.weights(window)?;
        d.push(window.y(0) - p.predict(window, &weights, dydt)?);
        a.push(p.error_constant(window, &weights));
    }
    let denominator = a[1] - a[0];
    if denominator.abs() <= f64::EPSILON * (a[0].abs() + a[1].abs()) {
        return Err(ResodeError::from(OdeSolverError::DegeneratePredictor {
            time: window.t(0),
        }));
    }
    Ok(&d[0] + (&d[0] - &d[1]) * (a[0] / denominator))
}
