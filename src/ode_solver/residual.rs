use nalgebra::DVector;

use crate::{error::ResodeError, ode_solver_error, ode_solver::history::HistoryWindow};

/// The implicit formulas that turn a residual `R(t, y, dy/dt)` into an equation for the next
/// state alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImplicitFormula {
    Bdf1,
    Bdf2,
    Bdf3,
    Bdf4,
    Midpoint,
    Trapezoid,
}

impl ImplicitFormula {
    /// Nominal order of accuracy.
    pub fn order(&self) -> usize {
        match self {
            ImplicitFormula::Bdf1 => 1,
            ImplicitFormula::Bdf2 | ImplicitFormula::Midpoint | ImplicitFormula::Trapezoid => 2,
            ImplicitFormula::Bdf3 => 3,
            ImplicitFormula::Bdf4 => 4,
        }
    }

    /// Number of points read from the history window, including the unknown next state.
    pub fn history_points(&self) -> usize {
        match self {
            ImplicitFormula::Bdf1 | ImplicitFormula::Midpoint | ImplicitFormula::Trapezoid => 2,
            ImplicitFormula::Bdf2 => 3,
            ImplicitFormula::Bdf3 => 4,
            ImplicitFormula::Bdf4 => 5,
        }
    }

    /// Check the window and bind any extra data the formula needs. The trapezoid rule needs the
    /// derivative at the newest committed point.
    pub fn stage<'a>(
        &self,
        window: &HistoryWindow,
        previous_dydt: Option<&'a DVector<f64>>,
    ) -> Result<Stage<'a>, ResodeError> {
        window.require(self.history_points())?;
        let stage = match self {
            ImplicitFormula::Bdf1 => Stage::Bdf1,
            ImplicitFormula::Bdf2 => Stage::Bdf2,
            ImplicitFormula::Bdf3 => Stage::Bdf(3),
            ImplicitFormula::Bdf4 => Stage::Bdf(4),
            ImplicitFormula::Midpoint => Stage::Midpoint,
            ImplicitFormula::Trapezoid => Stage::Trapezoid(previous_dydt.ok_or_else(|| {
                ode_solver_error!(
                    Other,
                    "trapezoid rule needs the derivative at the previous point"
                )
            })?),
        };
        Ok(stage)
    }
}

/// An [ImplicitFormula] bound to the data it needs for one step.
#[derive(Debug, Clone, Copy)]
pub enum Stage<'a> {
    Bdf1,
    Bdf2,
    Bdf(usize),
    Midpoint,
    Trapezoid(&'a DVector<f64>),
}

/// Arguments at which the base residual is evaluated for a candidate next state, together with
/// their derivatives with respect to that candidate.
#[derive(Debug, Clone)]
pub struct StageValues {
    pub t: f64,
    pub y: DVector<f64>,
    pub dydt: DVector<f64>,
    /// `d(y)/d(y_next)`
    pub y_coeff: f64,
    /// `d(dydt)/d(y_next)`
    pub dydt_coeff: f64,
}

impl Stage<'_> {
    /// Evaluate the stage at the speculative point of `window`. The window must hold at least
    /// [ImplicitFormula::history_points] points.
    pub fn evaluate(&self, window: &HistoryWindow) -> StageValues {
        let h = window.dt(0);
        match self {
            Stage::Bdf1 => StageValues {
                t: window.t(0),
                y: window.y(0).clone(),
                dydt: bdf1_dydt(window),
                y_coeff: 1.0,
                dydt_coeff: 1.0 / h,
            },
            Stage::Bdf2 => StageValues {
                t: window.t(0),
                y: window.y(0).clone(),
                dydt: bdf2_dydt(window),
                y_coeff: 1.0,
                dydt_coeff: bdf_leading_coefficient(window, 2),
            },
            Stage::Bdf(order) => StageValues {
                t: window.t(0),
                y: window.y(0).clone(),
                dydt: bdf_dydt(window, *order),
                y_coeff: 1.0,
                dydt_coeff: bdf_leading_coefficient(window, *order),
            },
            Stage::Midpoint => StageValues {
                t: 0.5 * (window.t(0) + window.t(1)),
                y: (window.y(0) + window.y(1)) * 0.5,
                dydt: midpoint_dydt(window),
                y_coeff: 0.5,
                dydt_coeff: 1.0 / h,
            },
            Stage::Trapezoid(dy_n) => StageValues {
                t: window.t(0),
                y: window.y(0).clone(),
                dydt: trapezoid_dydt(window, dy_n),
                y_coeff: 1.0,
                dydt_coeff: 2.0 / h,
            },
        }
    }
}

/// `(y_{n+1} - y_n) / dt_n`
pub fn bdf1_dydt(window: &HistoryWindow) -> DVector<f64> {
    (window.y(0) - window.y(1)) / window.dt(0)
}

/// The midpoint derivative is the same difference quotient as BDF1, attributed to the midpoint
/// of the step.
pub fn midpoint_dydt(window: &HistoryWindow) -> DVector<f64> {
    bdf1_dydt(window)
}

/// Variable step BDF2 derivative at the speculative point (Gresho & Sani).
pub fn bdf2_dydt(window: &HistoryWindow) -> DVector<f64> {
    let h = window.dt(0);
    let k = window.dt(1);
    let a = 1.0 / h + 1.0 / (h + k);
    let b = -(h + k) / (h * k);
    let c = h / ((h + k) * k);
    window.y(0) * a + window.y(1) * b + window.y(2) * c
}

/// Derivative at the speculative point of the polynomial interpolating the newest `order + 1`
/// points, valid for arbitrary step sequences.
///
/// With nodes `x_0 > x_1 > ... > x_k` (`x_0` the newest) the derivative of the Newton form is
/// `sum_{j=1..k} f[x_0..x_j] prod_{i=1..j-1} (x_0 - x_i)`.
pub fn bdf_dydt(window: &HistoryWindow, order: usize) -> DVector<f64> {
    let npoints = order + 1;
    let ts: Vec<f64> = (0..npoints).map(|i| window.t(i)).collect();
    let mut table: Vec<DVector<f64>> = (0..npoints).map(|i| window.y(i).clone()).collect();
    let mut dydt = DVector::zeros(window.y(0).len());
    let mut product = 1.0;
    for level in 1..npoints {
        for i in 0..npoints - level {
            let diff = (&table[i] - &table[i + 1]) / (ts[i] - ts[i + level]);
            table[i] = diff;
        }
        dydt.axpy(product, &table[0], 1.0);
        product *= ts[0] - ts[level];
    }
    dydt
}

/// `d(bdf_dydt)/d(y_next)`, which is `sum_{j=1..k} 1 / (x_0 - x_j)`.
pub fn bdf_leading_coefficient(window: &HistoryWindow, order: usize) -> f64 {
    (1..=order).map(|j| 1.0 / (window.t(0) - window.t(j))).sum()
}

/// Trapezoid rule derivative `(2 / dt_n) (y_{n+1} - y_n) - dy_n`.
pub fn trapezoid_dydt(window: &HistoryWindow, dy_n: &DVector<f64>) -> DVector<f64> {
    (window.y(0) - window.y(1)) * (2.0 / window.dt(0)) - dy_n
}
