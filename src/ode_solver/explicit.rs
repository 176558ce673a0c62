use nalgebra::{DVector, Matrix3, Vector3};

use crate::{error::ResodeError, ode_solver::history::HistoryWindow, ode_solver_error, OdeSolverError};

// All predictors read the committed points of a window and predict the value at its speculative
// time `t(0)`. The speculative value itself is never read.

/// Variable step Adams-Bashforth 2: `y_n + (h/2)((2 + r) dy_n - r dy_{n-1})`, `r = h/k`.
pub fn ab2_step(window: &HistoryWindow, dy_n: &DVector<f64>, dy_nm1: &DVector<f64>) -> DVector<f64> {
    let h = window.dt(0);
    let r = h / window.dt(1);
    window.y(1) + (dy_n * (2.0 + r) - dy_nm1 * r) * (0.5 * h)
}

/// Variable step explicit midpoint rule (explicit BDF2):
/// `(1 - r^2) y_n + (1 + r) h dy_n + r^2 y_{n-1}`, `r = h/k`.
pub fn emr_step(window: &HistoryWindow, dy_n: &DVector<f64>) -> DVector<f64> {
    let h = window.dt(0);
    let r = h / window.dt(1);
    window.y(1) * (1.0 - r * r) + dy_n * ((1.0 + r) * h) + window.y(2) * (r * r)
}

/// Variable step explicit BDF3: the cubic through `y_n`, `y_{n-1}`, `y_{n-2}` with slope `dy_n`
/// at `t_n`, evaluated at the speculative time.
pub fn ebdf3_step(window: &HistoryWindow, dy_n: &DVector<f64>) -> DVector<f64> {
    let h = window.dt(0);
    let k = window.dt(1);
    let k2 = window.dt(2);
    let (y_n, y_nm1, y_nm2) = (window.y(1), window.y(2), window.y(3));

    // Newton form on the nodes t_n, t_n, t_{n-1}, t_{n-2}
    let f01 = (y_n - y_nm1) / k;
    let f12 = (y_nm1 - y_nm2) / k2;
    let f001 = (dy_n - &f01) / k;
    let f012 = (&f01 - &f12) / (k + k2);
    let f0012 = (&f001 - &f012) / (k + k2);

    y_n + dy_n * h + f001 * (h * h) + f0012 * (h * h * (h + k))
}

/// Derivative at `t_n` from quadratic interpolation of the three newest midpoint derivatives,
/// including the one over the speculative step. Needs four points in the window.
pub fn interpolate_dydt(window: &HistoryWindow) -> DVector<f64> {
    let t_n = window.t(1);
    let mids: Vec<f64> = (0..3).map(|i| 0.5 * (window.t(i) + window.t(i + 1))).collect();
    let mut dydt = DVector::zeros(window.y(1).len());
    for i in 0..3 {
        let slope = (window.y(i) - window.y(i + 1)) / window.dt(i);
        let basis: f64 = (0..3)
            .filter(|&j| j != i)
            .map(|j| (t_n - mids[j]) / (mids[i] - mids[j]))
            .product();
        dydt.axpy(basis, &slope, 1.0);
    }
    dydt
}

/// One constraint on a quadratic predictor, indexed by how many steps back from `t_n` it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictorPoint {
    /// The value `y_{n-j}`.
    Value(usize),
    /// The exact derivative at `t_{n-j}`, from the user supplied derivative function.
    Derivative(usize),
    /// The mean slope `(y_{n-j} - y_{n-j-1}) / dt` over `[t_{n-j-1}, t_{n-j}]`.
    MidpointDerivative(usize),
}

impl PredictorPoint {
    /// Number of committed points needed to evaluate this constraint.
    pub fn committed_points(&self) -> usize {
        match self {
            PredictorPoint::Value(j) | PredictorPoint::Derivative(j) => j + 1,
            PredictorPoint::MidpointDerivative(j) => j + 2,
        }
    }

    pub fn needs_derivative(&self) -> bool {
        matches!(self, PredictorPoint::Derivative(_))
    }

    /// Row of the constraint applied to the basis `1, tau, tau^2` with `tau = t - t_n`.
    fn row(&self, window: &HistoryWindow) -> Vector3<f64> {
        match *self {
            PredictorPoint::Value(j) => {
                let tau = window.t(j + 1) - window.t(1);
                Vector3::new(1.0, tau, tau * tau)
            }
            PredictorPoint::Derivative(j) => {
                let tau = window.t(j + 1) - window.t(1);
                Vector3::new(0.0, 1.0, 2.0 * tau)
            }
            PredictorPoint::MidpointDerivative(j) => {
                let a = window.t(j + 1) - window.t(1);
                let b = window.t(j + 2) - window.t(1);
                Vector3::new(0.0, 1.0, a + b)
            }
        }
    }

    /// The constraint applied to `tau^3`.
    fn cubic(&self, window: &HistoryWindow) -> f64 {
        match *self {
            PredictorPoint::Value(j) => (window.t(j + 1) - window.t(1)).powi(3),
            PredictorPoint::Derivative(j) => 3.0 * (window.t(j + 1) - window.t(1)).powi(2),
            PredictorPoint::MidpointDerivative(j) => {
                let a = window.t(j + 1) - window.t(1);
                let b = window.t(j + 2) - window.t(1);
                a * a + a * b + b * b
            }
        }
    }
}

/// A quadratic explicit predictor fixed by exactly three [PredictorPoint]s, at least one of
/// which is a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predictor {
    points: [PredictorPoint; 3],
}

impl Predictor {
    pub fn new(points: &[PredictorPoint]) -> Option<Self> {
        let points: [PredictorPoint; 3] = points.try_into().ok()?;
        if !points.iter().any(|p| matches!(p, PredictorPoint::Value(_))) {
            return None;
        }
        Some(Self { points })
    }

    pub fn committed_points(&self) -> usize {
        self.points
            .iter()
            .map(|p| p.committed_points())
            .max()
            .unwrap_or(1)
    }

    pub fn needs_derivative(&self) -> bool {
        self.points.iter().any(|p| p.needs_derivative())
    }

    /// Weights `w` such that the prediction is `sum_i w_i d_i`, where `d_i` is the data of point
    /// `i`. Fails if the three constraints do not determine a unique quadratic.
    pub fn weights(&self, window: &HistoryWindow) -> Result<Vector3<f64>, ResodeError> {
        let h = window.dt(0);
        let rows: Vec<_> = self.points.iter().map(|p| p.row(window).transpose()).collect();
        let a = Matrix3::from_rows(&rows);
        a.transpose()
            .lu()
            .solve(&Vector3::new(1.0, h, h * h))
            .filter(|w| w.iter().all(|x| x.is_finite()))
            .ok_or_else(|| {
                ResodeError::from(OdeSolverError::DegeneratePredictor { time: window.t(0) })
            })
    }

    /// Predicted value at the speculative time. `dydt` must be given if any point is a
    /// [PredictorPoint::Derivative].
    pub fn predict(
        &self,
        window: &HistoryWindow,
        weights: &Vector3<f64>,
        dydt: Option<&dyn Fn(f64, &DVector<f64>) -> DVector<f64>>,
    ) -> Result<DVector<f64>, ResodeError> {
        let mut prediction = DVector::zeros(window.y(1).len());
        for (point, w) in self.points.iter().zip(weights.iter()) {
            let data = match *point {
                PredictorPoint::Value(j) => window.y(j + 1).clone(),
                PredictorPoint::Derivative(j) => {
                    let f = dydt.ok_or_else(|| {
                        ode_solver_error!(Other, "predictor needs the exact derivative function")
                    })?;
                    f(window.t(j + 1), window.y(j + 1))
                }
                PredictorPoint::MidpointDerivative(j) => {
                    (window.y(j + 1) - window.y(j + 2)) / window.dt(j + 1)
                }
            };
            prediction.axpy(*w, &data, 1.0);
        }
        Ok(prediction)
    }

    /// Error of the prediction for `y = tau^3`, i.e. predicted minus exact. The leading error of
    /// the prediction for smooth `y` is this constant times `y'''/6`.
    pub fn error_constant(&self, window: &HistoryWindow, weights: &Vector3<f64>) -> f64 {
        let predicted: f64 = self
            .points
            .iter()
            .zip(weights.iter())
            .map(|(p, w)| w * p.cubic(window))
            .sum();
        predicted - window.dt(0).powi(3)
    }
}
