use nalgebra::DVector;

use crate::{error::ResodeError, ode_solver_error, OdeSolverError};

/// The committed solution of an integration run: parallel, append-only lists of times and states.
///
/// Times are strictly increasing and `times.len() == values.len()` always holds. Points are only
/// ever appended by [Trajectory::commit]; nothing already committed is modified.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    times: Vec<f64>,
    values: Vec<DVector<f64>>,
}

impl Trajectory {
    /// Create a trajectory containing only the seed point `(t0, y0)`.
    pub fn new(t0: f64, y0: DVector<f64>) -> Self {
        Self {
            times: vec![t0],
            values: vec![y0],
        }
    }

    /// Create a trajectory from existing history, e.g. to restart a multistep method from known
    /// values. Returns `None` if the lists are empty, differ in length or the times are not
    /// strictly increasing.
    pub fn from_points(times: Vec<f64>, values: Vec<DVector<f64>>) -> Option<Self> {
        if times.is_empty() || times.len() != values.len() {
            return None;
        }
        if times.windows(2).any(|w| w[1] <= w[0]) {
            return None;
        }
        Some(Self { times, values })
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &[DVector<f64>] {
        &self.values
    }

    pub fn last_time(&self) -> f64 {
        self.times.last().copied().unwrap_or(f64::NAN)
    }

    pub fn last_value(&self) -> &DVector<f64> {
        &self.values[self.values.len() - 1]
    }

    pub fn into_parts(self) -> (Vec<f64>, Vec<DVector<f64>>) {
        (self.times, self.values)
    }

    /// A view of the committed history with `(t_next, y_next)` appended speculatively.
    pub fn window<'a>(&'a self, t_next: f64, y_next: &'a DVector<f64>) -> HistoryWindow<'a> {
        HistoryWindow {
            times: &self.times,
            values: &self.values,
            t_next,
            y_next,
        }
    }

    /// Append an accepted point.
    pub(crate) fn commit(&mut self, t: f64, y: DVector<f64>) -> Result<(), ResodeError> {
        let last = self.last_time();
        if t.is_nan() || t <= last {
            return Err(ode_solver_error!(
                Other,
                format!("committed time {t} does not advance past {last}")
            ));
        }
        self.times.push(t);
        self.values.push(y);
        Ok(())
    }
}

/// Read-only view of a history plus one speculative point at its end.
///
/// Indexing counts backwards from the newest point: index `0` is the speculative `(t_next,
/// y_next)`, index `1` is the newest committed point `(t_n, y_n)`, index `2` is `(t_{n-1},
/// y_{n-1})`, and so on.
#[derive(Clone, Copy)]
pub struct HistoryWindow<'a> {
    times: &'a [f64],
    values: &'a [DVector<f64>],
    t_next: f64,
    y_next: &'a DVector<f64>,
}

impl<'a> HistoryWindow<'a> {
    /// Build a window whose speculative point is the last element of `times` / `values`.
    pub fn from_slices(times: &'a [f64], values: &'a [DVector<f64>]) -> Option<Self> {
        let (t_next, times) = times.split_last()?;
        let (y_next, values) = values.split_last()?;
        if times.len() != values.len() {
            return None;
        }
        Some(Self {
            times,
            values,
            t_next: *t_next,
            y_next,
        })
    }

    /// Total number of points, including the speculative one.
    pub fn len(&self) -> usize {
        self.times.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of committed points.
    pub fn committed_len(&self) -> usize {
        self.times.len()
    }

    pub fn t(&self, back: usize) -> f64 {
        if back == 0 {
            self.t_next
        } else {
            self.times[self.times.len() - back]
        }
    }

    pub fn y(&self, back: usize) -> &'a DVector<f64> {
        if back == 0 {
            self.y_next
        } else {
            &self.values[self.values.len() - back]
        }
    }

    /// Step size ending at point `back`, i.e. `t(back) - t(back + 1)`.
    pub fn dt(&self, back: usize) -> f64 {
        self.t(back) - self.t(back + 1)
    }

    /// Fail unless at least `required` points (including the speculative one) are available.
    pub fn require(&self, required: usize) -> Result<(), ResodeError> {
        if self.len() < required {
            return Err(ResodeError::from(OdeSolverError::NotEnoughHistory {
                required,
                available: self.len(),
            }));
        }
        Ok(())
    }

    /// The same history with the speculative point removed, so that the newest committed point
    /// becomes the speculative one. Used to evaluate formulas "one step back".
    pub fn previous(&self) -> Option<HistoryWindow<'a>> {
        let (t_next, times) = self.times.split_last()?;
        let (y_next, values) = self.values.split_last()?;
        Some(HistoryWindow {
            times,
            values,
            t_next: *t_next,
            y_next,
        })
    }
}
