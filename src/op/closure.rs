use std::cell::RefCell;

use nalgebra::{DMatrix, DVector};

use super::{ImplicitResidual, OpStatistics};

/// An [ImplicitResidual] defined by a closure `func(t, y, dydt, r)` that writes `R(t, y, dydt)`
/// into `r`.
pub struct Closure<F>
where
    F: Fn(f64, &DVector<f64>, &DVector<f64>, &mut DVector<f64>),
{
    func: F,
    nstates: usize,
    statistics: RefCell<OpStatistics>,
}

impl<F> Closure<F>
where
    F: Fn(f64, &DVector<f64>, &DVector<f64>, &mut DVector<f64>),
{
    pub fn new(func: F, nstates: usize) -> Self {
        Self {
            func,
            nstates,
            statistics: RefCell::new(OpStatistics::default()),
        }
    }
}

impl<F> ImplicitResidual for Closure<F>
where
    F: Fn(f64, &DVector<f64>, &DVector<f64>, &mut DVector<f64>),
{
    fn nstates(&self) -> usize {
        self.nstates
    }
    fn call_inplace(&self, t: f64, y: &DVector<f64>, dydt: &DVector<f64>, r: &mut DVector<f64>) {
        self.statistics.borrow_mut().increment_call();
        (self.func)(t, y, dydt, r)
    }
    fn statistics(&self) -> OpStatistics {
        self.statistics.borrow().clone()
    }
}

/// An [ImplicitResidual] with user supplied partial derivatives.
///
/// `partials(t, y, dydt, dr_dy, dr_ddydt)` must overwrite both matrices with `dR/dy` and
/// `dR/d(dydt)` evaluated at `(t, y, dydt)`.
pub struct ClosureWithPartials<F, G>
where
    F: Fn(f64, &DVector<f64>, &DVector<f64>, &mut DVector<f64>),
    G: Fn(f64, &DVector<f64>, &DVector<f64>, &mut DMatrix<f64>, &mut DMatrix<f64>),
{
    func: F,
    partials: G,
    nstates: usize,
    statistics: RefCell<OpStatistics>,
}

impl<F, G> ClosureWithPartials<F, G>
where
    F: Fn(f64, &DVector<f64>, &DVector<f64>, &mut DVector<f64>),
    G: Fn(f64, &DVector<f64>, &DVector<f64>, &mut DMatrix<f64>, &mut DMatrix<f64>),
{
    pub fn new(func: F, partials: G, nstates: usize) -> Self {
        Self {
            func,
            partials,
            nstates,
            statistics: RefCell::new(OpStatistics::default()),
        }
    }
}

impl<F, G> ImplicitResidual for ClosureWithPartials<F, G>
where
    F: Fn(f64, &DVector<f64>, &DVector<f64>, &mut DVector<f64>),
    G: Fn(f64, &DVector<f64>, &DVector<f64>, &mut DMatrix<f64>, &mut DMatrix<f64>),
{
    fn nstates(&self) -> usize {
        self.nstates
    }
    fn call_inplace(&self, t: f64, y: &DVector<f64>, dydt: &DVector<f64>, r: &mut DVector<f64>) {
        self.statistics.borrow_mut().increment_call();
        (self.func)(t, y, dydt, r)
    }
    fn has_partials(&self) -> bool {
        true
    }
    fn partials_inplace(
        &self,
        t: f64,
        y: &DVector<f64>,
        dydt: &DVector<f64>,
        dr_dy: &mut DMatrix<f64>,
        dr_ddydt: &mut DMatrix<f64>,
    ) {
        self.statistics.borrow_mut().increment_partials();
        (self.partials)(t, y, dydt, dr_dy, dr_ddydt)
    }
    fn statistics(&self) -> OpStatistics {
        self.statistics.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{DMatrix, DVector};

    use super::*;

    #[test]
    fn closure_counts_calls() {
        // R = dydt - y
        let op = Closure::new(
            |_t: f64, y: &DVector<f64>, dydt: &DVector<f64>, r: &mut DVector<f64>| {
                r.copy_from(&(dydt - y))
            },
            1,
        );
        let r = op.call(0.0, &DVector::from_element(1, 2.0), &DVector::from_element(1, 5.0));
        assert_eq!(r[0], 3.0);
        assert!(!op.has_partials());
        assert_eq!(op.statistics().number_of_calls, 1);
    }

    #[test]
    fn closure_with_partials() {
        let op = ClosureWithPartials::new(
            |_t: f64, y: &DVector<f64>, dydt: &DVector<f64>, r: &mut DVector<f64>| {
                r.copy_from(&(dydt - y))
            },
            |_t: f64,
             _y: &DVector<f64>,
             _dydt: &DVector<f64>,
             dr_dy: &mut DMatrix<f64>,
             dr_ddydt: &mut DMatrix<f64>| {
                dr_dy.fill_with_identity();
                dr_dy.neg_mut();
                dr_ddydt.fill_with_identity();
            },
            2,
        );
        let mut dr_dy = DMatrix::zeros(2, 2);
        let mut dr_ddydt = DMatrix::zeros(2, 2);
        assert!(op.has_partials());
        op.partials_inplace(
            0.0,
            &DVector::zeros(2),
            &DVector::zeros(2),
            &mut dr_dy,
            &mut dr_ddydt,
        );
        assert_eq!(dr_dy, -DMatrix::identity(2, 2));
        assert_eq!(dr_ddydt, DMatrix::identity(2, 2));
        assert_eq!(op.statistics().number_of_partial_evals, 1);
    }
}
