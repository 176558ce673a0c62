use nalgebra::{DMatrix, DVector};

use crate::op::{
    closure::{Closure, ClosureWithPartials},
    ImplicitResidual,
};

// exponential growth problem
// dy/dt = ly, y(0) = 1
// R = dy/dt - ly
fn exponential_growth(l: f64, y: &DVector<f64>, dydt: &DVector<f64>, r: &mut DVector<f64>) {
    r.copy_from(dydt);
    r.axpy(-l, y, 1.0);
}

// dR/dy = -l, dR/d(dydt) = 1
fn exponential_growth_partials(l: f64, dr_dy: &mut DMatrix<f64>, dr_ddydt: &mut DMatrix<f64>) {
    dr_dy.fill(0.0);
    dr_dy.fill_diagonal(-l);
    dr_ddydt.fill_with_identity();
}

/// Scalar `dy/dt = l y` with analytic partials.
pub fn exponential_growth_residual(l: f64) -> impl ImplicitResidual {
    ClosureWithPartials::new(
        move |_t: f64, y: &DVector<f64>, dydt: &DVector<f64>, r: &mut DVector<f64>| {
            exponential_growth(l, y, dydt, r)
        },
        move |_t: f64,
              _y: &DVector<f64>,
              _dydt: &DVector<f64>,
              dr_dy: &mut DMatrix<f64>,
              dr_ddydt: &mut DMatrix<f64>| {
            exponential_growth_partials(l, dr_dy, dr_ddydt)
        },
        1,
    )
}

/// Scalar `dy/dt = l y`, Jacobians by finite differences.
pub fn exponential_growth_residual_no_partials(l: f64) -> impl ImplicitResidual {
    Closure::new(
        move |_t: f64, y: &DVector<f64>, dydt: &DVector<f64>, r: &mut DVector<f64>| {
            exponential_growth(l, y, dydt, r)
        },
        1,
    )
}

pub fn exponential_growth_exact(l: f64, t: f64) -> DVector<f64> {
    DVector::from_element(1, (l * t).exp())
}

/// The exact derivative `f(t, y) = l y`.
pub fn exponential_growth_dydt(l: f64) -> impl Fn(f64, &DVector<f64>) -> DVector<f64> + 'static {
    move |_t: f64, y: &DVector<f64>| y * l
}
