use nalgebra::{DMatrix, DVector};

use crate::op::{closure::ClosureWithPartials, ImplicitResidual};

// harmonic oscillator written as a first order system
// dy0/dt = y1
// dy1/dt = -w^2 y0
// R = dy/dt - A y,  A = | 0    1 |
//                       | -w^2 0 |
fn oscillator(w: f64, y: &DVector<f64>, dydt: &DVector<f64>, r: &mut DVector<f64>) {
    r[0] = dydt[0] - y[1];
    r[1] = dydt[1] + w * w * y[0];
}

pub fn oscillator_residual(w: f64) -> impl ImplicitResidual {
    ClosureWithPartials::new(
        move |_t: f64, y: &DVector<f64>, dydt: &DVector<f64>, r: &mut DVector<f64>| {
            oscillator(w, y, dydt, r)
        },
        move |_t: f64,
              _y: &DVector<f64>,
              _dydt: &DVector<f64>,
              dr_dy: &mut DMatrix<f64>,
              dr_ddydt: &mut DMatrix<f64>| {
            dr_dy.copy_from(&DMatrix::from_row_slice(2, 2, &[0.0, -1.0, w * w, 0.0]));
            dr_ddydt.fill_with_identity();
        },
        2,
    )
}

/// Solution with `y(0) = (1, 0)`.
pub fn oscillator_exact(w: f64, t: f64) -> DVector<f64> {
    DVector::from_vec(vec![(w * t).cos(), -w * (w * t).sin()])
}
