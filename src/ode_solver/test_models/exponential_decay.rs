use nalgebra::{DMatrix, DVector};

use crate::op::{
    closure::{Closure, ClosureWithPartials},
    ImplicitResidual,
};

// exponential decay problem with n independent components
// dy/dt = -y
// R = dy/dt + y
fn exponential_decay(y: &DVector<f64>, dydt: &DVector<f64>, r: &mut DVector<f64>) {
    r.copy_from(dydt);
    *r += y;
}

pub fn exponential_decay_residual(nstates: usize) -> impl ImplicitResidual {
    Closure::new(
        |_t: f64, y: &DVector<f64>, dydt: &DVector<f64>, r: &mut DVector<f64>| {
            exponential_decay(y, dydt, r)
        },
        nstates,
    )
}

// dR/dy = I, dR/d(dydt) = I
pub fn exponential_decay_residual_with_partials(nstates: usize) -> impl ImplicitResidual {
    ClosureWithPartials::new(
        |_t: f64, y: &DVector<f64>, dydt: &DVector<f64>, r: &mut DVector<f64>| {
            exponential_decay(y, dydt, r)
        },
        |_t: f64,
         _y: &DVector<f64>,
         _dydt: &DVector<f64>,
         dr_dy: &mut DMatrix<f64>,
         dr_ddydt: &mut DMatrix<f64>| {
            dr_dy.fill_with_identity();
            dr_ddydt.fill_with_identity();
        },
        nstates,
    )
}

pub fn exponential_decay_exact(y0: &DVector<f64>, t: f64) -> DVector<f64> {
    y0 * (-t).exp()
}
