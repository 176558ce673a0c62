use nalgebra::{DMatrix, DVector};

use crate::op::NonLinearOp;

/// Calculate the dense Jacobian of a non-linear operator by forward differences, overwriting `jac`.
///
/// Column `j` is `(F(x + eps * e_j) - F(x)) / eps`, where `fx = F(x)` is passed in so that it is
/// not recomputed for every column.
pub fn finite_difference_jacobian_inplace<F: NonLinearOp + ?Sized>(
    op: &F,
    x: &DVector<f64>,
    fx: &DVector<f64>,
    eps: f64,
    jac: &mut DMatrix<f64>,
) {
    let n = op.nstates();
    let mut xtmp = x.clone();
    let mut col = DVector::zeros(n);
    for j in 0..n {
        xtmp[j] += eps;
        op.call_inplace(&xtmp, &mut col);
        for i in 0..n {
            jac[(i, j)] = (col[i] - fx[i]) / eps;
        }
        xtmp[j] = x[j];
    }
}

/// Calculate the dense Jacobian of a non-linear operator by forward differences.
pub fn finite_difference_jacobian<F: NonLinearOp + ?Sized>(
    op: &F,
    x: &DVector<f64>,
    eps: f64,
) -> DMatrix<f64> {
    let n = op.nstates();
    let mut fx = DVector::zeros(n);
    op.call_inplace(x, &mut fx);
    let mut jac = DMatrix::zeros(n, n);
    finite_difference_jacobian_inplace(op, x, &fx, eps, &mut jac);
    jac
}
