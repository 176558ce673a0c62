use nalgebra::DVector;

/// Norms and comparisons on state vectors used throughout the solvers.
pub trait VectorExt {
    /// max_i |x_i|, the norm used for Newton convergence.
    fn max_abs(&self) -> f64;

    /// sqrt(sum_i x_i^2), the norm used for step-size control.
    fn two_norm(&self) -> f64;

    fn is_all_finite(&self) -> bool;

    fn assert_eq_st(&self, other: &Self, tol: f64);

    fn assert_eq(&self, other: &Self, tol: &Self);
}

impl VectorExt for DVector<f64> {
    fn max_abs(&self) -> f64 {
        self.iter().fold(0.0, |acc: f64, x| {
            if acc.is_nan() || x.is_nan() {
                f64::NAN
            } else {
                acc.max(x.abs())
            }
        })
    }

    fn two_norm(&self) -> f64 {
        self.norm()
    }

    fn is_all_finite(&self) -> bool {
        self.iter().all(|x| x.is_finite())
    }

    fn assert_eq_st(&self, other: &Self, tol: f64) {
        let tol = DVector::from_element(self.len(), tol);
        self.assert_eq(other, &tol);
    }

    fn assert_eq(&self, other: &Self, tol: &Self) {
        assert_eq!(
            self.len(),
            other.len(),
            "Vector length mismatch: {} != {}",
            self.len(),
            other.len()
        );
        for i in 0..self.len() {
            if (self[i] - other[i]).abs() > tol[i] || self[i].is_nan() {
                eprintln!(
                    "Vector element mismatch at index {}: {} != {}",
                    i, self[i], other[i]
                );
                if self.len() <= 3 {
                    eprintln!("left: {:?}", self.as_slice());
                    eprintln!("right: {:?}", other.as_slice());
                }
                panic!(
                    "Vector element mismatch at index {}: {} != {} (tol = {})",
                    i, self[i], other[i], tol[i]
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn norms() {
        let v = DVector::from_vec(vec![3.0, -4.0]);
        assert_eq!(v.max_abs(), 4.0);
        assert_eq!(v.two_norm(), 5.0);
        assert!(v.is_all_finite());
        assert!(!DVector::from_vec(vec![f64::NAN]).is_all_finite());
        // NaN entries must not be hidden by the max
        assert!(DVector::from_vec(vec![f64::NAN, 1.0]).max_abs().is_nan());
        assert!(DVector::from_vec(vec![1.0, f64::NAN]).max_abs().is_nan());
    }

    #[test]
    #[should_panic]
    fn assert_eq_panics_on_mismatch() {
        let v = DVector::from_vec(vec![1.0, 2.0]);
        v.assert_eq_st(&DVector::from_vec(vec![1.0, 2.1]), 1e-3);
    }
}
