use criterion::{criterion_group, criterion_main, Criterion};
use nalgebra::{DMatrix, DVector};
use resode::{IntegratorBuilder, LinearSolver, NalgebraLU};

#[cfg(feature = "faer")]
use resode::FaerLU;

// Robertson chemical kinetics as a residual, stiff with analytic partials
// dy0/dt = -0.04 y0 + 1e4 y1 y2
// dy1/dt = 0.04 y0 - 1e4 y1 y2 - 3e7 y1^2
// dy2/dt = 3e7 y1^2
fn robertson(_t: f64, y: &DVector<f64>, dydt: &DVector<f64>, r: &mut DVector<f64>) {
    r[0] = dydt[0] + 0.04 * y[0] - 1.0e4 * y[1] * y[2];
    r[1] = dydt[1] - 0.04 * y[0] + 1.0e4 * y[1] * y[2] + 3.0e7 * y[1] * y[1];
    r[2] = dydt[2] - 3.0e7 * y[1] * y[1];
}

fn robertson_partials(
    _t: f64,
    y: &DVector<f64>,
    _dydt: &DVector<f64>,
    dr_dy: &mut DMatrix<f64>,
    dr_ddydt: &mut DMatrix<f64>,
) {
    dr_dy.copy_from(&DMatrix::from_row_slice(
        3,
        3,
        &[
            0.04,
            -1.0e4 * y[2],
            -1.0e4 * y[1],
            -0.04,
            1.0e4 * y[2] + 6.0e7 * y[1],
            1.0e4 * y[1],
            0.0,
            -6.0e7 * y[1],
            0.0,
        ],
    ));
    dr_ddydt.fill_with_identity();
}

fn robertson_y0() -> DVector<f64> {
    DVector::from_vec(vec![1.0, 0.0, 0.0])
}

fn run(scheme: &str, linear_solver: Box<dyn LinearSolver>, partials: bool) {
    let builder = IntegratorBuilder::new()
        .scheme(scheme)
        .target_error(Some(1e-6))
        .linear_solver(linear_solver);
    let trajectory = if partials {
        builder
            .build_residual_with_partials(robertson, robertson_partials, 3)
            .unwrap()
            .integrate(robertson_y0(), 1.0, 1e-4)
    } else {
        builder
            .build_residual(robertson, 3)
            .unwrap()
            .integrate(robertson_y0(), 1.0, 1e-4)
    };
    trajectory.unwrap();
}

fn criterion_benchmark(c: &mut Criterion) {
    macro_rules! bench {
        ($name:ident, $scheme:expr, $linear_solver:ident, $partials:expr) => {
            c.bench_function(stringify!($name), |b| {
                b.iter(|| run($scheme, Box::new($linear_solver::default()), $partials))
            });
        };
    }

    bench!(nalgebra_bdf2_mp_robertson, "bdf2-mp", NalgebraLU, true);
    bench!(nalgebra_bdf2_ebdf3_robertson, "bdf2-ebdf3", NalgebraLU, true);
    bench!(nalgebra_imr_ebdf3_robertson, "imr-ebdf3", NalgebraLU, true);
    bench!(nalgebra_bdf2_mp_robertson_fd, "bdf2-mp", NalgebraLU, false);
    #[cfg(feature = "faer")]
    bench!(faer_bdf2_mp_robertson, "bdf2-mp", FaerLU, true);
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
