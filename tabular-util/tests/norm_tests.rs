use approx::assert_abs_diff_eq;
use tabular_util::traits::MatOps;

#[test]
fn dmatrix_normalize_test() {
    let mut xx = tabular_util::dmatrix_util::runif(100, 10);
    // inflate so every column norm exceeds one
    xx *= 10.0;
    xx.normalize_columns_inplace();

    for j in 0..xx.ncols() {
        let norm = xx.column(j).norm();
        assert_abs_diff_eq!(norm, 1.0, epsilon = 1e-4);
    }
}

#[test]
fn dmatrix_centre_test() {
    let xx = tabular_util::dmatrix_util::rnorm(200, 5);
    let yy = xx.centre_columns();

    for j in 0..yy.ncols() {
        let mu = yy.column(j).mean();
        assert_abs_diff_eq!(mu, 0.0, epsilon = 1e-4);
    }
}

#[test]
fn pearson_correlation_test() {
    use tabular_util::dmatrix_util::pearson_correlation;
    let xx = nalgebra::DVector::<f32>::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
    let yy = xx.scale(-2.0);

    assert_abs_diff_eq!(pearson_correlation(&xx, &xx), 1.0, epsilon = 1e-5);
    assert_abs_diff_eq!(pearson_correlation(&xx, &yy), -1.0, epsilon = 1e-5);
}
