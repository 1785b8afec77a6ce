use approx::assert_abs_diff_eq;
use nalgebra::DMatrix;
use rand::SeedableRng;
use variational_param::dmatrix_gamma::GammaMatrix;
use variational_param::dmatrix_gaussian::GaussianMatrix;
use variational_param::traits::{Inference, TwoStatParam};

#[test]
fn gaussian_calibration() {
    let mut theta = GaussianMatrix::new((2, 1), 0.0, 1.0);

    let add_a = DMatrix::from_vec(2, 1, vec![2.0, 0.0]);
    let add_b = DMatrix::from_vec(2, 1, vec![3.0, 0.0]);
    theta.update_stat(&add_a, &add_b);
    theta.calibrate();

    // first coordinate: (0 + 2) / (1 + 3)
    assert_abs_diff_eq!(theta.posterior_mean()[(0, 0)], 0.5, epsilon = 1e-6);
    assert_abs_diff_eq!(theta.posterior_sd()[(0, 0)], 0.5, epsilon = 1e-6);

    // second coordinate falls back to the prior
    assert_abs_diff_eq!(theta.posterior_mean()[(1, 0)], 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(theta.posterior_sd()[(1, 0)], 1.0, epsilon = 1e-6);
}

#[test]
fn gaussian_second_moment() {
    let mut theta = GaussianMatrix::new((1, 1), 0.0, 0.0);
    let add_a = DMatrix::from_element(1, 1, 8.0);
    let add_b = DMatrix::from_element(1, 1, 4.0);
    theta.update_stat(&add_a, &add_b);
    theta.calibrate();

    // mean = 2, var = 1/4
    assert_abs_diff_eq!(
        theta.posterior_second_moment()[(0, 0)],
        4.25,
        epsilon = 1e-6
    );
}

#[test]
fn gamma_calibration() {
    let mut tau = GammaMatrix::new((1, 1), 1.0, 1.0);

    let add_a = DMatrix::from_element(1, 1, 1.0);
    let add_b = DMatrix::from_element(1, 1, 1.0);
    tau.update_stat(&add_a, &add_b);
    tau.calibrate();

    // Gamma(2, 2): mean = 1, sd = sqrt(2)/2
    assert_abs_diff_eq!(tau.posterior_mean()[(0, 0)], 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(
        tau.posterior_sd()[(0, 0)],
        2.0_f32.sqrt() / 2.0,
        epsilon = 1e-6
    );

    // E[ln tau] = digamma(2) - ln(2), digamma(2) = 1 - gamma_e
    let expected = (1.0 - 0.577_215_7) - 2.0_f32.ln();
    assert_abs_diff_eq!(tau.posterior_log_mean()[(0, 0)], expected, epsilon = 1e-4);
}

#[test]
fn gamma_kl_vanishes_at_prior() {
    let mut tau = GammaMatrix::new((3, 1), 1.5, 2.0);
    tau.reset_stat();
    tau.calibrate();

    assert_abs_diff_eq!(tau.kl_to_prior(), 0.0, epsilon = 1e-5);
}

#[test]
fn gamma_kl_positive_away_from_prior() {
    let mut tau = GammaMatrix::new((1, 1), 1.0, 1.0);
    let add_a = DMatrix::from_element(1, 1, 10.0);
    let add_b = DMatrix::from_element(1, 1, 5.0);
    tau.update_stat(&add_a, &add_b);
    tau.calibrate();

    assert!(tau.kl_to_prior() > 0.0);
}

#[test]
fn posterior_sample_is_reproducible() -> anyhow::Result<()> {
    let mut theta = GaussianMatrix::new((5, 2), 0.0, 0.0);
    let add_a = DMatrix::from_element(5, 2, 1.0);
    let add_b = DMatrix::from_element(5, 2, 2.0);
    theta.update_stat(&add_a, &add_b);
    theta.calibrate();

    let mut rng1 = rand::rngs::StdRng::seed_from_u64(7);
    let mut rng2 = rand::rngs::StdRng::seed_from_u64(7);

    let s1 = theta.posterior_sample(&mut rng1)?;
    let s2 = theta.posterior_sample(&mut rng2)?;

    assert_eq!(s1, s2);
    Ok(())
}

#[test]
fn parquet_export() -> anyhow::Result<()> {
    use tabular_util::common_io::create_temp_dir_file;
    use variational_param::io::ParamIo;

    let mut theta = GaussianMatrix::new((3, 1), 0.0, 1.0);
    theta.calibrate();

    let row_names: Vec<Box<str>> = vec!["a".into(), "b".into(), "c".into()];
    let out = create_temp_dir_file(".parquet")?;
    theta.to_parquet(Some(&row_names), None, out.to_str().unwrap())?;

    assert!(out.exists());
    Ok(())
}
