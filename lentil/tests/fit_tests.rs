use lentil::input::{read_rating_data, read_reference_effects, RatingInputArgs};
use lentil::model::LinearPredictor;
use lentil::run_fit::{run_fit, FitArgs};
use lentil::run_sim::{run_sim_rating_data, SimArgs};
use lentil::stat::{EvalSchedule, FitOptions, MixedModelStat};
use nalgebra::DVector;
use tabular_util::common_io::create_temp_dir_file;
use tabular_util::dmatrix_util::pearson_correlation;
use variational_param::traits::Inference;

fn sim_args(out: &str) -> SimArgs {
    SimArgs {
        n_students: 50,
        n_instructors: 20,
        n_departments: 5,
        n_obs: 4000,
        intercept: 3.0,
        service_coef: 0.5,
        sigma_student: 0.5,
        sigma_instructor: 0.4,
        sigma_department: 0.3,
        sigma_noise: 0.3,
        rseed: 7,
        out: out.into(),
        verbose: false,
    }
}

#[test]
fn recovers_simulated_parameters() -> anyhow::Result<()> {
    let prefix = create_temp_dir_file("")?;
    let prefix = prefix.to_str().unwrap();

    let sim = run_sim_rating_data(sim_args(prefix))?;

    let data = read_rating_data(&RatingInputArgs {
        data_file: sim.data_file.clone(),
        test_fraction: 0.2,
        rseed: 7,
    })?;

    assert_eq!(data.train.len() + data.test.len(), 4000);

    let stat = MixedModelStat::from_table(
        &data.train,
        data.group_sizes(),
        FitOptions {
            n_opt_iter: Some(150),
            hyper_param: Some((1.0, 1.0)),
            fixed_prior_precision: Some(1.0),
        },
    )?;

    let (posterior, trace) = stat.estimate_parameters(Some(EvalSchedule {
        table: &data.test,
        interval: 10,
    }))?;

    // the evidence lower bound should improve over the run
    let first_elbo = trace.first().unwrap().elbo;
    let last_elbo = trace.last().unwrap().elbo;
    assert!(last_elbo.is_finite());
    assert!(last_elbo > first_elbo);

    // held-out evaluation lands on schedule
    assert!(trace[9].test_rmse.is_some());
    assert!(trace[8].test_rmse.is_none());

    let fixed = posterior.fixed.posterior_mean();
    assert!((fixed[(0, 0)] - 3.0).abs() < 0.5, "intercept {}", fixed[(0, 0)]);
    assert!(
        (fixed[(1, 0)] - 0.5).abs() < 0.1,
        "service coefficient {}",
        fixed[(1, 0)]
    );

    let noise_sd = posterior.noise_sd();
    assert!(
        (0.25..0.4).contains(&noise_sd),
        "noise scale {}",
        noise_sd
    );

    // student effects should track the simulation truth
    let truth = read_reference_effects(&sim.student_truth)?;
    let mean = posterior.effects[0].posterior_mean();

    let mut ref_vals = vec![];
    let mut est_vals = vec![];
    for (name, value) in truth.iter() {
        if let Some(k) = data.students.index_of(name) {
            ref_vals.push(*value);
            est_vals.push(mean[(k, 0)]);
        }
    }
    assert!(ref_vals.len() > 40);

    let corr = pearson_correlation(
        &DVector::from_vec(ref_vals),
        &DVector::from_vec(est_vals),
    );
    assert!(corr > 0.8, "student effect correlation {}", corr);

    // held-out prediction stays close to the noise floor
    let predictor = LinearPredictor::from_posterior(&posterior)?;
    let rmse = predictor.rmse(&data.test)?;
    assert!(rmse < 0.6, "held-out rmse {}", rmse);

    Ok(())
}

#[test]
fn fit_pipeline_writes_outputs() -> anyhow::Result<()> {
    let prefix = create_temp_dir_file("")?;
    let prefix = prefix.to_str().unwrap();

    let sim = run_sim_rating_data(sim_args(prefix))?;

    run_fit(FitArgs {
        data_file: sim.data_file.clone(),
        test_fraction: 0.2,
        num_opt_iter: 100,
        eval_interval: 20,
        a0: 1.0,
        b0: 1.0,
        tau0: 1.0,
        rseed: 7,
        ref_student: Some(sim.student_truth.clone()),
        ref_instructor: None,
        ref_department: None,
        out: prefix.into(),
        verbose: false,
    })?;

    for suffix in [
        "fixed.tsv.gz",
        "student.parquet",
        "instructor.parquet",
        "department.parquet",
        "variance.tsv.gz",
        "trace.tsv.gz",
        "residuals.tsv.gz",
        "compare.student.tsv.gz",
        "summary.json",
    ] {
        let path = format!("{}.{}", prefix, suffix);
        assert!(std::path::Path::new(&path).exists(), "missing {}", path);
    }

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(format!("{}.summary.json", prefix))?)?;

    assert_eq!(summary["n_rows"], 4000);
    assert_eq!(summary["reference"][0]["grouping"], "student");

    let corr = summary["reference"][0]["correlation"].as_f64().unwrap();
    assert!(corr > 0.7, "reference correlation {}", corr);

    Ok(())
}
