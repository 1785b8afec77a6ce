use crate::common::*;
use crate::input::*;
use crate::model::*;
use crate::stat::*;

use clap::Parser;
use rand::SeedableRng;
use serde::Serialize;
use std::io::Write;
use tabular_util::common_io::{open_buf_writer, write_lines};
use tabular_util::dmatrix_util::pearson_correlation;
use tabular_util::running_stat::RunningStatistics;
use tabular_util::traits::RunningStatOps;
use variational_param::io::ParamIo;
use variational_param::traits::Inference;

#[derive(Parser, Debug, Clone)]
pub struct FitArgs {
    /// rating data file (tsv/csv, plain or gzipped) with columns:
    /// student, instructor, department, service flag (0/1), rating.
    /// A header line is recognized and skipped.
    #[arg(required = true)]
    pub data_file: Box<str>,

    /// held-out fraction of rows
    #[arg(long, default_value_t = 0.2)]
    pub test_fraction: f32,

    /// number of iterations for optimization
    #[arg(long, default_value_t = 500)]
    pub num_opt_iter: usize,

    /// evaluate held-out rows every this many iterations
    #[arg(long, default_value_t = 10)]
    pub eval_interval: usize,

    /// hyperparameter a0 in Gamma(a0,b0)
    #[arg(long, default_value_t = 1.0)]
    pub a0: f32,

    /// hyperparameter b0 in Gamma(a0,b0)
    #[arg(long, default_value_t = 1.0)]
    pub b0: f32,

    /// prior precision of the fixed effects
    #[arg(long, default_value_t = 1.0)]
    pub tau0: f32,

    /// random seed for the train/test split
    #[arg(long, default_value_t = 42)]
    pub rseed: u64,

    /// reference per-student intercept estimates (name, value)
    #[arg(long)]
    pub ref_student: Option<Box<str>>,

    /// reference per-instructor intercept estimates (name, value)
    #[arg(long)]
    pub ref_instructor: Option<Box<str>>,

    /// reference per-department intercept estimates (name, value)
    #[arg(long)]
    pub ref_department: Option<Box<str>>,

    /// output file header
    #[arg(long, short, required = true)]
    pub out: Box<str>,

    /// verbosity
    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(Serialize)]
pub struct ComponentSummary {
    pub name: String,
    pub precision_mean: f32,
    pub precision_sd: f32,
    pub scale_sd: f32,
}

#[derive(Serialize)]
pub struct ReferenceSummary {
    pub grouping: String,
    pub n_matched: usize,
    pub correlation: f32,
}

#[derive(Serialize)]
pub struct FitSummary {
    pub n_rows: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub n_students: usize,
    pub n_instructors: usize,
    pub n_departments: usize,
    pub intercept: f32,
    pub service_coef: f32,
    pub noise_sd: f32,
    pub components: Vec<ComponentSummary>,
    pub held_out_rmse: Option<f32>,
    pub final_elbo: Option<f32>,
    pub reference: Vec<ReferenceSummary>,
}

/// Fit the mixed-effects model and write the posterior estimates
pub fn run_fit(args: FitArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    let _ = env_logger::try_init();

    let data = read_rating_data(&RatingInputArgs {
        data_file: args.data_file.clone(),
        test_fraction: args.test_fraction,
        rseed: args.rseed,
    })?;

    info!(
        "{} rows -> {} train + {} test; {} students, {} instructors, {} departments",
        data.train.len() + data.test.len(),
        data.train.len(),
        data.test.len(),
        data.students.len(),
        data.instructors.len(),
        data.departments.len()
    );

    let stat = MixedModelStat::from_table(
        &data.train,
        data.group_sizes(),
        FitOptions {
            n_opt_iter: Some(args.num_opt_iter),
            hyper_param: Some((args.a0, args.b0)),
            fixed_prior_precision: Some(args.tau0),
        },
    )?;

    let eval = (!data.test.is_empty() && args.eval_interval > 0).then_some(EvalSchedule {
        table: &data.test,
        interval: args.eval_interval,
    });

    info!("Optimizing parameters...");
    let (posterior, trace) = stat.estimate_parameters(eval)?;

    let predictor = LinearPredictor::from_posterior(&posterior)?;

    let held_out_rmse = if !data.test.is_empty() {
        let resid = predictor.residuals(&data.test)?;

        let mut digest = RunningStatistics::new();
        resid.iter().for_each(|&r| digest.add(r));
        info!(
            "held-out residuals: mean {:.4}, sd {:.4}, rmse {:.4} over {} rows",
            digest.mean(),
            digest.std(),
            digest.rmse(),
            digest.count()
        );

        let predicted = predictor.predict_table(&data.test)?;
        let mut lines: Vec<Box<str>> = Vec::with_capacity(data.test.len() + 1);
        lines.push("#observed\tpredicted\tresidual".into());
        for r in 0..data.test.len() {
            lines.push(
                format!(
                    "{:.4}\t{:.4}\t{:.4}",
                    data.test.rating[r], predicted[r], resid[r]
                )
                .into_boxed_str(),
            );
        }
        write_lines(&lines, &format!("{}.residuals.tsv.gz", args.out))?;

        Some(digest.rmse())
    } else {
        None
    };

    // one posterior draw as a stochastic sanity check on the training rows
    let mut rng = rand::rngs::StdRng::seed_from_u64(args.rseed);
    let sampled = LinearPredictor::from_posterior_sample(&posterior, &mut rng)?;
    info!(
        "posterior predictive rmse on training rows: {:.4}",
        sampled.rmse(&data.train)?
    );

    write_fixed_effects(&posterior, &args.out)?;
    write_random_effects(&data, &posterior, &args.out)?;
    write_variance_components(&posterior, &args.out)?;
    write_trace(&trace, &args.out)?;

    let reference_files = [
        args.ref_student.as_deref(),
        args.ref_instructor.as_deref(),
        args.ref_department.as_deref(),
    ];

    let mut reference = vec![];
    for (g, ref_file) in reference_files.into_iter().enumerate() {
        if let Some(ref_file) = ref_file {
            reference.push(compare_with_reference(g, ref_file, &data, &posterior, &args.out)?);
        }
    }

    let fixed_mean = posterior.fixed.posterior_mean();
    let summary = FitSummary {
        n_rows: data.train.len() + data.test.len(),
        n_train: data.train.len(),
        n_test: data.test.len(),
        n_students: data.students.len(),
        n_instructors: data.instructors.len(),
        n_departments: data.departments.len(),
        intercept: fixed_mean[(0, 0)],
        service_coef: fixed_mean[(1, 0)],
        noise_sd: posterior.noise_sd(),
        components: (0..N_GROUPINGS)
            .map(|g| ComponentSummary {
                name: GROUPING_NAMES[g].to_string(),
                precision_mean: posterior.group_precision[g].posterior_mean()[(0, 0)],
                precision_sd: posterior.group_precision[g].posterior_sd()[(0, 0)],
                scale_sd: posterior.group_sd(g),
            })
            .collect(),
        held_out_rmse,
        final_elbo: trace.last().map(|row| row.elbo),
        reference,
    };

    let summary_file = format!("{}.summary.json", args.out);
    let mut buf = open_buf_writer(&summary_file)?;
    buf.write_all(serde_json::to_string_pretty(&summary)?.as_bytes())?;
    buf.flush()?;
    info!("fit summary: {}", summary_file);

    info!("Done");
    Ok(())
}

fn write_fixed_effects(posterior: &MixedModelPosterior, out: &str) -> anyhow::Result<()> {
    let mean = posterior.fixed.posterior_mean();
    let sd = posterior.fixed.posterior_sd();

    let mut lines: Vec<Box<str>> = vec!["#name\tmean\tsd".into()];
    for (i, name) in FIXED_NAMES.iter().enumerate() {
        lines.push(format!("{}\t{:.6}\t{:.6}", name, mean[(i, 0)], sd[(i, 0)]).into_boxed_str());
    }

    let file = format!("{}.fixed.tsv.gz", out);
    write_lines(&lines, &file)?;
    info!("fixed effects: {}", file);
    Ok(())
}

fn write_random_effects(
    data: &RatingData,
    posterior: &MixedModelPosterior,
    out: &str,
) -> anyhow::Result<()> {
    let column_names: Vec<Box<str>> = vec!["effect".into()];

    for g in 0..N_GROUPINGS {
        let file = format!("{}.{}.parquet", out, GROUPING_NAMES[g]);
        posterior.effects[g].to_parquet(
            Some(data.vocabulary(g).names()),
            Some(&column_names),
            &file,
        )?;
        info!("{} effects: {}", GROUPING_NAMES[g], file);
    }

    Ok(())
}

fn write_variance_components(posterior: &MixedModelPosterior, out: &str) -> anyhow::Result<()> {
    let mut lines: Vec<Box<str>> = vec!["#component\tprecision_mean\tprecision_sd\tscale_sd".into()];

    for g in 0..N_GROUPINGS {
        lines.push(
            format!(
                "{}\t{:.6}\t{:.6}\t{:.6}",
                GROUPING_NAMES[g],
                posterior.group_precision[g].posterior_mean()[(0, 0)],
                posterior.group_precision[g].posterior_sd()[(0, 0)],
                posterior.group_sd(g)
            )
            .into_boxed_str(),
        );
    }

    lines.push(
        format!(
            "noise\t{:.6}\t{:.6}\t{:.6}",
            posterior.noise_precision.posterior_mean()[(0, 0)],
            posterior.noise_precision.posterior_sd()[(0, 0)],
            posterior.noise_sd()
        )
        .into_boxed_str(),
    );

    let file = format!("{}.variance.tsv.gz", out);
    write_lines(&lines, &file)?;
    info!("variance components: {}", file);
    Ok(())
}

fn write_trace(trace: &[TraceRow], out: &str) -> anyhow::Result<()> {
    let mut lines: Vec<Box<str>> = vec!["#iteration\telbo\ttest_rmse".into()];
    for row in trace {
        let rmse = row
            .test_rmse
            .map(|x| format!("{:.6}", x))
            .unwrap_or_else(|| "NA".to_string());
        lines.push(format!("{}\t{:.4}\t{}", row.iteration, row.elbo, rmse).into_boxed_str());
    }

    let file = format!("{}.trace.tsv.gz", out);
    write_lines(&lines, &file)?;
    info!("optimization trace: {}", file);
    Ok(())
}

fn compare_with_reference(
    g: usize,
    ref_file: &str,
    data: &RatingData,
    posterior: &MixedModelPosterior,
    out: &str,
) -> anyhow::Result<ReferenceSummary> {
    let reference = read_reference_effects(ref_file)?;
    let vocab = data.vocabulary(g);
    let mean = posterior.effects[g].posterior_mean();
    let sd = posterior.effects[g].posterior_sd();

    let mut lines: Vec<Box<str>> = vec!["#name\treference\tposterior_mean\tposterior_sd".into()];
    let mut ref_vals = vec![];
    let mut est_vals = vec![];
    let mut n_missing = 0;

    for (name, ref_val) in reference.iter() {
        if let Some(k) = vocab.index_of(name) {
            lines.push(
                format!(
                    "{}\t{:.6}\t{:.6}\t{:.6}",
                    name,
                    ref_val,
                    mean[(k, 0)],
                    sd[(k, 0)]
                )
                .into_boxed_str(),
            );
            ref_vals.push(*ref_val);
            est_vals.push(mean[(k, 0)]);
        } else {
            n_missing += 1;
        }
    }

    if n_missing > 0 {
        warn!(
            "{} reference {} levels not present in the data",
            n_missing, GROUPING_NAMES[g]
        );
    }

    let correlation = if ref_vals.len() > 1 {
        pearson_correlation(
            &DVec::from_vec(ref_vals.clone()),
            &DVec::from_vec(est_vals),
        )
    } else {
        0.0
    };

    let file = format!("{}.compare.{}.tsv.gz", out, GROUPING_NAMES[g]);
    write_lines(&lines, &file)?;
    info!(
        "{} reference comparison: {} (r = {:.4}, n = {})",
        GROUPING_NAMES[g],
        file,
        correlation,
        ref_vals.len()
    );

    Ok(ReferenceSummary {
        grouping: GROUPING_NAMES[g].to_string(),
        n_matched: ref_vals.len(),
        correlation,
    })
}
