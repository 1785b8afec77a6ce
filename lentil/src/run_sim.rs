use crate::common::*;
use clap::Parser;
use rand::Rng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tabular_util::common_io::write_lines;

#[derive(Parser, Debug, Clone)]
pub struct SimArgs {
    /// number of students
    #[arg(long, default_value_t = 200)]
    pub n_students: usize,

    /// number of instructors
    #[arg(long, default_value_t = 100)]
    pub n_instructors: usize,

    /// number of departments
    #[arg(long, default_value_t = 15)]
    pub n_departments: usize,

    /// number of rating observations
    #[arg(long, default_value_t = 10000)]
    pub n_obs: usize,

    /// global mean rating
    #[arg(long, default_value_t = 3.0)]
    pub intercept: f32,

    /// service covariate coefficient
    #[arg(long, default_value_t = 0.1)]
    pub service_coef: f32,

    /// student effect scale
    #[arg(long, default_value_t = 0.3)]
    pub sigma_student: f32,

    /// instructor effect scale
    #[arg(long, default_value_t = 0.4)]
    pub sigma_instructor: f32,

    /// department effect scale
    #[arg(long, default_value_t = 0.2)]
    pub sigma_department: f32,

    /// observation noise scale
    #[arg(long, default_value_t = 0.5)]
    pub sigma_noise: f32,

    /// random seed
    #[arg(long, default_value_t = 42)]
    pub rseed: u64,

    /// output file header
    #[arg(long, short, required = true)]
    pub out: Box<str>,

    /// verbosity
    #[arg(long, short)]
    pub verbose: bool,
}

pub struct SimOut {
    pub data_file: Box<str>,
    pub student_truth: Box<str>,
    pub instructor_truth: Box<str>,
    pub department_truth: Box<str>,
}

///
/// Generate a rating table from the generative model:
///
/// ```text
/// y ~ N(intercept + service_coef * x + u[s] + v[i] + w[d], sigma^2)
/// ```
///
/// and write the true effect tables next to the data, usable as
/// reference tables for `fit`.
///
pub fn run_sim_rating_data(args: SimArgs) -> anyhow::Result<SimOut> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    let _ = env_logger::try_init();

    if args.n_students == 0 || args.n_instructors == 0 || args.n_departments == 0 {
        anyhow::bail!("group sizes should be positive");
    }
    if args.n_obs == 0 {
        anyhow::bail!("need at least one observation");
    }

    let mut rng = rand::rngs::StdRng::seed_from_u64(args.rseed);

    let student_effect = sample_effects(args.n_students, args.sigma_student, &mut rng)?;
    let instructor_effect = sample_effects(args.n_instructors, args.sigma_instructor, &mut rng)?;
    let department_effect = sample_effects(args.n_departments, args.sigma_department, &mut rng)?;

    // each instructor teaches within one department
    let dept_of: Vec<usize> = (0..args.n_instructors)
        .map(|_| rng.random_range(0..args.n_departments))
        .collect();

    let noise = Normal::new(0.0, args.sigma_noise)?;

    let mut lines: Vec<Box<str>> = Vec::with_capacity(args.n_obs + 1);
    lines.push("student\tinstructor\tdepartment\tservice\trating".into());

    for _ in 0..args.n_obs {
        let s = rng.random_range(0..args.n_students);
        let i = rng.random_range(0..args.n_instructors);
        let d = dept_of[i];
        let x: f32 = if rng.random::<bool>() { 1.0 } else { 0.0 };

        let y = args.intercept
            + args.service_coef * x
            + student_effect[s]
            + instructor_effect[i]
            + department_effect[d]
            + noise.sample(&mut rng);

        lines.push(
            format!(
                "{}\t{}\t{}\t{}\t{:.4}",
                student_name(s),
                instructor_name(i),
                department_name(d),
                x as u8,
                y
            )
            .into_boxed_str(),
        );
    }

    let data_file: Box<str> = format!("{}.ratings.tsv.gz", args.out).into();
    write_lines(&lines, &data_file)?;
    info!("rating table: {}", data_file);

    let student_truth = write_truth(
        &format!("{}.student.truth.tsv.gz", args.out),
        &student_effect,
        student_name,
    )?;
    let instructor_truth = write_truth(
        &format!("{}.instructor.truth.tsv.gz", args.out),
        &instructor_effect,
        instructor_name,
    )?;
    let department_truth = write_truth(
        &format!("{}.department.truth.tsv.gz", args.out),
        &department_effect,
        department_name,
    )?;

    info!("Done");

    Ok(SimOut {
        data_file,
        student_truth,
        instructor_truth,
        department_truth,
    })
}

fn sample_effects<R: Rng>(n: usize, sigma: f32, rng: &mut R) -> anyhow::Result<Vec<f32>> {
    let normal = Normal::new(0.0, sigma)?;
    Ok((0..n).map(|_| normal.sample(rng)).collect())
}

fn student_name(k: usize) -> String {
    format!("s{:04}", k)
}

fn instructor_name(k: usize) -> String {
    format!("i{:03}", k)
}

fn department_name(k: usize) -> String {
    format!("d{:02}", k)
}

fn write_truth(
    file: &str,
    effects: &[f32],
    name_fn: impl Fn(usize) -> String,
) -> anyhow::Result<Box<str>> {
    let lines: Vec<Box<str>> = effects
        .iter()
        .enumerate()
        .map(|(k, effect)| format!("{}\t{:.6}", name_fn(k), effect).into_boxed_str())
        .collect();
    write_lines(&lines, file)?;
    info!("true effects: {}", file);
    Ok(file.into())
}
