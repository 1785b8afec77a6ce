use crate::common::*;
use crate::input::RatingTable;
use crate::model::{validate_table, LinearPredictor, MixedModelPosterior};
use indicatif::ProgressIterator;
use tabular_util::utils::partition_by_level;
use variational_param::dmatrix_gamma::GammaMatrix;
use variational_param::dmatrix_gaussian::GaussianMatrix;
use variational_param::traits::{Inference, TwoStatParam};

const LN_2PI: f32 = 1.837_877_1;

pub struct FitOptions {
    pub n_opt_iter: Option<usize>,
    /// hyper parameters (a0, b0) shared by all Gamma precisions
    pub hyper_param: Option<(f32, f32)>,
    /// prior precision of the fixed effects
    pub fixed_prior_precision: Option<f32>,
}

/// Evaluate held-out rows every `interval` iterations
pub struct EvalSchedule<'a> {
    pub table: &'a RatingTable,
    pub interval: usize,
}

#[derive(Clone, Debug)]
pub struct TraceRow {
    pub iteration: usize,
    pub elbo: f32,
    pub test_rmse: Option<f32>,
}

/// Sufficient statistics of the training rows, laid out per grouping
/// for the coordinate updates
pub struct MixedModelStat {
    level_rows: Vec<Vec<Vec<usize>>>, // grouping x level -> row indexes
    n_levels: [usize; N_GROUPINGS],
    service: DVec,
    rating: DVec,
    n_obs: usize,
    n_opt_iter: usize,
    a0: f32,
    b0: f32,
    tau0: f32,
}

impl MixedModelStat {
    pub fn from_table(
        table: &RatingTable,
        n_levels: [usize; N_GROUPINGS],
        opt: FitOptions,
    ) -> anyhow::Result<Self> {
        if table.is_empty() {
            anyhow::bail!("no training rows");
        }

        validate_table(table, &n_levels)?;

        let (a0, b0) = opt.hyper_param.unwrap_or((1.0, 1.0));
        let tau0 = opt.fixed_prior_precision.unwrap_or(1.0);

        if a0 <= 0.0 || b0 <= 0.0 || tau0 <= 0.0 {
            anyhow::bail!("hyper parameters should be positive");
        }

        let assignments = [&table.student, &table.instructor, &table.department];

        let level_rows = assignments
            .iter()
            .zip(n_levels.iter())
            .map(|(membership, &m)| partition_by_level(membership.as_slice(), m))
            .collect();

        Ok(Self {
            level_rows,
            n_levels,
            service: DVec::from_vec(table.service.clone()),
            rating: DVec::from_vec(table.rating.clone()),
            n_obs: table.len(),
            n_opt_iter: opt.n_opt_iter.unwrap_or(500),
            a0,
            b0,
            tau0,
        })
    }

    pub fn n_obs(&self) -> usize {
        self.n_obs
    }

    /// Coordinate-ascent updates for a fixed number of iterations.
    ///
    /// Every update is a conjugate closed form. The Gaussian effect
    /// updates use the current posterior means of all other terms; the
    /// Gamma precision updates use posterior second moments, so the
    /// latent uncertainty flows into the learned variances and the
    /// noise level.
    pub fn estimate_parameters(
        &self,
        eval: Option<EvalSchedule<'_>>,
    ) -> anyhow::Result<(MixedModelPosterior, Vec<TraceRow>)> {
        if let Some(sched) = &eval {
            validate_table(sched.table, &self.n_levels)?;
        }

        let nf = self.n_obs as f32;

        let mut fixed = GaussianMatrix::new((2, 1), 0.0, self.tau0);
        fixed.calibrate();

        let mut effects: Vec<GaussianMatrix> = self
            .n_levels
            .iter()
            .map(|&m| {
                let mut theta = GaussianMatrix::new((m, 1), 0.0, 0.0);
                theta.calibrate();
                theta
            })
            .collect();

        let mut group_precision: Vec<GammaMatrix> = (0..N_GROUPINGS)
            .map(|_| {
                let mut tau = GammaMatrix::new((1, 1), self.a0, self.b0);
                tau.calibrate();
                tau
            })
            .collect();

        let mut noise_precision = GammaMatrix::new((1, 1), self.a0, self.b0);
        noise_precision.calibrate();

        // cached linear predictor per training row; all means start at zero
        let mut pred = DVec::zeros(self.n_obs);
        let mut trace = Vec::with_capacity(self.n_opt_iter);

        let n_service: f32 = self.service.sum();
        let service_rows: Vec<usize> = (0..self.n_obs)
            .filter(|&r| self.service[r] > 0.0)
            .collect();

        for opt_iter in (0..self.n_opt_iter).progress() {
            let tau = noise_precision.posterior_mean()[(0, 0)];

            // fixed effects: intercept, then the service coefficient
            let mut fixed_a = Mat::zeros(2, 1);
            let mut fixed_b = Mat::zeros(2, 1);

            let mu_old = fixed.posterior_mean()[(0, 0)];
            let resid_sum: f32 = (0..self.n_obs)
                .map(|r| self.rating[r] - pred[r])
                .sum::<f32>()
                + nf * mu_old;
            let mu_new = tau * resid_sum / (self.tau0 + tau * nf);
            pred.add_scalar_mut(mu_new - mu_old);
            fixed_a[(0, 0)] = tau * resid_sum;
            fixed_b[(0, 0)] = tau * nf;

            let beta_old = fixed.posterior_mean()[(1, 0)];
            let service_resid: f32 = service_rows
                .iter()
                .map(|&r| self.rating[r] - pred[r])
                .sum::<f32>()
                + n_service * beta_old;
            let beta_new = tau * service_resid / (self.tau0 + tau * n_service);
            for &r in service_rows.iter() {
                pred[r] += beta_new - beta_old;
            }
            fixed_a[(1, 0)] = tau * service_resid;
            fixed_b[(1, 0)] = tau * n_service;

            fixed.update_stat(&fixed_a, &fixed_b);
            fixed.calibrate();

            // random effects, one grouping at a time
            for g in 0..N_GROUPINGS {
                let lambda = group_precision[g].posterior_mean()[(0, 0)];
                let m = self.n_levels[g];

                let mut add_a = Mat::zeros(m, 1);
                let mut add_b = Mat::zeros(m, 1);
                let old_mean = effects[g].posterior_mean().clone_owned();

                for k in 0..m {
                    let rows = &self.level_rows[g][k];
                    let n_k = rows.len() as f32;
                    let rsum: f32 = rows
                        .iter()
                        .map(|&r| self.rating[r] - pred[r])
                        .sum::<f32>()
                        + n_k * old_mean[(k, 0)];

                    add_a[(k, 0)] = tau * rsum;
                    add_b[(k, 0)] = lambda + tau * n_k;

                    let new_k = add_a[(k, 0)] / add_b[(k, 0)];
                    for &r in rows.iter() {
                        pred[r] += new_k - old_mean[(k, 0)];
                    }
                }

                effects[g].update_stat(&add_a, &add_b);
                effects[g].calibrate();
            }

            // grouping precisions from posterior second moments
            for g in 0..N_GROUPINGS {
                let m = self.n_levels[g] as f32;
                let ss: f32 = effects[g].posterior_second_moment().sum();
                group_precision[g].update_stat(
                    &Mat::from_element(1, 1, 0.5 * m),
                    &Mat::from_element(1, 1, 0.5 * ss),
                );
                group_precision[g].calibrate();
            }

            // noise precision from expected squared residuals
            let sse = self.expected_squared_error(&pred, &fixed, &effects);
            noise_precision.update_stat(
                &Mat::from_element(1, 1, 0.5 * nf),
                &Mat::from_element(1, 1, 0.5 * sse),
            );
            noise_precision.calibrate();

            let elbo = self.elbo(sse, &fixed, &effects, &group_precision, &noise_precision);

            let test_rmse = match &eval {
                Some(sched) if sched.interval > 0 && (opt_iter + 1) % sched.interval == 0 => {
                    let predictor = LinearPredictor::from_parts(&fixed, &effects)?;
                    Some(predictor.rmse(sched.table)?)
                }
                _ => None,
            };

            trace.push(TraceRow {
                iteration: opt_iter + 1,
                elbo,
                test_rmse,
            });
        }

        let posterior = MixedModelPosterior {
            fixed,
            effects,
            group_precision,
            noise_precision,
        };

        Ok((posterior, trace))
    }

    /// `sum_r E[(y_r - eta_r)^2]` where the expectation runs over the
    /// variational posterior of every effect entering row `r`
    fn expected_squared_error(
        &self,
        pred: &DVec,
        fixed: &GaussianMatrix,
        effects: &[GaussianMatrix],
    ) -> f32 {
        let var_b0 = fixed.posterior_sd()[(0, 0)].powi(2);
        let var_b1 = fixed.posterior_sd()[(1, 0)].powi(2);

        let effect_var: Vec<DVec> = effects
            .iter()
            .map(|theta| theta.posterior_sd().column(0).map(|s| s * s))
            .collect();

        let mut sse = 0.0;
        for r in 0..self.n_obs {
            let resid = self.rating[r] - pred[r];
            let x = self.service[r];
            sse += resid * resid + var_b0 + x * x * var_b1;
        }

        // each row picks up one variance per grouping; sum them
        // level-wise instead of row-wise
        for g in 0..N_GROUPINGS {
            for (k, rows) in self.level_rows[g].iter().enumerate() {
                sse += effect_var[g][k] * rows.len() as f32;
            }
        }

        sse
    }

    /// evidence lower bound of the current variational posterior
    fn elbo(
        &self,
        sse: f32,
        fixed: &GaussianMatrix,
        effects: &[GaussianMatrix],
        group_precision: &[GammaMatrix],
        noise_precision: &GammaMatrix,
    ) -> f32 {
        let nf = self.n_obs as f32;
        let tau = noise_precision.posterior_mean()[(0, 0)];
        let e_ln_tau = noise_precision.posterior_log_mean()[(0, 0)];

        // expected log likelihood
        let mut elbo = 0.5 * nf * (e_ln_tau - LN_2PI) - 0.5 * tau * sse;

        // fixed effects against N(0, 1/tau0)
        for i in 0..2 {
            let m = fixed.posterior_mean()[(i, 0)];
            let s = fixed.posterior_sd()[(i, 0)];
            elbo += 0.5 * (self.tau0.ln() - LN_2PI) - 0.5 * self.tau0 * (m * m + s * s);
            elbo += 0.5 * (LN_2PI + (s * s).ln() + 1.0);
        }

        // random effects against N(0, 1/lambda_g)
        for g in 0..N_GROUPINGS {
            let lambda = group_precision[g].posterior_mean()[(0, 0)];
            let e_ln_lambda = group_precision[g].posterior_log_mean()[(0, 0)];

            for k in 0..self.n_levels[g] {
                let m = effects[g].posterior_mean()[(k, 0)];
                let s = effects[g].posterior_sd()[(k, 0)];
                elbo += 0.5 * (e_ln_lambda - LN_2PI) - 0.5 * lambda * (m * m + s * s);
                elbo += 0.5 * (LN_2PI + (s * s).ln() + 1.0);
            }

            elbo -= group_precision[g].kl_to_prior();
        }

        elbo -= noise_precision.kl_to_prior();

        elbo
    }
}
