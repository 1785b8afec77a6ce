use crate::common::*;
use crate::input::RatingTable;
use variational_param::dmatrix_gamma::GammaMatrix;
use variational_param::dmatrix_gaussian::GaussianMatrix;
use variational_param::traits::Inference;

pub const FIXED_NAMES: [&str; 2] = ["intercept", "service"];

/// Calibrated variational posterior of the whole model
pub struct MixedModelPosterior {
    /// intercept and service coefficient (2 x 1)
    pub fixed: GaussianMatrix,
    /// one effect vector per grouping (m_g x 1 each)
    pub effects: Vec<GaussianMatrix>,
    /// one precision per grouping (1 x 1 each)
    pub group_precision: Vec<GammaMatrix>,
    /// observation-noise precision (1 x 1)
    pub noise_precision: GammaMatrix,
}

impl MixedModelPosterior {
    /// posterior-mean noise scale `1 / sqrt(E[tau])`
    pub fn noise_sd(&self) -> f32 {
        self.noise_precision.posterior_mean()[(0, 0)].sqrt().recip()
    }

    /// posterior-mean effect scale per grouping
    pub fn group_sd(&self, g: usize) -> f32 {
        self.group_precision[g].posterior_mean()[(0, 0)]
            .sqrt()
            .recip()
    }
}

pub fn invalid_index(grouping: &str, id: usize, len: usize) -> anyhow::Error {
    anyhow::anyhow!("invalid {} index {} (valid range 0..{})", grouping, id, len)
}

/// Fail fast when any categorical id falls outside its fitted range
pub fn validate_table(table: &RatingTable, n_levels: &[usize; N_GROUPINGS]) -> anyhow::Result<()> {
    for r in 0..table.len() {
        for (g, &id) in table.grouping_ids(r).iter().enumerate() {
            if id >= n_levels[g] {
                return Err(invalid_index(GROUPING_NAMES[g], id, n_levels[g]));
            }
        }
    }
    Ok(())
}

/// Point-estimate linear predictor:
///
/// ```text
/// mean = intercept + service_coef * service
///      + student_effect[student]
///      + instructor_effect[instructor]
///      + department_effect[department]
/// ```
///
/// A pure function of the parameter values it was built from. Built
/// from posterior means this is the deterministic evaluation-time
/// predictor; built from one posterior draw it is the stochastic
/// training-time counterpart.
#[derive(Clone, Debug)]
pub struct LinearPredictor {
    pub intercept: f32,
    pub service_coef: f32,
    pub student_effect: DVec,
    pub instructor_effect: DVec,
    pub department_effect: DVec,
}

impl LinearPredictor {
    /// plug-in predictor from posterior means
    pub fn from_posterior(posterior: &MixedModelPosterior) -> anyhow::Result<Self> {
        Self::from_parts(&posterior.fixed, &posterior.effects)
    }

    pub fn from_parts(fixed: &GaussianMatrix, effects: &[GaussianMatrix]) -> anyhow::Result<Self> {
        if effects.len() != N_GROUPINGS {
            anyhow::bail!(
                "expected {} grouping effects, found {}",
                N_GROUPINGS,
                effects.len()
            );
        }

        let fixed_mean = fixed.posterior_mean();

        Ok(Self {
            intercept: fixed_mean[(0, 0)],
            service_coef: fixed_mean[(1, 0)],
            student_effect: effects[0].posterior_mean().column(0).into_owned(),
            instructor_effect: effects[1].posterior_mean().column(0).into_owned(),
            department_effect: effects[2].posterior_mean().column(0).into_owned(),
        })
    }

    /// stochastic predictor from one draw of the variational posterior
    pub fn from_posterior_sample<R: rand::Rng>(
        posterior: &MixedModelPosterior,
        rng: &mut R,
    ) -> anyhow::Result<Self> {
        if posterior.effects.len() != N_GROUPINGS {
            anyhow::bail!(
                "expected {} grouping effects, found {}",
                N_GROUPINGS,
                posterior.effects.len()
            );
        }

        let fixed = posterior.fixed.posterior_sample(rng)?;

        Ok(Self {
            intercept: fixed[(0, 0)],
            service_coef: fixed[(1, 0)],
            student_effect: posterior.effects[0].posterior_sample(rng)?.column(0).into_owned(),
            instructor_effect: posterior.effects[1]
                .posterior_sample(rng)?
                .column(0)
                .into_owned(),
            department_effect: posterior.effects[2]
                .posterior_sample(rng)?
                .column(0)
                .into_owned(),
        })
    }

    /// predicted mean rating for one observation
    pub fn predict_one(
        &self,
        student: usize,
        instructor: usize,
        department: usize,
        service: f32,
    ) -> anyhow::Result<f32> {
        let u = *self
            .student_effect
            .get(student)
            .ok_or_else(|| invalid_index("student", student, self.student_effect.len()))?;
        let v = *self
            .instructor_effect
            .get(instructor)
            .ok_or_else(|| invalid_index("instructor", instructor, self.instructor_effect.len()))?;
        let w = *self
            .department_effect
            .get(department)
            .ok_or_else(|| invalid_index("department", department, self.department_effect.len()))?;

        Ok(self.intercept + self.service_coef * service + u + v + w)
    }

    /// predicted mean per row
    pub fn predict_table(&self, table: &RatingTable) -> anyhow::Result<DVec> {
        let mut out = DVec::zeros(table.len());
        for r in 0..table.len() {
            out[r] = self.predict_one(
                table.student[r],
                table.instructor[r],
                table.department[r],
                table.service[r],
            )?;
        }
        Ok(out)
    }

    /// observed minus predicted, per row
    pub fn residuals(&self, table: &RatingTable) -> anyhow::Result<DVec> {
        let mut out = self.predict_table(table)?;
        for r in 0..table.len() {
            out[r] = table.rating[r] - out[r];
        }
        Ok(out)
    }

    /// root mean squared residual
    pub fn rmse(&self, table: &RatingTable) -> anyhow::Result<f32> {
        if table.is_empty() {
            anyhow::bail!("empty table");
        }
        let resid = self.residuals(table)?;
        Ok((resid.norm_squared() / table.len() as f32).sqrt())
    }
}
