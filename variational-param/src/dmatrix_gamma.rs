#![allow(dead_code)]

extern crate special;

use crate::io::*;
use crate::traits::*;
use nalgebra::DMatrix;
use rand_distr::Distribution;

/// Gamma posterior matrix for precision parameters.
///
/// ```text
/// tau[i,j] ~ Gamma(a[i,j], b[i,j])    (shape, rate)
/// ```
///
/// with hyper parameters `a0` and `b0` restored by `reset_stat`.
#[derive(Debug)]
pub struct GammaMatrix {
    num_rows: usize,
    num_columns: usize,
    //////////////////////
    // hyper parameters //
    //////////////////////
    a0: f32,
    b0: f32,
    ///////////////////////////
    // sufficient statistics //
    ///////////////////////////
    a_stat: DMatrix<f32>,
    b_stat: DMatrix<f32>,
    //////////////////////////
    // estimated parameters //
    //////////////////////////
    estimated_mean: DMatrix<f32>,
    estimated_sd: DMatrix<f32>,
    estimated_log_mean: DMatrix<f32>,
    estimated_log_sd: DMatrix<f32>,
}

impl ParamIo for GammaMatrix {}

impl GammaMatrix {
    /// `E[ln tau] = digamma(a) - ln(b)` per coordinate
    pub fn posterior_log_mean(&self) -> &DMatrix<f32> {
        &self.estimated_log_mean
    }

    pub fn posterior_log_sd(&self) -> &DMatrix<f32> {
        &self.estimated_log_sd
    }

    /// Sum of `KL(q || p)` over all coordinates, with the prior
    /// `Gamma(a0, b0)` taken from the hyper parameters
    pub fn kl_to_prior(&self) -> f32 {
        use special::Gamma;
        let a0 = self.a0;
        let b0 = self.b0;
        self.a_stat
            .iter()
            .zip(self.b_stat.iter())
            .map(|(&a, &b)| {
                (a - a0) * a.digamma() - a.ln_gamma().0 + a0.ln_gamma().0
                    + a0 * (b.ln() - b0.ln())
                    + a * (b0 - b) / b
            })
            .sum()
    }
}

impl TwoStatParam for GammaMatrix {
    type Mat = DMatrix<f32>;
    type Scalar = f32;

    fn new(dims: (usize, usize), a: Self::Scalar, b: Self::Scalar) -> Self {
        Self {
            num_rows: dims.0,
            num_columns: dims.1,
            a0: a,
            b0: b,
            a_stat: DMatrix::from_element(dims.0, dims.1, a),
            b_stat: DMatrix::from_element(dims.0, dims.1, b),
            estimated_mean: DMatrix::zeros(dims.0, dims.1),
            estimated_sd: DMatrix::zeros(dims.0, dims.1),
            estimated_log_mean: DMatrix::zeros(dims.0, dims.1),
            estimated_log_sd: DMatrix::zeros(dims.0, dims.1),
        }
    }

    fn add_stat(&mut self, add_a: &Self::Mat, add_b: &Self::Mat) {
        self.a_stat += add_a;
        self.b_stat += add_b;
    }
    fn update_stat(&mut self, update_a: &Self::Mat, update_b: &Self::Mat) {
        self.reset_stat();
        self.add_stat(update_a, update_b);
    }
    fn reset_stat(&mut self) {
        self.a_stat.fill(self.a0);
        self.b_stat.fill(self.b0);
    }

    fn nrows(&self) -> usize {
        self.num_rows
    }
    fn ncols(&self) -> usize {
        self.num_columns
    }
}

impl Inference for GammaMatrix {
    type Mat = DMatrix<f32>;
    type Scalar = f32;

    fn posterior_mean(&self) -> &Self::Mat {
        &self.estimated_mean
    }

    fn posterior_sd(&self) -> &Self::Mat {
        &self.estimated_sd
    }

    fn posterior_sample<R: rand::Rng>(&self, rng: &mut R) -> anyhow::Result<Self::Mat> {
        let mut ret = Vec::with_capacity(self.num_rows * self.num_columns);
        for (&a, &b) in self.a_stat.iter().zip(self.b_stat.iter()) {
            let gamma = rand_distr::Gamma::new(a, b.recip())?;
            ret.push(gamma.sample(rng));
        }
        Ok(DMatrix::from_vec(self.num_rows, self.num_columns, ret))
    }

    fn calibrate(&mut self) {
        self.map_calibrate_mean();
        self.map_calibrate_sd();
        self.map_calibrate_log_mean();
        self.map_calibrate_log_sd();
    }
    fn map_calibrate_mean(&mut self) {
        self.estimated_mean = self.a_stat.zip_map(&self.b_stat, |a, b| a / b);
    }
    fn map_calibrate_sd(&mut self) {
        self.estimated_sd = self.a_stat.zip_map(&self.b_stat, |a, b| a.sqrt() / b);
    }
}

impl GammaMatrix {
    fn map_calibrate_log_mean(&mut self) {
        use special::Gamma;
        self.estimated_log_mean = self
            .a_stat
            .zip_map(&self.b_stat, |a, b| a.digamma() - b.ln());
    }
    fn map_calibrate_log_sd(&mut self) {
        self.estimated_log_sd = self.a_stat.map(|a| -> f32 {
            if a > 1.0 {
                1.0 / (a - 1.0).sqrt()
            } else {
                // this is actually not true
                0.0
            }
        });
    }
}
