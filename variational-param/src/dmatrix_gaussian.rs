#![allow(dead_code)]

use crate::io::*;
use crate::traits::*;
use nalgebra::DMatrix;
use rand_distr::{Distribution, Normal};

/// Gaussian posterior matrix in natural-parameter form.
///
/// Each coordinate keeps a precision-weighted sum `a` and a total
/// precision `b`:
///
/// ```text
/// theta[i,j] ~ N(a[i,j] / b[i,j], 1 / b[i,j])
/// ```
///
/// With hyper parameters `mu0` (prior mean) and `tau0` (prior
/// precision), `reset_stat` restores `a = tau0 * mu0` and `b = tau0`,
/// and conjugate Normal-Normal updates accumulate on top of that.
#[derive(Debug)]
pub struct GaussianMatrix {
    num_rows: usize,
    num_columns: usize,
    //////////////////////
    // hyper parameters //
    //////////////////////
    mu0: f32,
    tau0: f32,
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
}

impl ParamIo for GaussianMatrix {}

impl GaussianMatrix {
    /// Second moment `E[theta^2] = mean^2 + sd^2` per coordinate
    pub fn posterior_second_moment(&self) -> DMatrix<f32> {
        self.estimated_mean
            .zip_map(&self.estimated_sd, |m, s| m * m + s * s)
    }

    pub fn prior_mean(&self) -> f32 {
        self.mu0
    }

    pub fn prior_precision(&self) -> f32 {
        self.tau0
    }
}

impl TwoStatParam for GaussianMatrix {
    type Mat = DMatrix<f32>;
    type Scalar = f32;

    fn new(dims: (usize, usize), mu0: Self::Scalar, tau0: Self::Scalar) -> Self {
        Self {
            num_rows: dims.0,
            num_columns: dims.1,
            mu0,
            tau0,
            a_stat: DMatrix::from_element(dims.0, dims.1, tau0 * mu0),
            b_stat: DMatrix::from_element(dims.0, dims.1, tau0),
            estimated_mean: DMatrix::from_element(dims.0, dims.1, mu0),
            estimated_sd: DMatrix::zeros(dims.0, dims.1),
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
        self.a_stat.fill(self.tau0 * self.mu0);
        self.b_stat.fill(self.tau0);
    }

    fn nrows(&self) -> usize {
        self.num_rows
    }
    fn ncols(&self) -> usize {
        self.num_columns
    }
}

impl Inference for GaussianMatrix {
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
        for (&m, &s) in self.estimated_mean.iter().zip(self.estimated_sd.iter()) {
            let normal = Normal::new(m, s)?;
            ret.push(normal.sample(rng));
        }
        Ok(DMatrix::from_vec(self.num_rows, self.num_columns, ret))
    }

    fn calibrate(&mut self) {
        self.map_calibrate_mean();
        self.map_calibrate_sd();
    }
    fn map_calibrate_mean(&mut self) {
        self.estimated_mean = self
            .a_stat
            .zip_map(&self.b_stat, |a, b| if b > 0.0 { a / b } else { 0.0 });
    }
    fn map_calibrate_sd(&mut self) {
        self.estimated_sd = self.b_stat.map(|b| -> f32 {
            if b > 0.0 {
                b.sqrt().recip()
            } else {
                0.0
            }
        });
    }
}
