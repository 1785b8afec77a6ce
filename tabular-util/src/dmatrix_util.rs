use crate::traits::{MatOps, SampleOps};
pub use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;

#[allow(dead_code)]
/// Sample d,n matrix from U(0,1)
pub fn runif(dd: usize, nn: usize) -> DMatrix<f32> {
    let rvec = (0..(dd * nn))
        .into_par_iter()
        .map_init(rand::rng, |rng, _| rng.random::<f32>())
        .collect();

    DMatrix::<f32>::from_vec(dd, nn, rvec)
}

#[allow(dead_code)]
/// Sample d,n matrix from N(0,1)
pub fn rnorm(dd: usize, nn: usize) -> DMatrix<f32> {
    let rvec = (0..(dd * nn))
        .into_par_iter()
        .map_init(rand::rng, |rng, _| rng.sample(StandardNormal))
        .collect();

    DMatrix::<f32>::from_vec(dd, nn, rvec)
}

/// Pearson correlation between two vectors of the same length
pub fn pearson_correlation(xx: &DVector<f32>, yy: &DVector<f32>) -> f32 {
    debug_assert_eq!(xx.len(), yy.len());
    let nn = xx.len() as f32;
    if nn < 2.0 {
        return 0.0;
    }
    let x_bar = xx.mean();
    let y_bar = yy.mean();

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in xx.iter().zip(yy.iter()) {
        let dx = x - x_bar;
        let dy = y - y_bar;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let denom = (sxx * syy).sqrt();
    if denom > 0.0 {
        sxy / denom
    } else {
        0.0
    }
}

impl SampleOps for DMatrix<f32> {
    type Mat = DMatrix<f32>;
    type Scalar = f32;

    fn runif(dd: usize, nn: usize) -> Self::Mat {
        runif(dd, nn)
    }

    fn rnorm(dd: usize, nn: usize) -> Self::Mat {
        rnorm(dd, nn)
    }
}

impl MatOps for DMatrix<f32> {
    type Mat = DMatrix<f32>;
    type Scalar = f32;

    /// `Y[,j] = X[,j] / max(1, norm(X[,j]))`
    fn normalize_columns_inplace(&mut self) {
        for mut x_j in self.column_iter_mut() {
            let denom = x_j.norm().max(1.0);
            x_j /= denom;
        }
    }

    fn normalize_columns(&self) -> Self::Mat {
        let mut ret = self.clone();
        ret.normalize_columns_inplace();
        ret
    }

    fn centre_columns_inplace(&mut self) {
        for mut x_j in self.column_iter_mut() {
            let mu = x_j.mean();
            x_j.add_scalar_mut(-mu);
        }
    }

    fn centre_columns(&self) -> Self::Mat {
        let mut ret = self.clone();
        ret.centre_columns_inplace();
        ret
    }
}
