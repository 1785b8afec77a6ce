/// A parameter matrix with two types of sufficient statistics
/// with hyper parameters a0 and b0
///
/// For a Gaussian matrix, `a0` is the prior mean and `b0` the prior
/// precision; for a Gamma matrix, `a0` and `b0` are the usual shape
/// and rate.
pub trait TwoStatParam {
    type Mat;
    type Scalar;

    fn new(dims: (usize, usize), a0: Self::Scalar, b0: Self::Scalar) -> Self;
    fn add_stat(&mut self, add_a: &Self::Mat, add_b: &Self::Mat);
    fn update_stat(&mut self, update_a: &Self::Mat, update_b: &Self::Mat);
    fn reset_stat(&mut self);

    fn nrows(&self) -> usize;
    fn ncols(&self) -> usize;
}

pub trait Inference {
    type Mat;
    type Scalar;

    fn posterior_mean(&self) -> &Self::Mat;
    fn posterior_sd(&self) -> &Self::Mat;

    /// One draw from the calibrated posterior, coordinate by coordinate
    fn posterior_sample<R: rand::Rng>(&self, rng: &mut R) -> anyhow::Result<Self::Mat>;

    fn calibrate(&mut self);
    fn map_calibrate_mean(&mut self);
    fn map_calibrate_sd(&mut self);
}
