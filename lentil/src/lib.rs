pub mod common;
pub mod input; // rating tables, vocabularies, train/test split
pub mod model; // linear predictor and posterior containers
pub mod run_fit;
pub mod run_sim;
pub mod stat; // sufficient statistics and coordinate updates
