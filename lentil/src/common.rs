#![allow(dead_code)]

pub use log::{info, warn};

pub type Mat = nalgebra::DMatrix<f32>;
pub type DVec = nalgebra::DVector<f32>;

/// categorical groupings, in the order used throughout
pub const GROUPING_NAMES: [&str; 3] = ["student", "instructor", "department"];

pub const N_GROUPINGS: usize = 3;
