pub mod common_io; // delimited text files, gzipped or not
pub mod dmatrix_io; // read and write dense matrices
pub mod dmatrix_util; // sampling and column transforms
pub mod running_stat; // running summary statistics
pub mod traits;
pub mod utils; // membership partitioning
