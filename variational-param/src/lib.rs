pub mod dmatrix_gamma; // gamma posteriors over precisions
pub mod dmatrix_gaussian; // gaussian posteriors over effects
pub mod io; // tsv and parquet export
pub mod traits;
