pub mod normalize;
pub mod recommendations;
pub mod similarity;

pub use recommendations::{run_batch, BatchOptions, BatchReport, WriteFailure};
pub use similarity::{compute_similarities, compute_similarities_with, ComputeOptions};
