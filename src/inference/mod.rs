//! Grid-search inference of cost and policy parameters.

pub mod grid;
pub mod likelihood;
pub mod results;
pub mod space;

pub use grid::{GridContext, GridInference, GridInferenceBuilder};
pub use likelihood::LikelihoodSummary;
pub use results::{OptimizationResults, OptimizationRow};
pub use space::{Dimension, GridPoints, OptimizationSpace};
