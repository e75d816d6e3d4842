//! Model comparison over persisted result bundles.
//!
//! This module turns selected rows into a long-format comparison table with
//! BIC per row, queries it for one prior and block set, assigns stable
//! colors to model names, and re-evaluates traces trial by trial under the
//! parameters they were fitted with.

pub mod bic;
pub mod comparison;
pub mod palette;
pub mod trial_by_trial;

pub use bic::bic;
pub use comparison::{
    ComparisonQuery, ComparisonRow, ComparisonTable, MeltContext, MetricName, NULL_MODEL,
    melt_bundle,
};
pub use palette::{ModelPalette, generate_model_palette};
pub use trial_by_trial::{
    TrialByTrialInputs, TrialLikelihood, compute_trial_by_trial_likelihoods,
    load_trial_likelihoods, save_trial_likelihoods,
};
