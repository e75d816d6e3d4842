//! YAML configuration: cost functions, sessions, experiments, and
//! inference runs.
//!
//! Every file is parsed into a `serde` struct and cross-checked when it is
//! loaded, so a bad configuration fails before any optimization work starts.

pub mod cost_function;
pub mod experiment;
pub mod inference;
pub mod paths;
pub mod session;

use std::{fs, path::Path};

use serde::de::DeserializeOwned;

pub use cost_function::{CostDetails, CostFunctionRegistry, CostFunctionSpec};
pub use experiment::{ALL_BLOCKS, AnalysisConfig, ExperimentConfig, NONE_LABEL};
pub use inference::InferenceConfig;
pub use paths::AnalysisPaths;
pub use session::SessionDetails;

use crate::{Error, Result};

/// Read and deserialize a YAML file.
///
/// # Errors
///
/// Returns [`Error::Io`] when the file cannot be read and
/// [`Error::ConfigParse`] when it is not valid for `T`.
pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path).map_err(|source| Error::Io {
        operation: format!("read {}", path.display()),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|err| Error::ConfigParse {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}
