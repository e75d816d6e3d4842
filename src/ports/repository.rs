//! Repository ports for action-value tables and result bundles.
//!
//! These traits are the boundary between the inference core and the files it
//! exchanges with collaborators: the planning library writes action-value
//! tables, and the reporting side reads per-session result bundles.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::{
    Result, action_values::ActionValueTable, selection::ResultBundle, types::Parameters,
};

/// Identity of one action-value table: the experiment setting, the cost
/// function, and the cost-parameter combination it was computed for.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionValueKey {
    pub experiment_setting: String,
    pub cost_function: String,
    pub cost_parameters: Parameters,
}

impl ActionValueKey {
    pub fn new(
        experiment_setting: impl Into<String>,
        cost_function: impl Into<String>,
        cost_parameters: Parameters,
    ) -> Self {
        Self {
            experiment_setting: experiment_setting.into(),
            cost_function: cost_function.into(),
            cost_parameters,
        }
    }

    /// `{setting}_{cost_function}_{param_string}.msgpack`
    ///
    /// # Examples
    ///
    /// ```
    /// use costometer::ports::ActionValueKey;
    /// use costometer::types::Parameters;
    ///
    /// let key = ActionValueKey::new(
    ///     "high_increasing",
    ///     "linear_depth",
    ///     Parameters::new().with("static_cost_weight", 1.0).with("depth_cost_weight", 0.0),
    /// );
    /// assert_eq!(key.file_name(), "high_increasing_linear_depth_0.00_1.00.msgpack");
    /// ```
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}.msgpack",
            self.experiment_setting,
            self.cost_function,
            self.cost_parameters.param_string()
        )
    }
}

impl fmt::Display for ActionValueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} [{}]",
            self.experiment_setting,
            self.cost_function,
            self.cost_parameters.encode()
        )
    }
}

/// Port for persisting and loading action-value tables.
///
/// Loaded during optimizer construction, once per unique cost combination,
/// and shared between worker threads afterwards.
pub trait ActionValueRepository: Send + Sync {
    /// Save a table, overwriting any table stored under the same key.
    ///
    /// Returns the location the table was written to.
    fn save(&self, key: &ActionValueKey, table: &ActionValueTable) -> Result<PathBuf>;

    /// # Errors
    ///
    /// Returns [`crate::Error::ActionValuesNotFound`] when no table is stored
    /// under `key`; nothing is recomputed.
    fn load(&self, key: &ActionValueKey) -> Result<ActionValueTable>;

    fn contains(&self, key: &ActionValueKey) -> bool;
}

/// Port for per-session result bundles.
pub trait ResultRepository: Send + Sync {
    fn save(&self, bundle: &ResultBundle, path: &Path) -> Result<()>;

    fn load(&self, path: &Path) -> Result<ResultBundle>;

    /// Stored bundles directly inside `dir` whose file name starts with
    /// `prefix`, sorted by path. A missing directory yields an empty list.
    fn list(&self, dir: &Path, prefix: &str) -> Result<Vec<PathBuf>>;
}
