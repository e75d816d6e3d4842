//! Directory layout of an analysis project.

use std::path::{Path, PathBuf};

/// Where an experiment's inputs, intermediate results, and caches live.
///
/// ```text
/// {root}/data/inputs/yamls/cost_functions/{cost_function}.yaml
/// {root}/data/inputs/yamls/experiments/{session}.yaml
/// {root}/data/processed/{session}/traces.json
/// {root}/data/processed/{session}{param}/{cost_function}/mle_and_map*.msgpack
/// {root}/analysis/{subdirectory}/inputs/yamls/{experiment}.yaml
/// {root}/analysis/{subdirectory}/data/...
/// ```
///
/// # Examples
///
/// ```
/// use costometer::config::AnalysisPaths;
///
/// let paths = AnalysisPaths::new("/irl", "methods/static", "SoftmaxRecovery");
/// assert_eq!(
///     paths.experiment_yaml(),
///     std::path::Path::new("/irl/analysis/methods/static/inputs/yamls/SoftmaxRecovery.yaml")
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisPaths {
    root: PathBuf,
    subdirectory: PathBuf,
    experiment_name: String,
}

impl AnalysisPaths {
    pub fn new(
        root: impl Into<PathBuf>,
        subdirectory: impl Into<PathBuf>,
        experiment_name: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            subdirectory: subdirectory.into(),
            experiment_name: experiment_name.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    pub fn experiment_yaml(&self) -> PathBuf {
        self.analysis_dir()
            .join("inputs/yamls")
            .join(format!("{}.yaml", self.experiment_name))
    }

    pub fn cost_function_dir(&self) -> PathBuf {
        self.root.join("data/inputs/yamls/cost_functions")
    }

    pub fn session_yaml(&self, session: &str) -> PathBuf {
        self.root
            .join("data/inputs/yamls/experiments")
            .join(format!("{session}.yaml"))
    }

    /// Directory holding the result bundles of one session variant and
    /// cost function.
    pub fn results_dir(&self, session: &str, param: &str, cost_function: &str) -> PathBuf {
        self.root
            .join("data/processed")
            .join(format!("{session}{param}"))
            .join(cost_function)
    }

    /// Participant traces of one session, as a JSON array.
    pub fn traces_file(&self, session: &str) -> PathBuf {
        self.root
            .join("data/processed")
            .join(session)
            .join("traces.json")
    }

    pub fn analysis_dir(&self) -> PathBuf {
        self.root.join("analysis").join(&self.subdirectory)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.analysis_dir().join("data")
    }

    pub fn optimization_cache(&self) -> PathBuf {
        self.data_dir()
            .join(format!("{}_optimization_data.csv", self.experiment_name))
    }

    pub fn palette_file(&self, palette_name: &str) -> PathBuf {
        self.data_dir()
            .join(format!("{palette_name}_models_palette.json"))
    }

    pub fn trial_by_trial_cache(&self, block: &str, prior: &str) -> PathBuf {
        self.data_dir()
            .join("trial_by_trial")
            .join(format!("{}_{block}_{prior}.csv", self.experiment_name))
    }

    /// Default location of precomputed action values, relative to the root.
    pub fn default_action_value_dir(&self) -> PathBuf {
        self.root.join("cluster/data/q_files")
    }
}
