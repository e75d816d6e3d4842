//! Experiment-level configuration and the validated analysis configuration
//! built from it.

use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    Error, Result,
    config::{AnalysisPaths, CostFunctionRegistry, SessionDetails, read_yaml},
    priors::TempPriorDetails,
    types::{ParamValue, Parameters},
};

/// Block label used for every metric of a simulated session.
pub const ALL_BLOCKS: &str = "All";

/// Label for metrics that do not belong to a known block, and for the MLE
/// "prior".
pub const NONE_LABEL: &str = "None";

/// Contents of `analysis/{subdirectory}/inputs/yamls/{experiment}.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub sessions: Vec<String>,
    pub cost_functions: Vec<String>,
    #[serde(default)]
    pub simulated: bool,
    /// Trials per simulated trace.
    #[serde(default)]
    pub number_trials: Option<usize>,
    /// Suffixes appended to session names to find result directories.
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default = "default_block")]
    pub block: Vec<String>,
    #[serde(default = "default_prior")]
    pub prior: String,
    #[serde(default)]
    pub group: bool,
    #[serde(default)]
    pub include_null: bool,
    #[serde(default)]
    pub palette_name: Option<String>,
    /// Directory of precomputed action values, relative to the root.
    #[serde(default)]
    pub q_path: Option<PathBuf>,
    #[serde(default = "default_free_policy_parameters")]
    pub free_policy_parameters: usize,
    #[serde(default)]
    pub temp_priors: BTreeMap<String, TempPriorDetails>,
    /// Simulated temperatures.
    #[serde(default)]
    pub temp: Vec<f64>,
    /// Simulated values of every cost parameter.
    #[serde(default)]
    pub simulated_grid: BTreeMap<String, Vec<ParamValue>>,
}

fn default_block() -> Vec<String> {
    vec![NONE_LABEL.to_string()]
}

fn default_prior() -> String {
    NONE_LABEL.to_string()
}

fn default_free_policy_parameters() -> usize {
    1
}

/// Configuration of one analysis, loaded and checked once.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    experiment_name: String,
    experiment: ExperimentConfig,
    registry: CostFunctionRegistry,
    sessions: BTreeMap<String, SessionDetails>,
    params: Vec<String>,
    block: Vec<String>,
    experiment_setting: String,
}

impl AnalysisConfig {
    /// Read the experiment, cost-function, and session files under `paths`.
    ///
    /// # Errors
    ///
    /// Fails on unreadable or malformed files and on any check of
    /// [`AnalysisConfig::new`].
    pub fn load(paths: &AnalysisPaths) -> Result<Self> {
        let experiment: ExperimentConfig = read_yaml(&paths.experiment_yaml())?;
        let registry =
            CostFunctionRegistry::load(&paths.cost_function_dir(), &experiment.cost_functions)?;
        let sessions = if experiment.simulated {
            BTreeMap::new()
        } else {
            experiment
                .sessions
                .iter()
                .map(|session| Ok((session.clone(), read_yaml(&paths.session_yaml(session))?)))
                .collect::<Result<_>>()?
        };
        Self::new(paths.experiment_name(), experiment, registry, sessions)
    }

    /// Check the configuration and derive session parameters.
    ///
    /// Simulated experiments get one session variant per combination of
    /// simulated cost values and temperature, and a single `All` block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCostFunction`] for a cost function missing
    /// from `registry`, and [`Error::InvalidConfiguration`] when sessions
    /// disagree on their experiment setting, a simulated experiment does not
    /// have exactly one cost function and a trial count, or session details
    /// are missing.
    pub fn new(
        experiment_name: impl Into<String>,
        experiment: ExperimentConfig,
        registry: CostFunctionRegistry,
        mut sessions: BTreeMap<String, SessionDetails>,
    ) -> Result<Self> {
        let experiment_name = experiment_name.into();
        if experiment.sessions.is_empty() {
            return Err(invalid(format!("experiment '{experiment_name}' has no sessions")));
        }
        for name in &experiment.cost_functions {
            registry.get(name)?;
        }

        let (params, block) = if experiment.simulated {
            let [cost_function] = experiment.cost_functions.as_slice() else {
                return Err(invalid(format!(
                    "simulated experiment '{experiment_name}' needs exactly one cost function, \
                     found {}",
                    experiment.cost_functions.len()
                )));
            };
            if experiment.number_trials.is_none() {
                return Err(invalid(format!(
                    "simulated experiment '{experiment_name}' needs number_trials"
                )));
            }
            sessions = experiment
                .sessions
                .iter()
                .map(|session| (session.clone(), SessionDetails::simulated(session)))
                .collect();
            let params = if experiment.params.is_empty() {
                simulated_params(&experiment, registry.get(cost_function)?.parameter_args())?
            } else {
                experiment.params.clone()
            };
            (params, vec![ALL_BLOCKS.to_string()])
        } else {
            if let Some(missing) = experiment
                .sessions
                .iter()
                .find(|session| !sessions.contains_key(*session))
            {
                return Err(invalid(format!("no details for session '{missing}'")));
            }
            let params = if experiment.params.is_empty() {
                vec![String::new()]
            } else {
                experiment.params.clone()
            };
            (params, experiment.block.clone())
        };

        let mut settings = experiment
            .sessions
            .iter()
            .filter_map(|session| sessions.get(session))
            .map(|details| details.experiment_setting.as_str());
        let experiment_setting = settings.next().unwrap_or_default().to_string();
        if let Some(other) = settings.find(|setting| *setting != experiment_setting) {
            return Err(invalid(format!(
                "sessions of '{experiment_name}' mix experiment settings \
                 '{experiment_setting}' and '{other}'"
            )));
        }

        info!(
            experiment = %experiment_name,
            sessions = experiment.sessions.len(),
            cost_functions = experiment.cost_functions.len(),
            variants = params.len(),
            setting = %experiment_setting,
            "loaded analysis configuration"
        );

        Ok(Self {
            experiment_name,
            experiment,
            registry,
            sessions,
            params,
            block,
            experiment_setting,
        })
    }

    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    pub fn experiment(&self) -> &ExperimentConfig {
        &self.experiment
    }

    pub fn registry(&self) -> &CostFunctionRegistry {
        &self.registry
    }

    pub fn session(&self, session: &str) -> Option<&SessionDetails> {
        self.sessions.get(session)
    }

    pub fn sessions(&self) -> &[String] {
        &self.experiment.sessions
    }

    pub fn cost_functions(&self) -> &[String] {
        &self.experiment.cost_functions
    }

    /// Session-name suffixes, `[""]` unless configured or simulated.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Default blocks for queries.
    pub fn block(&self) -> &[String] {
        &self.block
    }

    pub fn experiment_setting(&self) -> &str {
        &self.experiment_setting
    }

    pub fn is_simulated(&self) -> bool {
        self.experiment.simulated
    }

    pub fn number_trials(&self) -> Option<usize> {
        self.experiment.number_trials
    }

    pub fn palette_name(&self) -> &str {
        self.experiment
            .palette_name
            .as_deref()
            .unwrap_or(&self.experiment_name)
    }
}

fn invalid(message: String) -> Error {
    Error::InvalidConfiguration { message }
}

/// `_{cost string}_{temp:.2}` for every temperature and every combination of
/// simulated cost values, temperatures outermost.
fn simulated_params(experiment: &ExperimentConfig, args: &[String]) -> Result<Vec<String>> {
    let mut combinations = vec![Parameters::new()];
    for arg in args {
        let values = experiment
            .simulated_grid
            .get(arg)
            .filter(|values| !values.is_empty())
            .ok_or_else(|| Error::EmptySearchSpace {
                dimension: arg.clone(),
            })?;
        combinations = combinations
            .into_iter()
            .flat_map(|partial| {
                values
                    .iter()
                    .map(move |value| partial.clone().with(arg.clone(), value.clone()))
            })
            .collect();
    }
    if experiment.temp.is_empty() {
        return Err(Error::EmptySearchSpace {
            dimension: "temp".to_string(),
        });
    }

    Ok(experiment
        .temp
        .iter()
        .flat_map(|temp| {
            combinations
                .iter()
                .map(move |cost| format!("_{}_{temp:.2}", cost.param_string()))
        })
        .collect())
}
