//! Configuration of one inference run, as read by `costometer infer`.

use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    Result,
    policy::PolicyKwargs,
    priors::{DiscretePrior, PriorSet, TempPriorDetails},
    types::ParamValue,
};

/// ```yaml
/// experiment_setting: high_increasing
/// cost_function: linear_depth
/// cost_parameters:
///   depth_cost_weight: [0, 1, 5]
///   static_cost_weight: [0, 1]
/// policy_parameters:
///   temp: [0.1, 1, 10]
/// noise: 0.0
/// temp_priors:
///   expon:
///     rv: {distribution: exponential, rate: 1}
///     possible_temps: [0.1, 1, 10]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub experiment_setting: String,
    pub cost_function: String,
    /// Directory with `{cost_function}.yaml`. Defaults to the directory of
    /// the inference file.
    #[serde(default)]
    pub cost_function_dir: Option<PathBuf>,
    /// Candidate values of each cost parameter, searched under a uniform
    /// prior.
    pub cost_parameters: BTreeMap<String, Vec<ParamValue>>,
    /// Candidate values of searched policy parameters.
    #[serde(default)]
    pub policy_parameters: BTreeMap<String, Vec<ParamValue>>,
    #[serde(default)]
    pub noise: f64,
    /// Temperature used when `temp` is not searched.
    #[serde(default = "default_temp")]
    pub temp: f64,
    #[serde(default)]
    pub temp_priors: BTreeMap<String, TempPriorDetails>,
    /// Extra parameters that get a uniform prior in every named prior.
    #[serde(default)]
    pub additional_params: Vec<String>,
    #[serde(default = "default_free_policy_parameters")]
    pub free_policy_parameters: usize,
}

fn default_temp() -> f64 {
    1.0
}

fn default_free_policy_parameters() -> usize {
    1
}

impl InferenceConfig {
    pub fn cost_priors(&self) -> PriorSet {
        uniform_priors(&self.cost_parameters)
    }

    pub fn policy_priors(&self) -> PriorSet {
        uniform_priors(&self.policy_parameters)
    }

    /// Policy arguments for everything not searched.
    pub fn held_constant(&self) -> Result<PolicyKwargs> {
        let kwargs = PolicyKwargs {
            temp: self.temp,
            noise: self.noise,
        };
        kwargs.validate()?;
        Ok(kwargs)
    }
}

fn uniform_priors(grid: &BTreeMap<String, Vec<ParamValue>>) -> PriorSet {
    grid.iter()
        .map(|(name, values)| (name.clone(), DiscretePrior::uniform(values.clone())))
        .collect()
}
