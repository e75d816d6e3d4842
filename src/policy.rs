//! Decision policies and their step log-probabilities.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    action_values::{ActionSpace, ActionValueTable},
    identifiers::StateId,
    types::{ParamValue, Parameters},
    utils::log_sum_exp,
};

/// The policy functions a participant can be equipped with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PolicyKind {
    #[serde(rename = "SoftmaxPolicy")]
    Softmax,
    #[serde(rename = "RandomPolicy")]
    Random,
}

impl PolicyKind {
    pub fn name(self) -> &'static str {
        match self {
            PolicyKind::Softmax => "SoftmaxPolicy",
            PolicyKind::Random => "RandomPolicy",
        }
    }

    /// Whether the policy reads action values at all.
    pub fn uses_action_values(self) -> bool {
        matches!(self, PolicyKind::Softmax)
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Policy parameters: inverse rationality and lapse rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicyKwargs {
    pub temp: f64,
    #[serde(default)]
    pub noise: f64,
}

impl Default for PolicyKwargs {
    fn default() -> Self {
        Self {
            temp: 1.0,
            noise: 0.0,
        }
    }
}

impl PolicyKwargs {
    pub const TEMP: &'static str = "temp";
    pub const NOISE: &'static str = "noise";

    /// Overlay any numeric `temp` / `noise` found in `params` onto `self`.
    pub fn overlaid(mut self, params: &Parameters) -> Self {
        if let Some(temp) = params.get(Self::TEMP).and_then(ParamValue::as_f64) {
            self.temp = temp;
        }
        if let Some(noise) = params.get(Self::NOISE).and_then(ParamValue::as_f64) {
            self.noise = noise;
        }
        self
    }

    /// # Errors
    ///
    /// Temperature must be positive and noise in `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if !(self.temp > 0.0 && self.temp.is_finite()) {
            return Err(Error::InvalidConfiguration {
                message: format!("softmax temperature must be positive, got {}", self.temp),
            });
        }
        if !(0.0..=1.0).contains(&self.noise) {
            return Err(Error::InvalidConfiguration {
                message: format!("policy noise must lie in [0, 1], got {}", self.noise),
            });
        }
        Ok(())
    }
}

/// `ln P(action | state)` under a softmax over `Q / temp`, mixed with a
/// uniform lapse of weight `noise`.
pub fn softmax_log_probability(
    table: &ActionValueTable,
    state: &StateId,
    action: usize,
    kwargs: &PolicyKwargs,
) -> Result<f64> {
    let values = table.values(state)?;
    let chosen = values
        .get(&action)
        .copied()
        .ok_or_else(|| Error::UnknownAction {
            state: state.to_string(),
            action,
        })?;

    let lse = log_sum_exp(values.values().map(|q| q / kwargs.temp));
    let log_softmax = chosen / kwargs.temp - lse;
    if kwargs.noise == 0.0 {
        return Ok(log_softmax);
    }

    let n = values.len() as f64;
    Ok(((1.0 - kwargs.noise) * log_softmax.exp() + kwargs.noise / n).ln())
}

/// `ln P(action | state)` under a uniform choice among available actions.
pub fn random_log_probability(space: &ActionSpace, state: &StateId, action: usize) -> Result<f64> {
    let actions = space.available_actions(state)?;
    if !actions.contains(&action) {
        return Err(Error::UnknownAction {
            state: state.to_string(),
            action,
        });
    }
    Ok(-(actions.len() as f64).ln())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ActionValueTable {
        let mut table = ActionValueTable::new();
        table.insert("s", 0, 0.0);
        table.insert("s", 1, 2.0);
        table.insert("s", 2, -1.0);
        table
    }

    #[test]
    fn softmax_probabilities_sum_to_one() {
        let table = table();
        let state = StateId::new("s");
        for kwargs in [
            PolicyKwargs::default(),
            PolicyKwargs {
                temp: 0.5,
                noise: 0.2,
            },
        ] {
            let total: f64 = (0..3)
                .map(|a| softmax_log_probability(&table, &state, a, &kwargs).unwrap().exp())
                .sum();
            assert!((total - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn full_noise_is_uniform() {
        let kwargs = PolicyKwargs {
            temp: 1.0,
            noise: 1.0,
        };
        let lp = softmax_log_probability(&table(), &StateId::new("s"), 1, &kwargs).unwrap();
        assert!((lp + 3f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn random_policy_rejects_unavailable_actions() {
        let space = table().action_space();
        let state = StateId::new("s");
        assert!((random_log_probability(&space, &state, 2).unwrap() + 3f64.ln()).abs() < 1e-12);
        assert!(random_log_probability(&space, &state, 5).is_err());
    }

    #[test]
    fn kwargs_overlay_reads_grid_values() {
        let params = Parameters::new().with("temp", 0.1).with("depth_cost_weight", 1.0);
        let kwargs = PolicyKwargs::default().overlaid(&params);
        assert_eq!(kwargs.temp, 0.1);
        assert_eq!(kwargs.noise, 0.0);
    }
}
