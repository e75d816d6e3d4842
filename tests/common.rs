//! Common test utilities for the costometer test suite.
//!
//! A toy click task: at `root` the agent stops (action 0) or clicks one of two
//! nodes (actions 1 and 2). After clicking it reaches `clicked`, where it can
//! stop or click the remaining deep node (action 2). Clicking costs `weight`
//! per level of depth.

#![allow(dead_code)]

use std::sync::Arc;

use costometer::{
    Result,
    action_values::ActionValueTable,
    adapters::{InMemoryRepository, TabularParticipantFactory},
    identifiers::{ParticipantId, StateId},
    ports::{ActionValueKey, ActionValueRepository, TrajectorySimulator},
    priors::{DiscretePrior, PriorSet},
    trace::Trace,
    types::{ParamValue, Parameters},
    utils::log_sum_exp,
};
use rand::{Rng, distr::StandardUniform, rngs::StdRng};

pub const SETTING: &str = "toy";
pub const COST_FUNCTION: &str = "linear_depth";
pub const WEIGHT: &str = "depth_cost_weight";
pub const WEIGHTS: [f64; 3] = [0.0, 1.0, 3.0];
pub const TEMPS: [f64; 3] = [0.5, 1.0, 2.0];
pub const STATIC_WEIGHT: &str = "static_cost_weight";
pub const TWO_COST_WEIGHTS: [f64; 3] = [0.0, 1.0, 10.0];

pub fn click_table(weight: f64) -> ActionValueTable {
    let mut table = ActionValueTable::new();
    table.insert("root", 0, 0.0);
    table.insert("root", 1, 2.0 - weight);
    table.insert("root", 2, 1.0 - weight);
    table.insert("clicked", 0, 0.0);
    table.insert("clicked", 2, 1.0 - 2.0 * weight);
    table
}

/// Click table where every click also pays a flat `static_weight`.
pub fn two_cost_table(depth_weight: f64, static_weight: f64) -> ActionValueTable {
    let mut table = ActionValueTable::new();
    table.insert("root", 0, 0.0);
    table.insert("root", 1, 2.0 - depth_weight - static_weight);
    table.insert("root", 2, 1.0 - 2.0 * depth_weight - static_weight);
    table.insert("clicked", 0, 0.0);
    table.insert("clicked", 2, 1.0 - 2.0 * depth_weight - static_weight);
    table
}

/// Equal values everywhere, so a softmax agent chooses uniformly.
pub fn flat_click_table() -> ActionValueTable {
    let mut table = ActionValueTable::new();
    for action in [0, 1, 2] {
        table.insert("root", action, 0.0);
    }
    table.insert("clicked", 0, 0.0);
    table.insert("clicked", 2, 0.0);
    table
}

pub fn two_cost_parameters(depth_weight: f64, static_weight: f64) -> Parameters {
    Parameters::new()
        .with(WEIGHT, depth_weight)
        .with(STATIC_WEIGHT, static_weight)
}

/// Repository holding a [`two_cost_table`] for every grid combination.
pub fn two_cost_repository() -> Arc<InMemoryRepository> {
    let repo = InMemoryRepository::new();
    for depth_weight in TWO_COST_WEIGHTS {
        for static_weight in TWO_COST_WEIGHTS {
            let key = ActionValueKey::new(
                SETTING,
                COST_FUNCTION,
                two_cost_parameters(depth_weight, static_weight),
            );
            ActionValueRepository::save(&repo, &key, &two_cost_table(depth_weight, static_weight))
                .unwrap();
        }
    }
    Arc::new(repo)
}

pub fn two_cost_priors() -> PriorSet {
    let mut priors = PriorSet::new();
    priors.insert(WEIGHT, uniform(&TWO_COST_WEIGHTS));
    priors.insert(STATIC_WEIGHT, uniform(&TWO_COST_WEIGHTS));
    priors
}

pub fn cost_parameters(weight: f64) -> Parameters {
    Parameters::new().with(WEIGHT, weight)
}

/// Repository holding a table for every weight in [`WEIGHTS`].
pub fn repository() -> Arc<InMemoryRepository> {
    let repo = InMemoryRepository::new();
    for weight in WEIGHTS {
        let key = ActionValueKey::new(SETTING, COST_FUNCTION, cost_parameters(weight));
        ActionValueRepository::save(&repo, &key, &click_table(weight)).unwrap();
    }
    Arc::new(repo)
}

pub fn factory() -> Arc<TabularParticipantFactory> {
    Arc::new(TabularParticipantFactory::from_table(&click_table(0.0)))
}

pub fn uniform(values: &[f64]) -> DiscretePrior {
    DiscretePrior::uniform(values.iter().copied().map(ParamValue::Number).collect())
}

pub fn cost_priors() -> PriorSet {
    let mut priors = PriorSet::new();
    priors.insert(WEIGHT, uniform(&WEIGHTS));
    priors
}

pub fn temp_priors() -> PriorSet {
    let mut priors = PriorSet::new();
    priors.insert("temp", uniform(&TEMPS));
    priors
}

/// A trace that clicks the shallow node, then the deep one, in every trial.
pub fn eager_trace(pid: &str, trials: usize) -> Trace {
    Trace::new(
        pid,
        vec![vec![StateId::new("root"), StateId::new("clicked")]; trials],
        vec![vec![1, 2]; trials],
    )
    .unwrap()
}

/// A trace that stops immediately in every trial.
pub fn lazy_trace(pid: &str, trials: usize) -> Trace {
    Trace::new(pid, vec![vec![StateId::new("root")]; trials], vec![vec![0]; trials]).unwrap()
}

/// Sample an index according to (unnormalized) `weights`.
pub fn sample_categorical(weights: &[f64], rng: &mut StdRng) -> usize {
    debug_assert!(!weights.is_empty());
    let total: f64 = weights.iter().sum();
    let ticket: f64 = rng.sample::<f64, _>(StandardUniform) * total;
    let mut cumulative = 0.0;
    for (idx, weight) in weights.iter().enumerate() {
        cumulative += weight;
        if ticket <= cumulative {
            return idx;
        }
    }
    weights.len() - 1
}

/// Softmax agent acting in the click task.
pub struct ClickSimulator {
    pub pid: ParticipantId,
    pub table: ActionValueTable,
    pub temp: f64,
    pub trials: usize,
    pub rng: StdRng,
}

impl ClickSimulator {
    fn choose(&mut self, state: &StateId) -> usize {
        let values = self.table.values(state).unwrap();
        let actions: Vec<usize> = values.keys().copied().collect();
        let lse = log_sum_exp(values.values().map(|q| q / self.temp));
        let weights: Vec<f64> = values
            .values()
            .map(|q| (q / self.temp - lse).exp())
            .collect();
        actions[sample_categorical(&weights, &mut self.rng)]
    }
}

impl TrajectorySimulator for ClickSimulator {
    fn simulate_trajectory(&mut self) -> Result<Trace> {
        let mut states = Vec::with_capacity(self.trials);
        let mut actions = Vec::with_capacity(self.trials);
        for _ in 0..self.trials {
            let mut state = StateId::new("root");
            let mut trial_states = Vec::new();
            let mut trial_actions = Vec::new();
            loop {
                let action = self.choose(&state);
                trial_states.push(state.clone());
                trial_actions.push(action);
                if action == 0 {
                    break;
                }
                state = StateId::new("clicked");
                if trial_actions.len() > 4 {
                    break;
                }
            }
            states.push(trial_states);
            actions.push(trial_actions);
        }
        Trace::new(self.pid.clone(), states, actions)
    }
}
