//! Participant adapter over precomputed action-value tables.
//!
//! A softmax participant scores each observed action against the table for
//! its cost parameters. A random participant only needs the set of actions
//! available in each state.

use std::sync::Arc;

use crate::{
    Result,
    action_values::{ActionSpace, ActionValueTable},
    error::Error,
    policy::{PolicyKind, PolicyKwargs, random_log_probability, softmax_log_probability},
    ports::{Participant, ParticipantFactory, ParticipantSpec},
    trace::Trace,
};

enum Scorer {
    Softmax(Arc<ActionValueTable>, PolicyKwargs),
    Random(Arc<ActionSpace>),
}

/// Participant whose action log-probabilities come from lookup tables.
pub struct TabularParticipant {
    scorer: Scorer,
    num_trials: usize,
}

impl TabularParticipant {
    pub fn softmax(
        table: Arc<ActionValueTable>,
        kwargs: PolicyKwargs,
        num_trials: usize,
    ) -> Result<Self> {
        kwargs.validate()?;
        Ok(Self {
            scorer: Scorer::Softmax(table, kwargs),
            num_trials,
        })
    }

    pub fn random(space: Arc<ActionSpace>, num_trials: usize) -> Self {
        Self {
            scorer: Scorer::Random(space),
            num_trials,
        }
    }
}

impl Participant for TabularParticipant {
    fn compute_likelihood(&self, trace: &Trace) -> Result<Vec<Vec<f64>>> {
        if trace.num_trials() > self.num_trials {
            return Err(Error::TraceShape {
                pid: trace.pid.to_string(),
                message: format!(
                    "{} trials exceed the {} the participant was built for",
                    trace.num_trials(),
                    self.num_trials
                ),
            });
        }

        trace
            .states
            .iter()
            .zip(&trace.actions)
            .map(|(states, actions)| {
                states
                    .iter()
                    .zip(actions)
                    .map(|(state, &action)| match &self.scorer {
                        Scorer::Softmax(table, kwargs) => {
                            softmax_log_probability(table, state, action, kwargs)
                        }
                        Scorer::Random(space) => random_log_probability(space, state, action),
                    })
                    .collect()
            })
            .collect()
    }
}

/// Builds [`TabularParticipant`]s.
///
/// Softmax specs must carry their action-value table. Random specs use the
/// factory's action space.
#[derive(Clone)]
pub struct TabularParticipantFactory {
    action_space: Arc<ActionSpace>,
}

impl TabularParticipantFactory {
    pub fn new(action_space: ActionSpace) -> Self {
        Self {
            action_space: Arc::new(action_space),
        }
    }

    /// Factory whose random participants act in `table`'s action space.
    pub fn from_table(table: &ActionValueTable) -> Self {
        Self::new(table.action_space())
    }
}

impl ParticipantFactory for TabularParticipantFactory {
    fn build(&self, spec: &ParticipantSpec) -> Result<Box<dyn Participant>> {
        match spec.policy {
            PolicyKind::Softmax => {
                let table = spec
                    .preference
                    .clone()
                    .ok_or_else(|| Error::MissingActionValues {
                        parameters: spec.cost_kwargs.encode(),
                    })?;
                Ok(Box::new(TabularParticipant::softmax(
                    table,
                    spec.policy_kwargs,
                    spec.num_trials,
                )?))
            }
            PolicyKind::Random => Ok(Box::new(TabularParticipant::random(
                Arc::clone(&self.action_space),
                spec.num_trials,
            ))),
        }
    }
}
