//! Decision traces and the keys that identify the agent behind them.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    identifiers::{ParticipantId, StateId},
    types::ParamValue,
};

/// Prefix marking ground-truth fields of simulated traces.
pub const SIM_PREFIX: &str = "sim_";

/// One participant-episode run: per trial, the states visited and the action
/// taken in each of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub pid: ParticipantId,
    /// Outer vector: trials. Inner vector: one state per decision step.
    pub states: Vec<Vec<StateId>>,
    /// Outer vector: trials. Inner vector: the action taken at each step.
    pub actions: Vec<Vec<usize>>,
    /// Optional block label for each trial.
    #[serde(default, rename = "block", skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<String>>,
    /// Ground-truth parameters used to simulate this trace (`sim_*` keys).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sim: BTreeMap<String, ParamValue>,
}

impl Trace {
    pub fn new(
        pid: impl Into<ParticipantId>,
        states: Vec<Vec<StateId>>,
        actions: Vec<Vec<usize>>,
    ) -> Result<Self> {
        let trace = Self {
            pid: pid.into(),
            states,
            actions,
            blocks: None,
            sim: BTreeMap::new(),
        };
        trace.validate()?;
        Ok(trace)
    }

    /// Attach one block label per trial.
    pub fn with_blocks(mut self, blocks: Vec<String>) -> Result<Self> {
        self.blocks = Some(blocks);
        self.validate()?;
        Ok(self)
    }

    /// Record a ground-truth parameter; the `sim_` prefix is added if missing.
    pub fn with_sim(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        let key = if name.starts_with(SIM_PREFIX) {
            name.to_string()
        } else {
            format!("{SIM_PREFIX}{name}")
        };
        self.sim.insert(key, value.into());
        self
    }

    pub fn num_trials(&self) -> usize {
        self.actions.len()
    }

    /// Key grouping this trace with every other trace of the same agent.
    pub fn key(&self) -> TraceKey {
        TraceKey::new(self.pid.clone(), self.sim.clone())
    }

    /// Check the trial/step structure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TraceShape`] when states and actions disagree on the
    /// number of trials or steps, when block labels do not cover every trial
    /// exactly once, or when a ground-truth field lacks the `sim_` prefix.
    pub fn validate(&self) -> Result<()> {
        let shape_error = |message: String| Error::TraceShape {
            pid: self.pid.to_string(),
            message,
        };

        if self.states.len() != self.actions.len() {
            return Err(shape_error(format!(
                "{} trials of states but {} trials of actions",
                self.states.len(),
                self.actions.len()
            )));
        }
        for (trial, (states, actions)) in self.states.iter().zip(&self.actions).enumerate() {
            if states.len() != actions.len() {
                return Err(shape_error(format!(
                    "trial {trial} has {} states but {} actions",
                    states.len(),
                    actions.len()
                )));
            }
        }
        if let Some(blocks) = &self.blocks
            && blocks.len() != self.num_trials()
        {
            return Err(shape_error(format!(
                "{} block labels for {} trials",
                blocks.len(),
                self.num_trials()
            )));
        }
        if let Some(bad) = self.sim.keys().find(|key| !key.starts_with(SIM_PREFIX)) {
            return Err(shape_error(format!(
                "ground-truth field '{bad}' must start with '{SIM_PREFIX}'"
            )));
        }
        Ok(())
    }
}

/// Identity of "the same underlying agent": participant id plus every
/// ground-truth `sim_*` field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TraceKey {
    pub pid: ParticipantId,
    pub sim: BTreeMap<String, ParamValue>,
}

impl TraceKey {
    pub fn new(pid: ParticipantId, sim: BTreeMap<String, ParamValue>) -> Self {
        Self { pid, sim }
    }
}

impl fmt::Display for TraceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pid)?;
        for (name, value) in &self.sim {
            write!(f, " {name}={value}")?;
        }
        Ok(())
    }
}
