//! Raw optimization output: one row per (trace, grid point).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    identifiers::ParticipantId,
    policy::PolicyKind,
    trace::TraceKey,
    types::{ParamValue, Parameters},
};

/// Fit of one trace at one grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRow {
    pub trace_pid: ParticipantId,
    /// Ground-truth fields copied from a simulated trace.
    #[serde(default)]
    pub sim: BTreeMap<String, ParamValue>,
    pub applied_policy: PolicyKind,
    pub mle: f64,
    pub map_val: f64,
    /// Block label -> summed log-likelihood of that block's trials.
    #[serde(default)]
    pub block_mles: BTreeMap<String, f64>,
    /// The grid point.
    pub params: Parameters,
}

impl OptimizationRow {
    pub fn key(&self) -> TraceKey {
        TraceKey::new(self.trace_pid.clone(), self.sim.clone())
    }
}

/// Rows of a completed run, in (grid point, trace) submission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptimizationResults(Vec<OptimizationRow>);

impl OptimizationResults {
    pub fn new(rows: Vec<OptimizationRow>) -> Self {
        Self(rows)
    }

    pub fn rows(&self) -> &[OptimizationRow] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OptimizationRow> {
        self.0.iter()
    }

    pub fn into_rows(self) -> Vec<OptimizationRow> {
        self.0
    }

    /// Rows belonging to one agent.
    pub fn for_key<'a>(&'a self, key: &'a TraceKey) -> impl Iterator<Item = &'a OptimizationRow> {
        self.0.iter().filter(move |row| {
            row.trace_pid == key.pid && row.sim == key.sim
        })
    }
}

impl<'a> IntoIterator for &'a OptimizationResults {
    type Item = &'a OptimizationRow;
    type IntoIter = std::slice::Iter<'a, OptimizationRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Extend<OptimizationRow> for OptimizationResults {
    fn extend<T: IntoIterator<Item = OptimizationRow>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}
