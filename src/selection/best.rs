//! Best-row selection per agent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, inference::OptimizationRow, trace::TraceKey};

/// Suffix of per-block likelihood metrics.
pub const MLE_SUFFIX: &str = "_mle";

/// Anything that belongs to one agent and can be scored on named metrics.
pub trait Scored {
    fn trace_key(&self) -> TraceKey;

    /// `None` when the row has no value for `metric`.
    fn score(&self, metric: &str) -> Option<f64>;
}

impl Scored for OptimizationRow {
    fn trace_key(&self) -> TraceKey {
        self.key()
    }

    /// `mle`, `map_val`, or `{block}_mle`.
    fn score(&self, metric: &str) -> Option<f64> {
        match metric {
            "mle" => Some(self.mle),
            "map_val" => Some(self.map_val),
            _ => metric
                .strip_suffix(MLE_SUFFIX)
                .and_then(|block| self.block_mles.get(block))
                .copied(),
        }
    }
}

impl<T: Scored + ?Sized> Scored for &T {
    fn trace_key(&self) -> TraceKey {
        (**self).trace_key()
    }

    fn score(&self, metric: &str) -> Option<f64> {
        (**self).score(metric)
    }
}

/// An optimization row with the metrics of one nested model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRow {
    pub row: OptimizationRow,
    pub metrics: BTreeMap<String, f64>,
}

impl Scored for ScoredRow {
    fn trace_key(&self) -> TraceKey {
        self.row.key()
    }

    fn score(&self, metric: &str) -> Option<f64> {
        self.metrics
            .get(metric)
            .copied()
            .or_else(|| self.row.score(metric))
    }
}

/// Direction of the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Objective {
    /// Likelihood-like metrics.
    #[default]
    Maximize,
    /// Loss-like metrics.
    Minimize,
}

impl Objective {
    fn improves(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Objective::Maximize => candidate > incumbent,
            Objective::Minimize => candidate < incumbent,
        }
    }
}

/// The best row of every agent on `metric`, ordered by [`TraceKey`].
///
/// Rows without a value for `metric`, or with NaN, are ignored. Under exact
/// ties the first row in input order wins, so the selection is
/// deterministic and idempotent.
///
/// # Errors
///
/// Returns [`Error::SelectionInvariant`] for an agent none of whose rows can
/// be scored on `metric`.
pub fn best_rows<'a, R: Scored>(
    rows: &'a [R],
    metric: &str,
    objective: Objective,
) -> Result<Vec<&'a R>> {
    let mut best: BTreeMap<TraceKey, Option<(&'a R, f64)>> = BTreeMap::new();

    for row in rows {
        let slot = best.entry(row.trace_key()).or_default();
        let Some(score) = row.score(metric).filter(|score| !score.is_nan()) else {
            continue;
        };
        match *slot {
            Some((_, incumbent)) if !objective.improves(score, incumbent) => {}
            _ => *slot = Some((row, score)),
        }
    }

    best.into_iter()
        .map(|(key, selected)| {
            selected
                .map(|(row, _)| row)
                .ok_or_else(|| Error::SelectionInvariant {
                    key: key.to_string(),
                    metric: metric.to_string(),
                    count: 0,
                })
        })
        .collect()
}
