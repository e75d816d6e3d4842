//! The persisted per-session result bundle.
//!
//! ```text
//! {
//!   "SoftmaxPolicy": { metric: { held-constant subset: [best rows] } },
//!   "RandomPolicy":  [rows],
//!   "Group":         { metric: { held-constant subset: [best rows] } },
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    Result,
    config::CostFunctionSpec,
    identifiers::ParticipantId,
    inference::OptimizationRow,
    priors::PriorCatalog,
    selection::{ModelLattice, ScoredRow},
    types::{ParamValue, ParameterSubset, Parameters},
};

/// Metric -> held-constant subset -> best row per agent.
pub type MetricTable = BTreeMap<String, BTreeMap<ParameterSubset, Vec<ScoredRow>>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultBundle {
    #[serde(rename = "SoftmaxPolicy", default)]
    pub softmax: MetricTable,
    #[serde(rename = "RandomPolicy", default)]
    pub random: Vec<OptimizationRow>,
    #[serde(rename = "Group", default)]
    pub group: MetricTable,
}

/// Select best rows for every nested model of `cost_spec` and package them
/// with the random-policy baseline.
///
/// Random rows are kept whole, with every prior parameter set to null since
/// the random policy ignores them. The `Group` section repeats the softmax
/// selection on per-grid-point sums over all traces that share their `sim_*`
/// fields.
pub fn extract_mles_and_maps(
    softmax: &[OptimizationRow],
    random: &[OptimizationRow],
    cost_spec: &CostFunctionSpec,
    priors: &PriorCatalog,
    free_policy_parameters: usize,
) -> Result<ResultBundle> {
    let prior_parameters: Vec<&String> = priors
        .values()
        .flat_map(|set| set.parameters())
        .collect();
    let random = random
        .iter()
        .cloned()
        .map(|mut row| {
            for parameter in &prior_parameters {
                row.params.insert((*parameter).clone(), ParamValue::Null);
            }
            row
        })
        .collect();

    let constants = cost_spec.constant_values();
    let softmax_table = select_nested(&ModelLattice::new(
        constants,
        free_policy_parameters,
        softmax,
        priors,
    ))?;

    let pooled = group_rows(softmax);
    let group_table = select_nested(&ModelLattice::new(
        constants,
        free_policy_parameters,
        &pooled,
        priors,
    ))?;

    info!(
        cost_function = %cost_spec.name(),
        softmax_rows = softmax.len(),
        group_rows = pooled.len(),
        metrics = softmax_table.len(),
        "extracted MLE and MAP estimates"
    );

    Ok(ResultBundle {
        softmax: softmax_table,
        random,
        group: group_table,
    })
}

fn select_nested(lattice: &ModelLattice<'_>) -> Result<MetricTable> {
    let mut table = MetricTable::new();
    for node in lattice.nodes() {
        for (metric, rows) in lattice.best_by_metric(node)? {
            table
                .entry(metric.clone())
                .or_default()
                .insert(node.subset().clone(), rows.clone());
        }
    }
    Ok(table)
}

/// Sum rows over traces sharing grid point and `sim_*` fields.
///
/// Output rows carry the [`ParticipantId::group`] pid and keep the order in
/// which each (sim, grid point) combination first appears. The log-prior of a
/// grid point is the same for every trace and is counted once.
pub fn group_rows(rows: &[OptimizationRow]) -> Vec<OptimizationRow> {
    let mut order: Vec<(BTreeMap<String, ParamValue>, Parameters)> = Vec::new();
    let mut sums: BTreeMap<(BTreeMap<String, ParamValue>, Parameters), OptimizationRow> =
        BTreeMap::new();

    for row in rows {
        let key = (row.sim.clone(), row.params.clone());
        match sums.get_mut(&key) {
            Some(total) => {
                total.mle += row.mle;
                total.map_val += row.mle;
                for (block, mle) in &row.block_mles {
                    *total.block_mles.entry(block.clone()).or_insert(0.0) += mle;
                }
            }
            None => {
                let mut total = row.clone();
                total.trace_pid = ParticipantId::group();
                order.push(key.clone());
                sums.insert(key, total);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| sums.remove(&key))
        .collect()
}
