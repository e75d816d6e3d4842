//! The lattice of nested models.
//!
//! A cost function whose parameters `P` each have a constant ("null") value
//! defines `2^|P|` nested models: one per subset of parameters held at that
//! constant. The empty subset is the full model, the whole of `P` the most
//! restricted one. An edge links each model to every model that holds one
//! more parameter constant.
//!
//! Every node scores the rows compatible with it and selects per-agent best
//! rows at most once; later requests are served from the node.

use std::{collections::BTreeMap, sync::OnceLock};

use tracing::debug;

use crate::{
    Result,
    inference::OptimizationRow,
    priors::PriorCatalog,
    selection::best::{MLE_SUFFIX, Objective, ScoredRow, best_rows},
    types::{ParamValue, ParameterSubset},
};

/// Name of the MAP metric for one prior, e.g. `map_uniform`.
pub fn map_metric(prior: &str) -> String {
    format!("map_{prior}")
}

/// One nested model and its cached computations.
#[derive(Debug)]
pub struct LatticeNode {
    subset: ParameterSubset,
    num_parameters: usize,
    scored: OnceLock<Vec<ScoredRow>>,
    best: OnceLock<BTreeMap<String, Vec<ScoredRow>>>,
}

impl LatticeNode {
    /// Parameters held at their constant value.
    pub fn subset(&self) -> &ParameterSubset {
        &self.subset
    }

    /// Free parameters of this model, for BIC.
    pub fn num_parameters(&self) -> usize {
        self.num_parameters
    }
}

/// Nested models of one cost function over one set of optimization rows.
pub struct ModelLattice<'a> {
    constant_values: &'a BTreeMap<String, ParamValue>,
    rows: &'a [OptimizationRow],
    priors: &'a PriorCatalog,
    nodes: Vec<LatticeNode>,
}

impl<'a> ModelLattice<'a> {
    /// Enumerate every subset of the constant parameters: by size, then in
    /// parameter-name order.
    ///
    /// A node holding `s` parameters constant has
    /// `|constant_values| + free_policy_parameters - s` parameters.
    pub fn new(
        constant_values: &'a BTreeMap<String, ParamValue>,
        free_policy_parameters: usize,
        rows: &'a [OptimizationRow],
        priors: &'a PriorCatalog,
    ) -> Self {
        let names: Vec<&String> = constant_values.keys().collect();
        let mut subsets: Vec<ParameterSubset> = (0..1usize << names.len())
            .map(|mask| {
                names
                    .iter()
                    .enumerate()
                    .filter(|&(bit, _)| mask & (1 << bit) != 0)
                    .map(|(_, name)| name.as_str())
                    .collect()
            })
            .collect();
        subsets.sort_by_key(|subset| (subset.len(), position_key(&names, subset)));

        let nodes = subsets
            .into_iter()
            .map(|subset| LatticeNode {
                num_parameters: constant_values.len() + free_policy_parameters - subset.len(),
                subset,
                scored: OnceLock::new(),
                best: OnceLock::new(),
            })
            .collect();

        Self {
            constant_values,
            rows,
            priors,
            nodes,
        }
    }

    pub fn nodes(&self) -> &[LatticeNode] {
        &self.nodes
    }

    pub fn node(&self, subset: &ParameterSubset) -> Option<&LatticeNode> {
        self.nodes.iter().find(|node| &node.subset == subset)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `(from, to)` for every pair where `to` holds exactly one more
    /// parameter constant than `from`.
    pub fn edges(&self) -> Vec<(&ParameterSubset, &ParameterSubset)> {
        self.nodes
            .iter()
            .flat_map(|from| {
                self.nodes
                    .iter()
                    .filter(move |to| {
                        to.subset.len() == from.subset.len() + 1
                            && from.subset.is_subset(&to.subset)
                    })
                    .map(move |to| (&from.subset, &to.subset))
            })
            .collect()
    }

    fn admits(&self, subset: &ParameterSubset, row: &OptimizationRow) -> bool {
        subset.iter().all(|name| {
            row.params
                .get(name)
                .is_some_and(|value| Some(value) == self.constant_values.get(name))
        })
    }

    /// Rows compatible with `node`, with its MLE and MAP metrics.
    ///
    /// Metrics: `mle`, `{block}_mle`, and for every prior `p` in the catalog
    /// `map_{p}` and `{block}_map_{p}`, adding the log-prior of the
    /// parameters `node` does not hold constant.
    pub fn scored_rows<'n>(&self, node: &'n LatticeNode) -> Result<&'n [ScoredRow]> {
        if let Some(scored) = node.scored.get() {
            return Ok(scored);
        }

        let mut scored = Vec::new();
        for row in self.rows.iter().filter(|row| self.admits(&node.subset, row)) {
            let mut metrics = BTreeMap::new();
            metrics.insert("mle".to_string(), row.mle);
            for (block, mle) in &row.block_mles {
                metrics.insert(format!("{block}{MLE_SUFFIX}"), *mle);
            }
            for (prior_name, priors) in self.priors {
                let log_prior = priors.log_prior(&row.params, &node.subset)?;
                let map = map_metric(prior_name);
                metrics.insert(map.clone(), row.mle + log_prior);
                for (block, mle) in &row.block_mles {
                    metrics.insert(format!("{block}_{map}"), mle + log_prior);
                }
            }
            scored.push(ScoredRow {
                row: row.clone(),
                metrics,
            });
        }
        debug!(subset = %node.subset, rows = scored.len(), "scored nested model");

        Ok(node.scored.get_or_init(|| scored))
    }

    /// Per metric, the best row of every agent for `node`.
    pub fn best_by_metric<'n>(
        &self,
        node: &'n LatticeNode,
    ) -> Result<&'n BTreeMap<String, Vec<ScoredRow>>> {
        if let Some(best) = node.best.get() {
            return Ok(best);
        }

        let scored = self.scored_rows(node)?;
        let metrics: Vec<String> = {
            let mut names: Vec<String> = scored
                .iter()
                .flat_map(|row| row.metrics.keys().cloned())
                .collect();
            names.sort();
            names.dedup();
            names
        };

        let mut best = BTreeMap::new();
        for metric in metrics {
            // agents without a block do not compete on that block's metrics
            let candidates: Vec<&ScoredRow> = scored
                .iter()
                .filter(|row| row.metrics.contains_key(&metric))
                .collect();
            let selected = best_rows(&candidates, &metric, Objective::Maximize)?
                .into_iter()
                .map(|row| (*row).clone())
                .collect();
            best.insert(metric, selected);
        }

        Ok(node.best.get_or_init(|| best))
    }
}

fn position_key(names: &[&String], subset: &ParameterSubset) -> Vec<usize> {
    subset
        .iter()
        .filter_map(|name| names.iter().position(|candidate| *candidate == name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        policy::PolicyKind,
        priors::{DiscretePrior, PriorSet},
        types::Parameters,
    };

    fn constants() -> BTreeMap<String, ParamValue> {
        BTreeMap::from([
            ("depth_cost_weight".to_string(), ParamValue::Number(0.0)),
            ("given_cost".to_string(), ParamValue::Number(0.0)),
            ("static_cost_weight".to_string(), ParamValue::Number(0.0)),
        ])
    }

    fn row(depth: f64, given: f64, mle: f64) -> OptimizationRow {
        OptimizationRow {
            trace_pid: "1".into(),
            sim: BTreeMap::new(),
            applied_policy: PolicyKind::Softmax,
            mle,
            map_val: mle,
            block_mles: BTreeMap::new(),
            params: Parameters::new()
                .with("depth_cost_weight", depth)
                .with("given_cost", given)
                .with("static_cost_weight", 0.0)
                .with("temp", 1.0),
        }
    }

    #[test]
    fn powerset_has_every_subset_once() {
        let constants = constants();
        let catalog = PriorCatalog::new();
        let lattice = ModelLattice::new(&constants, 1, &[], &catalog);

        assert_eq!(lattice.len(), 8);
        assert!(lattice.nodes()[0].subset().is_empty());
        assert_eq!(lattice.nodes()[0].num_parameters(), 4);
        assert_eq!(lattice.nodes()[7].subset().len(), 3);
        assert_eq!(lattice.nodes()[7].num_parameters(), 1);
        assert_eq!(
            lattice.nodes()[1].subset().to_string(),
            "depth_cost_weight"
        );
        // each of the 3 * 2^2 nesting steps
        assert_eq!(lattice.edges().len(), 12);
    }

    #[test]
    fn nodes_only_see_rows_at_the_constant() {
        let constants = constants();
        let rows = vec![row(0.0, 0.0, -5.0), row(1.0, 0.0, -2.0), row(1.0, 1.0, -1.0)];
        let mut priors = PriorSet::new();
        priors.insert("temp", DiscretePrior::point(1.0.into()));
        let catalog = PriorCatalog::from([("uniform".to_string(), priors)]);
        let lattice = ModelLattice::new(&constants, 1, &rows, &catalog);

        let full = lattice.node(&ParameterSubset::empty()).unwrap();
        assert_eq!(lattice.scored_rows(full).unwrap().len(), 3);
        assert_eq!(lattice.best_by_metric(full).unwrap()["mle"][0].row.mle, -1.0);

        let no_given = lattice.node(&["given_cost"].into_iter().collect()).unwrap();
        let best = lattice.best_by_metric(no_given).unwrap();
        assert_eq!(best["map_uniform"][0].row.mle, -2.0);
        assert_eq!(best["map_uniform"][0].metrics["map_uniform"], -2.0);

        // served from the node afterwards
        let again = lattice.best_by_metric(no_given).unwrap();
        assert!(std::ptr::eq(best, again));
    }
}
