//! Long-format model comparison table.
//!
//! Every persisted [`ResultBundle`] is reshaped into one [`ComparisonRow`] per
//! (selected row, metric), annotated with the nested model it belongs to and
//! its BIC. Queries pick one prior, group flag, and set of blocks, and
//! deduplicate nested models that several cost functions share.

use std::{collections::BTreeMap, fmt, fs, path::Path};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    Error, Result,
    analysis::bic,
    config::{ALL_BLOCKS, CostFunctionSpec, NONE_LABEL, SessionDetails},
    identifiers::ParticipantId,
    policy::PolicyKind,
    selection::{MetricTable, ResultBundle, best::MLE_SUFFIX},
    types::Parameters,
    utils::approx_eq,
};

/// Model name of the random-policy baseline.
pub const NULL_MODEL: &str = "Null";

/// Relative tolerance for summed BIC of the same model under different cost
/// functions.
pub const BIC_TOLERANCE: f64 = 1e-9;

/// A metric name split into its block and prior.
///
/// | metric | block | prior |
/// | --- | --- | --- |
/// | `mle` | | |
/// | `test_mle` | `test` | |
/// | `map_uniform` | | `uniform` |
/// | `test_map_uniform` | `test` | `uniform` |
/// | `map_task_mle` | `map_task` | |
///
/// A name ending in `_mle` without a `_map_` part is always a block
/// likelihood, so prior names must not end in `_mle`.
///
/// # Examples
///
/// ```
/// use costometer::analysis::MetricName;
///
/// let metric: MetricName = "test_map_expon".parse()?;
/// assert_eq!(metric.block.as_deref(), Some("test"));
/// assert_eq!(metric.prior.as_deref(), Some("expon"));
/// assert_eq!(metric.to_string(), "test_map_expon");
/// # Ok::<(), costometer::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricName {
    pub block: Option<String>,
    pub prior: Option<String>,
}

impl MetricName {
    /// `Prior` column value: the prior name, or `None` for likelihoods.
    pub fn prior_label(&self) -> &str {
        self.prior.as_deref().unwrap_or(NONE_LABEL)
    }
}

impl std::str::FromStr for MetricName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let unknown = || Error::InvalidConfiguration {
            message: format!("'{s}' is not an MLE or MAP metric"),
        };
        let nonempty = |part: &str| (!part.is_empty()).then(|| part.to_string());

        if s == "mle" {
            return Ok(Self {
                block: None,
                prior: None,
            });
        }
        // block likelihoods first, so a block label may itself start with `map_`
        if let Some(block) = s.strip_suffix(MLE_SUFFIX).filter(|_| !s.contains("_map_")) {
            return Ok(Self {
                block: Some(nonempty(block).ok_or_else(unknown)?),
                prior: None,
            });
        }
        if let Some((block, prior)) = s.split_once("_map_") {
            return Ok(Self {
                block: Some(nonempty(block).ok_or_else(unknown)?),
                prior: Some(nonempty(prior).ok_or_else(unknown)?),
            });
        }
        if let Some(prior) = s.strip_prefix("map_") {
            return Ok(Self {
                block: None,
                prior: Some(nonempty(prior).ok_or_else(unknown)?),
            });
        }
        Err(unknown())
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(block) = &self.block {
            write!(f, "{block}_")?;
        }
        match &self.prior {
            Some(prior) => write!(f, "map_{prior}"),
            None => f.write_str("mle"),
        }
    }
}

/// One metric of one selected row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub applied_policy: PolicyKind,
    pub trace_pid: ParticipantId,
    /// `sim_*` fields in `name=value;...` form.
    #[serde(with = "encoded")]
    pub sim: Parameters,
    #[serde(with = "encoded")]
    pub parameters: Parameters,
    #[serde(rename = "Model Name")]
    pub model_name: String,
    #[serde(rename = "Number Parameters")]
    pub number_parameters: usize,
    pub metric: String,
    pub value: f64,
    #[serde(rename = "Block")]
    pub block: String,
    #[serde(rename = "Number Trials")]
    pub number_trials: usize,
    #[serde(rename = "Prior")]
    pub prior: String,
    #[serde(rename = "Group")]
    pub group: bool,
    pub session: String,
    pub cost_function: String,
    pub bic: f64,
}

pub(crate) mod encoded {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    use crate::types::Parameters;

    pub fn serialize<S: Serializer>(params: &Parameters, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&params.encode())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Parameters, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(D::Error::custom)
    }
}

/// What a bundle needs to be placed in the comparison table.
#[derive(Debug, Clone, Copy)]
pub struct MeltContext<'a> {
    /// `session` column: the session-name suffix the bundle was found under.
    pub session_param: &'a str,
    pub session: &'a SessionDetails,
    pub cost_spec: &'a CostFunctionSpec,
    /// Trial count of simulated sessions; `None` for participant data.
    pub simulated_trials: Option<usize>,
    pub free_policy_parameters: usize,
}

impl MeltContext<'_> {
    fn block_and_trials(&self, metric: &MetricName) -> (String, usize) {
        if let Some(trials) = self.simulated_trials {
            return (ALL_BLOCKS.to_string(), trials);
        }
        let block = metric
            .block
            .as_deref()
            .filter(|block| self.session.is_block(block))
            .unwrap_or(NONE_LABEL);
        (block.to_string(), self.session.num_trials(block))
    }

    #[allow(clippy::too_many_arguments)]
    fn row(
        &self,
        applied_policy: PolicyKind,
        trace_pid: &ParticipantId,
        sim: Parameters,
        parameters: Parameters,
        model_name: &str,
        number_parameters: usize,
        metric: &str,
        value: f64,
        group: bool,
    ) -> Result<ComparisonRow> {
        let parsed: MetricName = metric.parse()?;
        let (block, number_trials) = self.block_and_trials(&parsed);
        Ok(ComparisonRow {
            applied_policy,
            trace_pid: trace_pid.clone(),
            sim,
            parameters,
            model_name: model_name.to_string(),
            number_parameters,
            metric: metric.to_string(),
            value,
            block,
            number_trials,
            prior: parsed.prior_label().to_string(),
            group,
            session: self.session_param.to_string(),
            cost_function: self.cost_spec.name().to_string(),
            bic: bic(value, number_trials, number_parameters),
        })
    }
}

/// Reshape a result bundle into comparison rows.
///
/// Random-policy rows become the `Null` model with no parameters, one row
/// per likelihood metric. Softmax and group rows are kept only for nested
/// models the cost function names.
pub fn melt_bundle(bundle: &ResultBundle, context: &MeltContext<'_>) -> Result<Vec<ComparisonRow>> {
    let mut rows = Vec::new();

    for row in &bundle.random {
        let sim: Parameters = row.sim.clone().into_iter().collect();
        let metrics = std::iter::once(("mle".to_string(), row.mle)).chain(
            row.block_mles
                .iter()
                .map(|(block, mle)| (format!("{block}{MLE_SUFFIX}"), *mle)),
        );
        for (metric, value) in metrics {
            rows.push(context.row(
                PolicyKind::Random,
                &row.trace_pid,
                sim.clone(),
                row.params.clone(),
                NULL_MODEL,
                0,
                &metric,
                value,
                false,
            )?);
        }
    }

    for (table, group) in [(&bundle.group, true), (&bundle.softmax, false)] {
        melt_table(table, group, context, &mut rows)?;
    }

    debug!(
        cost_function = %context.cost_spec.name(),
        session = %context.session_param,
        rows = rows.len(),
        "melted result bundle"
    );
    Ok(rows)
}

fn melt_table(
    table: &MetricTable,
    group: bool,
    context: &MeltContext<'_>,
    rows: &mut Vec<ComparisonRow>,
) -> Result<()> {
    let constants = context.cost_spec.constant_values().len();
    for (metric, subsets) in table {
        for (subset, selected) in subsets {
            let Some(model_name) = context.cost_spec.model_name(subset) else {
                continue;
            };
            let number_parameters = constants + context.free_policy_parameters - subset.len();
            for scored in selected {
                let Some(value) = scored.metrics.get(metric).copied() else {
                    continue;
                };
                rows.push(context.row(
                    scored.row.applied_policy,
                    &scored.row.trace_pid,
                    scored.row.sim.clone().into_iter().collect(),
                    scored.row.params.clone(),
                    model_name,
                    number_parameters,
                    metric,
                    value,
                    group,
                )?);
            }
        }
    }
    Ok(())
}

/// Which rows of a [`ComparisonTable`] to compare.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonQuery {
    pub group: bool,
    pub prior: String,
    pub blocks: Vec<String>,
    pub include_null: bool,
}

/// The long-format comparison table of one experiment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComparisonTable {
    rows: Vec<ComparisonRow>,
}

impl ComparisonTable {
    pub fn new(rows: Vec<ComparisonRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[ComparisonRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct model names.
    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rows.iter().map(|row| row.model_name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Rows matching `query`, one cost function per model name.
    ///
    /// Softmax rows must match the prior, group flag, and blocks; with
    /// `include_null`, random rows matching the group flag and blocks are
    /// added regardless of prior. A nested model shared by several cost
    /// functions is kept only under the lexicographically first of them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateModelFit`] when one model name has
    /// different summed BIC under different cost functions.
    pub fn query(&self, query: &ComparisonQuery) -> Result<ComparisonTable> {
        let in_blocks = |row: &ComparisonRow| query.blocks.iter().any(|block| *block == row.block);
        let subset: Vec<&ComparisonRow> = self
            .rows
            .iter()
            .filter(|row| match row.applied_policy {
                PolicyKind::Softmax => {
                    in_blocks(row) && row.prior == query.prior && row.group == query.group
                }
                PolicyKind::Random => query.include_null && in_blocks(row) && row.group == query.group,
            })
            .collect();

        let mut sums: BTreeMap<&str, BTreeMap<&str, f64>> = BTreeMap::new();
        for row in &subset {
            *sums
                .entry(row.model_name.as_str())
                .or_default()
                .entry(row.cost_function.as_str())
                .or_insert(0.0) += row.bic;
        }

        let mut representatives: BTreeMap<&str, &str> = BTreeMap::new();
        for (model_name, by_cost) in &sums {
            let mut fits = by_cost.iter();
            let Some((&cost_function, &reference)) = fits.next() else {
                continue;
            };
            if fits.any(|(_, &sum)| !approx_eq(sum, reference, BIC_TOLERANCE)) {
                return Err(Error::DuplicateModelFit {
                    model_name: model_name.to_string(),
                    fits: by_cost
                        .iter()
                        .map(|(cost_function, sum)| format!("{cost_function}={sum}"))
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
            representatives.insert(model_name, cost_function);
        }

        let rows: Vec<ComparisonRow> = subset
            .into_iter()
            .filter(|row| {
                representatives.get(row.model_name.as_str()) == Some(&row.cost_function.as_str())
            })
            .cloned()
            .collect();
        info!(
            prior = %query.prior,
            group = query.group,
            models = representatives.len(),
            rows = rows.len(),
            "queried comparison table"
        );
        Ok(ComparisonTable::new(rows))
    }

    /// Summed BIC per model name.
    pub fn summed_bic(&self) -> BTreeMap<&str, f64> {
        let mut sums = BTreeMap::new();
        for row in &self.rows {
            *sums.entry(row.model_name.as_str()).or_insert(0.0) += row.bic;
        }
        sums
    }

    pub fn save_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::Io {
                operation: format!("create {}", parent.display()),
                source,
            })?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush().map_err(|source| Error::Io {
            operation: format!("write {}", path.display()),
            source,
        })?;
        Ok(())
    }

    pub fn load_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let rows = reader
            .deserialize()
            .collect::<std::result::Result<Vec<ComparisonRow>, _>>()?;
        Ok(Self::new(rows))
    }
}

impl FromIterator<ComparisonRow> for ComparisonTable {
    fn from_iter<T: IntoIterator<Item = ComparisonRow>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CostDetails;

    #[test]
    fn metric_names_round_trip() {
        for metric in ["mle", "test_mle", "map_uniform", "test_map_expon", "block_1_map_uniform"] {
            let parsed: MetricName = metric.parse().unwrap();
            assert_eq!(parsed.to_string(), metric);
        }
        let parsed: MetricName = "block_1_mle".parse().unwrap();
        assert_eq!(parsed.block.as_deref(), Some("block_1"));
        assert!("map_".parse::<MetricName>().is_err());
        assert!("_mle".parse::<MetricName>().is_err());
    }

    #[test]
    fn block_labels_may_start_with_map() {
        let parsed: MetricName = "map_task_mle".parse().unwrap();
        assert_eq!(parsed.block.as_deref(), Some("map_task"));
        assert_eq!(parsed.prior, None);
        assert_eq!(parsed.to_string(), "map_task_mle");

        let parsed: MetricName = "map_task_map_expon".parse().unwrap();
        assert_eq!(parsed.block.as_deref(), Some("map_task"));
        assert_eq!(parsed.prior.as_deref(), Some("expon"));
        assert!("bic".parse::<MetricName>().is_err());
    }

    fn comparison_row(model: &str, cost_function: &str, bic: f64) -> ComparisonRow {
        ComparisonRow {
            applied_policy: PolicyKind::Softmax,
            trace_pid: "1".into(),
            sim: Parameters::new(),
            parameters: Parameters::new().with("temp", 1.0),
            model_name: model.to_string(),
            number_parameters: 1,
            metric: "test_map_uniform".to_string(),
            value: -bic / 2.0,
            block: "test".to_string(),
            number_trials: 20,
            prior: "uniform".to_string(),
            group: false,
            session: String::new(),
            cost_function: cost_function.to_string(),
            bic,
        }
    }

    fn query(include_null: bool) -> ComparisonQuery {
        ComparisonQuery {
            group: false,
            prior: "uniform".to_string(),
            blocks: vec!["test".to_string()],
            include_null,
        }
    }

    #[test]
    fn shared_models_keep_the_first_cost_function() {
        let table: ComparisonTable = [
            comparison_row("Full", "linear_depth", 10.0),
            comparison_row("Full", "back_dist", 12.0),
            comparison_row("Distance", "back_dist", 12.0),
            comparison_row("Distance", "forward_dist", 12.0),
        ]
        .into_iter()
        .collect();

        let err = table.query(&query(false)).unwrap_err();
        assert!(matches!(err, Error::DuplicateModelFit { ref model_name, .. } if model_name == "Full"));

        let table: ComparisonTable = table
            .rows()
            .iter()
            .filter(|row| !(row.model_name == "Full" && row.cost_function == "back_dist"))
            .cloned()
            .collect();
        let queried = table.query(&query(false)).unwrap();
        let kept: Vec<_> = queried
            .rows()
            .iter()
            .map(|row| (row.model_name.as_str(), row.cost_function.as_str()))
            .collect();
        assert_eq!(kept, vec![("Full", "linear_depth"), ("Distance", "back_dist")]);
    }

    #[test]
    fn null_rows_ignore_the_prior() {
        let mut null = comparison_row(NULL_MODEL, "linear_depth", 30.0);
        null.applied_policy = PolicyKind::Random;
        null.prior = NONE_LABEL.to_string();
        let table = ComparisonTable::new(vec![comparison_row("Full", "linear_depth", 10.0), null]);

        assert_eq!(table.query(&query(false)).unwrap().len(), 1);
        let with_null = table.query(&query(true)).unwrap();
        assert_eq!(with_null.model_names(), vec!["Full", NULL_MODEL]);
        assert_eq!(with_null.summed_bic()[NULL_MODEL], 30.0);
    }

    #[test]
    fn melt_assigns_blocks_and_bic() {
        use crate::{
            inference::OptimizationRow,
            selection::ScoredRow,
            types::ParameterSubset,
        };

        let details: CostDetails = serde_yaml::from_str(
            "cost_parameter_args: [depth_cost_weight]\n\
             constant_values: {depth_cost_weight: 0}\n\
             model_name: {'': Full}\n",
        )
        .unwrap();
        let spec = CostFunctionSpec::new("linear_depth", details).unwrap();
        let session = SessionDetails {
            experiment_setting: "high_increasing".to_string(),
            trials_per_block: Some(BTreeMap::from([
                ("train".to_string(), 10),
                ("test".to_string(), 20),
            ])),
        };
        let row = OptimizationRow {
            trace_pid: "7".into(),
            sim: BTreeMap::new(),
            applied_policy: PolicyKind::Softmax,
            mle: -30.0,
            map_val: -31.0,
            block_mles: BTreeMap::from([("test".to_string(), -20.0)]),
            params: Parameters::new().with("depth_cost_weight", 1.0).with("temp", 1.0),
        };
        let scored = ScoredRow {
            metrics: BTreeMap::from([
                ("mle".to_string(), -30.0),
                ("test_map_uniform".to_string(), -21.0),
            ]),
            row: row.clone(),
        };
        let mut bundle = ResultBundle::default();
        for metric in ["mle", "test_map_uniform"] {
            bundle.softmax.entry(metric.to_string()).or_default().insert(
                ParameterSubset::empty(),
                vec![scored.clone()],
            );
        }
        // not a named model
        bundle
            .softmax
            .entry("mle".to_string())
            .or_default()
            .insert(["depth_cost_weight"].into_iter().collect(), vec![scored]);
        bundle.random.push(OptimizationRow {
            applied_policy: PolicyKind::Random,
            ..row
        });

        let context = MeltContext {
            session_param: "",
            session: &session,
            cost_spec: &spec,
            simulated_trials: None,
            free_policy_parameters: 1,
        };
        let rows = melt_bundle(&bundle, &context).unwrap();
        assert_eq!(rows.len(), 4);

        let null_test = &rows[1];
        assert_eq!(null_test.model_name, NULL_MODEL);
        assert_eq!(null_test.block, "test");
        assert_eq!(null_test.number_trials, 20);

        let full_mle = rows.iter().find(|row| row.metric == "mle" && row.model_name == "Full").unwrap();
        assert_eq!(full_mle.block, NONE_LABEL);
        assert_eq!(full_mle.number_trials, 30);
        assert_eq!(full_mle.number_parameters, 2);
        assert_eq!(full_mle.prior, NONE_LABEL);
        assert!((full_mle.bic - bic(-30.0, 30, 2)).abs() < 1e-12);

        let full_map = rows.iter().find(|row| row.metric == "test_map_uniform").unwrap();
        assert_eq!(full_map.prior, "uniform");
        assert_eq!(full_map.value, -21.0);
    }

    #[test]
    fn csv_cache_round_trips_rows() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("data/exp_optimization_data.csv");
        let mut row = comparison_row("Full", "linear_depth", 10.0);
        row.sim = Parameters::new().with("sim_temp", 1.0);
        let table = ComparisonTable::new(vec![row]);

        table.save_csv(&path).unwrap();
        assert_eq!(ComparisonTable::load_csv(&path).unwrap(), table);
    }
}
