//! Per-trial likelihoods of traces under their selected models.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    Error, Result,
    action_values::ActionValueTable,
    analysis::comparison::{ComparisonTable, NULL_MODEL, encoded},
    config::CostFunctionRegistry,
    identifiers::ParticipantId,
    policy::{PolicyKind, PolicyKwargs},
    ports::{ActionValueKey, ActionValueRepository, ParticipantFactory, ParticipantSpec},
    trace::Trace,
    types::{ParamValue, Parameters},
};

/// Summed log-likelihood of one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialLikelihood {
    pub pid: ParticipantId,
    pub i_episode: usize,
    pub likelihood: f64,
    #[serde(with = "encoded")]
    pub parameters: Parameters,
    pub cost_function: String,
    pub applied_policy: PolicyKind,
    #[serde(rename = "Model Name")]
    pub model_name: String,
}

/// Inputs shared by every evaluation.
pub struct TrialByTrialInputs<'a> {
    pub traces: &'a [Trace],
    pub registry: &'a CostFunctionRegistry,
    pub experiment_setting: &'a str,
    pub factory: &'a dyn ParticipantFactory,
    pub action_values: &'a dyn ActionValueRepository,
}

/// Re-evaluate traces under the parameters selected for them.
///
/// For every cost function and model of the queried softmax rows, each
/// distinct setting of cost parameters and `temp` is evaluated on the traces
/// of the participants fitted there, without noise. If `rows` contains
/// random-policy rows, every trace is also evaluated under the random policy,
/// with the cost parameters set to null.
pub fn compute_trial_by_trial_likelihoods(
    rows: &ComparisonTable,
    inputs: &TrialByTrialInputs<'_>,
) -> Result<Vec<TrialLikelihood>> {
    let mut tables: BTreeMap<ActionValueKey, Arc<ActionValueTable>> = BTreeMap::new();
    let mut values = Vec::new();

    for spec in inputs.registry.iter() {
        let cost_rows: Vec<_> = rows
            .rows()
            .iter()
            .filter(|row| {
                row.applied_policy == PolicyKind::Softmax && row.cost_function == spec.name()
            })
            .collect();
        let mut models: Vec<&str> = Vec::new();
        for row in &cost_rows {
            if !models.contains(&row.model_name.as_str()) {
                models.push(&row.model_name);
            }
        }

        let setting_names: Vec<String> = spec
            .parameter_args()
            .iter()
            .cloned()
            .chain(std::iter::once(PolicyKwargs::TEMP.to_string()))
            .collect();

        for model in models {
            let mut settings: Vec<(Parameters, BTreeSet<ParticipantId>)> = Vec::new();
            for row in cost_rows.iter().filter(|row| row.model_name == model) {
                let setting = row.parameters.project(&setting_names)?;
                match settings.iter_mut().find(|(existing, _)| *existing == setting) {
                    Some((_, pids)) => {
                        pids.insert(row.trace_pid.clone());
                    }
                    None => settings.push((setting, BTreeSet::from([row.trace_pid.clone()]))),
                }
            }

            for (setting, pids) in settings {
                let traces: Vec<&Trace> = inputs
                    .traces
                    .iter()
                    .filter(|trace| pids.contains(&trace.pid))
                    .collect();
                if traces.is_empty() {
                    continue;
                }
                let cost_kwargs = setting.project(spec.parameter_args())?;
                let temp = setting
                    .get(PolicyKwargs::TEMP)
                    .and_then(ParamValue::as_f64)
                    .ok_or_else(|| Error::MissingParameter {
                        name: PolicyKwargs::TEMP.to_string(),
                    })?;

                let key = ActionValueKey::new(
                    inputs.experiment_setting,
                    spec.name(),
                    cost_kwargs.clone(),
                );
                let table = match tables.get(&key) {
                    Some(table) => Arc::clone(table),
                    None => {
                        let table = Arc::new(inputs.action_values.load(&key)?);
                        tables.insert(key, Arc::clone(&table));
                        table
                    }
                };

                let participant_spec = ParticipantSpec {
                    experiment_setting: inputs.experiment_setting.to_string(),
                    num_trials: max_trials(&traces),
                    cost_function: spec.name().to_string(),
                    cost_kwargs,
                    policy: PolicyKind::Softmax,
                    policy_kwargs: PolicyKwargs { temp, noise: 0.0 },
                    preference: Some(table),
                };
                debug!(
                    cost_function = %spec.name(),
                    model,
                    setting = %setting.encode(),
                    traces = traces.len(),
                    "evaluating trial-by-trial likelihoods"
                );
                evaluate(
                    inputs.factory,
                    &participant_spec,
                    &traces,
                    &setting,
                    model,
                    &mut values,
                )?;
            }
        }
    }

    let random_cost_function = rows
        .rows()
        .iter()
        .find(|row| row.applied_policy == PolicyKind::Random)
        .map(|row| row.cost_function.clone());
    if let Some(cost_function) = random_cost_function {
        let spec = inputs.registry.get(&cost_function)?;
        let parameters: Parameters = spec
            .parameter_args()
            .iter()
            .map(|arg| (arg.clone(), ParamValue::Null))
            .collect();
        let traces: Vec<&Trace> = inputs.traces.iter().collect();
        let participant_spec = ParticipantSpec {
            experiment_setting: inputs.experiment_setting.to_string(),
            num_trials: max_trials(&traces),
            cost_function,
            cost_kwargs: Parameters::new(),
            policy: PolicyKind::Random,
            policy_kwargs: PolicyKwargs::default(),
            preference: None,
        };
        evaluate(
            inputs.factory,
            &participant_spec,
            &traces,
            &parameters,
            NULL_MODEL,
            &mut values,
        )?;
    }

    info!(rows = values.len(), "computed trial-by-trial likelihoods");
    Ok(values)
}

fn max_trials(traces: &[&Trace]) -> usize {
    traces
        .iter()
        .map(|trace| trace.num_trials())
        .max()
        .unwrap_or_default()
}

fn evaluate(
    factory: &dyn ParticipantFactory,
    spec: &ParticipantSpec,
    traces: &[&Trace],
    parameters: &Parameters,
    model_name: &str,
    values: &mut Vec<TrialLikelihood>,
) -> Result<()> {
    let participant = factory.build(spec)?;
    for trace in traces {
        let likelihood = participant.compute_likelihood(trace)?;
        values.extend(
            likelihood
                .iter()
                .enumerate()
                .map(|(i_episode, trial)| TrialLikelihood {
                    pid: trace.pid.clone(),
                    i_episode,
                    likelihood: trial.iter().sum(),
                    parameters: parameters.clone(),
                    cost_function: spec.cost_function.clone(),
                    applied_policy: spec.policy,
                    model_name: model_name.to_string(),
                }),
        );
    }
    Ok(())
}

pub fn save_trial_likelihoods(values: &[TrialLikelihood], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| Error::Io {
            operation: format!("create {}", parent.display()),
            source,
        })?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for value in values {
        writer.serialize(value)?;
    }
    writer.flush().map_err(|source| Error::Io {
        operation: format!("write {}", path.display()),
        source,
    })?;
    Ok(())
}

pub fn load_trial_likelihoods(path: &Path) -> Result<Vec<TrialLikelihood>> {
    let mut reader = csv::Reader::from_path(path)?;
    Ok(reader
        .deserialize()
        .collect::<std::result::Result<Vec<TrialLikelihood>, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adapters::{InMemoryRepository, TabularParticipantFactory},
        analysis::ComparisonRow,
        config::{CostDetails, CostFunctionSpec},
    };

    fn table() -> ActionValueTable {
        let mut table = ActionValueTable::new();
        table.insert("root", 0, 0.0);
        table.insert("root", 1, 1.0);
        table
    }

    fn comparison_row(pid: &str, policy: PolicyKind, weight: ParamValue) -> ComparisonRow {
        ComparisonRow {
            applied_policy: policy,
            trace_pid: pid.into(),
            sim: Parameters::new(),
            parameters: Parameters::new()
                .with("depth_cost_weight", weight)
                .with("temp", 1.0),
            model_name: if policy == PolicyKind::Random {
                NULL_MODEL.to_string()
            } else {
                "Full".to_string()
            },
            number_parameters: 2,
            metric: "mle".to_string(),
            value: -1.0,
            block: "None".to_string(),
            number_trials: 2,
            prior: "None".to_string(),
            group: false,
            session: String::new(),
            cost_function: "linear_depth".to_string(),
            bic: 2.0,
        }
    }

    #[test]
    fn evaluates_each_fitted_setting_and_the_baseline() {
        let details: CostDetails = serde_yaml::from_str(
            "cost_parameter_args: [depth_cost_weight]\nconstant_values: {depth_cost_weight: 0}\n",
        )
        .unwrap();
        let mut registry = CostFunctionRegistry::new();
        registry.register(CostFunctionSpec::new("linear_depth", details).unwrap());

        let store = InMemoryRepository::new();
        let key = ActionValueKey::new(
            "high_increasing",
            "linear_depth",
            Parameters::new().with("depth_cost_weight", 1.0),
        );
        ActionValueRepository::save(&store, &key, &table()).unwrap();

        let traces = vec![
            Trace::new("1", vec![vec!["root".into()]; 2], vec![vec![1], vec![0]]).unwrap(),
            Trace::new("2", vec![vec!["root".into()]], vec![vec![1]]).unwrap(),
        ];
        let rows = ComparisonTable::new(vec![
            comparison_row("1", PolicyKind::Softmax, 1.0.into()),
            comparison_row("1", PolicyKind::Random, ParamValue::Null),
        ]);
        let factory = TabularParticipantFactory::from_table(&table());
        let inputs = TrialByTrialInputs {
            traces: &traces,
            registry: &registry,
            experiment_setting: "high_increasing",
            factory: &factory,
            action_values: &store,
        };

        let values = compute_trial_by_trial_likelihoods(&rows, &inputs).unwrap();
        // two softmax trials of pid 1, then three random trials over both traces
        assert_eq!(values.len(), 5);
        let lse = (1f64.exp() + 1.0).ln();
        assert!((values[0].likelihood - (1.0 - lse)).abs() < 1e-12);
        assert!((values[1].likelihood + lse).abs() < 1e-12);
        assert_eq!(values[1].i_episode, 1);
        assert!(values[2..].iter().all(|value| value.model_name == NULL_MODEL));
        assert!((values[4].likelihood + 2f64.ln()).abs() < 1e-12);
        assert_eq!(
            values[4].parameters.get("depth_cost_weight"),
            Some(&ParamValue::Null)
        );

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("trial_by_trial/exp_test_None.csv");
        save_trial_likelihoods(&values, &path).unwrap();
        assert_eq!(load_trial_likelihoods(&path).unwrap(), values);
    }
}
