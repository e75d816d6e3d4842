//! Exhaustive grid-search inference.
//!
//! [`GridInference`] evaluates every trace at every point of the Cartesian
//! product of the parameter priors. Each (grid point, trace) pair is an
//! independent task on a [`TaskFarm`]; the only state shared between tasks is
//! the read-only [`GridContext`], including the action-value tables resolved
//! once per cost combination while building.

use std::{collections::BTreeMap, sync::Arc};

use tracing::{debug, info};

use crate::{
    Error, Result,
    action_values::ActionValueTable,
    adapters::RayonFarm,
    inference::{LikelihoodSummary, OptimizationResults, OptimizationRow, OptimizationSpace},
    policy::{PolicyKind, PolicyKwargs},
    ports::{
        ActionValueKey, ActionValueRepository, ParticipantFactory, ParticipantSpec, TaskFarm,
    },
    priors::PriorSet,
    selection::{Objective, best_rows},
    trace::Trace,
    types::{ParameterSubset, Parameters},
};

/// Builder for [`GridInference`].
pub struct GridInferenceBuilder {
    traces: Vec<Trace>,
    factory: Option<Arc<dyn ParticipantFactory>>,
    experiment_setting: String,
    cost_function: String,
    cost_parameters: PriorSet,
    policy_parameters: PriorSet,
    policy_kind: PolicyKind,
    held_constant: PolicyKwargs,
    action_values: Option<Arc<dyn ActionValueRepository>>,
}

impl GridInferenceBuilder {
    fn new() -> Self {
        Self {
            traces: Vec::new(),
            factory: None,
            experiment_setting: String::new(),
            cost_function: String::new(),
            cost_parameters: PriorSet::new(),
            policy_parameters: PriorSet::new(),
            policy_kind: PolicyKind::Softmax,
            held_constant: PolicyKwargs::default(),
            action_values: None,
        }
    }

    pub fn traces(mut self, traces: Vec<Trace>) -> Self {
        self.traces = traces;
        self
    }

    pub fn factory(mut self, factory: Arc<dyn ParticipantFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn experiment_setting(mut self, setting: impl Into<String>) -> Self {
        self.experiment_setting = setting.into();
        self
    }

    pub fn cost_function(mut self, name: impl Into<String>) -> Self {
        self.cost_function = name.into();
        self
    }

    /// Priors over the cost parameters; their supports are searched.
    pub fn cost_parameters(mut self, priors: PriorSet) -> Self {
        self.cost_parameters = priors;
        self
    }

    /// Priors over searched policy parameters (usually `temp`).
    pub fn policy_parameters(mut self, priors: PriorSet) -> Self {
        self.policy_parameters = priors;
        self
    }

    pub fn policy_kind(mut self, kind: PolicyKind) -> Self {
        self.policy_kind = kind;
        self
    }

    /// Policy parameters not searched over. Searched values override these.
    pub fn held_constant(mut self, kwargs: PolicyKwargs) -> Self {
        self.held_constant = kwargs;
        self
    }

    /// Where precomputed action values are read from. Without a source the
    /// factory receives no tables.
    pub fn action_values(mut self, source: Arc<dyn ActionValueRepository>) -> Self {
        self.action_values = Some(source);
        self
    }

    /// Validate the inputs and resolve every action-value table the grid
    /// will need.
    ///
    /// # Errors
    ///
    /// Fails on missing factory or traces, malformed traces, priors that do
    /// not sum to one, a parameter declared both as cost and policy
    /// parameter, empty dimensions, searched `temp` / `noise` values outside
    /// their range, and missing action-value tables.
    pub fn build(self) -> Result<GridInference> {
        let factory = self.factory.ok_or_else(|| Error::InvalidConfiguration {
            message: "grid inference needs a participant factory".to_string(),
        })?;
        if self.traces.is_empty() {
            return Err(Error::InvalidConfiguration {
                message: "grid inference needs at least one trace".to_string(),
            });
        }
        self.traces.iter().try_for_each(Trace::validate)?;
        self.cost_parameters.validate()?;
        self.policy_parameters.validate()?;
        if let Some(shared) = self
            .cost_parameters
            .parameters()
            .find(|name| self.policy_parameters.get(name).is_some())
        {
            return Err(Error::InvalidConfiguration {
                message: format!("'{shared}' is declared as both a cost and a policy parameter"),
            });
        }
        self.held_constant.validate()?;

        let space = OptimizationSpace::from_priors(&self.cost_parameters, &self.policy_parameters)?;
        for policy_point in space
            .restricted_to(self.policy_parameters.parameters())
            .points()
        {
            self.held_constant.overlaid(&policy_point).validate()?;
        }

        let action_values = match (&self.action_values, self.policy_kind.uses_action_values()) {
            (Some(source), true) => {
                let cost_space = space.restricted_to(self.cost_parameters.parameters());
                let mut cache = BTreeMap::new();
                for cost_kwargs in cost_space.points() {
                    let key = ActionValueKey::new(
                        self.experiment_setting.clone(),
                        self.cost_function.clone(),
                        cost_kwargs,
                    );
                    debug!(%key, "loading action values");
                    let table = source.load(&key)?;
                    cache.insert(key.cost_parameters.param_string(), Arc::new(table));
                }
                info!(
                    tables = cache.len(),
                    cost_function = %self.cost_function,
                    "resolved action-value tables"
                );
                Some(cache)
            }
            _ => None,
        };

        let num_trials = self
            .traces
            .iter()
            .map(Trace::num_trials)
            .max()
            .unwrap_or_default();

        let mut priors = self.cost_parameters.clone();
        for (name, prior) in self.policy_parameters.iter() {
            priors.insert(name.clone(), prior.clone());
        }

        Ok(GridInference {
            context: Arc::new(GridContext {
                traces: self.traces,
                factory,
                experiment_setting: self.experiment_setting,
                cost_function: self.cost_function,
                cost_parameters: self.cost_parameters,
                policy_parameters: self.policy_parameters,
                priors,
                policy_kind: self.policy_kind,
                held_constant: self.held_constant,
                action_values,
                num_trials,
            }),
            space,
            results: None,
        })
    }
}

/// Read-only state shared by every task of a run.
pub struct GridContext {
    traces: Vec<Trace>,
    factory: Arc<dyn ParticipantFactory>,
    experiment_setting: String,
    cost_function: String,
    cost_parameters: PriorSet,
    policy_parameters: PriorSet,
    /// Cost and policy priors together.
    priors: PriorSet,
    policy_kind: PolicyKind,
    held_constant: PolicyKwargs,
    /// Canonical cost-parameter string -> table.
    action_values: Option<BTreeMap<String, Arc<ActionValueTable>>>,
    num_trials: usize,
}

impl GridContext {
    fn participant_spec(&self, params: &Parameters) -> Result<ParticipantSpec> {
        let cost_kwargs = params.project(self.cost_parameters.parameters())?;
        let policy_kwargs = self
            .held_constant
            .overlaid(&params.project(self.policy_parameters.parameters())?);

        let preference = match (&self.action_values, self.policy_kind.uses_action_values()) {
            (Some(cache), true) => Some(
                cache
                    .get(&cost_kwargs.param_string())
                    .cloned()
                    .ok_or_else(|| Error::MissingActionValues {
                        parameters: cost_kwargs.encode(),
                    })?,
            ),
            _ => None,
        };

        Ok(ParticipantSpec {
            experiment_setting: self.experiment_setting.clone(),
            num_trials: self.num_trials,
            cost_function: self.cost_function.clone(),
            cost_kwargs,
            policy: self.policy_kind,
            policy_kwargs,
            preference,
        })
    }

    fn likelihood(&self, params: &Parameters, trace: &Trace) -> Result<Vec<Vec<f64>>> {
        let participant = self.factory.build(&self.participant_spec(params)?)?;
        participant.compute_likelihood(trace)
    }

    fn evaluate(&self, params: &Parameters, trace_index: usize) -> Result<OptimizationRow> {
        let trace = &self.traces[trace_index];
        let likelihood = self.likelihood(params, trace)?;
        let summary = LikelihoodSummary::from_trace(trace, &likelihood)?;
        let log_prior = self.priors.log_prior(params, &ParameterSubset::empty())?;

        Ok(OptimizationRow {
            trace_pid: trace.pid.clone(),
            sim: trace.sim.clone(),
            applied_policy: self.policy_kind,
            mle: summary.mle,
            map_val: summary.mle + log_prior,
            block_mles: summary.block_mles,
            params: params.clone(),
        })
    }
}

/// Grid-search optimizer over cost and policy parameters.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use costometer::adapters::{MsgPackActionValueStore, TabularParticipantFactory};
/// use costometer::inference::GridInference;
/// use costometer::priors::{DiscretePrior, PriorSet};
/// use costometer::action_values::ActionSpace;
///
/// # fn traces() -> Vec<costometer::trace::Trace> { unimplemented!() }
/// let mut cost = PriorSet::new();
/// cost.insert("depth_cost_weight", DiscretePrior::uniform(vec![0.0.into(), 1.0.into(), 10.0.into()]));
///
/// let mut inference = GridInference::builder()
///     .traces(traces())
///     .factory(Arc::new(TabularParticipantFactory::new(ActionSpace::new())))
///     .experiment_setting("high_increasing")
///     .cost_function("linear_depth")
///     .cost_parameters(cost)
///     .action_values(Arc::new(MsgPackActionValueStore::new("data/q_files")))
///     .build()?;
/// inference.run()?;
/// let best = inference.get_best_parameters()?;
/// # Ok::<(), costometer::Error>(())
/// ```
pub struct GridInference {
    context: Arc<GridContext>,
    space: OptimizationSpace,
    results: Option<OptimizationResults>,
}

impl GridInference {
    pub fn builder() -> GridInferenceBuilder {
        GridInferenceBuilder::new()
    }

    pub fn get_optimization_space(&self) -> &OptimizationSpace {
        &self.space
    }

    pub fn traces(&self) -> &[Trace] {
        &self.context.traces
    }

    pub fn policy_kind(&self) -> PolicyKind {
        self.context.policy_kind
    }

    /// Every configured prior, cost and policy.
    pub fn priors(&self) -> &PriorSet {
        &self.context.priors
    }

    /// Number of cached action-value tables.
    pub fn cached_tables(&self) -> usize {
        self.context
            .action_values
            .as_ref()
            .map_or(0, BTreeMap::len)
    }

    pub fn is_run(&self) -> bool {
        self.results.is_some()
    }

    /// Run on the global rayon pool.
    pub fn run(&mut self) -> Result<()> {
        self.run_with(&mut RayonFarm::new())
    }

    /// Run every (grid point, trace) task on `farm` and keep the rows.
    ///
    /// # Errors
    ///
    /// Any failing task fails the run; previous results are discarded and
    /// the optimizer is left un-run.
    pub fn run_with<F: TaskFarm<OptimizationRow>>(&mut self, farm: &mut F) -> Result<()> {
        self.results = None;
        let traces = self.context.traces.len();
        info!(
            grid_points = self.space.len(),
            traces,
            policy = %self.context.policy_kind,
            "starting grid search"
        );

        for point in self.space.points() {
            for trace_index in 0..traces {
                let context = Arc::clone(&self.context);
                let params = point.clone();
                farm.submit(Box::new(move || context.evaluate(&params, trace_index)));
            }
        }

        let rows = match farm.await_all() {
            Ok(rows) => rows,
            Err(err) => {
                farm.abort();
                return Err(err);
            }
        };
        info!(rows = rows.len(), "grid search finished");
        self.results = Some(OptimizationResults::new(rows));
        Ok(())
    }

    pub fn get_optimization_results(&self) -> Result<&OptimizationResults> {
        self.results.as_ref().ok_or(Error::NotRun)
    }

    /// Parameters maximizing `mle` for each input trace, in trace order.
    ///
    /// Traces sharing a [`crate::trace::TraceKey`] get the same parameters.
    pub fn get_best_parameters(&self) -> Result<Vec<Parameters>> {
        let results = self.get_optimization_results()?;
        let best = best_rows(results.rows(), "mle", Objective::Maximize)?;
        let by_key: BTreeMap<_, _> = best.into_iter().map(|row| (row.key(), row)).collect();

        self.context
            .traces
            .iter()
            .map(|trace| {
                let key = trace.key();
                by_key
                    .get(&key)
                    .map(|row| row.params.clone())
                    .ok_or_else(|| Error::SelectionInvariant {
                        key: key.to_string(),
                        metric: "mle".to_string(),
                        count: 0,
                    })
            })
            .collect()
    }

    /// Per-step log-likelihoods of each trace under its best parameters.
    pub fn likelihoods_at_best(&self) -> Result<Vec<Vec<Vec<f64>>>> {
        let best = self.get_best_parameters()?;
        self.context
            .traces
            .iter()
            .zip(&best)
            .map(|(trace, params)| self.context.likelihood(params, trace))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        action_values::ActionValueTable,
        adapters::{InMemoryRepository, SequentialFarm, TabularParticipantFactory},
        identifiers::StateId,
        priors::DiscretePrior,
    };

    fn table(weight: f64) -> ActionValueTable {
        let mut table = ActionValueTable::new();
        table.insert("root", 0, 0.0);
        table.insert("root", 1, 1.0 - weight);
        table
    }

    fn repository() -> Arc<InMemoryRepository> {
        let repo = InMemoryRepository::new();
        for weight in [0.0, 5.0] {
            let key = ActionValueKey::new(
                "toy",
                "linear_depth",
                Parameters::new().with("w", weight),
            );
            ActionValueRepository::save(&repo, &key, &table(weight)).unwrap();
        }
        Arc::new(repo)
    }

    fn builder() -> GridInferenceBuilder {
        let mut cost = PriorSet::new();
        cost.insert("w", DiscretePrior::uniform(vec![0.0.into(), 5.0.into()]));
        let trace = Trace::new("1", vec![vec![StateId::new("root")]], vec![vec![1]]).unwrap();

        GridInference::builder()
            .traces(vec![trace])
            .factory(Arc::new(TabularParticipantFactory::from_table(&table(0.0))))
            .experiment_setting("toy")
            .cost_function("linear_depth")
            .cost_parameters(cost)
    }

    #[test]
    fn queries_before_run_fail() {
        let inference = builder().action_values(repository()).build().unwrap();
        assert!(matches!(inference.get_best_parameters(), Err(Error::NotRun)));
        assert!(matches!(inference.get_optimization_results(), Err(Error::NotRun)));
    }

    #[test]
    fn tables_are_resolved_once_per_cost_combination() {
        let mut temps = PriorSet::new();
        temps.insert("temp", DiscretePrior::uniform(vec![0.5.into(), 1.0.into(), 2.0.into()]));
        let inference = builder()
            .policy_parameters(temps)
            .action_values(repository())
            .build()
            .unwrap();
        assert_eq!(inference.get_optimization_space().len(), 6);
        assert_eq!(inference.cached_tables(), 2);
    }

    #[test]
    fn missing_table_fails_the_build() {
        let mut cost = PriorSet::new();
        cost.insert("w", DiscretePrior::uniform(vec![0.0.into(), 7.0.into()]));
        let result = builder()
            .cost_parameters(cost)
            .action_values(repository())
            .build();
        assert!(matches!(result, Err(Error::ActionValuesNotFound { .. })));
    }

    #[test]
    fn searched_temperatures_must_be_positive() {
        let mut temps = PriorSet::new();
        temps.insert("temp", DiscretePrior::uniform(vec![0.0.into(), 1.0.into()]));
        let result = builder()
            .policy_parameters(temps)
            .action_values(repository())
            .build();
        assert!(matches!(result, Err(Error::InvalidConfiguration { .. })));

        let mut noise = PriorSet::new();
        noise.insert("noise", DiscretePrior::uniform(vec![0.5.into(), 1.5.into()]));
        let result = builder()
            .policy_parameters(noise)
            .action_values(repository())
            .build();
        assert!(matches!(result, Err(Error::InvalidConfiguration { .. })));
    }

    #[test]
    fn softmax_without_tables_fails_the_run() {
        let mut inference = builder().build().unwrap();
        let result = inference.run_with(&mut SequentialFarm::new());
        assert!(matches!(result, Err(Error::MissingActionValues { .. })));
        assert!(!inference.is_run());
    }

    #[test]
    fn best_parameters_follow_the_likelihood() {
        let mut inference = builder().action_values(repository()).build().unwrap();
        inference.run_with(&mut SequentialFarm::new()).unwrap();
        // action 1 has value 1 at w=0 and -4 at w=5
        let best = inference.get_best_parameters().unwrap();
        assert_eq!(best, vec![Parameters::new().with("w", 0.0)]);

        let rows = inference.get_optimization_results().unwrap();
        assert_eq!(rows.len(), 2);
        for row in rows {
            assert!((row.map_val - (row.mle + 0.5f64.ln())).abs() < 1e-12);
        }
    }
}
