//! Selection of nested models and persistence of result bundles.

mod common;

use std::collections::BTreeMap;

use common::{
    COST_FUNCTION, SETTING, WEIGHT, cost_priors, eager_trace, factory, lazy_trace, repository,
    temp_priors,
};
use costometer::{
    Error,
    adapters::{MsgPackRepository, SequentialFarm},
    config::{CostDetails, CostFunctionSpec},
    identifiers::ParticipantId,
    inference::{GridInference, OptimizationRow},
    policy::PolicyKind,
    ports::ResultRepository,
    priors::{DiscretePrior, PriorCatalog, PriorSet},
    selection::{ResultBundle, extract_mles_and_maps, group_rows},
    types::{ParamValue, ParameterSubset},
};
use tempfile::TempDir;

fn cost_spec() -> CostFunctionSpec {
    CostFunctionSpec::new(
        COST_FUNCTION,
        CostDetails {
            cost_function_name: None,
            cost_parameter_args: vec![WEIGHT.to_string()],
            cost_parameter_names: Vec::new(),
            latex_mapping: BTreeMap::new(),
            constant_values: BTreeMap::from([(WEIGHT.to_string(), ParamValue::Number(0.0))]),
            model_name: BTreeMap::new(),
            env_params: BTreeMap::new(),
        },
    )
    .unwrap()
}

fn run(kind: PolicyKind) -> Vec<OptimizationRow> {
    let traces = vec![
        eager_trace("1", 2),
        lazy_trace("2", 2),
        eager_trace("1", 2).with_sim("temp", 1.0),
    ];
    let builder = GridInference::builder()
        .traces(traces)
        .factory(factory())
        .experiment_setting(SETTING)
        .cost_function(COST_FUNCTION)
        .policy_kind(kind);
    let builder = match kind {
        PolicyKind::Softmax => builder
            .cost_parameters(cost_priors())
            .policy_parameters(temp_priors())
            .action_values(repository()),
        PolicyKind::Random => builder,
    };
    let mut inference = builder.build().unwrap();
    inference.run_with(&mut SequentialFarm::new()).unwrap();
    inference.get_optimization_results().unwrap().rows().to_vec()
}

fn catalog() -> PriorCatalog {
    let mut priors = temp_priors();
    for (name, prior) in cost_priors().iter() {
        priors.insert(name.clone(), prior.clone());
    }
    PriorCatalog::from([("uniform".to_string(), priors)])
}

fn bundle() -> ResultBundle {
    extract_mles_and_maps(
        &run(PolicyKind::Softmax),
        &run(PolicyKind::Random),
        &cost_spec(),
        &catalog(),
        1,
    )
    .unwrap()
}

#[test]
fn every_nested_model_gets_one_row_per_agent() {
    let bundle = bundle();
    let empty = ParameterSubset::empty();
    let zero_weight: ParameterSubset = [WEIGHT].into_iter().collect();

    for metric in ["mle", "map_uniform"] {
        let subsets = &bundle.softmax[metric];
        assert_eq!(subsets.len(), 2);
        // the simulated trace is a distinct agent despite sharing pid 1
        assert_eq!(subsets[&empty].len(), 3);
        assert_eq!(subsets[&zero_weight].len(), 3);
        for scored in &subsets[&zero_weight] {
            assert_eq!(scored.row.params.get(WEIGHT), Some(&ParamValue::Number(0.0)));
        }
    }
}

#[test]
fn random_rows_carry_null_prior_parameters() {
    let bundle = bundle();
    assert_eq!(bundle.random.len(), 3);
    for row in &bundle.random {
        assert_eq!(row.applied_policy, PolicyKind::Random);
        assert_eq!(row.params.get(WEIGHT), Some(&ParamValue::Null));
        assert_eq!(row.params.get("temp"), Some(&ParamValue::Null));
    }
}

#[test]
fn group_rows_sum_per_simulated_agent_and_grid_point() {
    let softmax = run(PolicyKind::Softmax);
    let pooled = group_rows(&softmax);
    // two sim groups (none, temp=1) times nine grid points
    assert_eq!(pooled.len(), 2 * 9);
    assert!(pooled.iter().all(|row| row.trace_pid == ParticipantId::group()));

    let point = &softmax[0].params;
    let unsimulated: f64 = softmax
        .iter()
        .filter(|row| row.sim.is_empty() && row.params == *point)
        .map(|row| row.mle)
        .sum();
    let pooled_row = pooled
        .iter()
        .find(|row| row.sim.is_empty() && row.params == *point)
        .unwrap();
    assert!((pooled_row.mle - unsimulated).abs() < 1e-12);
}

#[test]
fn bundles_survive_a_trip_through_messagepack() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("session/linear_depth/mle_and_map.msgpack");
    let repo = MsgPackRepository::new();
    let bundle = bundle();

    repo.save(&bundle, &path).unwrap();
    assert_eq!(repo.load(&path).unwrap(), bundle);
    assert_eq!(repo.list(path.parent().unwrap(), "mle_and_map").unwrap(), vec![path]);
}

#[test]
fn grid_value_outside_the_prior_fails_selection() {
    let mut priors = PriorSet::new();
    priors.insert("temp", DiscretePrior::uniform(vec![0.5.into(), 1.0.into()]));
    let result = extract_mles_and_maps(
        &run(PolicyKind::Softmax),
        &[],
        &cost_spec(),
        &PriorCatalog::from([("narrow".to_string(), priors)]),
        1,
    );
    assert!(matches!(result, Err(Error::MissingPriorValue { .. })));
}
