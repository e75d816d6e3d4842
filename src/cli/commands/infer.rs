//! Infer command - Grid-search cost parameters for a set of traces

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, anyhow};
use clap::Parser;

use crate::{
    adapters::{MsgPackActionValueStore, MsgPackRepository, RayonFarm, TabularParticipantFactory},
    cli::output::{create_spinner, format_number, print_section, print_stats_table},
    config::{CostFunctionRegistry, InferenceConfig, read_yaml},
    inference::{GridInference, OptimizationSpace},
    policy::PolicyKind,
    ports::{ActionValueKey, ActionValueRepository, ResultRepository},
    priors::{PriorSet, add_cost_priors_to_temp_priors},
    selection::extract_mles_and_maps,
    trace::Trace,
};

#[derive(Parser, Debug)]
#[command(about = "Grid-search cost and policy parameters for observed traces")]
pub struct InferArgs {
    /// Traces to fit (JSON array)
    #[arg(long, short = 't')]
    pub traces: PathBuf,

    /// Inference configuration (YAML)
    #[arg(long, short = 'c')]
    pub config: PathBuf,

    /// Directory of precomputed action values
    #[arg(long, short = 'q')]
    pub action_values: PathBuf,

    /// Where to write the result bundle
    #[arg(long, short = 'o', default_value = "mle_and_map.msgpack")]
    pub output: PathBuf,

    /// Worker threads (default: one per core)
    #[arg(long)]
    pub threads: Option<usize>,
}

pub fn execute(args: InferArgs) -> Result<()> {
    let traces = read_traces(&args.traces)?;
    let config: InferenceConfig = read_yaml(&args.config)
        .with_context(|| format!("Failed to read inference config {}", args.config.display()))?;

    let cost_function_dir = config.cost_function_dir.clone().unwrap_or_else(|| {
        args.config
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    });
    let registry = CostFunctionRegistry::load(&cost_function_dir, [&config.cost_function])?;
    let cost_spec = registry.get(&config.cost_function)?;

    let cost_priors = config.cost_priors();
    let store = Arc::new(MsgPackActionValueStore::new(&args.action_values));
    let factory = Arc::new(action_space_factory(&config, &cost_priors, store.as_ref())?);

    print_section("Grid Inference");
    print_stats_table(&[
        ("Experiment setting", config.experiment_setting.clone()),
        ("Cost function", cost_spec.name().to_string()),
        ("Traces", format_number(traces.len())),
    ]);

    let mut softmax = GridInference::builder()
        .traces(traces.clone())
        .factory(factory.clone())
        .experiment_setting(&config.experiment_setting)
        .cost_function(cost_spec.name())
        .cost_parameters(cost_priors)
        .policy_parameters(config.policy_priors())
        .policy_kind(PolicyKind::Softmax)
        .held_constant(config.held_constant()?)
        .action_values(store)
        .build()?;
    let mut random = GridInference::builder()
        .traces(traces)
        .factory(factory)
        .experiment_setting(&config.experiment_setting)
        .cost_function(cost_spec.name())
        .policy_kind(PolicyKind::Random)
        .build()?;

    for inference in [&mut softmax, &mut random] {
        let spinner = create_spinner(&format!(
            "{} over {} grid points",
            inference.policy_kind(),
            format_number(inference.get_optimization_space().len())
        ));
        let mut farm = match args.threads {
            Some(threads) => RayonFarm::with_threads(threads),
            None => RayonFarm::new(),
        };
        let outcome = inference.run_with(&mut farm);
        spinner.finish_and_clear();
        outcome?;
    }

    let softmax_rows = softmax.get_optimization_results()?.rows();
    let random_rows = random.get_optimization_results()?.rows();
    let priors = add_cost_priors_to_temp_priors(
        softmax_rows,
        cost_spec,
        &config.temp_priors,
        &config.additional_params,
    )?;
    let bundle = extract_mles_and_maps(
        softmax_rows,
        random_rows,
        cost_spec,
        &priors,
        config.free_policy_parameters,
    )?;

    MsgPackRepository::new()
        .save(&bundle, &args.output)
        .with_context(|| format!("Failed to write result bundle {}", args.output.display()))?;

    print_stats_table(&[
        ("Softmax rows", format_number(softmax_rows.len())),
        ("Random rows", format_number(random_rows.len())),
        ("Metrics", format_number(bundle.softmax.len())),
        ("Priors", priors.keys().cloned().collect::<Vec<_>>().join(", ")),
        ("Output", args.output.display().to_string()),
    ]);
    Ok(())
}

fn read_traces(path: &Path) -> Result<Vec<Trace>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let traces: Vec<Trace> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse traces from {}", path.display()))?;
    if traces.is_empty() {
        return Err(anyhow!("No traces in {}", path.display()));
    }
    Ok(traces)
}

/// Factory whose random participants act in the action space of the first
/// cost combination's table.
fn action_space_factory(
    config: &InferenceConfig,
    cost_priors: &PriorSet,
    store: &dyn ActionValueRepository,
) -> Result<TabularParticipantFactory> {
    let first = OptimizationSpace::from_priors(cost_priors, &PriorSet::new())?
        .points()
        .next()
        .ok_or_else(|| anyhow!("Cost grid is empty"))?;
    let key = ActionValueKey::new(&config.experiment_setting, &config.cost_function, first);
    let table = store
        .load(&key)
        .with_context(|| format!("Failed to load action values for {key}"))?;
    Ok(TabularParticipantFactory::from_table(&table))
}
