//! Compare command - Rank models of an experiment by summed BIC

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::{
    app::Analysis,
    cli::output::{format_number, print_kv, print_section, print_stats_table, print_subsection},
    config::AnalysisPaths,
};

#[derive(Parser, Debug)]
#[command(about = "Compare the models fitted for an experiment")]
pub struct CompareArgs {
    /// Experiment name (analysis/<subdirectory>/inputs/yamls/<name>.yaml)
    pub experiment: String,

    /// Project root
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Analysis subdirectory under <root>/analysis
    #[arg(long, short = 's', default_value = "")]
    pub subdirectory: PathBuf,

    /// Prior to compare MAP fits under (overrides the experiment file)
    #[arg(long, short = 'p')]
    pub prior: Option<String>,

    /// Blocks to include (overrides the experiment file)
    #[arg(long, short = 'b')]
    pub block: Vec<String>,

    /// Compare group fits instead of per-participant fits
    #[arg(long)]
    pub group: bool,

    /// Include the random-policy baseline
    #[arg(long)]
    pub include_null: bool,

    /// Export the queried rows to CSV
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

pub fn execute(args: CompareArgs) -> Result<()> {
    let paths = AnalysisPaths::new(&args.root, &args.subdirectory, &args.experiment);
    let analysis = Analysis::load(paths)
        .with_context(|| format!("Failed to load experiment {}", args.experiment))?;

    let mut query = analysis.default_query();
    if let Some(prior) = args.prior {
        query.prior = prior;
    }
    if !args.block.is_empty() {
        query.blocks = args.block;
    }
    query.group |= args.group;
    query.include_null |= args.include_null;

    let rows = analysis.query_optimization_data(&query)?;

    print_section(&format!("Model Comparison: {}", args.experiment));
    print_stats_table(&[
        ("Prior", query.prior.clone()),
        ("Blocks", query.blocks.join(", ")),
        ("Group", query.group.to_string()),
        ("Rows", format_number(rows.len())),
    ]);

    let mut ranking: Vec<(&str, f64)> = rows.summed_bic().into_iter().collect();
    ranking.sort_by(|a, b| a.1.total_cmp(&b.1));

    print_subsection("Summed BIC (lower is better)");
    for (model, bic) in &ranking {
        print_kv(model, &format!("{bic:.2}"));
    }

    if let Some(output) = args.output {
        rows.save_csv(&output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("\nRows written to: {}", output.display());
    }

    Ok(())
}
