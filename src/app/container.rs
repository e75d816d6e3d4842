//! The analysis container: configuration, repositories, and cached tables of
//! one experiment.

use std::{
    fs::File,
    io::BufReader,
    path::PathBuf,
    sync::{Arc, OnceLock},
};

use tracing::{debug, info};

use crate::{
    Error, Result,
    adapters::{MsgPackActionValueStore, MsgPackRepository},
    analysis::{
        ComparisonQuery, ComparisonTable, MeltContext, ModelPalette, TrialByTrialInputs,
        TrialLikelihood, compute_trial_by_trial_likelihoods, generate_model_palette,
        load_trial_likelihoods, melt_bundle, save_trial_likelihoods,
    },
    config::{AnalysisConfig, AnalysisPaths},
    ports::{ActionValueRepository, ParticipantFactory, ResultRepository},
    trace::Trace,
};

/// File-name prefix of persisted result bundles.
pub const RESULT_PREFIX: &str = "mle_and_map";

/// One experiment's analysis.
///
/// Configuration is read and validated once when the analysis is built and
/// never changes afterwards. The comparison table is assembled on first use,
/// from the CSV cache when there is one.
///
/// # Examples
///
/// ```no_run
/// use costometer::app::Analysis;
/// use costometer::config::AnalysisPaths;
///
/// let analysis = Analysis::load(AnalysisPaths::new(".", "methods/static", "SoftmaxRecovery"))?;
/// let rows = analysis.query_optimization_data(&analysis.default_query())?;
/// println!("{} rows", rows.len());
/// # Ok::<(), costometer::Error>(())
/// ```
pub struct Analysis {
    paths: AnalysisPaths,
    config: AnalysisConfig,
    results: Arc<dyn ResultRepository>,
    optimization_data: OnceLock<ComparisonTable>,
}

impl Analysis {
    /// Load with the MessagePack result repository.
    pub fn load(paths: AnalysisPaths) -> Result<Self> {
        Self::builder(paths).build()
    }

    /// Builder for injecting a repository or an already-loaded
    /// configuration.
    ///
    /// ```
    /// use costometer::adapters::InMemoryRepository;
    /// use costometer::app::Analysis;
    /// use costometer::config::AnalysisPaths;
    ///
    /// let builder = Analysis::builder(AnalysisPaths::new("/tmp/irl", "methods", "Exp"))
    ///     .with_result_repository(InMemoryRepository::new());
    /// ```
    pub fn builder(paths: AnalysisPaths) -> AnalysisBuilder {
        AnalysisBuilder::new(paths)
    }

    pub fn paths(&self) -> &AnalysisPaths {
        &self.paths
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn result_repository(&self) -> Arc<dyn ResultRepository> {
        Arc::clone(&self.results)
    }

    /// Query with the experiment's configured group, prior, blocks, and
    /// null-model flag.
    pub fn default_query(&self) -> ComparisonQuery {
        let experiment = self.config.experiment();
        ComparisonQuery {
            group: experiment.group,
            prior: experiment.prior.clone(),
            blocks: self.config.block().to_vec(),
            include_null: experiment.include_null,
        }
    }

    /// The comparison table of every result bundle of the experiment.
    ///
    /// Built once and cached at [`AnalysisPaths::optimization_cache`]; later
    /// analyses read the cache instead. The model palette is written next to
    /// it if it does not exist yet.
    pub fn optimization_data(&self) -> Result<&ComparisonTable> {
        if let Some(table) = self.optimization_data.get() {
            return Ok(table);
        }

        let cache = self.paths.optimization_cache();
        let table = if cache.is_file() {
            debug!(path = %cache.display(), "reading cached optimization data");
            ComparisonTable::load_csv(&cache)?
        } else {
            let table = self.load_optimization_data()?;
            table.save_csv(&cache)?;
            info!(path = %cache.display(), rows = table.len(), "cached optimization data");
            table
        };

        let palette = self.paths.palette_file(self.config.palette_name());
        if !palette.is_file() {
            generate_model_palette(table.model_names()).save(&palette)?;
        }

        Ok(self.optimization_data.get_or_init(|| table))
    }

    fn load_optimization_data(&self) -> Result<ComparisonTable> {
        let experiment = self.config.experiment();
        let simulated_trials = if self.config.is_simulated() {
            self.config.number_trials()
        } else {
            None
        };

        let mut rows = Vec::new();
        for cost_function in self.config.cost_functions() {
            let cost_spec = self.config.registry().get(cost_function)?;
            for session in self.config.sessions() {
                let details = self
                    .config
                    .session(session)
                    .ok_or_else(|| Error::InvalidConfiguration {
                        message: format!("no details for session '{session}'"),
                    })?;
                for param in self.config.params() {
                    let dir = self.paths.results_dir(session, param, cost_function);
                    let context = MeltContext {
                        session_param: param,
                        session: details,
                        cost_spec,
                        simulated_trials,
                        free_policy_parameters: experiment.free_policy_parameters,
                    };
                    for path in self.results.list(&dir, RESULT_PREFIX)? {
                        debug!(path = %path.display(), "melting result bundle");
                        let bundle = self.results.load(&path)?;
                        rows.extend(melt_bundle(&bundle, &context)?);
                    }
                }
            }
        }

        info!(
            experiment = %self.config.experiment_name(),
            rows = rows.len(),
            "assembled optimization data"
        );
        Ok(ComparisonTable::new(rows))
    }

    /// Rows of the comparison table matching `query`, one cost function per
    /// model name.
    pub fn query_optimization_data(&self, query: &ComparisonQuery) -> Result<ComparisonTable> {
        self.optimization_data()?.query(query)
    }

    pub fn palette(&self) -> Result<ModelPalette> {
        self.optimization_data()?;
        ModelPalette::load(&self.paths.palette_file(self.config.palette_name()))
    }

    /// Every session's traces, in session order.
    pub fn traces(&self) -> Result<Vec<Trace>> {
        let mut traces = Vec::new();
        for session in self.config.sessions() {
            let path = self.paths.traces_file(session);
            let file = File::open(&path).map_err(|source| Error::Io {
                operation: format!("open {}", path.display()),
                source,
            })?;
            let session_traces: Vec<Trace> = serde_json::from_reader(BufReader::new(file))?;
            session_traces.iter().try_for_each(Trace::validate)?;
            traces.extend(session_traces);
        }
        Ok(traces)
    }

    /// Directory of precomputed action values.
    pub fn action_value_dir(&self) -> PathBuf {
        match &self.config.experiment().q_path {
            Some(q_path) => self.paths.root().join(q_path),
            None => self.paths.default_action_value_dir(),
        }
    }

    /// Per-trial likelihoods under the models selected by `query`.
    ///
    /// Cached as CSV per block and prior. Tables are read from
    /// `action_values`, or from [`Analysis::action_value_dir`] when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] unless `query` names exactly
    /// one block.
    pub fn trial_by_trial_likelihoods(
        &self,
        query: &ComparisonQuery,
        factory: &dyn ParticipantFactory,
        action_values: Option<&dyn ActionValueRepository>,
    ) -> Result<Vec<TrialLikelihood>> {
        let [block] = query.blocks.as_slice() else {
            return Err(Error::InvalidConfiguration {
                message: format!(
                    "trial-by-trial likelihoods need exactly one block, got {:?}",
                    query.blocks
                ),
            });
        };

        let cache = self.paths.trial_by_trial_cache(block, &query.prior);
        if cache.is_file() {
            debug!(path = %cache.display(), "reading cached trial-by-trial likelihoods");
            return load_trial_likelihoods(&cache);
        }

        let rows = self.query_optimization_data(query)?;
        let traces = self.traces()?;
        let store;
        let action_values: &dyn ActionValueRepository = match action_values {
            Some(action_values) => action_values,
            None => {
                store = MsgPackActionValueStore::new(self.action_value_dir());
                &store
            }
        };
        let values = compute_trial_by_trial_likelihoods(
            &rows,
            &TrialByTrialInputs {
                traces: &traces,
                registry: self.config.registry(),
                experiment_setting: self.config.experiment_setting(),
                factory,
                action_values,
            },
        )?;
        save_trial_likelihoods(&values, &cache)?;
        Ok(values)
    }
}

/// Builder for [`Analysis`].
pub struct AnalysisBuilder {
    paths: AnalysisPaths,
    results: Option<Arc<dyn ResultRepository>>,
    config: Option<AnalysisConfig>,
}

impl AnalysisBuilder {
    pub fn new(paths: AnalysisPaths) -> Self {
        Self {
            paths,
            results: None,
            config: None,
        }
    }

    pub fn with_result_repository<R: ResultRepository + 'static>(mut self, repo: R) -> Self {
        self.results = Some(Arc::new(repo));
        self
    }

    /// Use `config` instead of reading the YAML files.
    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// # Errors
    ///
    /// Fails if the configuration cannot be read or does not validate.
    pub fn build(self) -> Result<Analysis> {
        let config = match self.config {
            Some(config) => config,
            None => AnalysisConfig::load(&self.paths)?,
        };
        Ok(Analysis {
            paths: self.paths,
            config,
            results: self
                .results
                .unwrap_or_else(|| Arc::new(MsgPackRepository::new())),
            optimization_data: OnceLock::new(),
        })
    }
}

