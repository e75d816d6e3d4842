//! Error types for the costometer crate

use thiserror::Error;

/// Main error type for the costometer crate
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("unknown cost function '{name}' (registered: {known})")]
    UnknownCostFunction { name: String, known: String },

    #[error("failed to parse configuration file {path}: {message}")]
    ConfigParse { path: String, message: String },

    #[error("prior for '{parameter}' sums to {total} instead of 1")]
    PriorNotNormalized { parameter: String, total: f64 },

    #[error("prior for '{parameter}' has no probability for value {value}")]
    MissingPriorValue { parameter: String, value: String },

    #[error("parameter '{name}' is missing from the parameterization")]
    MissingParameter { name: String },

    #[error("invalid reference distribution: {message}")]
    InvalidDistribution { message: String },

    #[error("malformed trace for participant '{pid}': {message}")]
    TraceShape { pid: String, message: String },

    #[error("likelihood shape does not match trace for participant '{pid}': {message}")]
    LikelihoodShape { pid: String, message: String },

    #[error("state '{state}' is not present in the action-value table")]
    UnknownState { state: String },

    #[error("action {action} is not available in state '{state}'")]
    UnknownAction { state: String, action: usize },

    #[error("action-value table not found at {path}")]
    ActionValuesNotFound { path: String },

    #[error("softmax policy for cost parameters '{parameters}' has no action-value table")]
    MissingActionValues { parameters: String },

    #[error("search space is empty: dimension '{dimension}' has no candidate values")]
    EmptySearchSpace { dimension: String },

    #[error("optimizer has not been run yet")]
    NotRun,

    #[error("expected exactly one best row for trace {key} on '{metric}', found {count}")]
    SelectionInvariant {
        key: String,
        metric: String,
        count: usize,
    },

    #[error("model '{model_name}' has different summed BIC across cost functions: {fits}")]
    DuplicateModelFit { model_name: String, fits: String },

    #[error("task farm failure: {message}")]
    TaskFarm { message: String },

    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to {operation}: {message}")]
    SerializationContext { operation: String, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Convenience type alias for Results using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io {
            operation: "IO operation".to_string(),
            source,
        }
    }
}
