//! Command-line interface for grid inference and model comparison.

pub mod commands;
pub mod output;
