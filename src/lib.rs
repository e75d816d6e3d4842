//! Inverse reinforcement learning of planning costs
//!
//! This crate provides:
//! - Grid-search inference of cost and softmax-policy parameters from
//!   participant traces, against precomputed action-value tables
//! - Discrete priors, including temperature priors shaped by a reference
//!   distribution
//! - MLE and MAP selection over the lattice of nested models
//! - Long-format model comparison by BIC, model palettes, and trial-by-trial
//!   likelihoods for an experiment's result bundles

pub mod action_values;
pub mod adapters;
pub mod analysis;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod identifiers;
pub mod inference;
pub mod policy;
pub mod ports;
pub mod priors;
pub mod selection;
pub mod trace;
pub mod types;
pub mod utils;

pub use error::{Error, Result};
