//! Subcommands of the `costometer` binary.

pub mod compare;
pub mod infer;
