//! Participant port - the planning collaborator behind every likelihood.
//!
//! The environment, its cost functions, and the agent that follows a
//! policy through it live outside this crate. The grid optimizer only needs
//! to construct an agent for one grid point and ask it how likely a trace
//! is, so that is all this port describes.

use std::sync::Arc;

use crate::{
    Result,
    action_values::ActionValueTable,
    policy::{PolicyKind, PolicyKwargs},
    trace::Trace,
    types::Parameters,
};

/// Everything needed to construct one participant for one grid point.
#[derive(Debug, Clone)]
pub struct ParticipantSpec {
    pub experiment_setting: String,
    pub num_trials: usize,
    pub cost_function: String,
    pub cost_kwargs: Parameters,
    pub policy: PolicyKind,
    pub policy_kwargs: PolicyKwargs,
    /// Precomputed action values for `cost_kwargs`, shared read-only
    /// between every task of the same cost combination.
    pub preference: Option<Arc<ActionValueTable>>,
}

/// A policy-equipped agent.
///
/// # Examples
///
/// ```no_run
/// use costometer::ports::Participant;
/// use costometer::trace::Trace;
///
/// fn total_log_likelihood<P: Participant + ?Sized>(
///     participant: &P,
///     trace: &Trace,
/// ) -> costometer::Result<f64> {
///     let per_trial = participant.compute_likelihood(trace)?;
///     Ok(per_trial.iter().flatten().sum())
/// }
/// ```
pub trait Participant: Send {
    /// Per trial, the log-probability of each observed action.
    ///
    /// # Errors
    ///
    /// Returns an error if a state or action of the trace is unknown to the
    /// agent.
    fn compute_likelihood(&self, trace: &Trace) -> Result<Vec<Vec<f64>>>;
}

/// Builds participants from a [`ParticipantSpec`].
///
/// Shared between worker threads, hence `Send + Sync`.
pub trait ParticipantFactory: Send + Sync {
    fn build(&self, spec: &ParticipantSpec) -> Result<Box<dyn Participant>>;
}

/// An agent that can act in the environment and record what it did.
pub trait TrajectorySimulator {
    fn simulate_trajectory(&mut self) -> Result<Trace>;
}
