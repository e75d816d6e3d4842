//! Reduction of per-step log-likelihoods to trace and block totals.

use std::collections::BTreeMap;

use crate::{Error, Result, trace::Trace};

/// Summed log-likelihoods of one trace under one parameterization.
#[derive(Debug, Clone, PartialEq)]
pub struct LikelihoodSummary {
    /// One sum per trial.
    pub trial_mles: Vec<f64>,
    /// Sum over trials.
    pub mle: f64,
    /// Sum over the trials of each block label. Empty for unlabelled traces.
    pub block_mles: BTreeMap<String, f64>,
}

impl LikelihoodSummary {
    /// Sum `likelihoods` within trials, then across trials and per block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LikelihoodShape`] when `likelihoods` does not have one
    /// entry per trial and per step of `trace`.
    pub fn from_trace(trace: &Trace, likelihoods: &[Vec<f64>]) -> Result<Self> {
        if likelihoods.len() != trace.num_trials() {
            return Err(Error::LikelihoodShape {
                pid: trace.pid.to_string(),
                message: format!(
                    "{} trials of likelihoods for {} trials",
                    likelihoods.len(),
                    trace.num_trials()
                ),
            });
        }
        for (trial, (steps, actions)) in likelihoods.iter().zip(&trace.actions).enumerate() {
            if steps.len() != actions.len() {
                return Err(Error::LikelihoodShape {
                    pid: trace.pid.to_string(),
                    message: format!(
                        "trial {trial} has {} likelihoods for {} actions",
                        steps.len(),
                        actions.len()
                    ),
                });
            }
        }

        let trial_mles: Vec<f64> = likelihoods.iter().map(|steps| steps.iter().sum()).collect();
        let mle = trial_mles.iter().sum();

        let mut block_mles = BTreeMap::new();
        if let Some(blocks) = &trace.blocks {
            for (block, trial_mle) in blocks.iter().zip(&trial_mles) {
                *block_mles.entry(block.clone()).or_insert(0.0) += trial_mle;
            }
        }

        Ok(Self {
            trial_mles,
            mle,
            block_mles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::StateId;

    fn trace() -> Trace {
        let states = |n: usize| (0..n).map(|i| StateId::new(format!("s{i}"))).collect();
        Trace::new(
            "3",
            vec![states(2), states(1), states(3)],
            vec![vec![1, 0], vec![0], vec![2, 1, 0]],
        )
        .unwrap()
        .with_blocks(vec!["train".into(), "test".into(), "train".into()])
        .unwrap()
    }

    #[test]
    fn block_sums_partition_the_total() {
        let likelihoods = vec![vec![-1.0, -0.5], vec![-2.0], vec![-0.25, -0.25, 0.0]];
        let summary = LikelihoodSummary::from_trace(&trace(), &likelihoods).unwrap();

        assert_eq!(summary.trial_mles, vec![-1.5, -2.0, -0.5]);
        assert_eq!(summary.mle, -4.0);
        assert_eq!(summary.block_mles["train"], -2.0);
        assert_eq!(summary.block_mles["test"], -2.0);
        assert_eq!(summary.block_mles.values().sum::<f64>(), summary.mle);
    }

    #[test]
    fn mismatched_shape_is_rejected() {
        let likelihoods = vec![vec![-1.0], vec![-2.0], vec![0.0, 0.0, 0.0]];
        assert!(matches!(
            LikelihoodSummary::from_trace(&trace(), &likelihoods),
            Err(Error::LikelihoodShape { .. })
        ));
    }
}
