//! Per-session experiment details.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Contents of `data/inputs/yamls/experiments/{session}.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDetails {
    pub experiment_setting: String,
    /// Block label -> number of trials. Absent for simulated sessions.
    #[serde(default)]
    pub trials_per_block: Option<BTreeMap<String, usize>>,
}

impl SessionDetails {
    /// Details of a simulated session, whose setting is the second path
    /// component of its name (`simulated/high_increasing/...`).
    pub fn simulated(session: &str) -> Self {
        Self {
            experiment_setting: session.split('/').nth(1).unwrap_or(session).to_string(),
            trials_per_block: None,
        }
    }

    pub fn is_block(&self, label: &str) -> bool {
        self.trials_per_block
            .as_ref()
            .is_some_and(|blocks| blocks.contains_key(label))
    }

    /// Trials in `block`, or in all blocks together when `block` is not one
    /// of this session's labels.
    pub fn num_trials(&self, block: &str) -> usize {
        match &self.trials_per_block {
            Some(blocks) => blocks
                .get(block)
                .copied()
                .unwrap_or_else(|| blocks.values().sum()),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_block_counts_every_trial() {
        let details: SessionDetails = serde_yaml::from_str(
            "experiment_setting: high_increasing\ntrials_per_block: {train: 10, test: 20}\n",
        )
        .unwrap();
        assert!(details.is_block("test"));
        assert_eq!(details.num_trials("test"), 20);
        assert_eq!(details.num_trials("None"), 30);
    }

    #[test]
    fn simulated_setting_comes_from_the_session_path() {
        let details = SessionDetails::simulated("simulated/high_increasing/SoftmaxPolicy");
        assert_eq!(details.experiment_setting, "high_increasing");
        assert!(!details.is_block("test"));
    }
}
