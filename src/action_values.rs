//! Precomputed action-value (Q) tables.
//!
//! Tables are produced by the external planning library for one
//! `(experiment setting, cost function, cost parameters)` triple and are
//! only read here.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{Error, Result, identifiers::StateId};

/// State -> (action -> Q value).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionValueTable(BTreeMap<StateId, BTreeMap<usize, f64>>);

impl ActionValueTable {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, state: impl Into<StateId>, action: usize, value: f64) {
        self.0.entry(state.into()).or_default().insert(action, value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn states(&self) -> impl Iterator<Item = &StateId> {
        self.0.keys()
    }

    /// Action values of one state, ordered by action.
    pub fn values(&self, state: &StateId) -> Result<&BTreeMap<usize, f64>> {
        self.0.get(state).ok_or_else(|| Error::UnknownState {
            state: state.to_string(),
        })
    }

    pub fn value(&self, state: &StateId, action: usize) -> Result<f64> {
        self.values(state)?
            .get(&action)
            .copied()
            .ok_or_else(|| Error::UnknownAction {
                state: state.to_string(),
                action,
            })
    }

    pub fn available_actions(&self, state: &StateId) -> Result<BTreeSet<usize>> {
        Ok(self.values(state)?.keys().copied().collect())
    }

    /// The actions of every state, without their values.
    pub fn action_space(&self) -> ActionSpace {
        self.0
            .iter()
            .map(|(state, values)| (state.clone(), values.keys().copied().collect()))
            .collect()
    }
}

impl FromIterator<(StateId, BTreeMap<usize, f64>)> for ActionValueTable {
    fn from_iter<T: IntoIterator<Item = (StateId, BTreeMap<usize, f64>)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// State -> available actions. Enough for policies that ignore values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionSpace(BTreeMap<StateId, BTreeSet<usize>>);

impl ActionSpace {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, state: impl Into<StateId>, actions: impl IntoIterator<Item = usize>) {
        self.0.entry(state.into()).or_default().extend(actions);
    }

    pub fn available_actions(&self, state: &StateId) -> Result<&BTreeSet<usize>> {
        self.0.get(state).ok_or_else(|| Error::UnknownState {
            state: state.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(StateId, BTreeSet<usize>)> for ActionSpace {
    fn from_iter<T: IntoIterator<Item = (StateId, BTreeSet<usize>)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_state_and_action_are_errors() {
        let mut table = ActionValueTable::new();
        table.insert("root", 0, 0.0);
        table.insert("root", 1, -1.0);

        let root = StateId::new("root");
        assert_eq!(table.value(&root, 1).unwrap(), -1.0);
        assert!(matches!(
            table.value(&root, 7),
            Err(Error::UnknownAction { action: 7, .. })
        ));
        assert!(matches!(
            table.values(&StateId::new("leaf")),
            Err(Error::UnknownState { .. })
        ));
    }

    #[test]
    fn action_space_drops_values() {
        let mut table = ActionValueTable::new();
        table.insert("root", 0, 0.0);
        table.insert("root", 3, 2.0);
        let space = table.action_space();
        let actions = space.available_actions(&StateId::new("root")).unwrap();
        assert_eq!(actions.iter().copied().collect::<Vec<_>>(), vec![0, 3]);
    }
}
