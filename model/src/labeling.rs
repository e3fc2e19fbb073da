use std::collections::BTreeMap;

use pmctk_ids::Id;

use crate::{ModelError, StateId, StateSet};

/// Maps atomic proposition names to the set of states satisfying them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateLabeling {
    state_count: usize,
    labels: BTreeMap<String, StateSet>,
}

impl StateLabeling {
    /// Creates an empty labeling for `state_count` states.
    pub fn new(state_count: usize) -> Self {
        Self {
            state_count,
            labels: BTreeMap::new(),
        }
    }

    /// Number of states covered by this labeling.
    pub fn state_count(&self) -> usize {
        self.state_count
    }

    /// Adds a label with the given set of states.
    pub fn add_label(&mut self, name: impl Into<String>, states: StateSet) -> Result<(), ModelError> {
        let name = name.into();
        if states.len() != self.state_count {
            return Err(ModelError::LengthMismatch {
                what: format!("label {name:?}"),
                len: states.len(),
                states: self.state_count,
            });
        }
        if self.labels.contains_key(&name) {
            return Err(ModelError::DuplicateName(name));
        }
        self.labels.insert(name, states);
        Ok(())
    }

    /// Adds `state` to the label `name`, creating the label when it doesn't exist yet.
    #[track_caller]
    pub fn add_label_to_state(&mut self, name: &str, state: StateId) {
        let state_count = self.state_count;
        self.labels
            .entry(name.to_owned())
            .or_insert_with(|| StateSet::with_capacity(state_count))
            .insert(state.id_index());
    }

    /// Returns the label names in lexicographic order.
    pub fn label_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.labels.keys().map(String::as_str)
    }

    /// Returns all labels with their state sets.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StateSet)> + '_ {
        self.labels.iter().map(|(name, states)| (name.as_str(), states))
    }

    /// Returns the states having a label, if the label exists.
    pub fn states_with_label(&self, name: &str) -> Option<&StateSet> {
        self.labels.get(name)
    }

    /// Returns `true` if `state` has the given label.
    pub fn has_label(&self, name: &str, state: StateId) -> bool {
        self.labels
            .get(name)
            .is_some_and(|states| states.contains(state.id_index()))
    }

    /// Returns the labels of a single state.
    pub fn labels_of_state(&self, state: StateId) -> impl Iterator<Item = &str> + '_ {
        self.labels
            .iter()
            .filter(move |(_, states)| states.contains(state.id_index()))
            .map(|(name, _)| name.as_str())
    }
}
