use std::collections::BTreeMap;

use pmctk_ids::Id;

use crate::{ModelError, SparseMatrix, StateId, StateLabeling, StateSet, Weight};

/// Kind of a Markov chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// Discrete-time Markov chain.
    Dtmc,
    /// Continuous-time Markov chain.
    ///
    /// The transition matrix holds the branching probabilities of the embedded discrete-time
    /// chain, the residence time is given by the per-state exit rates.
    Ctmc,
}

/// A discrete- or continuous-time Markov chain with labels and state rewards.
#[derive(Clone, Debug)]
pub struct Model<V> {
    kind: ModelKind,
    transitions: SparseMatrix<V>,
    exit_rates: Option<Vec<V>>,
    labeling: StateLabeling,
    initial_states: StateSet,
    reward_models: BTreeMap<String, Vec<V>>,
}

impl<V: Weight> Model<V> {
    /// Assembles a model from its parts, checking that all parts agree on the state count.
    pub fn new(
        kind: ModelKind,
        transitions: SparseMatrix<V>,
        exit_rates: Option<Vec<V>>,
        labeling: StateLabeling,
        initial_states: StateSet,
        reward_models: BTreeMap<String, Vec<V>>,
    ) -> Result<Self, ModelError> {
        let states = transitions.row_count();
        if transitions.column_count() != states {
            return Err(ModelError::MatrixShape {
                rows: states,
                columns: transitions.column_count(),
                states,
            });
        }

        let check_len = |what: String, len: usize| {
            if len == states {
                Ok(())
            } else {
                Err(ModelError::LengthMismatch { what, len, states })
            }
        };

        match (kind, &exit_rates) {
            (ModelKind::Ctmc, None) => return Err(ModelError::MissingExitRates),
            (ModelKind::Dtmc, Some(_)) => return Err(ModelError::UnexpectedExitRates),
            (ModelKind::Ctmc, Some(rates)) => check_len("exit rates".into(), rates.len())?,
            (ModelKind::Dtmc, None) => (),
        }

        check_len("labeling".into(), labeling.state_count())?;
        check_len("initial states".into(), initial_states.len())?;
        for (name, rewards) in &reward_models {
            check_len(format!("reward model {name:?}"), rewards.len())?;
        }

        Ok(Self {
            kind,
            transitions,
            exit_rates,
            labeling,
            initial_states,
            reward_models,
        })
    }
}

impl<V> Model<V> {
    /// The kind of this model.
    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    /// Number of states.
    pub fn state_count(&self) -> usize {
        self.transitions.row_count()
    }

    /// The forward transition relation.
    pub fn transitions(&self) -> &SparseMatrix<V> {
        &self.transitions
    }

    /// Exit rates, present exactly for continuous-time models.
    pub fn exit_rates(&self) -> Option<&[V]> {
        self.exit_rates.as_deref()
    }

    /// The state labeling.
    pub fn labeling(&self) -> &StateLabeling {
        &self.labeling
    }

    /// The set of initial states.
    pub fn initial_states(&self) -> &StateSet {
        &self.initial_states
    }

    /// Named state reward vectors.
    pub fn reward_models(&self) -> &BTreeMap<String, Vec<V>> {
        &self.reward_models
    }
}

/// Incrementally assembles a [`Model`].
#[derive(Clone, Debug)]
pub struct ModelBuilder<V> {
    kind: ModelKind,
    rows: Vec<Vec<(StateId, V)>>,
    exit_rates: Option<Vec<V>>,
    labeling: StateLabeling,
    initial_states: StateSet,
    reward_models: BTreeMap<String, Vec<V>>,
}

impl<V: Weight> ModelBuilder<V> {
    /// Starts a model with `state_count` states and no transitions.
    pub fn new(kind: ModelKind, state_count: usize) -> Self {
        Self {
            kind,
            rows: (0..state_count).map(|_| vec![]).collect(),
            exit_rates: None,
            labeling: StateLabeling::new(state_count),
            initial_states: StateSet::with_capacity(state_count),
            reward_models: BTreeMap::new(),
        }
    }

    /// Adds a transition. Weights of repeated transitions between the same states are summed.
    ///
    /// # Panics
    ///
    /// Panics when `from` is not a state of the model. Out of range targets are reported by
    /// [`build`][Self::build].
    #[track_caller]
    pub fn transition(&mut self, from: StateId, to: StateId, weight: V) -> &mut Self {
        self.rows[from.id_index()].push((to, weight));
        self
    }

    /// Sets the exit rates of a continuous-time model.
    pub fn exit_rates(&mut self, rates: Vec<V>) -> &mut Self {
        self.exit_rates = Some(rates);
        self
    }

    /// Adds a label to a state.
    #[track_caller]
    pub fn label(&mut self, name: &str, state: StateId) -> &mut Self {
        self.labeling.add_label_to_state(name, state);
        self
    }

    /// Marks a state as initial.
    #[track_caller]
    pub fn initial(&mut self, state: StateId) -> &mut Self {
        self.initial_states.insert(state.id_index());
        self
    }

    /// Adds a state reward model.
    pub fn reward_model(&mut self, name: impl Into<String>, rewards: Vec<V>) -> &mut Self {
        self.reward_models.insert(name.into(), rewards);
        self
    }

    /// Finishes the model.
    pub fn build(&self) -> Result<Model<V>, ModelError> {
        let state_count = self.rows.len();
        let transitions = SparseMatrix::from_rows(state_count, self.rows.iter().cloned())?;
        Model::new(
            self.kind,
            transitions,
            self.exit_rates.clone(),
            self.labeling.clone(),
            self.initial_states.clone(),
            self.reward_models.clone(),
        )
    }
}
