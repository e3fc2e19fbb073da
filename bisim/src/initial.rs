//! Construction of initial partitions.
//!
//! Refinement only ever splits blocks, so the initial partition fixes which states must never be
//! merged: nothing for the uniform partition, states with different labels for the label based
//! partition, and states with different qualitative reachability behavior for the measure-driven
//! partition.

use pmctk_ids::Id;
use pmctk_model::{Model, ModelKind, StateId, StateSet, Weight};

use crate::{
    partition::{BlockGroup, Partition},
    BisimError, BisimulationOptions, Comparator,
};

/// Which initial partition refinement starts from.
#[derive(Clone, Debug, Default)]
pub enum InitialPartitionKind {
    /// A single block with all states, computing plain strong bisimulation.
    Uniform,
    /// Split by every label of the model or by the labels listed in
    /// [`BisimulationOptions::respected_labels`].
    #[default]
    Labels,
    /// Three blocks from precomputed prob0/prob1 sets, preserving a single `phi U psi` query.
    MeasureDriven(MeasureDrivenOptions),
}

/// Input of the measure-driven initial partition for a `phi U psi` query.
#[derive(Clone, Debug)]
pub struct MeasureDrivenOptions {
    /// States reaching psi with probability zero.
    pub prob0_states: StateSet,
    /// States reaching psi with probability one.
    pub prob1_states: StateSet,
    /// States satisfying psi, required when `bounded` is set or rewards are kept.
    pub psi_states: Option<StateSet>,
    /// Whether the query is step or time bounded.
    ///
    /// The absorbing prob1 block then contains exactly the psi states, as only those reach psi
    /// with probability one within every bound. All other prob1 states are refined normally.
    pub bounded: bool,
    /// Label given to quotient states of blocks that are neither prob0 nor prob1.
    pub phi_label: String,
    /// Tag and quotient label of the prob1 block.
    pub prob1_label: String,
    /// Tag and quotient label of the prob0 block.
    pub other_label: String,
}

impl MeasureDrivenOptions {
    /// Options for an unbounded query with the default labels `phi`, `psi` and `other`.
    pub fn new(prob0_states: StateSet, prob1_states: StateSet) -> Self {
        Self {
            prob0_states,
            prob1_states,
            psi_states: None,
            bounded: false,
            phi_label: "phi".into(),
            prob1_label: "psi".into(),
            other_label: "other".into(),
        }
    }

    /// Sets the psi states and marks the query as bounded.
    pub fn bounded(mut self, psi_states: StateSet) -> Self {
        self.psi_states = Some(psi_states);
        self.bounded = true;
        self
    }

    /// Sets the psi states without changing whether the query is bounded.
    pub fn with_psi_states(mut self, psi_states: StateSet) -> Self {
        self.psi_states = Some(psi_states);
        self
    }
}

fn check_set_size(what: &'static str, set: &StateSet, states: usize) -> Result<(), BisimError> {
    if set.len() == states {
        Ok(())
    } else {
        Err(BisimError::StateSetSizeMismatch {
            what,
            len: set.len(),
            states,
        })
    }
}

impl<V: Weight> Partition<V> {
    /// The coarsest partition in which every block is either contained in or disjoint from each
    /// of the given label sets.
    pub fn respecting_labels<'a>(
        state_count: usize,
        labels: impl IntoIterator<Item = &'a StateSet>,
    ) -> Result<Self, BisimError> {
        let mut partition = Self::new(state_count);
        for states in labels {
            check_set_size("label", states, state_count)?;
            partition.split_label(states);
        }
        Ok(partition)
    }

    /// The measure-driven partition with one absorbing block for `prob1_states` tagged
    /// `prob1_label`, one absorbing block for `prob0_states` tagged `other_label` and one block
    /// for all remaining states. Empty groups don't produce a block.
    pub fn measure_driven(
        state_count: usize,
        prob0_states: &StateSet,
        prob1_states: &StateSet,
        prob1_label: &str,
        other_label: &str,
    ) -> Result<Self, BisimError> {
        check_set_size("prob0 states", prob0_states, state_count)?;
        check_set_size("prob1 states", prob1_states, state_count)?;
        if !prob0_states.is_disjoint(prob1_states) {
            return Err(BisimError::OverlappingMeasureSets);
        }

        let mut prob1 = BlockGroup {
            absorbing: true,
            label: Some(prob1_label.to_owned()),
            ..Default::default()
        };
        let mut prob0 = BlockGroup {
            absorbing: true,
            label: Some(other_label.to_owned()),
            ..Default::default()
        };
        let mut other = BlockGroup::default();

        for index in 0..state_count {
            let group = if prob1_states.contains(index) {
                &mut prob1
            } else if prob0_states.contains(index) {
                &mut prob0
            } else {
                &mut other
            };
            group.states.push(StateId::from_id_index(index));
        }

        Ok(Self::from_groups(state_count, &[prob1, prob0, other]))
    }
}

/// Builds the initial partition selected by `options` for `model`.
///
/// On top of the selected partition, blocks are split by state rewards when rewards are kept
/// and by exit rates for continuous-time models.
pub(crate) fn initial_partition<V: Weight, C: Comparator<V>>(
    model: &Model<V>,
    comparator: &C,
    options: &BisimulationOptions,
) -> Result<Partition<V>, BisimError> {
    let state_count = model.state_count();

    let mut partition = match &options.initial {
        InitialPartitionKind::Uniform => Partition::new(state_count),
        InitialPartitionKind::Labels => {
            let labeling = model.labeling();
            match &options.respected_labels {
                Some(names) => {
                    let mut sets = vec![];
                    for name in names {
                        let states = labeling
                            .states_with_label(name)
                            .ok_or_else(|| BisimError::UnknownLabel(name.clone()))?;
                        sets.push(states);
                    }
                    Partition::respecting_labels(state_count, sets)?
                }
                None => Partition::respecting_labels(
                    state_count,
                    labeling.iter().map(|(_, states)| states),
                )?,
            }
        }
        InitialPartitionKind::MeasureDriven(measure) => {
            let prob1_states = if measure.bounded || options.keep_rewards {
                let psi_states = measure
                    .psi_states
                    .as_ref()
                    .ok_or(BisimError::MissingPsiStates)?;
                check_set_size("psi states", psi_states, state_count)?;
                psi_states
            } else {
                &measure.prob1_states
            };
            Partition::measure_driven(
                state_count,
                &measure.prob0_states,
                prob1_states,
                &measure.prob1_label,
                &measure.other_label,
            )?
        }
    };

    log::debug!("initial partition has {} blocks", partition.block_count());

    if options.keep_rewards {
        for (name, rewards) in model.reward_models() {
            let created = partition
                .split_by_state_values(comparator, |state| rewards[state.id_index()].clone());
            log::debug!("reward model {name:?} split off {created} blocks");
        }
    }

    if let (ModelKind::Ctmc, Some(exit_rates)) = (model.kind(), model.exit_rates()) {
        let created = partition
            .split_by_state_values(comparator, |state| exit_rates[state.id_index()].clone());
        log::debug!("exit rates split off {created} blocks");
    }

    Ok(partition)
}
