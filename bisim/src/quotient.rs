//! Collapsing a stable partition into a quotient model.

use pmctk_ids::{id_vec::IdVec, Id};
use pmctk_model::{Model, SparseMatrix, StateId, StateLabeling, StateSet, Weight};

use crate::{partition::BlockId, BisimError, Partition};

/// How quotient states are labeled.
#[derive(Clone, Copy, Debug)]
pub enum QuotientLabels<'a> {
    /// Copy every label of the model from each block's representative.
    Representative,
    /// Copy only the listed labels from each block's representative.
    Respected(&'a [String]),
    /// Label each block by its tag, untagged blocks by the given label.
    ///
    /// This is used for measure-driven partitions, where the tags name the prob0 and prob1
    /// blocks.
    Tags {
        /// Label of untagged blocks.
        untagged: &'a str,
    },
}

/// Builds the quotient of `model` by a stable `partition`.
///
/// Quotient states are numbered in block list order. Each block is represented by its member
/// with the lowest index, whose outgoing transitions are lifted to the blocks of their targets.
/// Absorbing blocks get a single self-loop of weight one instead. Exit rates are taken from the
/// representative, state rewards as well when `keep_rewards` is set. A quotient state is initial
/// when any member of its block is.
pub fn build_quotient<V: Weight>(
    model: &Model<V>,
    partition: &Partition<V>,
    labels: QuotientLabels,
    keep_rewards: bool,
) -> Result<Model<V>, BisimError> {
    if partition.state_count() != model.state_count() {
        return Err(BisimError::PartitionSizeMismatch {
            partition: partition.state_count(),
            states: model.state_count(),
        });
    }

    let block_count = partition.block_count();
    let mut quotient_state: IdVec<BlockId, StateId> =
        IdVec::from_elem(StateId::MIN_ID, block_count);
    let mut representatives: Vec<StateId> = Vec::with_capacity(block_count);

    for (index, block) in partition.block_ids().enumerate() {
        quotient_state[block] = StateId::from_id_index(index);
        // blocks are never empty
        let representative = partition
            .states_in_block(block)
            .min()
            .unwrap_or(StateId::MIN_ID);
        representatives.push(representative);
    }

    let lift = |state: StateId| quotient_state[partition.block_of(state)];

    let rows = partition.block_ids().zip(&representatives).map(|(block, &rep)| {
        if partition.block(block).is_absorbing() {
            vec![(quotient_state[block], V::one())]
        } else {
            model
                .transitions()
                .row(rep)
                .iter()
                .map(|(target, weight)| (lift(*target), weight.clone()))
                .collect()
        }
    });
    let transitions = SparseMatrix::from_rows(block_count, rows)?;

    let mut labeling = StateLabeling::new(block_count);
    match labels {
        QuotientLabels::Representative => {
            for (name, states) in model.labeling().iter() {
                labeling.add_label(name, lift_representatives(&representatives, states))?;
            }
        }
        QuotientLabels::Respected(names) => {
            for name in names {
                let states = model
                    .labeling()
                    .states_with_label(name)
                    .ok_or_else(|| BisimError::UnknownLabel(name.clone()))?;
                labeling.add_label(name.as_str(), lift_representatives(&representatives, states))?;
            }
        }
        QuotientLabels::Tags { untagged } => {
            for block in partition.blocks() {
                let name = block.label().unwrap_or(untagged);
                labeling.add_label_to_state(name, quotient_state[block.id()]);
            }
        }
    }

    let mut initial_states = StateSet::with_capacity(block_count);
    for state in model.initial_states().ones() {
        initial_states.insert(lift(StateId::from_id_index(state)).id_index());
    }

    let from_representatives = |values: &[V]| -> Vec<V> {
        representatives
            .iter()
            .map(|rep| values[rep.id_index()].clone())
            .collect()
    };

    let exit_rates = model.exit_rates().map(from_representatives);

    let reward_models = if keep_rewards {
        model
            .reward_models()
            .iter()
            .map(|(name, rewards)| (name.clone(), from_representatives(rewards.as_slice())))
            .collect()
    } else {
        Default::default()
    };

    let quotient = Model::new(
        model.kind(),
        transitions,
        exit_rates,
        labeling,
        initial_states,
        reward_models,
    )?;

    log::debug!(
        "quotient has {} states and {} transitions",
        quotient.state_count(),
        quotient.transitions().entry_count()
    );

    Ok(quotient)
}

fn lift_representatives(representatives: &[StateId], states: &StateSet) -> StateSet {
    let mut lifted = StateSet::with_capacity(representatives.len());
    for (index, rep) in representatives.iter().enumerate() {
        lifted.set(index, states.contains(rep.id_index()));
    }
    lifted
}
