//! Bisimulation minimization of a whole model.
//!
//! Ties together the initial partition, the refinement loop and the quotient construction and
//! validates the backward relation passed in by the caller.

use std::sync::Arc;

use pmctk_ids::id_vec::IdVec;
use pmctk_model::{Model, SparseMatrix, StateId, Weight};

use crate::{
    initial::{initial_partition, InitialPartitionKind, MeasureDrivenOptions},
    partition::BlockId,
    quotient::{build_quotient, QuotientLabels},
    BisimError, Comparator, Partition, RefinementEngine, RefinementStats, WorklistOrder,
};

/// Options controlling a [`BisimulationDecomposition`].
#[derive(Clone, Debug)]
pub struct BisimulationOptions {
    /// The partition refinement starts from.
    pub initial: InitialPartitionKind,
    /// Labels to respect for [`InitialPartitionKind::Labels`], all labels when `None`.
    pub respected_labels: Option<Vec<String>>,
    /// Keep states with different rewards apart and carry rewards into the quotient.
    pub keep_rewards: bool,
    /// Whether to build the quotient model.
    pub build_quotient: bool,
    /// Splitter processing order.
    pub worklist_order: WorklistOrder,
}

impl Default for BisimulationOptions {
    fn default() -> Self {
        Self {
            initial: InitialPartitionKind::Labels,
            respected_labels: None,
            keep_rewards: false,
            build_quotient: true,
            worklist_order: WorklistOrder::Fifo,
        }
    }
}

impl BisimulationOptions {
    /// Default options with a measure-driven initial partition.
    pub fn measure_driven(measure: MeasureDrivenOptions) -> Self {
        Self {
            initial: InitialPartitionKind::MeasureDriven(measure),
            ..Default::default()
        }
    }

    fn quotient_labels(&self) -> QuotientLabels<'_> {
        match (&self.initial, &self.respected_labels) {
            (InitialPartitionKind::MeasureDriven(measure), _) => QuotientLabels::Tags {
                untagged: &measure.phi_label,
            },
            (InitialPartitionKind::Labels, Some(names)) => QuotientLabels::Respected(names),
            _ => QuotientLabels::Representative,
        }
    }
}

/// The coarsest probabilistic bisimulation of a model, optionally with its quotient.
#[derive(Clone, Debug)]
pub struct BisimulationDecomposition<V> {
    partition: Partition<V>,
    class_index: IdVec<BlockId, usize>,
    stats: RefinementStats,
    quotient: Option<Arc<Model<V>>>,
}

impl<V: Weight> BisimulationDecomposition<V> {
    /// Computes the decomposition of `model`.
    ///
    /// `backward` must be the transpose of the model's transition matrix, see
    /// [`SparseMatrix::transpose`].
    pub fn new<C: Comparator<V>>(
        model: &Model<V>,
        backward: &SparseMatrix<V>,
        options: &BisimulationOptions,
        comparator: C,
    ) -> Result<Self, BisimError> {
        check_backward(model, backward, &comparator)?;
        let partition = initial_partition(model, &comparator, options)?;
        Self::refine(partition, model, backward, comparator, options)
    }

    /// Refines a caller supplied partition of the states of `model`.
    ///
    /// Only the quotient related options and the worklist order are used, the initial partition
    /// options are ignored.
    pub fn refine<C: Comparator<V>>(
        partition: Partition<V>,
        model: &Model<V>,
        backward: &SparseMatrix<V>,
        comparator: C,
        options: &BisimulationOptions,
    ) -> Result<Self, BisimError> {
        if partition.state_count() != model.state_count() {
            return Err(BisimError::PartitionSizeMismatch {
                partition: partition.state_count(),
                states: model.state_count(),
            });
        }
        check_backward(model, backward, &comparator)?;

        let initial_blocks = partition.block_count();
        let mut engine =
            RefinementEngine::new(partition, backward, comparator, options.worklist_order)?;
        engine.run();
        let stats = engine.stats();
        let partition = engine.into_partition();

        log::info!(
            "{} states in {} classes, refined from {} blocks using {} splitters",
            partition.state_count(),
            partition.block_count(),
            initial_blocks,
            stats.splitters,
        );

        let quotient = if options.build_quotient {
            let quotient = build_quotient(
                model,
                &partition,
                options.quotient_labels(),
                options.keep_rewards,
            )?;
            Some(Arc::new(quotient))
        } else {
            None
        };

        let mut class_index = IdVec::from_elem(0, partition.block_count());
        for (index, block) in partition.block_ids().enumerate() {
            class_index[block] = index;
        }

        Ok(Self {
            partition,
            class_index,
            stats,
            quotient,
        })
    }
}

impl<V> BisimulationDecomposition<V> {
    /// Number of equivalence classes.
    pub fn class_count(&self) -> usize {
        self.partition.block_count()
    }

    /// The equivalence classes in block list order, each sorted ascending.
    ///
    /// The position of a class matches the corresponding state of the quotient.
    pub fn classes(&self) -> Vec<Vec<StateId>> {
        self.partition
            .block_ids()
            .map(|block| {
                let mut class: Vec<StateId> = self.partition.states_in_block(block).collect();
                class.sort_unstable();
                class
            })
            .collect()
    }

    /// Index of the class containing `state`, which is also its state in the quotient.
    pub fn class_of(&self, state: StateId) -> usize {
        self.class_index[self.partition.block_of(state)]
    }

    /// Whether two states are bisimilar.
    pub fn are_equivalent(&self, state_1: StateId, state_2: StateId) -> bool {
        self.partition.block_of(state_1) == self.partition.block_of(state_2)
    }

    /// Refinement counters.
    pub fn stats(&self) -> RefinementStats {
        self.stats
    }

    /// The quotient, present when it was requested.
    pub fn quotient(&self) -> Option<Arc<Model<V>>> {
        self.quotient.clone()
    }

    /// The stable partition.
    pub fn partition(&self) -> &Partition<V> {
        &self.partition
    }

    /// Returns the stable partition, e.g. for further refinement.
    pub fn into_partition(self) -> Partition<V> {
        self.partition
    }
}

fn check_backward<V, C: Comparator<V>>(
    model: &Model<V>,
    backward: &SparseMatrix<V>,
    comparator: &C,
) -> Result<(), BisimError> {
    let forward = model.transitions();
    if backward.row_count() != forward.row_count() {
        return Err(BisimError::BackwardDimensionMismatch {
            forward: forward.row_count(),
            backward: backward.row_count(),
        });
    }
    if backward.column_count() != forward.row_count() {
        return Err(BisimError::BackwardColumnMismatch {
            states: forward.row_count(),
            columns: backward.column_count(),
        });
    }
    if backward.entry_count() != forward.entry_count() {
        return Err(BisimError::BackwardEntryMismatch {
            forward: forward.entry_count(),
            backward: backward.entry_count(),
        });
    }

    // Rows hold each column once, so with equal entry counts a matching forward entry for every
    // backward entry makes the relations transposes of each other.
    for state in backward.row_ids() {
        for (predecessor, weight) in backward.row(state) {
            let row = forward.row(*predecessor);
            let matches = row
                .binary_search_by_key(&state, |&(target, _)| target)
                .is_ok_and(|position| comparator.is_equal(&row[position].1, weight));
            if !matches {
                return Err(BisimError::BackwardNotTranspose {
                    state,
                    predecessor: *predecessor,
                });
            }
        }
    }
    Ok(())
}
