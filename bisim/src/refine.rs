//! Worklist driven partition refinement.
//!
//! Each step pops a splitter block and collects, for every state with a transition into the
//! splitter, the probability mass it sends there. Blocks receiving mass are then split such that
//! all members of a resulting block send equal mass into the splitter, where members sending no
//! mass at all form their own group. Every block produced or shrunk by a split becomes a splitter
//! again, so the loop terminates with the coarsest stable refinement of the initial partition.

use std::collections::VecDeque;

use pmctk_model::{SparseMatrix, StateId, Weight};

use crate::{
    partition::{BlockId, Partition},
    BisimError, Comparator,
};

/// Order in which queued splitters are processed.
///
/// The resulting partition doesn't depend on the order, only the block numbering does.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WorklistOrder {
    /// Process splitters in the order they were queued.
    #[default]
    Fifo,
    /// Process the most recently queued splitter first.
    Lifo,
}

/// Counters collected during refinement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefinementStats {
    /// Number of splitters popped from the worklist.
    pub splitters: usize,
    /// Number of blocks created by splits.
    pub splits: usize,
    /// Number of backward edges followed while collecting signatures.
    pub predecessor_edges: usize,
    /// Number of times a block received probability mass from a splitter.
    pub touched_blocks: usize,
}

/// Refines a [`Partition`] to the coarsest probabilistic bisimulation contained in it.
pub struct RefinementEngine<'a, V, C> {
    partition: Partition<V>,
    backward: &'a SparseMatrix<V>,
    comparator: C,
    order: WorklistOrder,
    worklist: VecDeque<BlockId>,
    splitter_states: Vec<StateId>,
    touched_blocks: Vec<BlockId>,
    stats: RefinementStats,
}

impl<'a, V: Weight, C: Comparator<V>> RefinementEngine<'a, V, C> {
    /// Prepares refinement of `partition` using the backward transition relation, i.e. the
    /// transpose of the model's transition matrix.
    ///
    /// Every block of the initial partition is queued as a splitter.
    pub fn new(
        mut partition: Partition<V>,
        backward: &'a SparseMatrix<V>,
        comparator: C,
        order: WorklistOrder,
    ) -> Result<Self, BisimError> {
        let states = partition.state_count();
        if backward.row_count() != states {
            return Err(BisimError::BackwardDimensionMismatch {
                forward: states,
                backward: backward.row_count(),
            });
        }
        if backward.column_count() != states {
            return Err(BisimError::BackwardColumnMismatch {
                states,
                columns: backward.column_count(),
            });
        }

        partition.clear_values();

        let mut engine = Self {
            partition,
            backward,
            comparator,
            order,
            worklist: VecDeque::new(),
            splitter_states: vec![],
            touched_blocks: vec![],
            stats: RefinementStats::default(),
        };

        let initial: Vec<BlockId> = engine.partition.block_ids().collect();
        for block in initial {
            engine.enqueue(block);
        }

        Ok(engine)
    }

    /// The partition in its current state.
    pub fn partition(&self) -> &Partition<V> {
        &self.partition
    }

    /// Counters collected so far.
    pub fn stats(&self) -> RefinementStats {
        self.stats
    }

    /// Returns the partition, refined as far as the engine has run.
    pub fn into_partition(self) -> Partition<V> {
        self.partition
    }

    /// Queues a block as splitter unless it is already queued.
    pub fn enqueue(&mut self, block: BlockId) {
        let block_data = self.partition.block_mut(block);
        if !block_data.marked_as_splitter {
            block_data.marked_as_splitter = true;
            self.worklist.push_back(block);
        }
    }

    fn pop(&mut self) -> Option<BlockId> {
        let block = match self.order {
            WorklistOrder::Fifo => self.worklist.pop_front(),
            WorklistOrder::Lifo => self.worklist.pop_back(),
        }?;
        self.partition.block_mut(block).marked_as_splitter = false;
        Some(block)
    }

    /// Processes splitters until the partition is stable.
    pub fn run(&mut self) {
        log::debug!(
            "refining {} states in {} blocks",
            self.partition.state_count(),
            self.partition.block_count()
        );

        while let Some(splitter) = self.pop() {
            self.refine_partition_by_splitter(splitter);
        }

        log::debug!(
            "stable after {} splitters with {} blocks",
            self.stats.splitters,
            self.partition.block_count()
        );
    }

    /// Processes a single queued splitter, returning `false` when the worklist is empty.
    pub fn step(&mut self) -> bool {
        match self.pop() {
            Some(splitter) => {
                self.refine_partition_by_splitter(splitter);
                true
            }
            None => false,
        }
    }

    fn refine_partition_by_splitter(&mut self, splitter: BlockId) {
        self.stats.splitters += 1;
        log::trace!(
            "splitter {splitter:?} with {} states",
            self.partition.block(splitter).len()
        );

        // Collecting moves states within their blocks, which includes the splitter itself.
        let mut splitter_states = std::mem::take(&mut self.splitter_states);
        splitter_states.clear();
        splitter_states.extend(self.partition.states_in_block(splitter));

        let backward = self.backward;
        for &target in &splitter_states {
            for (predecessor, weight) in backward.row(target) {
                self.add_predecessor_mass(*predecessor, weight);
            }
        }
        self.splitter_states = splitter_states;

        let mut touched_blocks = std::mem::take(&mut self.touched_blocks);
        self.stats.touched_blocks += touched_blocks.len();
        for block in touched_blocks.drain(..) {
            self.refine_block_probabilities(block);
        }
        self.touched_blocks = touched_blocks;
    }

    fn add_predecessor_mass(&mut self, predecessor: StateId, weight: &V) {
        let block = self.partition.block_of(predecessor);
        let block_data = self.partition.block_mut(block);
        if block_data.is_absorbing() {
            return;
        }
        self.stats.predecessor_edges += 1;

        if !block_data.marked_as_predecessor {
            block_data.marked_as_predecessor = true;
            block_data.marked_position = block_data.begin();
            self.touched_blocks.push(block);
        }

        let marked = block_data.marked_position;
        let position = self.partition.position(predecessor);
        if position >= marked {
            self.partition.swap_states_at_positions(position, marked);
            self.partition.block_mut(block).marked_position = marked + 1;
        }

        self.partition.increase_value(predecessor, weight);
    }

    /// Splits a block that received mass from the current splitter by the collected values.
    fn refine_block_probabilities(&mut self, block: BlockId) {
        let block_data = self.partition.block(block);
        let (begin, end) = (block_data.begin(), block_data.end());
        let touched_end = block_data.marked_position();

        // Touched states whose mass cancels out behave as untouched ones.
        let mut nonzero_end = touched_end;
        let mut position = begin;
        while position < nonzero_end {
            if self.comparator.is_zero(self.partition.value_at(position)) {
                nonzero_end -= 1;
                self.partition
                    .swap_states_at_positions(position, nonzero_end);
            } else {
                position += 1;
            }
        }

        let block_data = self.partition.block_mut(block);
        block_data.marked_as_predecessor = false;
        block_data.marked_position = begin;

        let mut created = vec![];
        if nonzero_end > begin {
            if nonzero_end < end {
                created.push(self.partition.split_block(block, nonzero_end));
            }
            self.partition
                .split_by_values(block, &self.comparator, |_, new_block| {
                    created.push(new_block)
                });
        }

        for position in begin..touched_end {
            let state = self.partition.state_at(position);
            self.partition.set_value(state, V::zero());
        }

        if created.is_empty() {
            return;
        }

        log::trace!("split {block:?} into {} blocks", created.len() + 1);
        self.stats.splits += created.len();
        self.enqueue(block);
        for new_block in created {
            self.enqueue(new_block);
        }
    }
}
