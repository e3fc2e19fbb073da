//! Partition of the state space into contiguous blocks of a permuted state array.
//!
//! All states are stored in one array, permuted such that every block occupies a contiguous
//! range. Together with the inverse permutation this allows moving a state to either end of its
//! block with a single swap, so splitting a block costs time proportional to the part that is
//! split off instead of to the size of the block.
//!
//! Blocks are kept in an arena indexed by [`BlockId`] and linked into a list ordered by their
//! ranges. Blocks are never removed: a split shrinks a block and inserts the split off part as a
//! new block right after it.

use std::fmt;

use pmctk_ids::{id_vec::IdVec, Id};
use pmctk_model::{StateId, StateSet, Weight};
use thiserror::Error;

use crate::Comparator;

/// Handle of a block within a [`Partition`].
///
/// Block ids are allocated in increasing order and stay valid for the lifetime of the partition.
#[derive(Id)]
#[repr(transparent)]
pub struct BlockId(u32);

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// A block of a [`Partition`], i.e. one equivalence class candidate.
#[derive(Clone, Debug)]
pub struct Block {
    id: BlockId,
    begin: usize,
    end: usize,
    prev: Option<BlockId>,
    next: Option<BlockId>,
    pub(crate) marked_as_splitter: bool,
    pub(crate) marked_as_predecessor: bool,
    pub(crate) marked_position: usize,
    absorbing: bool,
    label: Option<String>,
}

impl Block {
    fn new(id: BlockId, begin: usize, end: usize) -> Self {
        Self {
            id,
            begin,
            end,
            prev: None,
            next: None,
            marked_as_splitter: false,
            marked_as_predecessor: false,
            marked_position: begin,
            absorbing: false,
            label: None,
        }
    }

    /// The handle of this block.
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// First position of this block in the state array.
    pub fn begin(&self) -> usize {
        self.begin
    }

    /// One past the last position of this block in the state array.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of states in the block.
    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    /// Always `false` for blocks of a partition, provided for completeness.
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// The preceding block in list order.
    pub fn prev(&self) -> Option<BlockId> {
        self.prev
    }

    /// The following block in list order.
    pub fn next(&self) -> Option<BlockId> {
        self.next
    }

    /// Whether outgoing transitions of this block's states are ignored during refinement.
    pub fn is_absorbing(&self) -> bool {
        self.absorbing
    }

    /// The optional tag of this block.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Whether the block is currently queued as a splitter.
    pub fn is_marked_as_splitter(&self) -> bool {
        self.marked_as_splitter
    }

    /// Whether the block currently receives probability mass from a splitter.
    pub fn is_marked_as_predecessor(&self) -> bool {
        self.marked_as_predecessor
    }

    /// Scan cursor used while the block is split in place.
    pub fn marked_position(&self) -> usize {
        self.marked_position
    }
}

/// A violated [`Partition`] invariant, reported by [`Partition::check`].
#[allow(missing_docs)]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartitionCheckError {
    #[error("position index of {state:?} is {position} but that slot holds {found:?}")]
    PositionMismatch {
        state: StateId,
        position: usize,
        found: StateId,
    },
    #[error("{state:?} occurs more than once")]
    DuplicateState { state: StateId },
    #[error("{state:?} at position {position} is mapped to {block:?} covering {begin}..{end}")]
    WrongBlock {
        state: StateId,
        position: usize,
        block: BlockId,
        begin: usize,
        end: usize,
    },
    #[error("{block:?} has the empty or inverted range {begin}..{end}")]
    EmptyBlock {
        block: BlockId,
        begin: usize,
        end: usize,
    },
    #[error("{block:?} starts at {begin} but the previous block ends at {expected}")]
    Gap {
        block: BlockId,
        begin: usize,
        expected: usize,
    },
    #[error("{block:?} is not linked back to its neighbor")]
    BrokenLink { block: BlockId },
    #[error("blocks cover {covered} of {states} states")]
    Coverage { covered: usize, states: usize },
    #[error("{block:?} is unreachable from the block list")]
    Unlinked { block: BlockId },
    #[error("{block:?} still carries transient refinement marks")]
    StaleMarks { block: BlockId },
}

/// A partition of the states `0..n` into blocks, with one weight value per state.
///
/// The values are scratch space for refinement: they accumulate the probability mass a state
/// sends into the current splitter and are zero between refinement steps.
#[derive(Clone, Debug)]
pub struct Partition<V> {
    states_and_values: Vec<(StateId, V)>,
    positions: IdVec<StateId, usize>,
    state_to_block: IdVec<StateId, BlockId>,
    blocks: IdVec<BlockId, Block>,
    first_block: Option<BlockId>,
}

impl<V: Weight> Partition<V> {
    /// Creates the uniform partition, consisting of a single block with all states.
    ///
    /// For `state_count == 0` the partition has no blocks.
    pub fn new(state_count: usize) -> Self {
        let states_and_values = (0..state_count)
            .map(|index| (StateId::from_id_index(index), V::zero()))
            .collect();
        let mut blocks = IdVec::default();
        let mut first_block = None;
        if state_count > 0 {
            let id = blocks.next_unused_key();
            blocks.push(Block::new(id, 0, state_count));
            first_block = Some(id);
        }

        Self {
            states_and_values,
            positions: IdVec::from_vec((0..state_count).collect()),
            state_to_block: IdVec::from_elem(BlockId::MIN_ID, state_count),
            blocks,
            first_block,
        }
    }

    /// Creates a partition from groups of states, laid out in the given order.
    ///
    /// Every state must occur in exactly one group. Empty groups don't produce a block. The
    /// partition is built in place, by shrinking a single block from the front and inserting a
    /// block for each group in front of it.
    ///
    /// # Panics
    ///
    /// Panics when the groups don't form a partition of the states.
    #[track_caller]
    pub(crate) fn from_groups(state_count: usize, groups: &[BlockGroup]) -> Self {
        let mut partition = Self::new(state_count);
        let Some(block) = partition.first_block else {
            assert!(groups.iter().all(|group| group.states.is_empty()));
            return partition;
        };

        let mut position = 0;
        for group in groups {
            for &state in &group.states {
                partition.swap_states_at_positions(position, partition.position(state));
                position += 1;
            }
        }
        assert_eq!(position, state_count, "groups don't cover all states");

        let mut groups = groups
            .iter()
            .filter(|group| !group.states.is_empty())
            .peekable();
        let mut begin = 0;
        while let Some(group) = groups.next() {
            if groups.peek().is_none() {
                partition.set_block_attributes(block, group.absorbing, group.label.clone());
                break;
            }
            begin += group.states.len();
            partition.blocks[block].begin = begin;
            partition.blocks[block].marked_position = begin;
            let inserted = partition.insert_block(block);
            partition.set_block_attributes(inserted, group.absorbing, group.label.clone());
        }

        partition
    }

    fn set_block_attributes(&mut self, block: BlockId, absorbing: bool, label: Option<String>) {
        let block = &mut self.blocks[block];
        block.absorbing = absorbing;
        block.label = label;
    }

    /// Sets the value of a state.
    pub fn set_value(&mut self, state: StateId, value: V) {
        let position = self.positions[state];
        self.states_and_values[position].1 = value;
    }

    /// Resets the values of all states to zero.
    pub fn clear_values(&mut self) {
        for (_, value) in &mut self.states_and_values {
            *value = V::zero();
        }
    }

    /// Adds to the value of a state.
    pub fn increase_value(&mut self, state: StateId, value: &V) {
        let position = self.positions[state];
        self.states_and_values[position].1 += value;
    }

    /// Splits every block into the states contained in `states_with_label` and the states that
    /// are not.
    ///
    /// Blocks entirely inside or outside the label set are left untouched, so a second call with
    /// the same set is a no-op. Returns the number of newly created blocks.
    pub fn split_label(&mut self, states_with_label: &StateSet) -> usize {
        let mut created = 0;
        let mut current = self.first_block;
        while let Some(block) = current {
            current = self.blocks[block].next;
            let new_block =
                self.partition_block(block, |state| states_with_label.contains(state.id_index()));
            created += new_block.is_some() as usize;
        }
        created
    }

    /// Moves all states satisfying `predicate` to the front of the block and splits off the rest
    /// if both parts are non-empty, returning the new block for the rest.
    pub fn partition_block(
        &mut self,
        block: BlockId,
        mut predicate: impl FnMut(StateId) -> bool,
    ) -> Option<BlockId> {
        let Block { begin, end, .. } = self.blocks[block];
        if end - begin < 2 {
            return None;
        }

        let mut left = begin;
        let mut right = end - 1;

        let split_at = loop {
            while left <= right && predicate(self.states_and_values[left].0) {
                left += 1
            }
            while left < right && !predicate(self.states_and_values[right].0) {
                right -= 1
            }
            if left >= right {
                break left;
            }
            self.swap_states_at_positions(left, right);
        };

        if split_at == begin || split_at == end {
            return None;
        }

        Some(self.split_block(block, split_at))
    }

    /// Splits `block` into groups of states whose current values the comparator considers equal.
    ///
    /// The block is scanned in place: the states equal to the first state's value are moved to
    /// the front, delimited by [`Block::marked_position`], the rest is split off and the
    /// procedure repeats on the split off part. `new_block` is called for every created block.
    /// Values are left untouched.
    pub fn split_by_values<C: Comparator<V>>(
        &mut self,
        block: BlockId,
        comparator: &C,
        mut new_block: impl FnMut(&mut Self, BlockId),
    ) {
        let mut current = block;
        loop {
            let Block { begin, end, .. } = self.blocks[current];
            if end - begin < 2 {
                break;
            }

            self.blocks[current].marked_position = begin + 1;
            for position in begin + 1..end {
                let marked = self.blocks[current].marked_position;
                if comparator.is_equal(
                    &self.states_and_values[position].1,
                    &self.states_and_values[begin].1,
                ) {
                    self.swap_states_at_positions(position, marked);
                    self.blocks[current].marked_position = marked + 1;
                }
            }

            let marked = self.blocks[current].marked_position;
            self.blocks[current].marked_position = begin;
            if marked == end {
                break;
            }

            let rest = self.split_block(current, marked);
            new_block(self, rest);
            current = rest;
        }
    }

    /// Refines every block by per-state values, such that all states of a block have values the
    /// comparator considers equal. Blocks marked as absorbing are left untouched.
    ///
    /// Values are reset to zero afterwards. Returns the number of newly created blocks.
    pub fn split_by_state_values<C: Comparator<V>>(
        &mut self,
        comparator: &C,
        mut value: impl FnMut(StateId) -> V,
    ) -> usize {
        let mut created = 0;
        let mut current = self.first_block;
        while let Some(block) = current {
            current = self.blocks[block].next;
            if self.blocks[block].absorbing {
                continue;
            }
            let Block { begin, end, .. } = self.blocks[block];
            for position in begin..end {
                let state = self.states_and_values[position].0;
                self.states_and_values[position].1 = value(state);
            }
            self.split_by_values(block, comparator, |_, _| created += 1);
            for (_, slot) in &mut self.states_and_values[begin..end] {
                *slot = V::zero();
            }
        }
        created
    }
}

impl<V> Partition<V> {
    /// Number of states of the partitioned state space.
    pub fn state_count(&self) -> usize {
        self.states_and_values.len()
    }

    /// Number of blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// The first block in list order.
    pub fn first_block(&self) -> Option<BlockId> {
        self.first_block
    }

    /// Returns a block by its handle.
    pub fn block(&self, block: BlockId) -> &Block {
        &self.blocks[block]
    }

    pub(crate) fn block_mut(&mut self, block: BlockId) -> &mut Block {
        &mut self.blocks[block]
    }

    /// Iterates over all blocks in list order, i.e. ordered by their ranges.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> + '_ {
        std::iter::successors(self.first_block.map(|id| &self.blocks[id]), |block| {
            block.next.map(|id| &self.blocks[id])
        })
    }

    /// Iterates over the handles of all blocks in list order.
    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks().map(|block| block.id)
    }

    /// Iterates over the states of a block in their current order.
    pub fn states_in_block(&self, block: BlockId) -> impl Iterator<Item = StateId> + '_ {
        let Block { begin, end, .. } = self.blocks[block];
        self.states_and_values[begin..end]
            .iter()
            .map(|&(state, _)| state)
    }

    /// The block containing a state.
    pub fn block_of(&self, state: StateId) -> BlockId {
        self.state_to_block[state]
    }

    /// The current position of a state in the state array.
    pub fn position(&self, state: StateId) -> usize {
        self.positions[state]
    }

    /// The state at a position of the state array.
    pub fn state_at(&self, position: usize) -> StateId {
        self.states_and_values[position].0
    }

    /// The current value of a state.
    pub fn value(&self, state: StateId) -> &V {
        &self.states_and_values[self.positions[state]].1
    }

    /// The value stored at a position of the state array.
    pub fn value_at(&self, position: usize) -> &V {
        &self.states_and_values[position].1
    }

    /// Exchanges the positions of two states.
    pub fn swap_states(&mut self, state_1: StateId, state_2: StateId) {
        self.swap_states_at_positions(self.positions[state_1], self.positions[state_2]);
    }

    /// Exchanges the states (together with their values) at two positions.
    ///
    /// This doesn't change block membership, so callers have to stay within one block or fix up
    /// the block mapping themselves.
    pub fn swap_states_at_positions(&mut self, position_1: usize, position_2: usize) {
        if position_1 == position_2 {
            return;
        }
        self.states_and_values.swap(position_1, position_2);
        let state_1 = self.states_and_values[position_1].0;
        let state_2 = self.states_and_values[position_2].0;
        self.positions[state_1] = position_1;
        self.positions[state_2] = position_2;
    }

    /// Splits a block at a position strictly inside its range.
    ///
    /// The block keeps `begin..position` and a new block covering `position..end` is inserted
    /// right after it. The new block inherits the absorbing flag and the label. This takes time
    /// proportional to the size of the new block.
    ///
    /// # Panics
    ///
    /// Panics when `position` is not strictly inside the block's range.
    #[track_caller]
    pub fn split_block(&mut self, block: BlockId, position: usize) -> BlockId {
        let old = &self.blocks[block];
        assert!(
            old.begin < position && position < old.end,
            "split position {position} outside of {block:?} covering {}..{}",
            old.begin,
            old.end,
        );
        let old_next = old.next;

        let new_id = self.blocks.next_unused_key();
        let mut new = Block::new(new_id, position, old.end);
        new.prev = Some(block);
        new.next = old_next;
        new.absorbing = old.absorbing;
        new.label = old.label.clone();

        if let Some(next) = old_next {
            self.blocks[next].prev = Some(new_id);
        }

        let old = &mut self.blocks[block];
        old.end = position;
        old.next = Some(new_id);
        old.marked_position = old.marked_position.min(position);

        let range = new.begin..new.end;
        self.blocks.push(new);

        for &(state, _) in &self.states_and_values[range] {
            self.state_to_block[state] = new_id;
        }

        new_id
    }

    /// Inserts a block covering the gap between the preceding block (or the start of the state
    /// array) and `block.begin()`, right before `block`.
    ///
    /// This is used to build a multi-way partition in place: shrink a block from the front, then
    /// insert a block for the freed range. Returns the inserted block.
    ///
    /// # Panics
    ///
    /// Panics when the gap is empty.
    #[track_caller]
    pub fn insert_block(&mut self, block: BlockId) -> BlockId {
        let prev = self.blocks[block].prev;
        let begin = prev.map_or(0, |prev| self.blocks[prev].end);
        let end = self.blocks[block].begin;
        assert!(begin < end, "no gap before {block:?}");

        let new_id = self.blocks.next_unused_key();
        let mut new = Block::new(new_id, begin, end);
        new.prev = prev;
        new.next = Some(block);
        self.blocks.push(new);

        self.blocks[block].prev = Some(new_id);
        match prev {
            Some(prev) => self.blocks[prev].next = Some(new_id),
            None => self.first_block = Some(new_id),
        }

        for &(state, _) in &self.states_and_values[begin..end] {
            self.state_to_block[state] = new_id;
        }

        new_id
    }

    /// Checks all structural invariants, reporting the first violation found.
    ///
    /// This is meant for tests, refinement never depends on it.
    pub fn check(&self) -> Result<(), PartitionCheckError> {
        let state_count = self.state_count();

        let mut seen = StateSet::with_capacity(state_count);
        for (position, &(state, _)) in self.states_and_values.iter().enumerate() {
            if seen.put(state.id_index()) {
                return Err(PartitionCheckError::DuplicateState { state });
            }
            let recorded = self.positions[state];
            if recorded != position {
                return Err(PartitionCheckError::PositionMismatch {
                    state,
                    position: recorded,
                    found: self.states_and_values[recorded].0,
                });
            }
            let block = self.state_to_block[state];
            let Block { begin, end, .. } = self.blocks[block];
            if !(begin..end).contains(&position) {
                return Err(PartitionCheckError::WrongBlock {
                    state,
                    position,
                    block,
                    begin,
                    end,
                });
            }
        }

        let mut expected_begin = 0;
        let mut linked = 0;
        let mut prev = None;
        for block in self.blocks() {
            if block.begin >= block.end {
                return Err(PartitionCheckError::EmptyBlock {
                    block: block.id,
                    begin: block.begin,
                    end: block.end,
                });
            }
            if block.begin != expected_begin {
                return Err(PartitionCheckError::Gap {
                    block: block.id,
                    begin: block.begin,
                    expected: expected_begin,
                });
            }
            if block.prev != prev {
                return Err(PartitionCheckError::BrokenLink { block: block.id });
            }
            if block.marked_as_splitter
                || block.marked_as_predecessor
                || block.marked_position != block.begin
            {
                return Err(PartitionCheckError::StaleMarks { block: block.id });
            }
            expected_begin = block.end;
            prev = Some(block.id);
            linked += 1;
            if linked > self.blocks.len() {
                return Err(PartitionCheckError::BrokenLink { block: block.id });
            }
        }

        if expected_begin != state_count {
            return Err(PartitionCheckError::Coverage {
                covered: expected_begin,
                states: state_count,
            });
        }

        if linked != self.blocks.len() {
            let reachable: Vec<BlockId> = self.block_ids().collect();
            let block = self
                .blocks
                .keys()
                .into_iter()
                .find(|block| !reachable.contains(block))
                .unwrap_or(BlockId::MIN_ID);
            return Err(PartitionCheckError::Unlinked { block });
        }

        Ok(())
    }
}

/// States forming one block of an initial partition built by [`Partition::from_groups`].
#[derive(Clone, Debug, Default)]
pub(crate) struct BlockGroup {
    pub states: Vec<StateId>,
    pub absorbing: bool,
    pub label: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExactComparator;
    use pmctk_model::state_set_from_iter;

    fn s(index: usize) -> StateId {
        StateId::from_id_index(index)
    }

    fn classes(partition: &Partition<u64>) -> Vec<Vec<usize>> {
        let mut classes: Vec<Vec<usize>> = partition
            .block_ids()
            .map(|block| {
                let mut states: Vec<usize> = partition
                    .states_in_block(block)
                    .map(|state| state.id_index())
                    .collect();
                states.sort_unstable();
                states
            })
            .collect();
        classes.sort_unstable();
        classes
    }

    #[test]
    fn uniform_partition() {
        let partition = Partition::<u64>::new(5);
        partition.check().unwrap();
        assert_eq!(partition.block_count(), 1);
        assert_eq!(classes(&partition), [vec![0, 1, 2, 3, 4]]);

        let empty = Partition::<u64>::new(0);
        empty.check().unwrap();
        assert_eq!(empty.block_count(), 0);
    }

    #[test]
    fn split_block_updates_mapping() {
        let mut partition = Partition::<u64>::new(6);
        let first = partition.first_block().unwrap();
        let second = partition.split_block(first, 4);
        partition.check().unwrap();
        let third = partition.split_block(first, 1);
        partition.check().unwrap();

        let order: Vec<BlockId> = partition.block_ids().collect();
        assert_eq!(order, [first, third, second]);
        assert_eq!(partition.block_of(s(0)), first);
        assert_eq!(partition.block_of(s(2)), third);
        assert_eq!(partition.block_of(s(5)), second);
        assert_eq!(partition.block(second).prev(), Some(third));
    }

    #[test]
    #[should_panic]
    fn split_at_block_boundary_panics() {
        let mut partition = Partition::<u64>::new(3);
        let block = partition.first_block().unwrap();
        partition.split_block(block, 3);
    }

    #[test]
    fn swaps_keep_positions_consistent() {
        let mut partition = Partition::<u64>::new(4);
        partition.set_value(s(1), 7);
        partition.swap_states(s(1), s(3));
        assert_eq!(partition.position(s(1)), 3);
        assert_eq!(partition.state_at(1), s(3));
        assert_eq!(*partition.value(s(1)), 7);
        partition.increase_value(s(1), &2);
        assert_eq!(*partition.value_at(3), 9);
        partition.swap_states_at_positions(0, 0);
        partition.check().unwrap();
    }

    #[test]
    fn split_label_is_idempotent() {
        let mut partition = Partition::<u64>::new(8);
        let evens = state_set_from_iter(8, (0..8).step_by(2).map(s));
        let small = state_set_from_iter(8, (0..3).map(s));

        assert_eq!(partition.split_label(&evens), 1);
        partition.check().unwrap();
        assert_eq!(partition.split_label(&evens), 0);
        assert_eq!(partition.split_label(&small), 2);
        partition.check().unwrap();

        assert_eq!(
            classes(&partition),
            [vec![0, 2], vec![1], vec![3, 5, 7], vec![4, 6]]
        );
        for block in partition.block_ids() {
            let inside = partition
                .states_in_block(block)
                .filter(|state| evens.contains(state.id_index()))
                .count();
            assert!(inside == 0 || inside == partition.block(block).len());
        }
    }

    #[test]
    fn groups_built_in_place() {
        let groups = [
            BlockGroup {
                states: vec![s(5)],
                absorbing: true,
                label: Some("psi".into()),
            },
            BlockGroup::default(),
            BlockGroup {
                states: vec![s(4), s(0)],
                absorbing: true,
                label: Some("other".into()),
            },
            BlockGroup {
                states: vec![s(1), s(2), s(3)],
                ..Default::default()
            },
        ];
        let partition = Partition::<u64>::from_groups(6, &groups);
        partition.check().unwrap();
        assert_eq!(partition.block_count(), 3);

        let blocks: Vec<&Block> = partition.blocks().collect();
        assert_eq!(blocks[0].label(), Some("psi"));
        assert!(blocks[0].is_absorbing());
        assert_eq!(blocks[1].label(), Some("other"));
        assert_eq!(blocks[1].len(), 2);
        assert_eq!(blocks[2].label(), None);
        assert!(!blocks[2].is_absorbing());
        assert_eq!(partition.block_of(s(4)), blocks[1].id());
    }

    #[test]
    fn split_by_values_groups_equal_values() {
        let mut partition = Partition::<u64>::new(7);
        let values = [3, 1, 3, 2, 1, 3, 0];
        let created = partition.split_by_state_values(&ExactComparator, |state| {
            values[state.id_index()]
        });
        partition.check().unwrap();
        assert_eq!(created, 3);
        assert_eq!(
            classes(&partition),
            [vec![0, 2, 5], vec![1, 4], vec![3], vec![6]]
        );
        assert!((0..7).all(|index| *partition.value(s(index)) == 0));
    }
}
