use std::fmt;

use fixedbitset::FixedBitSet;
use pmctk_ids::Id;

/// Index of a state in a model.
#[derive(Id)]
#[repr(transparent)]
pub struct StateId(u32);

impl fmt::Debug for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A set of states, represented as a bit set indexed by [`StateId::id_index`].
pub type StateSet = FixedBitSet;

/// Builds a state set for a model with `state_count` states.
///
/// # Panics
///
/// Panics when a state is out of range.
#[track_caller]
pub fn state_set_from_iter(state_count: usize, states: impl IntoIterator<Item = StateId>) -> StateSet {
    let mut set = StateSet::with_capacity(state_count);
    for state in states {
        set.insert(state.id_index());
    }
    set
}
