//! Errors reported by bisimulation minimization.

use pmctk_model::{ModelError, StateId};
use thiserror::Error;

/// Caller contract violations, detected before refinement starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BisimError {
    /// The backward relation has a different number of rows than the model has states.
    #[error("backward relation has {backward} rows but the model has {forward} states")]
    BackwardDimensionMismatch {
        /// Number of states of the model.
        forward: usize,
        /// Number of rows of the backward relation.
        backward: usize,
    },
    /// The backward relation has a different number of columns than the model has states.
    #[error("backward relation has {columns} columns but the model has {states} states")]
    BackwardColumnMismatch {
        /// Number of states of the model.
        states: usize,
        /// Number of columns of the backward relation.
        columns: usize,
    },
    /// The backward relation has a different number of entries than the forward relation.
    #[error("backward relation has {backward} entries but the forward relation has {forward}")]
    BackwardEntryMismatch {
        /// Number of forward transitions.
        forward: usize,
        /// Number of backward transitions.
        backward: usize,
    },
    /// A backward entry has no matching forward transition of equal weight.
    #[error("backward entry {predecessor} of {state} has no matching forward transition")]
    BackwardNotTranspose {
        /// Row of the backward relation.
        state: StateId,
        /// The listed predecessor.
        predecessor: StateId,
    },
    /// A state set has the wrong size.
    #[error("{what} covers {len} states but the model has {states} states")]
    StateSetSizeMismatch {
        /// Which set is affected.
        what: &'static str,
        /// Size of the set.
        len: usize,
        /// Number of states of the model.
        states: usize,
    },
    /// A caller supplied partition doesn't cover the model's states.
    #[error("partition covers {partition} states but the model has {states} states")]
    PartitionSizeMismatch {
        /// Number of states of the partition.
        partition: usize,
        /// Number of states of the model.
        states: usize,
    },
    /// The prob0 and prob1 state sets intersect.
    #[error("prob0 and prob1 state sets overlap")]
    OverlappingMeasureSets,
    /// Psi states are required for step-bounded properties or when rewards are kept.
    #[error("measure-driven partitions for bounded properties or rewards require psi states")]
    MissingPsiStates,
    /// A label that should be respected doesn't exist in the model.
    #[error("unknown label {0:?}")]
    UnknownLabel(String),
    /// Assembling the quotient failed.
    #[error("building the quotient failed: {0}")]
    Quotient(#[from] ModelError),
}
