use thiserror::Error;

use crate::StateId;

/// Errors detected while assembling a [`Model`][crate::Model].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    /// A transition refers to a state outside of the model.
    #[error("transition {from} -> {to} leaves the state space of {states} states")]
    TargetOutOfRange {
        /// Source state of the offending transition.
        from: StateId,
        /// Offending target state.
        to: StateId,
        /// Number of states in the model.
        states: usize,
    },
    /// The transition matrix is not square or doesn't match the state count.
    #[error("transition matrix is {rows}x{columns} but the model has {states} states")]
    MatrixShape {
        /// Row count of the matrix.
        rows: usize,
        /// Column count of the matrix.
        columns: usize,
        /// Number of states in the model.
        states: usize,
    },
    /// A state set or per-state vector has the wrong length.
    #[error("{what} covers {len} states but the model has {states} states")]
    LengthMismatch {
        /// Description of the offending set or vector.
        what: String,
        /// Its length.
        len: usize,
        /// Number of states in the model.
        states: usize,
    },
    /// A continuous-time model was built without exit rates.
    #[error("continuous-time models require exit rates")]
    MissingExitRates,
    /// Exit rates were given for a discrete-time model.
    #[error("discrete-time models cannot have exit rates")]
    UnexpectedExitRates,
    /// A label or reward model name was used twice.
    #[error("duplicate name {0:?}")]
    DuplicateName(String),
}
