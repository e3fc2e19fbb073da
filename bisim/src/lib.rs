//! Probabilistic bisimulation minimization of Markov chains.
//!
//! States of a discrete- or continuous-time Markov chain are bisimilar when they carry the same
//! labels and move with equal probability into every equivalence class. This crate computes the
//! coarsest such equivalence by signature based partition refinement and optionally collapses
//! the model into its quotient.
//!
//! The entry point is [`BisimulationDecomposition`]. The building blocks, [`Partition`] and
//! [`RefinementEngine`], are exposed for callers that want to drive refinement themselves.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod comparator;
mod decomposition;
mod error;
mod initial;
pub mod partition;
mod quotient;
mod refine;

pub use comparator::{Comparator, EpsilonComparator, ExactComparator};
pub use decomposition::{BisimulationDecomposition, BisimulationOptions};
pub use error::BisimError;
pub use initial::{InitialPartitionKind, MeasureDrivenOptions};
pub use partition::{Block, BlockId, Partition, PartitionCheckError};
pub use quotient::{build_quotient, QuotientLabels};
pub use refine::{RefinementEngine, RefinementStats, WorklistOrder};
