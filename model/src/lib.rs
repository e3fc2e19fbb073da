//! Explicit-state Markov chain models.
//!
//! This crate provides the model representation consumed by the bisimulation minimization in
//! `pmctk-bisim`: sparse transition matrices in compressed row form, state sets, state labelings
//! and reward vectors, bundled into a discrete- or continuous-time Markov chain [`Model`].
//!
//! Transition weights are generic over the [`Weight`] trait, which is implemented for `f64` and
//! for exact rationals ([`num::BigRational`]).
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod labeling;
mod model;
mod sparse;
mod state;
mod weight;

pub use error::ModelError;
pub use labeling::StateLabeling;
pub use model::{Model, ModelBuilder, ModelKind};
pub use sparse::SparseMatrix;
pub use state::{state_set_from_iter, StateId, StateSet};
pub use weight::Weight;
