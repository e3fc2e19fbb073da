//! Type checked integer ids and id indexed collections.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod id;
mod id_range;
pub mod id_vec;

/// Derives an [`Id`] instance for a newtype wrapper around an existing [`Id`] type.
///
/// Deriving an [`Id`] instance requires the `#[repr(transparent)]` attribute on the target struct.
///
/// This also derives [`Id`]'s supertraits [`Clone`], [`Copy`], [`PartialEq`], [`Eq`],
/// [`PartialOrd`], [`Ord`] and [`Hash`][core::hash::Hash] by forwarding to the wrapped id, so that
/// comparisons always agree with [`Id::id_index`]. [`Debug`][core::fmt::Debug] is left to the user.
pub use pmctk_derive::Id;

pub use id::Id;

pub use id_range::IdRange;
