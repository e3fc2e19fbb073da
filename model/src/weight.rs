use std::{fmt::Debug, ops::AddAssign};

use num::traits::{One, Zero};

/// Transition weights: probabilities, rates or rewards.
///
/// Minimization only ever adds weights and compares them through an injected comparator, so
/// this is all that is required. The trait is implemented for every type providing these
/// operations, which includes `f64` and [`num::BigRational`].
pub trait Weight: Clone + Debug + Zero + One + for<'a> AddAssign<&'a Self> + Send + Sync {}

impl<T> Weight for T where T: Clone + Debug + Zero + One + for<'a> AddAssign<&'a T> + Send + Sync {}
