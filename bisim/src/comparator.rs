use num::traits::Zero;

/// Decides equality of weights during refinement.
///
/// Whenever equality can't be asserted, implementations must answer `false`: refinement then
/// keeps the states apart, which never merges states that might differ.
pub trait Comparator<V> {
    /// Whether two weights are considered equal.
    fn is_equal(&self, a: &V, b: &V) -> bool;

    /// Whether a weight is considered zero.
    fn is_zero(&self, value: &V) -> bool;
}

/// Floating point comparison up to a tolerance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpsilonComparator {
    epsilon: f64,
    relative: bool,
}

impl Default for EpsilonComparator {
    fn default() -> Self {
        Self::absolute(1e-6)
    }
}

impl EpsilonComparator {
    /// Values are equal when they differ by at most `epsilon`.
    pub fn absolute(epsilon: f64) -> Self {
        Self {
            epsilon,
            relative: false,
        }
    }

    /// Values are equal when they differ by at most `epsilon` times the larger magnitude.
    pub fn relative(epsilon: f64) -> Self {
        Self {
            epsilon,
            relative: true,
        }
    }

    /// The tolerance.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

impl Comparator<f64> for EpsilonComparator {
    fn is_equal(&self, &a: &f64, &b: &f64) -> bool {
        if a == b {
            return true;
        }
        let difference = (a - b).abs();
        // NaN compares false here
        if self.relative {
            difference <= self.epsilon * a.abs().max(b.abs())
        } else {
            difference <= self.epsilon
        }
    }

    fn is_zero(&self, &value: &f64) -> bool {
        if self.relative {
            value == 0.0
        } else {
            value.abs() <= self.epsilon
        }
    }
}

/// Exact comparison, for weights with exact arithmetic such as rationals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExactComparator;

impl<V: PartialEq + Zero> Comparator<V> for ExactComparator {
    fn is_equal(&self, a: &V, b: &V) -> bool {
        a == b
    }

    fn is_zero(&self, value: &V) -> bool {
        value.is_zero()
    }
}
