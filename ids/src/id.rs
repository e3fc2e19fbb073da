use core::{fmt::Debug, hash::Hash};

/// Types that represent integer ids
///
/// A type of this trait represents an `usize` index value in the range `0..=Self::MAX_ID_INDEX`,
/// with the specific representation used being up to the implementing type. Implementing types
/// can be smaller than `usize`, which keeps id indexed tables compact.
///
/// Implementations are expected to compare, order and hash exactly like the represented index.
/// Implementations obtained via `#[derive(Id)]` guarantee this.
pub trait Id: Copy + Ord + Hash + Send + Sync + Debug {
    /// The largest index representable by this id type.
    const MAX_ID_INDEX: usize;
    /// The id with index zero.
    const MIN_ID: Self;
    /// The id with the largest representable index.
    const MAX_ID: Self;

    /// Returns the id with a given index, panicking when the index is invalid.
    ///
    /// This panics if and only if `index > Self::MAX_ID_INDEX`.
    #[track_caller]
    fn from_id_index(index: usize) -> Self {
        match Self::try_from_id_index(index) {
            Some(id) => id,
            None => panic!(
                "index {index} exceeds the maximal id index {}",
                Self::MAX_ID_INDEX
            ),
        }
    }

    /// Returns the id with a given index, if it is valid.
    ///
    /// This returns `None` if and only if `index > Self::MAX_ID_INDEX`.
    fn try_from_id_index(index: usize) -> Option<Self>;

    /// Returns the index represented by this id.
    fn id_index(self) -> usize;

    /// Returns a value of another [`Id`] type having the same index.
    ///
    /// Panics when the index is not valid for the target type.
    #[inline(always)]
    #[track_caller]
    fn cast_into_id<T: Id>(self) -> T {
        T::from_id_index(self.id_index())
    }
}

macro_rules! impl_primitive_id {
    ($($ty:ty),*) => {$(
        impl Id for $ty {
            const MAX_ID_INDEX: usize = {
                if (<$ty>::MAX as u128) < usize::MAX as u128 {
                    <$ty>::MAX as usize
                } else {
                    usize::MAX
                }
            };
            const MIN_ID: Self = 0;
            const MAX_ID: Self = Self::MAX_ID_INDEX as $ty;

            #[inline(always)]
            fn try_from_id_index(index: usize) -> Option<Self> {
                <$ty>::try_from(index).ok()
            }

            #[inline(always)]
            fn id_index(self) -> usize {
                self as usize
            }
        }
    )*};
}

impl_primitive_id!(u8, u16, u32, usize);

#[cfg(target_pointer_width = "64")]
impl_primitive_id!(u64);
