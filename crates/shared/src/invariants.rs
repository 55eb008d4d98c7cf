//! Bounded integers for validated settings.
//!
//! Buffer sizes, flush intervals and request timeouts are carried as
//! `Bounded*` values once the configuration layer has checked them, so the
//! runtime never re-validates a range.

use crate::{ErrorCode, ErrorEnvelope};
use std::fmt;

/// Out-of-range error for bounded numeric wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundsError<T> {
    /// Raw value provided.
    pub value: T,
    /// Inclusive minimum.
    pub min: T,
    /// Inclusive maximum.
    pub max: T,
}

impl<T: fmt::Display> BoundsError<T> {
    /// Convert into an `invalid_input` envelope naming the offending setting.
    pub fn into_envelope(self, field: &str) -> ErrorEnvelope {
        ErrorEnvelope::expected(
            ErrorCode::invalid_input(),
            format!("{field} must be between {} and {}", self.min, self.max),
        )
        .with_metadata("field", field)
        .with_metadata("value", self.value.to_string())
    }
}

impl<T: fmt::Display> fmt::Display for BoundsError<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "value {} is outside [{}, {}]",
            self.value, self.min, self.max
        )
    }
}

impl<T: fmt::Debug + fmt::Display> std::error::Error for BoundsError<T> {}

macro_rules! bounded_int {
    ($(#[$meta:meta])* $name:ident, $int:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name<const MIN: $int, const MAX: $int>($int);

        impl<const MIN: $int, const MAX: $int> $name<MIN, MAX> {
            /// Create a bounded value when within the inclusive range.
            pub const fn new(value: $int) -> Option<Self> {
                if value < MIN || value > MAX {
                    None
                } else {
                    Some(Self(value))
                }
            }

            /// Create a bounded value or return a bounds error.
            pub const fn try_new(value: $int) -> Result<Self, BoundsError<$int>> {
                match Self::new(value) {
                    Some(value) => Ok(value),
                    None => Err(BoundsError {
                        value,
                        min: MIN,
                        max: MAX,
                    }),
                }
            }

            /// Return the wrapped value.
            pub const fn get(self) -> $int {
                self.0
            }
        }

        impl<const MIN: $int, const MAX: $int> fmt::Display for $name<MIN, MAX> {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(formatter)
            }
        }
    };
}

bounded_int!(
    /// Bounded `u32` with const generic limits.
    BoundedU32,
    u32
);
bounded_int!(
    /// Bounded `u64` with const generic limits.
    BoundedU64,
    u64
);
bounded_int!(
    /// Bounded `usize` with const generic limits.
    BoundedUsize,
    usize
);

#[cfg(test)]
mod tests {
    use super::*;

    type CommitSize = BoundedU32<1, 100_000>;

    #[test]
    fn accepts_inclusive_edges() {
        assert_eq!(CommitSize::new(1).map(CommitSize::get), Some(1));
        assert_eq!(CommitSize::new(100_000).map(CommitSize::get), Some(100_000));
        assert!(CommitSize::new(0).is_none());
        assert!(BoundedUsize::<2, 4>::new(5).is_none());
    }

    #[test]
    fn bounds_error_names_the_setting() {
        let error = BoundedU64::<100, 600_000>::try_new(5)
            .err()
            .map(|error| error.into_envelope("store.timeoutMs"));
        assert_eq!(
            error.as_ref().map(|error| error.message.as_str()),
            Some("store.timeoutMs must be between 100 and 600000")
        );
        assert_eq!(
            error.as_ref().and_then(|error| error.metadata_value("value")),
            Some("5")
        );
    }
}
