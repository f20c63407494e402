use std::error::Error;
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

/// Result with boxed error as trait object.
pub type GenericResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Convenient alias for tests that use `?`.
pub type TestResult = GenericResult<()>;

/// A non-negative distance that may be `+infinity`.
///
/// Unreachable nodes get the infinite value; reduction rules that compare
/// against it treat the candidate as "ignore", never as zero. Addition
/// saturates at infinity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NaturalOrInfinite(u64);

impl NaturalOrInfinite {
    const INFINITE: u64 = u64::MAX;

    pub fn infinity() -> Self {
        NaturalOrInfinite(Self::INFINITE)
    }

    pub fn is_finite(self) -> bool {
        self.0 != Self::INFINITE
    }

    /// Wrap an already-summed distance.
    pub fn from_finite(value: u64) -> Self {
        debug_assert!(value != Self::INFINITE);
        NaturalOrInfinite(value)
    }

    /// The underlying value.
    ///
    /// # Panics
    /// If the value is infinite.
    pub fn finite_value(self) -> u64 {
        assert!(self.is_finite(), "finite_value() called on infinity");
        self.0
    }
}

impl From<u32> for NaturalOrInfinite {
    fn from(value: u32) -> Self {
        NaturalOrInfinite(u64::from(value))
    }
}

impl Add for NaturalOrInfinite {
    type Output = NaturalOrInfinite;

    fn add(self, rhs: NaturalOrInfinite) -> Self::Output {
        if self.is_finite() && rhs.is_finite() {
            NaturalOrInfinite(self.0 + rhs.0)
        } else {
            NaturalOrInfinite::infinity()
        }
    }
}

impl Sum for NaturalOrInfinite {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(0.into(), |a, b| a + b)
    }
}

impl Default for NaturalOrInfinite {
    fn default() -> Self {
        0.into()
    }
}

impl fmt::Debug for NaturalOrInfinite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_finite() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "infinity")
        }
    }
}
