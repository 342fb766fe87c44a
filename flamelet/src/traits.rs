/// Merge another accumulator of the same shape into this one.
///
/// Implementations must be associative and commutative so that partial
/// results computed by independent workers can be combined in any pairing
/// order, independent of how the input was partitioned.
pub trait Mergeable {
    fn merge(&mut self, other: &Self) -> &Self;
}
