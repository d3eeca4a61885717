//! Sum-by-key reduction used to scatter element contributions to global nodes.
use nalgebra::DVector;
use nlfem_optimize::Real;

/// Sums `values` into a dense vector of length `n` according to `keys`.
///
/// Entry `i` of the result is the sum of all `values[k]` with `keys[k] == i`, or zero if no key
/// equals `i`. Duplicate keys accumulate.
///
/// # Panics
///
/// Panics if `keys` and `values` have different lengths, or if any key is not in `0 .. n`.
pub fn scatter_accumulate<T>(keys: &[usize], values: &[T], n: usize) -> DVector<T>
where
    T: Real,
{
    assert_eq!(keys.len(), values.len(), "Every key must have exactly one value.");

    let mut result = DVector::zeros(n);
    for (&key, &value) in keys.iter().zip(values) {
        assert!(key < n, "Key {} is out of bounds for output of length {}.", key, n);
        result[key] += value;
    }
    result
}
