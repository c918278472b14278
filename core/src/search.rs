//! Search helpers shared by the first stop finders and the decompression
//! stop length search.

use crate::error::EngineError;

/// Find the largest `k` in `[0, n)` for which `f(k)` is true.
///
/// `f` must be true for a prefix of the range and false afterwards.
/// Returns `None` when `f(0)` is false.
pub fn bisect_find<F>(n: usize, mut f: F) -> Result<Option<usize>, EngineError>
where
    F: FnMut(usize) -> Result<bool, EngineError>,
{
    let mut lo = 0;
    let mut hi = n;
    while lo < hi {
        let k = (lo + hi) / 2;
        if f(k)? {
            lo = k + 1;
        } else {
            hi = k;
        }
    }
    Ok(lo.checked_sub(1))
}

/// Apply `f` while `predicate` holds for the produced value.
///
/// Returns the last value for which the predicate was true, or `start`
/// when the first produced value already breaks it. At most `limit`
/// applications of `f` are made.
pub fn recurse_while<T, P, F>(
    mut predicate: P,
    mut f: F,
    start: T,
    limit: usize,
) -> Result<T, EngineError>
where
    P: FnMut(&T) -> Result<bool, EngineError>,
    F: FnMut(&T) -> Result<T, EngineError>,
{
    let mut value = start;
    for _ in 0..limit {
        let next = f(&value)?;
        if !predicate(&next)? {
            return Ok(value);
        }
        value = next;
    }
    Err(EngineError::Consistency(format!(
        "search did not finish after {limit} iterations"
    )))
}
