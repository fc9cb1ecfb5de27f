//! Splitting work into fixed-size ledger round-trips.

use std::ops::Range;

/// Index ranges covering `0..len` in chunks of `size`.
///
/// A `size` of 0 yields a single batch holding everything.
pub fn batches(len: usize, size: usize) -> impl Iterator<Item = Range<usize>> {
    let size = if size == 0 { len.max(1) } else { size };
    (0..len)
        .step_by(size)
        .map(move |start| start..len.min(start + size))
}
