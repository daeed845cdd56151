//! Fixed-size windowing for bounded membership filters.
//!
//! The document store rejects "field is one of N values" filters with more
//! than [`IN_FILTER_LIMIT`] values. Callers partition their id list with
//! [`id_windows`], issue one query per window and union the results.

/// Maximum number of values accepted by a single "is one of" filter.
pub const IN_FILTER_LIMIT: usize = 10;

/// Partition `ids` into consecutive windows of at most `size` elements.
///
/// A `size` of zero is treated as one. An empty input yields no windows.
///
/// ```
/// use choreboard_core::id_windows;
///
/// let ids: Vec<u32> = (0..12).collect();
/// let sizes: Vec<usize> = id_windows(&ids, 10).map(<[u32]>::len).collect();
/// assert_eq!(sizes, vec![10, 2]);
/// ```
pub fn id_windows<T>(ids: &[T], size: usize) -> std::slice::Chunks<'_, T> {
    ids.chunks(size.max(1))
}
