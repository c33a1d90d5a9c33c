//! Order-preserving partition of the input into batches

/// Number of chunks `len` items split into
pub fn chunk_count(len: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    len.div_ceil(batch_size)
}

/// Split `items` into contiguous chunks of `batch_size`, the last one holding
/// the remainder. A zero batch size yields no chunks.
pub fn chunk_split<T>(items: &[T], batch_size: usize) -> impl Iterator<Item = &[T]> {
    // chunks() panics on zero; an empty source keeps the iterator type uniform
    let source: &[T] = if batch_size == 0 { &[] } else { items };
    source.chunks(batch_size.max(1))
}
