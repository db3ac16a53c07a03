//! Batching helper for bulk requests

use crate::{Error, Result};

/// Split `items` into consecutive batches of at most `size` elements
///
/// Order is preserved both across and within batches.
pub fn batches<T: Clone>(items: &[T], size: usize) -> Result<Vec<Vec<T>>> {
    if size == 0 {
        return Err(Error::InvalidInput("Batch size must be positive".to_string()));
    }
    Ok(items.chunks(size).map(<[T]>::to_vec).collect())
}
