//! Chunked iteration helpers shared by the batch executors.

use std::ops::Range;

use crate::jobs::registry::ProgressReporter;

/// Requested chunk size, or the default; never zero.
pub fn effective_chunk_size(requested: Option<usize>, default: usize) -> usize {
    requested.unwrap_or(default).max(1)
}

/// Index ranges of at most `size` covering `0..len`.
pub fn index_chunks(len: usize, size: usize) -> impl Iterator<Item = Range<usize>> {
    let size = size.max(1);
    (0..len)
        .step_by(size)
        .map(move |start| start..(start + size).min(len))
}

/// Maps a flat pair index onto `(left, right)` for a `left × right` cross product.
pub fn pair_at(index: usize, right_len: usize) -> (usize, usize) {
    (index / right_len, index % right_len)
}

/// Between chunks: reports progress, yields to the runtime, and checks cancellation.
/// Returns false when the job was cancelled and work should stop.
pub async fn checkpoint(progress: &ProgressReporter, units: u64) -> bool {
    progress.advance(units).await;
    tokio::task::yield_now().await;
    !progress.is_cancelled().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_chunks_cover_range() {
        let chunks: Vec<Range<usize>> = index_chunks(7, 3).collect();
        assert_eq!(chunks, vec![0..3, 3..6, 6..7]);
        assert_eq!(index_chunks(0, 3).count(), 0);
        assert_eq!(index_chunks(2, 0).count(), 2);
    }

    #[test]
    fn test_pair_at() {
        // 2 candidates × 3 postings
        assert_eq!(pair_at(0, 3), (0, 0));
        assert_eq!(pair_at(4, 3), (1, 1));
        assert_eq!(pair_at(5, 3), (1, 2));
    }

    #[test]
    fn test_effective_chunk_size() {
        assert_eq!(effective_chunk_size(None, 500), 500);
        assert_eq!(effective_chunk_size(Some(0), 500), 1);
        assert_eq!(effective_chunk_size(Some(25), 500), 25);
    }
}
