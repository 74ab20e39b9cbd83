//! Row-to-batch accumulation shared by the streaming readers.

use crate::core::value::{Batch, Row};

/// Groups a row stream into contiguous batches of a fixed size.
///
/// Tracks the absolute position of every row so each batch knows which
/// records it covers.
#[derive(Debug)]
pub struct RowBatcher {
    batch_size: usize,
    rows: Vec<Row>,
    next_row: u64,
}

impl RowBatcher {
    /// Create a batcher emitting batches of `batch_size` rows (at least one).
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            rows: Vec::with_capacity(batch_size),
            next_row: 0,
        }
    }

    /// Add a row, returning a full batch once `batch_size` rows are held.
    pub fn push(&mut self, row: Row) -> Option<Batch> {
        self.rows.push(row);
        if self.rows.len() >= self.batch_size {
            self.take()
        } else {
            None
        }
    }

    /// Flush the trailing partial batch, if any rows remain.
    pub fn finish(mut self) -> Option<Batch> {
        self.take()
    }

    fn take(&mut self) -> Option<Batch> {
        if self.rows.is_empty() {
            return None;
        }
        let rows = std::mem::replace(&mut self.rows, Vec::with_capacity(self.batch_size));
        let batch = Batch::new(rows, self.next_row);
        self.next_row += batch.len() as u64;
        Some(batch)
    }
}
