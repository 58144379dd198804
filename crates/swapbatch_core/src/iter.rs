//! Forward iteration over a sequence.
//!
//! A [`Cursor`] names a record by `(batch, header offset)`. Cursors are plain
//! values: they can be compared, stored, and dereferenced later through
//! [`BatchSequence::record`], which maps the owning batch on demand.
//! [`BatchIter`] wraps a cursor and the sequence it walks.

use crate::chain::{self, Link};
use crate::error::{CoreError, CoreResult};
use crate::record::{RecordReader, RecordView};
use crate::sequence::BatchSequence;
use std::iter::FusedIterator;

/// Position of a record in a sequence.
///
/// A live cursor always rests on a record: positions that would land on the
/// end of a batch's chain move on to the next non-empty batch, or to
/// [`Cursor::End`] if there is none. All end cursors are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cursor {
    /// The record introduced by the header at `header` in batch `batch`.
    At {
        /// Batch index.
        batch: usize,
        /// Byte offset of the record's header within the batch.
        header: usize,
    },
    /// Past the last record.
    End,
}

impl Cursor {
    /// Returns `true` for the end position.
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }

    /// Batch index, unless at the end.
    #[must_use]
    pub fn batch(&self) -> Option<usize> {
        match self {
            Self::At { batch, .. } => Some(*batch),
            Self::End => None,
        }
    }
}

impl<B: RecordReader> BatchSequence<B> {
    /// Cursor to the first record, or [`Cursor::End`] if there are none.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a batch cannot be mapped, or
    /// [`CoreError::CorruptBatch`] if a chain is damaged.
    pub fn begin(&mut self) -> CoreResult<Cursor> {
        self.settle(0, 0)
    }

    /// The end cursor.
    #[must_use]
    pub fn end(&self) -> Cursor {
        Cursor::End
    }

    /// Cursor to the record after `cursor`. The end cursor stays at the end.
    ///
    /// # Errors
    ///
    /// See [`begin`](Self::begin).
    pub fn next_cursor(&mut self, cursor: Cursor) -> CoreResult<Cursor> {
        let Cursor::At { batch, header } = cursor else {
            return Ok(Cursor::End);
        };
        self.load_batch(batch)?;
        match chain::follow::<B>(self.region()?.as_slice(), batch, header)? {
            Link::Next(next) => self.settle(batch, next),
            Link::Terminal => self.settle(batch + 1, 0),
        }
    }

    /// The record at `cursor`, mapping its batch if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CursorAtEnd`] for the end cursor,
    /// [`CoreError::BatchOutOfRange`] for a cursor into a missing batch, or
    /// [`CoreError::CorruptBatch`] if no record lives at the cursor.
    pub fn record(&mut self, cursor: Cursor) -> CoreResult<RecordView<'_, B>> {
        let Cursor::At { batch, header } = cursor else {
            return Err(CoreError::CursorAtEnd);
        };
        self.load_batch(batch)?;
        let region = self.region()?.as_slice();
        if chain::follow::<B>(region, batch, header)? == Link::Terminal {
            return Err(CoreError::corrupt_batch(
                batch,
                header,
                "cursor rests on the end of the chain",
            ));
        }
        let record = chain::record_at::<B>(region, batch, header)?;
        Ok(RecordView::new(record, region, batch, header))
    }

    /// Returns an iterator over owned copies of every record.
    pub fn iter(&mut self) -> BatchIter<'_, B> {
        BatchIter {
            seq: self,
            cursor: None,
        }
    }

    /// First record at or after `header` in `batch`, moving on through later
    /// batches while chains are empty.
    fn settle(&mut self, mut batch: usize, mut header: usize) -> CoreResult<Cursor> {
        while batch < self.n_batches() {
            self.load_batch(batch)?;
            if let Link::Next(_) = chain::follow::<B>(self.region()?.as_slice(), batch, header)? {
                return Ok(Cursor::At { batch, header });
            }
            batch += 1;
            header = 0;
        }
        Ok(Cursor::End)
    }
}

/// A restartable, forward-only walk over a sequence.
///
/// The walk starts lazily at the first record. As an [`Iterator`] it yields
/// owned records ([`RecordReader::Owned`]); [`get`](Self::get) and
/// [`advance`](Self::advance) walk the mapped records in place. After an
/// error the iterator is at its end.
pub struct BatchIter<'s, B: RecordReader> {
    seq: &'s mut BatchSequence<B>,
    cursor: Option<Cursor>,
}

impl<B: RecordReader> BatchIter<'_, B> {
    /// Current position.
    ///
    /// # Errors
    ///
    /// See [`BatchSequence::begin`].
    pub fn cursor(&mut self) -> CoreResult<Cursor> {
        match self.cursor {
            Some(cursor) => Ok(cursor),
            None => {
                let cursor = self.seq.begin()?;
                self.cursor = Some(cursor);
                Ok(cursor)
            }
        }
    }

    /// Returns `true` once the walk has passed the last record.
    ///
    /// # Errors
    ///
    /// See [`BatchSequence::begin`].
    pub fn is_end(&mut self) -> CoreResult<bool> {
        Ok(self.cursor()?.is_end())
    }

    /// The record at the current position.
    ///
    /// # Errors
    ///
    /// See [`BatchSequence::record`].
    pub fn get(&mut self) -> CoreResult<RecordView<'_, B>> {
        let cursor = self.cursor()?;
        self.seq.record(cursor)
    }

    /// Moves to the next record.
    ///
    /// # Errors
    ///
    /// See [`BatchSequence::next_cursor`].
    pub fn advance(&mut self) -> CoreResult<()> {
        let cursor = self.cursor()?;
        self.cursor = Some(self.seq.next_cursor(cursor)?);
        Ok(())
    }

    /// Returns to the first record.
    pub fn restart(&mut self) {
        self.cursor = None;
    }

    fn step(&mut self) -> CoreResult<Option<B::Owned>> {
        let cursor = self.cursor()?;
        if cursor.is_end() {
            return Ok(None);
        }
        let owned = B::detach(&self.seq.record(cursor)?);
        self.cursor = Some(self.seq.next_cursor(cursor)?);
        Ok(Some(owned))
    }
}

impl<B: RecordReader> Iterator for BatchIter<'_, B> {
    type Item = CoreResult<B::Owned>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Ok(owned) => owned.map(Ok),
            Err(e) => {
                self.cursor = Some(Cursor::End);
                Some(Err(e))
            }
        }
    }
}

impl<B: RecordReader> FusedIterator for BatchIter<'_, B> {}

impl<B: RecordReader> std::fmt::Debug for BatchIter<'_, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchIter")
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::HEADER_SIZE;
    use crate::config::BatchConfig;
    use crate::record::Line;
    use std::io::Cursor as Input;
    use tempfile::{tempdir, TempDir};

    const SHORT: usize = size_of::<Line>() + 2 * HEADER_SIZE;
    const TWO_SHORT: usize = HEADER_SIZE + 2 * SHORT;

    fn sequence(lines: &str) -> (TempDir, BatchSequence<Line>) {
        let dir = tempdir().unwrap();
        let config = BatchConfig::new(dir.path().join("iter."), TWO_SHORT);
        let mut seq = BatchSequence::create(config).unwrap();
        seq.read_all(&mut Input::new(lines)).unwrap();
        (dir, seq)
    }

    #[test]
    fn iterates_in_insertion_order() {
        let (_dir, mut seq) = sequence("a\nbb\nccc\ndddd\ne\n");

        let lines: Vec<String> = seq.iter().collect::<CoreResult<_>>().unwrap();
        assert_eq!(lines, ["a", "bb", "ccc", "dddd", "e"]);

        let mut visited = Vec::new();
        seq.enumerate(|line| visited.push(line.text().into_owned())).unwrap();
        assert_eq!(lines, visited);
    }

    #[test]
    fn empty_sequence_begins_at_end() {
        let (_dir, mut seq) = sequence("");
        assert_eq!(seq.begin().unwrap(), Cursor::End);
        assert_eq!(seq.begin().unwrap(), seq.end());
        assert_eq!(seq.iter().count(), 0);
    }

    #[test]
    fn cursors_name_batch_and_header() {
        let (_dir, mut seq) = sequence("a\nb\nc\n");

        let first = seq.begin().unwrap();
        assert_eq!(first, Cursor::At { batch: 0, header: 0 });
        let second = seq.next_cursor(first).unwrap();
        assert_eq!(second, Cursor::At { batch: 0, header: SHORT });
        let third = seq.next_cursor(second).unwrap();
        assert_eq!(third, Cursor::At { batch: 1, header: 0 });
        let end = seq.next_cursor(third).unwrap();
        assert!(end.is_end());
        assert_eq!(seq.next_cursor(end).unwrap(), Cursor::End);
    }

    #[test]
    fn record_maps_owning_batch() {
        let (_dir, mut seq) = sequence("a\nb\nc\n");
        let first = seq.begin().unwrap();
        seq.load_batch(1).unwrap();

        let record = seq.record(first).unwrap();
        assert_eq!(record.text(), "a");
        assert_eq!(seq.loaded_batch(), Some(0));
    }

    #[test]
    fn record_at_end_fails() {
        let (_dir, mut seq) = sequence("a\n");
        assert!(matches!(seq.record(Cursor::End), Err(CoreError::CursorAtEnd)));
    }

    #[test]
    fn skips_empty_batches() {
        let (_dir, mut seq) = sequence("a\n");
        seq.create_next_batch().unwrap();
        seq.create_next_batch().unwrap();
        seq.read_all(&mut Input::new("b\n")).unwrap();
        assert_eq!(seq.records_per_batch().unwrap(), [1, 0, 1]);

        let first = seq.begin().unwrap();
        let second = seq.next_cursor(first).unwrap();
        assert_eq!(second, Cursor::At { batch: 2, header: 0 });

        let lines: Vec<String> = seq.iter().collect::<CoreResult<_>>().unwrap();
        assert_eq!(lines, ["a", "b"]);
    }

    #[test]
    fn walks_in_place_and_restarts() {
        let (_dir, mut seq) = sequence("x\ny\nz\n");
        let mut iter = seq.iter();

        let mut seen = Vec::new();
        while !iter.is_end().unwrap() {
            seen.push(iter.get().unwrap().text().into_owned());
            iter.advance().unwrap();
        }
        assert_eq!(seen, ["x", "y", "z"]);
        assert!(iter.next().is_none());

        iter.restart();
        assert_eq!(iter.next().unwrap().unwrap(), "x");
    }
}
