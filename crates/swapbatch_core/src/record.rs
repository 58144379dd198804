//! The record reader protocol and the built-in [`Line`] record.
//!
//! A record type is plain data ([`bytemuck::Pod`]) stored right after its
//! chain header. Variable-length content lives in the same batch, claimed
//! from the arena while the record is read, and is referenced from the
//! record through [`Span`]s.

use crate::arena::{ArenaError, BumpArena, Span};
use bytemuck::{Pod, Zeroable};
use std::borrow::Cow;
use std::io::{self, BufRead};
use std::ops::Deref;
use thiserror::Error;

/// Failures reported by a [`RecordReader`].
#[derive(Debug, Error)]
pub enum RecordError {
    /// The arena ran out of space. The sequence may retry in a fresh batch.
    #[error(transparent)]
    Overflow(#[from] ArenaError),

    /// The input does not describe a valid record.
    #[error("malformed record: {0}")]
    Malformed(String),

    /// Reading the input failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RecordError {
    /// Creates a malformed record error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

/// A record type that can be read from a stream into batch space.
///
/// # Contract
///
/// - [`read`](Self::read) deserializes exactly one logical item. The slot for
///   the record value is already reserved; extra space must be claimed with
///   the arena's `alloc*` methods, never by computing offsets by hand.
/// - At a clean end of input, `read` returns `Ok(None)` without consuming
///   any bytes.
/// - Arena overflow must be propagated unchanged (the `?` operator does
///   this), since the sequence replays the item in a new batch. The reader
///   may be invoked again on the same input after such a failure.
pub trait RecordReader: Pod {
    /// Owned form of a record, independent of any mapping.
    type Owned;

    /// Reads one record from `input`, claiming trailer space from `arena`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Overflow`] when the arena is exhausted,
    /// [`RecordError::Malformed`] for invalid input, and
    /// [`RecordError::Io`] if reading fails.
    fn read(
        input: &mut dyn BufRead,
        arena: &mut BumpArena<'_>,
    ) -> Result<Option<Self>, RecordError>;

    /// Copies a stored record, including its trailers, out of the mapping.
    fn detach(view: &RecordView<'_, Self>) -> Self::Owned;
}

/// A stored record together with the batch it lives in.
///
/// The view borrows the mapped batch, so it cannot outlive the next call that
/// loads a different batch.
pub struct RecordView<'a, B> {
    record: &'a B,
    region: &'a [u8],
    batch: usize,
    header: usize,
}

impl<'a, B: Pod> RecordView<'a, B> {
    pub(crate) fn new(record: &'a B, region: &'a [u8], batch: usize, header: usize) -> Self {
        Self {
            record,
            region,
            batch,
            header,
        }
    }

    /// Returns the record value.
    #[must_use]
    pub fn get(&self) -> &'a B {
        self.record
    }

    /// Index of the batch holding the record.
    #[must_use]
    pub fn batch(&self) -> usize {
        self.batch
    }

    /// Offset of the record's chain header within its batch.
    #[must_use]
    pub fn header_offset(&self) -> usize {
        self.header
    }

    /// Returns the bytes covered by `span`, or `None` if it lies outside the
    /// batch.
    #[must_use]
    pub fn bytes(&self, span: Span) -> Option<&'a [u8]> {
        self.region.get(span.range()?)
    }

    /// Returns the values covered by `span`, or `None` if it lies outside the
    /// batch or is not a whole number of aligned `T`.
    #[must_use]
    pub fn slice<T: Pod>(&self, span: Span) -> Option<&'a [T]> {
        bytemuck::try_cast_slice(self.bytes(span)?).ok()
    }
}

impl<B> Deref for RecordView<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        self.record
    }
}

impl<B: std::fmt::Debug> std::fmt::Debug for RecordView<'_, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordView")
            .field("record", self.record)
            .field("batch", &self.batch)
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

/// One line of text, stored without its terminating newline.
///
/// A final line that is not newline-terminated is still a record; an empty
/// line is a record with empty text.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct Line {
    text: Span,
}

impl Line {
    /// Span of the line's text within its batch.
    #[must_use]
    pub fn span(&self) -> Span {
        self.text
    }
}

impl RecordReader for Line {
    type Owned = String;

    fn read(
        input: &mut dyn BufRead,
        arena: &mut BumpArena<'_>,
    ) -> Result<Option<Self>, RecordError> {
        let mut buf = Vec::new();
        if input.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }

        let text = arena.alloc_slice::<u8>(buf.len())?;
        arena.slice_mut::<u8>(text).copy_from_slice(&buf);
        Ok(Some(Self { text }))
    }

    fn detach(view: &RecordView<'_, Self>) -> String {
        view.text().into_owned()
    }
}

impl<'a> RecordView<'a, Line> {
    /// The raw bytes of the line.
    ///
    /// A span pointing outside the batch yields an empty slice.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes(self.record.text).unwrap_or_default()
    }

    /// The line as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_lines(input: &str, words: usize) -> (Vec<Line>, Vec<u64>, Result<(), RecordError>) {
        let mut backing = vec![0u64; words];
        let mut stream = Cursor::new(input.as_bytes());
        let mut lines = Vec::new();
        let outcome = {
            let mut arena = BumpArena::new(bytemuck::cast_slice_mut(&mut backing));
            loop {
                match Line::read(&mut stream, &mut arena) {
                    Ok(Some(line)) => lines.push(line),
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e),
                }
            }
        };
        (lines, backing, outcome)
    }

    fn text_of(backing: &[u64], line: Line) -> String {
        let bytes: &[u8] = bytemuck::cast_slice(backing);
        String::from_utf8(bytes[line.span().range().unwrap()].to_vec()).unwrap()
    }

    #[test]
    fn reads_lines_into_arena() {
        let (lines, backing, outcome) = read_lines("one\ntwo\n", 8);
        outcome.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(text_of(&backing, lines[0]), "one");
        assert_eq!(text_of(&backing, lines[1]), "two");
    }

    #[test]
    fn keeps_empty_and_unterminated_lines() {
        let (lines, backing, outcome) = read_lines("a\n\nlast", 8);
        outcome.unwrap();
        let texts: Vec<_> = lines.iter().map(|&l| text_of(&backing, l)).collect();
        assert_eq!(texts, vec!["a", "", "last"]);
    }

    #[test]
    fn empty_input_is_clean_eof() {
        let (lines, _, outcome) = read_lines("", 8);
        outcome.unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn long_line_overflows() {
        let (_, _, outcome) = read_lines("this line does not fit\n", 1);
        assert!(matches!(outcome, Err(RecordError::Overflow(_))));
    }
}
