//! The batch sequence: records spread over fixed-size, memory-mapped files.
//!
//! Records are appended to the last batch until one does not fit, at which
//! point the input is rewound to the start of that record, a new batch file
//! is created, and the record is read again. At most one batch is mapped at
//! any time; reading an older batch unmaps the one being written, and the
//! next append maps the last batch again.
//!
//! The write position (the terminal header and the arena cursor of the last
//! batch) is kept as offsets, so it survives any number of remaps.

use crate::arena::{BumpArena, Slot};
use crate::chain::{self, Link, HEADER_SIZE};
use crate::config::BatchConfig;
use crate::error::{CoreError, CoreResult};
use crate::record::{RecordError, RecordReader, RecordView};
use crate::stats::BatchStats;
use std::io::{BufRead, Seek, SeekFrom};
use std::marker::PhantomData;
use std::path::PathBuf;
use swapbatch_storage::{remove_if_exists, MappedRegion};
use tracing::{debug, trace, warn};

/// What the sequence currently has mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    /// No batch is mapped.
    Empty,
    /// The last batch is mapped read/write.
    Writing(usize),
    /// A batch is mapped read-only.
    Reading(usize),
}

/// Write position in the last batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WritePosition {
    /// Offset of the terminal (zero) header.
    tail: usize,
    /// Arena cursor: first byte past the terminal header.
    top: usize,
}

impl WritePosition {
    const FRESH: Self = Self {
        tail: 0,
        top: HEADER_SIZE,
    };
}

/// Progress of one append through the overflow-retry protocol.
#[derive(Debug, Clone, Copy)]
enum Attempt {
    /// Reading into the batch that was current when the append started.
    First,
    /// Reading again after rolling over; holds the previous write position
    /// so the rollover can be undone.
    Retry(WritePosition),
}

/// A record appended by [`write_record`], by offset.
struct Appended {
    header: usize,
    next: WritePosition,
}

/// An out-of-core sequence of records of type `B`.
///
/// # Example
///
/// ```no_run
/// use swapbatch_core::{BatchConfig, BatchSequence, Line};
/// use std::io::Cursor;
///
/// let config = BatchConfig::new("/tmp/lines.", 1 << 20);
/// let mut seq = BatchSequence::<Line>::create(config)?;
/// seq.read_all(&mut Cursor::new("alpha\nbeta\n"))?;
///
/// let mut seen = Vec::new();
/// seq.enumerate(|line| seen.push(line.text().into_owned()))?;
/// assert_eq!(seen, ["alpha", "beta"]);
/// # Ok::<(), swapbatch_core::CoreError>(())
/// ```
pub struct BatchSequence<B: RecordReader> {
    config: BatchConfig,
    region: Option<MappedRegion>,
    loaded: Option<usize>,
    n_batch: usize,
    total_items: usize,
    write: WritePosition,
    autodelete: bool,
    _record: PhantomData<fn() -> B>,
}

impl<B: RecordReader> BatchSequence<B> {
    /// Creates a new sequence and its first batch, `<basename>0`.
    ///
    /// Existing files with the same names are truncated as batches are
    /// created.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] for an unusable configuration or
    /// a storage error if the first batch cannot be created.
    pub fn create(config: BatchConfig) -> CoreResult<Self> {
        config.validate()?;
        let autodelete = config.autodelete;
        let mut seq = Self::with_config(config, autodelete);
        seq.create_next_batch()?;
        Ok(seq)
    }

    /// Attaches to batch files left behind by a preserved sequence.
    ///
    /// Batches `<basename>0, <basename>1, …` are discovered until the first
    /// missing index. Every chain is validated, the record count is rebuilt,
    /// and appends resume at the end of the last batch. The attached
    /// sequence preserves its files on drop unless
    /// [`autodelete`](Self::autodelete) is called.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if `<basename>0` does not exist,
    /// [`CoreError::CorruptBatch`] if a chain is damaged, or a storage error
    /// if a batch has the wrong size or cannot be mapped.
    pub fn open(config: BatchConfig) -> CoreResult<Self> {
        config.validate()?;
        let n_batch = (0..)
            .take_while(|&i| config.batch_path(i).exists())
            .count();
        if n_batch == 0 {
            return Err(CoreError::NotFound {
                basename: config.basename,
            });
        }

        let mut seq = Self::with_config(config, false);
        seq.n_batch = n_batch;
        for batch in 0..n_batch {
            seq.load_batch(batch)?;
            let (count, tail) = chain::measure::<B>(seq.region()?.as_slice(), batch)?;
            seq.total_items += count;
            seq.write = WritePosition {
                tail,
                top: tail + HEADER_SIZE,
            };
        }

        debug!(
            basename = %seq.config.basename.display(),
            batches = n_batch,
            items = seq.total_items,
            "attached to preserved batches"
        );
        Ok(seq)
    }

    fn with_config(config: BatchConfig, autodelete: bool) -> Self {
        Self {
            config,
            region: None,
            loaded: None,
            n_batch: 0,
            total_items: 0,
            write: WritePosition::FRESH,
            autodelete,
            _record: PhantomData,
        }
    }

    /// Creates batch `n_batches()` and makes it the batch being written.
    ///
    /// The new batch holds an empty chain: a single zero header.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file cannot be created or mapped.
    pub fn create_next_batch(&mut self) -> CoreResult<()> {
        let index = self.n_batch;
        let path = self.batch_path(index);
        debug!(batch = index, path = %path.display(), "creating batch");

        self.unload()?;
        let mut region =
            MappedRegion::create(&path, self.config.batch_size, self.config.region_options())?;

        let mut arena = BumpArena::new(region.as_mut_slice()?);
        let tail = arena.alloc::<usize>()?;
        *arena.get_mut(tail) = 0;
        self.write = WritePosition {
            tail: tail.offset(),
            top: arena.used(),
        };

        self.region = Some(region);
        self.loaded = Some(index);
        self.n_batch += 1;
        Ok(())
    }

    /// Maps batch `index` read-only, unmapping whatever was loaded.
    ///
    /// Loading the batch that is already mapped is a no-op, whether it is
    /// mapped for reading or writing.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BatchOutOfRange`] if `index >= n_batches()`, or a
    /// storage error if the file cannot be mapped.
    pub fn load_batch(&mut self, index: usize) -> CoreResult<()> {
        if self.loaded == Some(index) {
            return Ok(());
        }
        if index >= self.n_batch {
            return Err(CoreError::BatchOutOfRange {
                index,
                n_batches: self.n_batch,
            });
        }

        self.unload()?;
        let path = self.batch_path(index);
        trace!(batch = index, "loading batch");
        self.region = Some(MappedRegion::reopen(&path, self.config.batch_size, false)?);
        self.loaded = Some(index);
        Ok(())
    }

    /// Reads one record from `input` and chains it into the last batch.
    ///
    /// Returns `None` at a clean end of input. If the record does not fit in
    /// the current batch, the input is rewound to where the record started
    /// and it is read again into a new batch. A record that does not fit even
    /// in an empty batch fails with [`CoreError::RecordTooLarge`] and leaves
    /// the batch count unchanged.
    ///
    /// After a failed append the chain and the batch count are exactly as
    /// they were before the call, and the input is left wherever the reader
    /// stopped.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RecordTooLarge`] for oversize records,
    /// [`CoreError::CorruptInput`] if the input ends mid-record or the reader
    /// rejects it, [`CoreError::Io`] if the input cannot be repositioned, or
    /// a storage error if a batch cannot be created or mapped.
    pub fn append<R: BufRead + Seek>(
        &mut self,
        input: &mut R,
    ) -> CoreResult<Option<RecordView<'_, B>>> {
        let start = input.stream_position()?;
        if input.fill_buf()?.is_empty() {
            return Ok(None);
        }
        let mut attempt = Attempt::First;

        let appended = loop {
            self.ensure_writable()?;
            let write = self.write;
            let buf = self.region_mut()?.as_mut_slice()?;

            let failure = match write_record::<B>(buf, write, &mut *input) {
                Ok(Some(appended)) => break appended,
                Ok(None) => (input.stream_position()? != start)
                    .then(|| CoreError::corrupt_input("input ended mid-record")),
                Err(RecordError::Overflow(overflow)) => match attempt {
                    // An empty batch is as large as a batch gets.
                    Attempt::First if write.tail == 0 => Some(self.too_large()),
                    Attempt::First => {
                        debug!(batch = self.n_batch - 1, %overflow, "batch full, rolling over");
                        input.seek(SeekFrom::Start(start))?;
                        self.create_next_batch()?;
                        attempt = Attempt::Retry(write);
                        continue;
                    }
                    Attempt::Retry(_) => Some(self.too_large()),
                },
                Err(RecordError::Malformed(message)) => Some(CoreError::corrupt_input(message)),
                Err(RecordError::Io(e)) => Some(CoreError::corrupt_input(e.to_string())),
            };

            // Nothing was stored, so the batch opened for this record goes too.
            if let Attempt::Retry(previous) = attempt {
                self.undo_rollover(previous)?;
            }
            return match failure {
                Some(e) => Err(e),
                None => Ok(None),
            };
        };

        self.total_items += 1;
        self.write = appended.next;

        let batch = self.n_batch - 1;
        trace!(batch, header = appended.header, items = self.total_items, "appended record");
        let region = self.region()?.as_slice();
        let record = chain::record_at::<B>(region, batch, appended.header)?;
        Ok(Some(RecordView::new(record, region, batch, appended.header)))
    }

    /// Appends records until `input` is exhausted.
    ///
    /// Returns the number of records stored by this call.
    ///
    /// # Errors
    ///
    /// Stops at the first failed append and returns its error; records stored
    /// before it remain in the sequence.
    pub fn read_all<R: BufRead + Seek>(&mut self, input: &mut R) -> CoreResult<usize> {
        let mut count = 0;
        while self.append(input)?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    /// Appends records until `input` is exhausted, visiting each one as it
    /// is stored.
    ///
    /// # Errors
    ///
    /// See [`read_all`](Self::read_all).
    pub fn read_all_with<R, F>(&mut self, input: &mut R, mut visit: F) -> CoreResult<usize>
    where
        R: BufRead + Seek,
        F: FnMut(RecordView<'_, B>),
    {
        let mut count = 0;
        while let Some(record) = self.append(input)? {
            visit(record);
            count += 1;
        }
        Ok(count)
    }

    /// Visits every record in insertion order, batch by batch.
    ///
    /// Returns the number of records visited.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a batch cannot be mapped, or
    /// [`CoreError::CorruptBatch`] if a chain is damaged.
    pub fn enumerate<F>(&mut self, mut visit: F) -> CoreResult<usize>
    where
        F: FnMut(RecordView<'_, B>),
    {
        let mut count = 0;
        for batch in 0..self.n_batch {
            self.load_batch(batch)?;
            let region = self.region()?.as_slice();

            let mut header = 0;
            while let Link::Next(next) = chain::follow::<B>(region, batch, header)? {
                let record = chain::record_at::<B>(region, batch, header)?;
                visit(RecordView::new(record, region, batch, header));
                count += 1;
                header = next;
            }
        }
        Ok(count)
    }

    /// Returns the number of records in each batch, in batch order.
    ///
    /// # Errors
    ///
    /// See [`enumerate`](Self::enumerate).
    pub fn records_per_batch(&mut self) -> CoreResult<Vec<usize>> {
        let mut counts = Vec::with_capacity(self.n_batch);
        for batch in 0..self.n_batch {
            self.load_batch(batch)?;
            let (count, _) = chain::measure::<B>(self.region()?.as_slice(), batch)?;
            counts.push(count);
        }
        Ok(counts)
    }

    /// Removes every batch file and consumes the sequence.
    ///
    /// Unlike dropping an autodeleting sequence, removal failures are
    /// reported. Files are removed even if the sequence was preserved.
    ///
    /// # Errors
    ///
    /// Returns the first removal failure; removal continues past it.
    pub fn discard(mut self) -> CoreResult<()> {
        self.autodelete = false;
        self.remove_batches()
    }

    /// Keeps batch files on disk when the sequence is dropped.
    pub fn preserve(&mut self) {
        self.autodelete = false;
    }

    /// Removes batch files when the sequence is dropped (the default for
    /// newly created sequences).
    pub fn autodelete(&mut self) {
        self.autodelete = true;
    }

    /// Returns `true` if batch files will be removed on drop.
    #[must_use]
    pub fn is_autodelete(&self) -> bool {
        self.autodelete
    }

    /// Number of records stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.total_items
    }

    /// Returns `true` if no records have been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_items == 0
    }

    /// Number of batch files.
    #[must_use]
    pub fn n_batches(&self) -> usize {
        self.n_batch
    }

    /// Capacity of each batch in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.config.batch_size
    }

    /// Index of the mapped batch, if any.
    #[must_use]
    pub fn loaded_batch(&self) -> Option<usize> {
        self.loaded
    }

    /// What is currently mapped.
    #[must_use]
    pub fn state(&self) -> SequenceState {
        match (self.loaded, &self.region) {
            (Some(index), Some(region)) if region.is_writable() => SequenceState::Writing(index),
            (Some(index), Some(_)) => SequenceState::Reading(index),
            _ => SequenceState::Empty,
        }
    }

    /// Path of batch `index`.
    #[must_use]
    pub fn batch_path(&self, index: usize) -> PathBuf {
        self.config.batch_path(index)
    }

    /// The configuration the sequence was created or opened with.
    #[must_use]
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Summary counters for the sequence.
    #[must_use]
    pub fn stats(&self) -> BatchStats {
        BatchStats {
            items: self.total_items,
            batches: self.n_batch,
            batch_size: self.config.batch_size,
            basename: self.config.basename.clone(),
        }
    }

    pub(crate) fn region(&self) -> CoreResult<&MappedRegion> {
        self.region.as_ref().ok_or(CoreError::NoBatchLoaded)
    }

    fn region_mut(&mut self) -> CoreResult<&mut MappedRegion> {
        self.region.as_mut().ok_or(CoreError::NoBatchLoaded)
    }

    /// Maps the last batch read/write, creating batch 0 if there are none.
    fn ensure_writable(&mut self) -> CoreResult<()> {
        let Some(last) = self.n_batch.checked_sub(1) else {
            return self.create_next_batch();
        };
        if self.state() == SequenceState::Writing(last) {
            return Ok(());
        }

        self.unload()?;
        let path = self.batch_path(last);
        trace!(batch = last, "remapping batch for writing");
        self.region = Some(MappedRegion::reopen(&path, self.config.batch_size, true)?);
        self.loaded = Some(last);
        Ok(())
    }

    /// Drops the batch created by a rollover whose retry also overflowed.
    fn undo_rollover(&mut self, previous: WritePosition) -> CoreResult<()> {
        let fresh = self.n_batch - 1;
        self.region = None;
        self.loaded = None;
        remove_if_exists(&self.batch_path(fresh))?;
        self.n_batch = fresh;
        self.write = previous;
        debug!(batch = fresh, "discarded rollover batch");
        Ok(())
    }

    fn too_large(&self) -> CoreError {
        CoreError::RecordTooLarge {
            batch_size: self.config.batch_size,
        }
    }

    /// Unmaps the loaded batch, flushing it first if it is writable and the
    /// files are meant to outlive the sequence.
    fn unload(&mut self) -> CoreResult<()> {
        self.loaded = None;
        if let Some(region) = self.region.take() {
            if region.is_writable() && !self.autodelete {
                region.flush()?;
            }
        }
        Ok(())
    }

    /// Unmaps and removes batch files `0..=n_batches()`, returning the
    /// sequence to [`SequenceState::Empty`]. The extra index covers a file
    /// left by a rollover that failed part-way through creation.
    ///
    /// A later append starts again at batch 0.
    ///
    /// # Errors
    ///
    /// Returns the first removal failure; removal continues past it.
    pub fn remove_batches(&mut self) -> CoreResult<()> {
        self.region = None;
        self.loaded = None;

        let mut first_error = None;
        for index in 0..=self.n_batch {
            let path = self.batch_path(index);
            match remove_if_exists(&path) {
                Ok(true) => trace!(batch = index, "removed batch file"),
                Ok(false) => {}
                Err(e) => {
                    warn!(batch = index, error = %e, "failed to remove batch file");
                    first_error.get_or_insert(e);
                }
            }
        }
        debug!(batches = self.n_batch, "removed batch files");
        self.n_batch = 0;
        self.total_items = 0;
        self.write = WritePosition::FRESH;

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

/// Reads one record into `buf` at `write` and links it into the chain.
///
/// Nothing outside the new record's slot, trailer, and terminator is touched
/// unless the read succeeds; on success the previous terminator is rewritten
/// to point at the new one.
fn write_record<B: RecordReader>(
    buf: &mut [u8],
    write: WritePosition,
    input: &mut dyn BufRead,
) -> Result<Option<Appended>, RecordError> {
    let mut arena = BumpArena::resume(buf, write.top);

    // Hold room for the next terminator while the reader claims space.
    let mark = arena.save_end();
    arena.alloc_end::<usize>()?;
    let slot = arena.alloc::<B>()?;

    let Some(record) = B::read(input, &mut arena)? else {
        return Ok(None);
    };

    arena.restore_end(mark);
    debug_assert!(arena.capacity::<usize>() > 0);
    let terminator = arena.alloc::<usize>()?;

    *arena.get_mut(slot) = record;
    *arena.get_mut(terminator) = 0;
    let distance = (terminator.offset() - write.tail) / HEADER_SIZE;
    *arena.get_mut(Slot::<usize>::at(write.tail)) = distance;

    Ok(Some(Appended {
        header: write.tail,
        next: WritePosition {
            tail: terminator.offset(),
            top: arena.used(),
        },
    }))
}

impl<B: RecordReader> Drop for BatchSequence<B> {
    fn drop(&mut self) {
        if self.autodelete {
            if let Err(e) = self.remove_batches() {
                warn!(error = %e, "batch files left behind");
            }
        } else if let Err(e) = self.unload() {
            warn!(error = %e, "failed to flush batch on drop");
        }
    }
}

impl<B: RecordReader> std::fmt::Debug for BatchSequence<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchSequence")
            .field("basename", &self.config.basename)
            .field("batch_size", &self.config.batch_size)
            .field("n_batch", &self.n_batch)
            .field("total_items", &self.total_items)
            .field("state", &self.state())
            .field("autodelete", &self.autodelete)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Span;
    use crate::record::Line;
    use std::io::Cursor;
    use std::path::Path;
    use tempfile::tempdir;

    /// Space taken by a line of 1 to `HEADER_SIZE` bytes plus its header.
    const SHORT: usize = size_of::<Line>() + 2 * HEADER_SIZE;

    /// A batch holding exactly two short lines.
    const TWO_SHORT: usize = HEADER_SIZE + 2 * SHORT;

    fn config(dir: &Path, batch_size: usize) -> BatchConfig {
        BatchConfig::new(dir.join("batch."), batch_size)
    }

    fn collect(seq: &mut BatchSequence<Line>) -> Vec<String> {
        let mut lines = Vec::new();
        seq.enumerate(|line| lines.push(line.text().into_owned())).unwrap();
        lines
    }

    /// A line record that rejects lines starting with `!`, treats the line
    /// `cut` as input ending mid-record, and stops without consuming input
    /// at a `#`.
    #[repr(C)]
    #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    struct Picky {
        text: Span,
    }

    impl RecordReader for Picky {
        type Owned = String;

        fn read(
            input: &mut dyn BufRead,
            arena: &mut BumpArena<'_>,
        ) -> Result<Option<Self>, RecordError> {
            if input.fill_buf()?.first() == Some(&b'#') {
                return Ok(None);
            }
            let Some(line) = Line::read(input, arena)? else {
                return Ok(None);
            };
            let text = line.span();
            match arena.slice::<u8>(text) {
                [b'!', ..] => Err(RecordError::malformed("rejected line")),
                b"cut" => Ok(None),
                _ => Ok(Some(Self { text })),
            }
        }

        fn detach(view: &RecordView<'_, Self>) -> String {
            let bytes = view.bytes(view.get().text).unwrap_or_default();
            String::from_utf8_lossy(bytes).into_owned()
        }
    }

    fn picky_lines(seq: &mut BatchSequence<Picky>) -> Vec<String> {
        seq.iter().collect::<CoreResult<_>>().unwrap()
    }

    #[test]
    fn create_makes_first_batch() {
        let dir = tempdir().unwrap();
        let seq = BatchSequence::<Line>::create(config(dir.path(), 4096)).unwrap();

        assert_eq!(seq.n_batches(), 1);
        assert!(seq.is_empty());
        assert_eq!(seq.state(), SequenceState::Writing(0));
        assert!(seq.batch_path(0).exists());
        assert_eq!(std::fs::metadata(seq.batch_path(0)).unwrap().len(), 4096);
    }

    #[test]
    fn create_rejects_invalid_config() {
        let dir = tempdir().unwrap();
        let result = BatchSequence::<Line>::create(config(dir.path(), 1));
        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
    }

    #[test]
    fn read_all_then_enumerate() {
        let dir = tempdir().unwrap();
        let mut seq = BatchSequence::<Line>::create(config(dir.path(), 4096)).unwrap();

        let stored = seq
            .read_all(&mut Cursor::new("alpha\nbeta\n\ngamma"))
            .unwrap();
        assert_eq!(stored, 4);
        assert_eq!(seq.len(), 4);
        assert_eq!(collect(&mut seq), ["alpha", "beta", "", "gamma"]);
    }

    #[test]
    fn append_returns_stored_record() {
        let dir = tempdir().unwrap();
        let mut seq = BatchSequence::<Line>::create(config(dir.path(), 4096)).unwrap();
        let mut input = Cursor::new("first\nsecond\n");

        let record = seq.append(&mut input).unwrap().unwrap();
        assert_eq!(record.text(), "first");
        assert_eq!(record.batch(), 0);
        assert_eq!(record.header_offset(), 0);

        assert!(seq.append(&mut input).unwrap().is_some());
        assert!(seq.append(&mut input).unwrap().is_none());
        assert_eq!(seq.len(), 2);
    }

    #[test]
    fn rolls_over_when_batch_is_full() {
        let dir = tempdir().unwrap();
        let mut seq = BatchSequence::<Line>::create(config(dir.path(), TWO_SHORT)).unwrap();

        seq.read_all(&mut Cursor::new("a\nbb\nccc\ndddd\ne\n")).unwrap();

        assert_eq!(seq.n_batches(), 3);
        assert_eq!(seq.records_per_batch().unwrap(), [2, 2, 1]);
        assert_eq!(collect(&mut seq), ["a", "bb", "ccc", "dddd", "e"]);
    }

    #[test]
    fn full_batch_at_end_of_input_adds_no_batch() {
        let dir = tempdir().unwrap();
        let mut seq = BatchSequence::<Line>::create(config(dir.path(), TWO_SHORT)).unwrap();

        assert_eq!(seq.read_all(&mut Cursor::new("a\nb\nc\nd\n")).unwrap(), 4);
        assert_eq!(seq.n_batches(), 2);
        assert_eq!(seq.records_per_batch().unwrap(), [2, 2]);

        assert!(seq.append(&mut Cursor::new("")).unwrap().is_none());
        assert_eq!(seq.n_batches(), 2);
        assert!(!seq.batch_path(2).exists());
        assert_eq!(seq.stats().batches, 2);
    }

    #[test]
    fn rejected_record_leaves_chain_intact() {
        let dir = tempdir().unwrap();
        let mut seq = BatchSequence::<Picky>::create(config(dir.path(), TWO_SHORT)).unwrap();
        seq.read_all(&mut Cursor::new("a\n")).unwrap();

        let result = seq.append(&mut Cursor::new("!x\n"));
        assert!(matches!(result, Err(CoreError::CorruptInput { .. })));
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.n_batches(), 1);

        seq.read_all(&mut Cursor::new("c\n")).unwrap();
        assert_eq!(picky_lines(&mut seq), ["a", "c"]);
    }

    #[test]
    fn truncated_record_is_corrupt_input() {
        let dir = tempdir().unwrap();
        let mut seq = BatchSequence::<Picky>::create(config(dir.path(), TWO_SHORT)).unwrap();
        seq.read_all(&mut Cursor::new("a\n")).unwrap();

        let result = seq.append(&mut Cursor::new("cut\n"));
        assert!(matches!(
            result,
            Err(CoreError::CorruptInput { message }) if message == "input ended mid-record"
        ));
        assert_eq!(seq.len(), 1);
        assert_eq!(picky_lines(&mut seq), ["a"]);
    }

    #[test]
    fn failure_after_rollover_restores_batch_count() {
        let dir = tempdir().unwrap();
        let mut seq = BatchSequence::<Picky>::create(config(dir.path(), TWO_SHORT)).unwrap();
        seq.read_all(&mut Cursor::new("a\nb\n")).unwrap();

        for input in ["!x\n", "cut\n"] {
            let result = seq.append(&mut Cursor::new(input));
            assert!(matches!(result, Err(CoreError::CorruptInput { .. })));
            assert_eq!(seq.n_batches(), 1);
            assert!(!seq.batch_path(1).exists());
            assert_eq!(seq.len(), 2);
        }

        // A reader that stops without consuming anything is a clean end.
        assert!(seq.append(&mut Cursor::new("#\n")).unwrap().is_none());
        assert_eq!(seq.n_batches(), 1);
        assert!(!seq.batch_path(1).exists());

        seq.read_all(&mut Cursor::new("c\n")).unwrap();
        assert_eq!(seq.records_per_batch().unwrap(), [2, 1]);
        assert_eq!(picky_lines(&mut seq), ["a", "b", "c"]);
    }

    #[test]
    fn oversize_record_in_empty_batch() {
        let dir = tempdir().unwrap();
        let mut seq = BatchSequence::<Line>::create(config(dir.path(), TWO_SHORT)).unwrap();
        let long = "x".repeat(TWO_SHORT * 2);

        let result = seq.append(&mut Cursor::new(long));
        assert!(matches!(result, Err(CoreError::RecordTooLarge { .. })));
        assert_eq!(seq.n_batches(), 1);
        assert!(seq.is_empty());
    }

    #[test]
    fn failed_rollover_is_undone() {
        let dir = tempdir().unwrap();
        let mut seq = BatchSequence::<Line>::create(config(dir.path(), TWO_SHORT)).unwrap();
        seq.append(&mut Cursor::new("ab\n")).unwrap();

        let long = "x".repeat(TWO_SHORT * 2);
        let result = seq.append(&mut Cursor::new(long));
        assert!(matches!(result, Err(CoreError::RecordTooLarge { .. })));
        assert_eq!(seq.n_batches(), 1);
        assert!(!seq.batch_path(1).exists());
        assert_eq!(seq.len(), 1);

        // The chain is intact and appends continue in batch 0.
        seq.append(&mut Cursor::new("cd\n")).unwrap();
        assert_eq!(seq.records_per_batch().unwrap(), [2]);
        assert_eq!(collect(&mut seq), ["ab", "cd"]);
    }

    #[test]
    fn load_batch_out_of_range() {
        let dir = tempdir().unwrap();
        let mut seq = BatchSequence::<Line>::create(config(dir.path(), 4096)).unwrap();

        let err = seq.load_batch(1).unwrap_err();
        assert!(matches!(
            err,
            CoreError::BatchOutOfRange {
                index: 1,
                n_batches: 1
            }
        ));
    }

    #[test]
    fn load_batch_maps_read_only() {
        let dir = tempdir().unwrap();
        let mut seq = BatchSequence::<Line>::create(config(dir.path(), TWO_SHORT)).unwrap();
        seq.read_all(&mut Cursor::new("a\nb\nc\n")).unwrap();
        assert_eq!(seq.state(), SequenceState::Writing(1));

        seq.load_batch(0).unwrap();
        assert_eq!(seq.state(), SequenceState::Reading(0));
        assert_eq!(seq.loaded_batch(), Some(0));

        // Loading the mapped batch again changes nothing.
        seq.load_batch(0).unwrap();
        assert_eq!(seq.state(), SequenceState::Reading(0));
    }

    #[test]
    fn append_after_reading_remaps_last_batch() {
        let dir = tempdir().unwrap();
        let mut seq = BatchSequence::<Line>::create(config(dir.path(), TWO_SHORT)).unwrap();
        seq.read_all(&mut Cursor::new("a\nb\nc\n")).unwrap();
        assert_eq!(collect(&mut seq), ["a", "b", "c"]);
        assert_eq!(seq.state(), SequenceState::Reading(1));

        seq.append(&mut Cursor::new("d\n")).unwrap();
        assert_eq!(seq.state(), SequenceState::Writing(1));
        assert_eq!(seq.records_per_batch().unwrap(), [2, 2]);
        assert_eq!(collect(&mut seq), ["a", "b", "c", "d"]);
    }

    #[test]
    fn read_all_with_visits_each_record() {
        let dir = tempdir().unwrap();
        let mut seq = BatchSequence::<Line>::create(config(dir.path(), TWO_SHORT)).unwrap();

        let mut seen = Vec::new();
        let stored = seq
            .read_all_with(&mut Cursor::new("a\nb\nc\n"), |line| {
                seen.push((line.batch(), line.text().into_owned()));
            })
            .unwrap();

        assert_eq!(stored, 3);
        assert_eq!(
            seen,
            [(0, "a".to_string()), (0, "b".to_string()), (1, "c".to_string())]
        );
    }

    #[test]
    fn drop_removes_batch_files() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path(), TWO_SHORT);
        {
            let mut seq = BatchSequence::<Line>::create(cfg.clone()).unwrap();
            seq.read_all(&mut Cursor::new("a\nb\nc\n")).unwrap();
            assert!(seq.is_autodelete());
        }

        assert!(!cfg.batch_path(0).exists());
        assert!(!cfg.batch_path(1).exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn preserved_batches_can_be_reopened() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path(), TWO_SHORT);
        {
            let mut seq = BatchSequence::<Line>::create(cfg.clone()).unwrap();
            seq.read_all(&mut Cursor::new("a\nb\nc\n")).unwrap();
            seq.preserve();
        }

        let mut seq = BatchSequence::<Line>::open(cfg.clone()).unwrap();
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.n_batches(), 2);
        assert!(!seq.is_autodelete());
        assert_eq!(collect(&mut seq), ["a", "b", "c"]);

        // Appends resume at the tail of the last batch.
        seq.read_all(&mut Cursor::new("d\ne\n")).unwrap();
        assert_eq!(seq.records_per_batch().unwrap(), [2, 2, 1]);

        seq.autodelete();
        drop(seq);
        assert!(!cfg.batch_path(0).exists());
    }

    #[test]
    fn open_without_batches() {
        let dir = tempdir().unwrap();
        let result = BatchSequence::<Line>::open(config(dir.path(), 4096));
        assert!(matches!(result, Err(CoreError::NotFound { .. })));
    }

    #[test]
    fn open_detects_corrupt_chain() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path(), 4096);
        {
            let mut seq = BatchSequence::<Line>::create(cfg.clone()).unwrap();
            seq.read_all(&mut Cursor::new("a\nb\n")).unwrap();
            seq.preserve();
        }

        // A one-word link leaves no room for the record it introduces.
        let mut bytes = std::fs::read(cfg.batch_path(0)).unwrap();
        bytes[..HEADER_SIZE].copy_from_slice(&1usize.to_ne_bytes());
        std::fs::write(cfg.batch_path(0), bytes).unwrap();

        let result = BatchSequence::<Line>::open(cfg.clone());
        assert!(matches!(
            result,
            Err(CoreError::CorruptBatch {
                batch: 0,
                offset: 0,
                ..
            })
        ));
        assert!(cfg.batch_path(0).exists());
    }

    #[test]
    fn discard_removes_preserved_files() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path(), TWO_SHORT);
        let mut seq = BatchSequence::<Line>::create(cfg.clone()).unwrap();
        seq.read_all(&mut Cursor::new("a\nb\nc\n")).unwrap();
        seq.preserve();

        seq.discard().unwrap();
        assert!(!cfg.batch_path(0).exists());
        assert!(!cfg.batch_path(1).exists());
    }

    #[test]
    fn remove_batches_starts_over() {
        let dir = tempdir().unwrap();
        let mut seq = BatchSequence::<Line>::create(config(dir.path(), TWO_SHORT)).unwrap();
        seq.read_all(&mut Cursor::new("a\nb\nc\n")).unwrap();

        seq.remove_batches().unwrap();
        assert_eq!(seq.state(), SequenceState::Empty);
        assert_eq!(seq.n_batches(), 0);
        assert!(seq.is_empty());
        assert_eq!(seq.enumerate(|_| {}).unwrap(), 0);

        seq.append(&mut Cursor::new("z\n")).unwrap();
        assert_eq!(seq.n_batches(), 1);
        assert_eq!(collect(&mut seq), ["z"]);
    }

    #[test]
    fn stats_summarize_sequence() {
        let dir = tempdir().unwrap();
        let mut seq = BatchSequence::<Line>::create(config(dir.path(), TWO_SHORT)).unwrap();
        seq.read_all(&mut Cursor::new("a\nb\nc\n")).unwrap();

        let stats = seq.stats();
        assert_eq!(stats.items, 3);
        assert_eq!(stats.batches, 2);
        assert_eq!(stats.batch_size, TWO_SHORT);
    }
}
