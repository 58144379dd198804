//! Linear (bump) allocation over a borrowed byte range.
//!
//! A [`BumpArena`] hands out typed, aligned reservations from the low end of
//! a byte range and can additionally hold space back at the high end. There
//! is no general free: the low cursor only advances, and the high bound only
//! moves back up by restoring a checkpoint taken with
//! [`BumpArena::save_end`].
//!
//! Reservations are identified by offsets ([`Slot`] and [`Span`]) rather than
//! references, so records can store them and they stay meaningful after the
//! range is unmapped and mapped again elsewhere.
//!
//! ```text
//! 0            top                  end           len
//! | allocated  |  free               | held back  |
//! ```

use bytemuck::{Pod, Zeroable};
use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::ops::Range;
use thiserror::Error;

/// Errors produced by arena allocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    /// The reservation does not fit in what is left of the range.
    #[error("arena overflow: requested {requested} bytes, {remaining} remaining")]
    Overflow {
        /// Bytes the reservation needed, including alignment padding.
        requested: usize,
        /// Bytes that were free before the attempt.
        remaining: usize,
    },
}

/// Typed handle to a single value reserved in an arena.
pub struct Slot<T> {
    offset: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Slot<T> {
    pub(crate) const fn at(offset: usize) -> Self {
        Self {
            offset,
            _marker: PhantomData,
        }
    }

    /// Byte offset of the value from the start of the range.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Slot<T> {}

impl<T> PartialEq for Slot<T> {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset
    }
}

impl<T> Eq for Slot<T> {}

impl<T> std::fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot").field("offset", &self.offset).finish()
    }
}

/// A contiguous byte span inside a range, stored by offset.
///
/// Spans are plain data and can be embedded in records to reference
/// variable-length trailers.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Span {
    /// Byte offset from the start of the range.
    pub offset: usize,
    /// Length in bytes.
    pub len: usize,
}

impl Span {
    /// The empty span at offset zero.
    pub const EMPTY: Self = Self { offset: 0, len: 0 };

    /// Returns `true` if the span covers no bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the byte range covered, or `None` if it would overflow.
    #[must_use]
    pub fn range(&self) -> Option<Range<usize>> {
        Some(self.offset..self.offset.checked_add(self.len)?)
    }
}

/// Saved position of the arena's high bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndMark(usize);

/// A bump allocator over a borrowed byte range.
///
/// The range must start at an address aligned for every type allocated from
/// it. Memory maps are page aligned, which covers all plain-data types.
///
/// # Example
///
/// ```rust
/// use swapbatch_core::BumpArena;
///
/// let mut words = vec![0u64; 4];
/// let mut arena = BumpArena::new(bytemuck::cast_slice_mut(&mut words));
///
/// let slot = arena.alloc::<u32>().unwrap();
/// *arena.get_mut(slot) = 7;
/// assert_eq!(*arena.get(slot), 7);
/// assert_eq!(arena.remaining(), 28);
/// ```
pub struct BumpArena<'a> {
    buf: &'a mut [u8],
    top: usize,
    end: usize,
}

impl<'a> BumpArena<'a> {
    /// Creates an arena covering all of `buf`.
    pub fn new(buf: &'a mut [u8]) -> Self {
        let end = buf.len();
        Self { buf, top: 0, end }
    }

    /// Resumes allocation in `buf` with the low cursor at `top`.
    pub(crate) fn resume(buf: &'a mut [u8], top: usize) -> Self {
        let end = buf.len();
        Self {
            buf,
            top: top.min(end),
            end,
        }
    }

    /// Resets the arena to cover all of `buf`, discarding every reservation.
    pub fn init(&mut self, buf: &'a mut [u8]) {
        self.end = buf.len();
        self.buf = buf;
        self.top = 0;
    }

    /// Reserves one zeroed `T` at the low end.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::Overflow`] if the value does not fit; the arena
    /// is left unchanged.
    pub fn alloc<T: Pod>(&mut self) -> Result<Slot<T>, ArenaError> {
        let offset = self.reserve(size_of::<T>(), align_of::<T>())?;
        Ok(Slot::at(offset))
    }

    /// Reserves `count` contiguous zeroed `T` at the low end.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::Overflow`] if the values do not fit; the arena is
    /// left unchanged.
    pub fn alloc_slice<T: Pod>(&mut self, count: usize) -> Result<Span, ArenaError> {
        let len = size_of::<T>()
            .checked_mul(count)
            .ok_or_else(|| self.overflow(usize::MAX))?;
        let offset = self.reserve(len, align_of::<T>())?;
        Ok(Span { offset, len })
    }

    /// Reserves one `T` at the high end, lowering the bound that low-end
    /// allocations may reach.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::Overflow`] if the value does not fit above the
    /// low cursor.
    pub fn alloc_end<T: Pod>(&mut self) -> Result<Slot<T>, ArenaError> {
        let size = size_of::<T>();
        let start = self
            .end
            .checked_sub(size)
            .map(|s| s - s % align_of::<T>())
            .filter(|&s| s >= self.top)
            .ok_or_else(|| self.overflow(size))?;
        self.end = start;
        Ok(Slot::at(start))
    }

    /// Checkpoints the high bound.
    #[must_use]
    pub fn save_end(&self) -> EndMark {
        EndMark(self.end)
    }

    /// Returns space reserved at the high end since `mark` was taken.
    pub fn restore_end(&mut self, mark: EndMark) {
        debug_assert!(mark.0 >= self.end, "end marks restore in stack order");
        self.end = mark.0.min(self.buf.len());
    }

    /// Bytes between the low cursor and the high bound.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.end - self.top
    }

    /// Number of additional `T` that [`alloc`](Self::alloc) could still
    /// reserve.
    #[must_use]
    pub fn capacity<T>(&self) -> usize {
        let start = self.top.next_multiple_of(align_of::<T>());
        match size_of::<T>() {
            0 => usize::MAX,
            size => self.end.saturating_sub(start) / size,
        }
    }

    /// Bytes consumed at the low end, including alignment padding.
    #[must_use]
    pub fn used(&self) -> usize {
        self.top
    }

    /// Total size of the underlying range.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if the underlying range is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns the value behind `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` was not issued by an arena over this range.
    #[must_use]
    pub fn get<T: Pod>(&self, slot: Slot<T>) -> &T {
        bytemuck::from_bytes(&self.buf[slot.offset..slot.offset + size_of::<T>()])
    }

    /// Returns the value behind `slot` for writing.
    ///
    /// # Panics
    ///
    /// Panics if `slot` was not issued by an arena over this range.
    pub fn get_mut<T: Pod>(&mut self, slot: Slot<T>) -> &mut T {
        bytemuck::from_bytes_mut(&mut self.buf[slot.offset..slot.offset + size_of::<T>()])
    }

    /// Returns the values covered by `span`.
    ///
    /// # Panics
    ///
    /// Panics if `span` lies outside the range or is not a whole number of
    /// aligned `T`.
    #[must_use]
    pub fn slice<T: Pod>(&self, span: Span) -> &[T] {
        bytemuck::cast_slice(&self.buf[span.offset..span.offset + span.len])
    }

    /// Returns the values covered by `span` for writing.
    ///
    /// # Panics
    ///
    /// Panics if `span` lies outside the range or is not a whole number of
    /// aligned `T`.
    pub fn slice_mut<T: Pod>(&mut self, span: Span) -> &mut [T] {
        bytemuck::cast_slice_mut(&mut self.buf[span.offset..span.offset + span.len])
    }

    fn reserve(&mut self, size: usize, align: usize) -> Result<usize, ArenaError> {
        let start = self.top.next_multiple_of(align);
        let new_top = start
            .checked_add(size)
            .filter(|&t| t <= self.end)
            .ok_or_else(|| self.overflow(start.saturating_add(size) - self.top))?;

        // Failed attempts may have left bytes here; reservations start zeroed.
        self.buf[start..new_top].fill(0);
        self.top = new_top;
        Ok(start)
    }

    fn overflow(&self, requested: usize) -> ArenaError {
        ArenaError::Overflow {
            requested,
            remaining: self.remaining(),
        }
    }
}

impl std::fmt::Debug for BumpArena<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BumpArena")
            .field("len", &self.buf.len())
            .field("top", &self.top)
            .field("end", &self.end)
            .finish()
    }
}
