//! Walking the per-batch header chain.
//!
//! Every batch starts with a header. A header holds the distance, in
//! header-sized units, to the next header; the record it introduces follows
//! it, aligned for the record type. A zero header ends the chain.
//!
//! ```text
//! | hdr=d | pad | record | trailer... | hdr=0 |
//! ^-------------- d * HEADER_SIZE ---^
//! ```
//!
//! All reads here are bounds-checked: a damaged or foreign file produces
//! [`CoreError::CorruptBatch`] rather than a panic.

use crate::error::{CoreError, CoreResult};
use bytemuck::Pod;
use std::mem::{align_of, size_of};

/// Width of a chain header in bytes (the native pointer width).
pub const HEADER_SIZE: usize = size_of::<usize>();

/// Where a header leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Link {
    /// The header introduces a record; the next header is at this offset.
    Next(usize),
    /// The header is the end of the chain.
    Terminal,
}

/// Reads the header at `offset`, or `None` if it lies outside `region`.
pub(crate) fn read_header(region: &[u8], offset: usize) -> Option<usize> {
    region
        .get(offset..offset.checked_add(HEADER_SIZE)?)
        .map(bytemuck::pod_read_unaligned::<usize>)
}

/// Offset of the record introduced by the header at `header`.
pub(crate) fn record_offset<B>(header: usize) -> usize {
    (header + HEADER_SIZE).next_multiple_of(align_of::<B>())
}

/// Follows the header at `header`, validating that the link stays inside
/// the region and leaves room for the record it introduces.
pub(crate) fn follow<B: Pod>(region: &[u8], batch: usize, header: usize) -> CoreResult<Link> {
    let value = read_header(region, header)
        .ok_or_else(|| CoreError::corrupt_batch(batch, header, "header outside region"))?;
    if value == 0 {
        return Ok(Link::Terminal);
    }

    let next = value
        .checked_mul(HEADER_SIZE)
        .and_then(|distance| header.checked_add(distance))
        .filter(|&next| next.checked_add(HEADER_SIZE).is_some_and(|end| end <= region.len()))
        .ok_or_else(|| CoreError::corrupt_batch(batch, header, "link points outside region"))?;

    if record_offset::<B>(header) + size_of::<B>() > next {
        return Err(CoreError::corrupt_batch(
            batch,
            header,
            "record overlaps the next header",
        ));
    }

    Ok(Link::Next(next))
}

/// Returns the record introduced by the header at `header`.
pub(crate) fn record_at<B: Pod>(region: &[u8], batch: usize, header: usize) -> CoreResult<&B> {
    let start = record_offset::<B>(header);
    region
        .get(start..start + size_of::<B>())
        .and_then(|bytes| bytemuck::try_from_bytes(bytes).ok())
        .ok_or_else(|| CoreError::corrupt_batch(batch, header, "record outside region"))
}

/// Counts the records in a batch and returns the offset of its terminal
/// header.
pub(crate) fn measure<B: Pod>(region: &[u8], batch: usize) -> CoreResult<(usize, usize)> {
    let mut count = 0;
    let mut header = 0;
    while let Link::Next(next) = follow::<B>(region, batch, header)? {
        count += 1;
        header = next;
    }
    Ok((count, header))
}
