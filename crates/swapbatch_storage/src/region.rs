//! Fixed-size file regions mapped into memory.

use crate::error::{StorageError, StorageResult};
use crate::file::{create_sized_file, open_sized_file};
use memmap2::{Mmap, MmapMut, MmapOptions};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Options applied when a region's backing file is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionOptions {
    /// Preferred base address for the mapping.
    ///
    /// This is a placement preference only. The mapping backend may ignore
    /// it, and no caller may depend on where the region lands.
    pub base_hint: Option<usize>,

    /// Reserve disk blocks for the whole file up front.
    pub preallocate: bool,
}

enum Mapping {
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
}

/// A fixed-size file mapped into the address space.
///
/// The region owns its mapping; dropping it unmaps the file. Opening a
/// different file means constructing a new region, so callers that must
/// bound resident memory drop the old region first.
///
/// # Example
///
/// ```no_run
/// use swapbatch_storage::{MappedRegion, RegionOptions};
/// use std::path::Path;
///
/// let mut region = MappedRegion::create(Path::new("batch0"), 4096, RegionOptions::default())?;
/// region.as_mut_slice()?[0] = 42;
/// region.flush()?;
/// # Ok::<(), swapbatch_storage::StorageError>(())
/// ```
pub struct MappedRegion {
    path: PathBuf,
    map: Mapping,
}

impl MappedRegion {
    /// Creates (or truncates) `path`, sizes it to `size` bytes, and maps it
    /// read/write.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Mapping`] if the file cannot be created,
    /// resized, or mapped.
    pub fn create(path: &Path, size: usize, options: RegionOptions) -> StorageResult<Self> {
        let file = create_sized_file(path, size as u64, options.preallocate)?;

        if let Some(hint) = options.base_hint {
            debug!(
                path = %path.display(),
                hint = format_args!("{hint:#x}"),
                "placement hint is advisory, mapping at an OS-chosen address"
            );
        }

        let map = map_read_write(path, &file, size)?;
        debug!(path = %path.display(), size, "created mapped region");
        Ok(Self {
            path: path.to_path_buf(),
            map: Mapping::ReadWrite(map),
        })
    }

    /// Maps an existing file of exactly `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::SizeMismatch`] if the file has a different
    /// length, or [`StorageError::Mapping`] if it cannot be opened or mapped.
    pub fn reopen(path: &Path, size: usize, writable: bool) -> StorageResult<Self> {
        let file = open_sized_file(path, size as u64, writable)?;

        let map = if writable {
            Mapping::ReadWrite(map_read_write(path, &file, size)?)
        } else {
            // SAFETY: batch files are owned by a single process-local writer
            // or reader; nothing truncates or rewrites the file while it is
            // mapped, so the bytes behind the slice stay valid.
            let map = unsafe { MmapOptions::new().len(size).map(&file) }
                .map_err(|e| StorageError::mapping(path, e))?;
            Mapping::ReadOnly(map)
        };

        Ok(Self {
            path: path.to_path_buf(),
            map,
        })
    }

    /// Returns the mapped bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        match &self.map {
            Mapping::ReadOnly(map) => &map[..],
            Mapping::ReadWrite(map) => &map[..],
        }
    }

    /// Returns the mapped bytes for writing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadOnly`] if the region was mapped read-only.
    pub fn as_mut_slice(&mut self) -> StorageResult<&mut [u8]> {
        match &mut self.map {
            Mapping::ReadWrite(map) => Ok(&mut map[..]),
            Mapping::ReadOnly(_) => Err(StorageError::ReadOnly {
                path: self.path.clone(),
            }),
        }
    }

    /// Synchronously writes modified pages back to the file.
    ///
    /// A no-op for read-only regions.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Mapping`] if the flush fails.
    pub fn flush(&self) -> StorageResult<()> {
        match &self.map {
            Mapping::ReadWrite(map) => map
                .flush()
                .map_err(|e| StorageError::mapping(&self.path, e)),
            Mapping::ReadOnly(_) => Ok(()),
        }
    }

    /// Returns the size of the region in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Returns `true` if the region has zero length.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the region is mapped read/write.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        matches!(self.map, Mapping::ReadWrite(_))
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn map_read_write(path: &Path, file: &File, size: usize) -> StorageResult<MmapMut> {
    // SAFETY: see `MappedRegion::reopen`; the file is exclusively ours while
    // the mapping lives.
    unsafe { MmapOptions::new().len(size).map_mut(file) }
        .map_err(|e| StorageError::mapping(path, e))
}

impl std::fmt::Debug for MappedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedRegion")
            .field("path", &self.path)
            .field("len", &self.len())
            .field("writable", &self.is_writable())
            .finish()
    }
}
