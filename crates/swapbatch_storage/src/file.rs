//! File collaborators: fixed-size file creation, reopening, and removal.

use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Returns `<base><index>`, the name of the `index`-th file sharing `base`.
///
/// The index is appended to the final path component verbatim, so
/// `indexed_path("/tmp/run.", 3)` is `/tmp/run.3`.
#[must_use]
pub fn indexed_path(base: &Path, index: usize) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(index.to_string());
    PathBuf::from(name)
}

/// Creates (or truncates) the file at `path` and sizes it to `size` bytes.
///
/// When `preallocate` is set, disk blocks are reserved for the whole file so
/// that writes through a mapping cannot fault on a full disk. Filesystems
/// that do not support preallocation fall back to a sparse resize.
///
/// # Errors
///
/// Returns [`StorageError::Mapping`] if the file cannot be created or resized.
pub fn create_sized_file(path: &Path, size: u64, preallocate: bool) -> StorageResult<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| StorageError::mapping(path, e))?;

    file.set_len(size)
        .map_err(|e| StorageError::mapping(path, e))?;

    if preallocate {
        if let Err(e) = file.allocate(size) {
            debug!(
                path = %path.display(),
                error = %e,
                "preallocation unsupported, file left sparse"
            );
        }
    }

    Ok(file)
}

/// Opens an existing file that must be exactly `size` bytes long.
///
/// # Errors
///
/// Returns [`StorageError::Mapping`] if the file cannot be opened and
/// [`StorageError::SizeMismatch`] if its length differs from `size`.
pub fn open_sized_file(path: &Path, size: u64, writable: bool) -> StorageResult<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(writable)
        .open(path)
        .map_err(|e| StorageError::mapping(path, e))?;

    let actual = file
        .metadata()
        .map_err(|e| StorageError::mapping(path, e))?
        .len();
    if actual != size {
        return Err(StorageError::SizeMismatch {
            path: path.to_path_buf(),
            expected: size,
            actual,
        });
    }

    Ok(file)
}

/// Removes the file at `path`, treating a missing file as success.
///
/// Returns `true` if a file was actually removed.
///
/// # Errors
///
/// Returns [`StorageError::Remove`] for any failure other than `NotFound`.
pub fn remove_if_exists(path: &Path) -> StorageResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(StorageError::Remove {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn indexed_path_appends_decimal_index() {
        let base = Path::new("/tmp/swap");
        assert_eq!(indexed_path(base, 0), PathBuf::from("/tmp/swap0"));
        assert_eq!(indexed_path(base, 12), PathBuf::from("/tmp/swap12"));
    }

    #[test]
    fn create_sizes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("batch0");

        create_sized_file(&path, 4096, false).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 4096);
    }

    #[test]
    fn create_truncates_existing_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("batch0");
        fs::write(&path, vec![7u8; 100]).unwrap();

        create_sized_file(&path, 64, true).unwrap();
        let data = fs::read(&path).unwrap();
        assert_eq!(data.len(), 64);
        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn open_rejects_wrong_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("batch0");
        fs::write(&path, [0u8; 10]).unwrap();

        let result = open_sized_file(&path, 20, false);
        assert!(matches!(
            result,
            Err(StorageError::SizeMismatch {
                expected: 20,
                actual: 10,
                ..
            })
        ));
    }

    #[test]
    fn open_missing_file_is_mapping_error() {
        let dir = tempdir().unwrap();
        let result = open_sized_file(&dir.path().join("missing"), 20, false);
        assert!(matches!(result, Err(StorageError::Mapping { .. })));
    }

    #[test]
    fn remove_missing_is_not_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("batch0");
        assert!(!remove_if_exists(&path).unwrap());

        fs::write(&path, b"x").unwrap();
        assert!(remove_if_exists(&path).unwrap());
        assert!(!path.exists());
    }
}
