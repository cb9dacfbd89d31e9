//! A storage is the byte store the proxy persists fetched artifacts in.
//!
//! This module defines the `Storage` trait and provides implementations of it in its submodules.

pub mod dispatcher;
pub mod filesystem;
pub mod in_memory;

use crate::util::close::Close;
use std::io;
use std::io::{ErrorKind, Read, Write};

/// A storage is a place where files are stored, for example the local filesystem.
///
/// Paths are expected to use `/` as the path separator and to be absolute within the storage
/// (this could, however, map to a path relative to some base directory within the filesystem).
/// Every path names an independent file: a file may be stored at a path that is a prefix of
/// another file's path. Empty components are ignored, and `.` or `..` components are rejected
/// with [io::ErrorKind::InvalidInput].
///
/// For reading and writing files, a [Storage::Reader] and [Storage::Writer] are returned,
/// respectively. This allows interacting with the file data without loading the full file
/// content into memory.
///
/// Written files must become available atomically. Thus, the `Writer` must implement [Close]
/// and the file only becomes visible once [Close::close] succeeded. A writer that is dropped
/// without being closed must leave no trace in the storage.
///
/// Implementations are used from multiple threads at once and must stay consistent under
/// concurrent access. Missing files are reported with [io::ErrorKind::NotFound].
pub trait Storage {
    /// The type of reader returned by this storage.
    type Reader: Read;

    /// The type of writer returned by this storage.
    type Writer: Write + Close;

    /// Deletes the file at the given path.
    fn delete(&self, path: &str) -> io::Result<()>;

    /// Checks if a file exists at the given path.
    fn exists_file(&self, path: &str) -> io::Result<bool>;

    /// Returns a reader for the file at the given path.
    fn get(&self, path: &str) -> io::Result<Self::Reader>;

    /// Returns a writer for the file at the given path.
    ///
    /// An existing file is replaced once the writer is closed.
    fn put(&self, path: &str) -> io::Result<Self::Writer>;
}

/// Normalizes an absolute storage path by dropping empty components.
pub(crate) fn normalize_path(path: &str) -> io::Result<String> {
    if !path.starts_with('/') {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            "Path must be absolute, i.e. start with a slash '/'",
        ));
    }
    let mut normalized = String::with_capacity(path.len());
    for component in path.split('/').filter(|c| !c.is_empty()) {
        if component == "." || component == ".." {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                "Path must not contain relative components",
            ));
        }
        normalized.push('/');
        normalized.push_str(component);
    }
    if normalized.is_empty() {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            "Path must contain at least one component",
        ));
    }
    Ok(normalized)
}
