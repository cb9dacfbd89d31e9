//! Implementation of the `Storage` trait for an in-memory storage.

use crate::storage::{Storage, normalize_path};
use crate::util::close::Close;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;
use std::io::{Cursor, ErrorKind, Write};
use std::sync::Arc;

type Files = HashMap<String, Arc<[u8]>>;

/// In-memory storage implementation.
///
/// This implementation is mainly intended for testing purposes. It can also be used as the
/// cache of a permanently running proxy to avoid hitting the disk, but its content is lost on
/// restart and it never evicts anything.
///
/// Cloning the storage yields a handle to the same files.
///
/// # Examples
///
/// ```rust
/// # use std::io;
/// use std::io::{Read, Write};
/// use fileproxy::storage::in_memory::InMemoryStorage;
/// use fileproxy::storage::Storage;
/// use fileproxy::util::close::Close;
///
/// # fn main() -> io::Result<()> {
/// let storage = InMemoryStorage::new();
/// let mut writer = storage.put("/foo/bar")?;
/// writer.write_all(b"Hello, world!")?;
/// writer.close()?;
/// let mut buf = String::new();
/// storage.get("/foo/bar")?.read_to_string(&mut buf)?;
/// assert_eq!(buf, "Hello, world!");
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryStorage {
    files: Arc<RwLock<Files>>,
}

impl InMemoryStorage {
    /// Creates a new, empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files in the storage.
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

impl Storage for InMemoryStorage {
    type Reader = Cursor<Arc<[u8]>>;
    type Writer = InMemoryWriter;

    fn delete(&self, path: &str) -> io::Result<()> {
        let path = normalize_path(path)?;
        match self.files.write().remove(&path) {
            Some(_) => Ok(()),
            None => Err(io::Error::new(ErrorKind::NotFound, "File not found")),
        }
    }

    fn exists_file(&self, path: &str) -> io::Result<bool> {
        let path = normalize_path(path)?;
        Ok(self.files.read().contains_key(&path))
    }

    fn get(&self, path: &str) -> io::Result<Self::Reader> {
        let path = normalize_path(path)?;
        self.files
            .read()
            .get(&path)
            .map(|content| Cursor::new(Arc::clone(content)))
            .ok_or_else(|| io::Error::new(ErrorKind::NotFound, "File not found"))
    }

    fn put(&self, path: &str) -> io::Result<Self::Writer> {
        let path = normalize_path(path)?;
        Ok(InMemoryWriter {
            files: Arc::clone(&self.files),
            path,
            buf: Vec::new(),
        })
    }
}

/// Writer buffering a file in memory until it is closed.
///
/// Dropping the writer without closing it discards the written data.
#[derive(Debug)]
pub struct InMemoryWriter {
    files: Arc<RwLock<Files>>,
    path: String,
    buf: Vec<u8>,
}

impl Write for InMemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Close for InMemoryWriter {
    fn close(self) -> io::Result<()> {
        self.files.write().insert(self.path, self.buf.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::write_file_to_storage;
    use crate::test_storage;

    test_storage!(in_memory_tests, InMemoryStorage::new());

    #[test]
    fn test_clones_share_files() {
        let storage = InMemoryStorage::new();
        let clone = storage.clone();
        write_file_to_storage(&storage, "/dir/file.txt", "Hello, world!").unwrap();
        assert!(clone.exists_file("/dir/file.txt").unwrap());
        assert_eq!(clone.len(), 1);
    }

    #[test]
    fn test_normalizes_repeated_slashes() {
        let storage = InMemoryStorage::new();
        write_file_to_storage(&storage, "//dir///file.txt/", "Hello, world!").unwrap();
        assert!(storage.exists_file("/dir/file.txt").unwrap());
    }

    #[test]
    fn test_file_may_share_prefix_with_nested_file() {
        let storage = InMemoryStorage::new();
        write_file_to_storage(&storage, "/foo/bar", "nested").unwrap();
        write_file_to_storage(&storage, "/foo", "outer").unwrap();
        write_file_to_storage(&storage, "/foo-bar", "sibling").unwrap();
        assert_eq!(storage.len(), 3);
        storage.delete("/foo").unwrap();
        assert!(storage.exists_file("/foo/bar").unwrap());
    }
}
