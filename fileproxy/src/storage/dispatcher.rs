//! Runtime selection between the storage implementations.

use crate::storage::Storage;
use crate::storage::filesystem::FilesystemStorage;
use crate::storage::in_memory::{InMemoryStorage, InMemoryWriter};
use crate::util::close::Close;
use std::io;
use std::io::{Read, Write};
use std::path::PathBuf;

/// A storage whose implementation is chosen at runtime, e.g. from configuration.
#[derive(Clone, Debug)]
pub enum StorageDispatcher {
    InMemory(InMemoryStorage),
    Filesystem(FilesystemStorage),
}

impl Storage for StorageDispatcher {
    type Reader = Box<dyn Read + Send>;
    type Writer = DispatchedWriter;

    fn delete(&self, path: &str) -> io::Result<()> {
        match self {
            Self::InMemory(storage) => storage.delete(path),
            Self::Filesystem(storage) => storage.delete(path),
        }
    }

    fn exists_file(&self, path: &str) -> io::Result<bool> {
        match self {
            Self::InMemory(storage) => storage.exists_file(path),
            Self::Filesystem(storage) => storage.exists_file(path),
        }
    }

    fn get(&self, path: &str) -> io::Result<Self::Reader> {
        Ok(match self {
            Self::InMemory(storage) => Box::new(storage.get(path)?),
            Self::Filesystem(storage) => Box::new(storage.get(path)?),
        })
    }

    fn put(&self, path: &str) -> io::Result<Self::Writer> {
        match self {
            Self::InMemory(storage) => storage.put(path).map(DispatchedWriter::InMemory),
            Self::Filesystem(storage) => storage.put(path).map(DispatchedWriter::Filesystem),
        }
    }
}

pub enum DispatchedWriter {
    InMemory(InMemoryWriter),
    Filesystem(<FilesystemStorage as Storage>::Writer),
}

impl Write for DispatchedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::InMemory(writer) => writer.write(buf),
            Self::Filesystem(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::InMemory(writer) => writer.flush(),
            Self::Filesystem(writer) => writer.flush(),
        }
    }
}

impl Close for DispatchedWriter {
    fn close(self) -> io::Result<()> {
        match self {
            Self::InMemory(writer) => writer.close(),
            Self::Filesystem(writer) => writer.close(),
        }
    }
}

impl From<InMemoryStorage> for StorageDispatcher {
    fn from(storage: InMemoryStorage) -> Self {
        Self::InMemory(storage)
    }
}

impl From<FilesystemStorage> for StorageDispatcher {
    fn from(storage: FilesystemStorage) -> Self {
        Self::Filesystem(storage)
    }
}

impl StorageDispatcher {
    /// Creates a filesystem storage rooted at `root`.
    pub fn filesystem(root: impl Into<PathBuf>) -> Self {
        Self::Filesystem(FilesystemStorage::new(root.into()))
    }

    /// Removes staging files left behind by a previous process, if applicable to the storage.
    pub fn clean_leftover_tmp_files(&self) -> io::Result<()> {
        match self {
            Self::InMemory(_) => Ok(()),
            Self::Filesystem(storage) => storage.clean_leftover_tmp_files(),
        }
    }
}
