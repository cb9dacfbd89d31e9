//! Implementation of the `Storage` trait for storage in the local filesystem.

mod staged_file;

use crate::storage::filesystem::staged_file::{StagedFile, clean_leftover_tmp_files};
use crate::storage::{Storage, normalize_path};
use data_encoding::HEXLOWER;
use rand::rngs::ThreadRng;
use std::fs::File;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::{fs, io};

const FAN_OUT_LEN: usize = 2;

/// Storage implementation using the local filesystem.
///
/// Multiple instances of this storage with the same root directory may be used in parallel.
/// The root directory itself is never created by the storage.
///
/// Files are not laid out by their storage path. Each file is stored under the BLAKE3 hash of
/// its normalized path, in a subdirectory named after the first byte of the hash:
///
/// ```text
/// <root>/3f/a1c0...e9
/// ```
///
/// Thus, a path may be a prefix of another path, and no path can address the staging files
/// of in-progress writes.
///
/// # Examples
///
/// ```rust
/// # use std::io;
/// use std::io::{Read, Write};
/// use fileproxy::storage::filesystem::FilesystemStorage;
/// use fileproxy::storage::Storage;
/// use fileproxy::util::close::Close;
///
/// # fn main() -> io::Result<()> {
/// # let root = tempfile::tempdir()?;
/// let storage = FilesystemStorage::new(root.path().into());
/// let mut writer = storage.put("/foo/bar")?;
/// writer.write_all(b"Hello, world!")?;
/// writer.close()?;
/// let mut buf = String::new();
/// storage.get("/foo/bar")?.read_to_string(&mut buf)?;
/// assert_eq!(buf, "Hello, world!");
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct FilesystemStorage {
    root: PathBuf,
}

impl FilesystemStorage {
    /// Creates a new filesystem storage with the given root directory.
    pub fn new(root: PathBuf) -> Self {
        FilesystemStorage { root }
    }

    /// Cleans up leftover temporary files in the storage.
    ///
    /// The filesystem storage writes temporary files to ensure atomic writes. Usually these are
    /// removed when the writer is closed or dropped. However, if the process is killed hard,
    /// these files might be left behind. This method can be used to clean them up.
    pub fn clean_leftover_tmp_files(&self) -> io::Result<()> {
        clean_leftover_tmp_files(&self.root)
    }

    /// Location of the file stored at `path` within the filesystem.
    pub fn file_path(&self, path: &str) -> io::Result<PathBuf> {
        let path = normalize_path(path)?;
        let hash = HEXLOWER.encode(blake3::hash(path.as_bytes()).as_bytes());
        let (fan_out, name) = hash.split_at(FAN_OUT_LEN);
        Ok(self.root.join(fan_out).join(name))
    }
}

impl Storage for FilesystemStorage {
    type Reader = File;
    type Writer = StagedFile<PathBuf>;

    fn delete(&self, path: &str) -> io::Result<()> {
        fs::remove_file(self.file_path(path)?)
    }

    fn exists_file(&self, path: &str) -> io::Result<bool> {
        Ok(self.file_path(path)?.is_file())
    }

    fn get(&self, path: &str) -> io::Result<Self::Reader> {
        File::open(self.file_path(path)?)
    }

    fn put(&self, path: &str) -> io::Result<Self::Writer> {
        let file_path = self.file_path(path)?;
        if !self.root.is_dir() {
            return Err(io::Error::new(
                ErrorKind::NotFound,
                format!("Storage root {} does not exist", self.root.display()),
            ));
        }
        if let Some(parent_dir) = file_path.parent() {
            fs::create_dir_all(parent_dir)?;
        }
        StagedFile::new(file_path, &mut ThreadRng::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::{read_file_from_storage_to_string, write_file_to_storage};
    use crate::test_storage;
    use crate::util::close::Close;
    use std::fs::create_dir_all;
    use std::io::Write;
    use std::path::Path;
    use tempfile::{TempDir, tempdir};

    struct FilesystemStorageTestFixture {
        storage: FilesystemStorage,
        _tempdir: TempDir,
    }

    impl FilesystemStorageTestFixture {
        fn new() -> Self {
            let tempdir = tempdir().unwrap();
            Self {
                storage: FilesystemStorage::new(tempdir.path().to_path_buf()),
                _tempdir: tempdir,
            }
        }
    }

    impl Storage for FilesystemStorageTestFixture {
        type Reader = <FilesystemStorage as Storage>::Reader;
        type Writer = <FilesystemStorage as Storage>::Writer;

        fn delete(&self, path: &str) -> io::Result<()> {
            self.storage.delete(path)
        }

        fn exists_file(&self, path: &str) -> io::Result<bool> {
            self.storage.exists_file(path)
        }

        fn get(&self, path: &str) -> io::Result<Self::Reader> {
            self.storage.get(path)
        }

        fn put(&self, path: &str) -> io::Result<Self::Writer> {
            self.storage.put(path)
        }
    }

    test_storage!(filesystem_tests, FilesystemStorageTestFixture::new());

    #[test]
    fn test_does_not_create_non_existent_root() {
        let tempdir = tempdir().unwrap();
        let storage_path = tempdir.path().join("non-existent");
        let storage = FilesystemStorage::new(storage_path.clone());
        assert_eq!(
            write_file_to_storage(&storage, "/file.txt", "Hello, world!")
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
        assert!(!storage_path.exists());
    }

    #[test]
    fn test_disallows_putting_files_above_root() {
        let tempdir = tempdir().unwrap();
        let storage_root = tempdir.path().join("storage-root");
        fs::create_dir(&storage_root).unwrap();
        let storage = FilesystemStorage::new(storage_root.clone());
        assert!(write_file_to_storage(&storage, "/../file.txt", "file-content").is_err());
        assert!(!tempdir.path().join("file.txt").exists());
    }

    fn files_below(dir: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in dir.read_dir().unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                files.extend(files_below(&path));
            } else {
                files.push(path);
            }
        }
        files
    }

    #[test]
    fn test_dropped_writer_removes_staging_file() {
        let fixture = FilesystemStorageTestFixture::new();
        let mut writer = fixture.storage.put("/file.txt").unwrap();
        writer.write_all(b"partial").unwrap();
        drop(writer);
        assert!(files_below(fixture._tempdir.path()).is_empty());
    }

    #[test]
    fn test_stores_files_under_hashed_names() {
        let fixture = FilesystemStorageTestFixture::new();
        write_file_to_storage(&fixture.storage, "/dist/app.tar", "artifact").unwrap();
        let files = files_below(fixture._tempdir.path());
        assert_eq!(files, vec![fixture.storage.file_path("/dist/app.tar").unwrap()]);

        let relative = files[0].strip_prefix(fixture._tempdir.path()).unwrap();
        let components: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_str().unwrap().to_string())
            .collect();
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].len(), FAN_OUT_LEN);
        assert_eq!(components[0].len() + components[1].len(), 64);
        assert!(
            components
                .iter()
                .all(|c| c.chars().all(|ch| ch.is_ascii_hexdigit()))
        );
    }

    #[test]
    fn test_equivalent_paths_share_a_file() {
        let fixture = FilesystemStorageTestFixture::new();
        assert_eq!(
            fixture.storage.file_path("//dir///file.txt/").unwrap(),
            fixture.storage.file_path("/dir/file.txt").unwrap()
        );
    }

    #[test]
    fn test_clean_leftover_tmp_files_keeps_files_named_like_staging_files() {
        let fixture = FilesystemStorageTestFixture::new();
        write_file_to_storage(&fixture.storage, "/dist/app.tmp.deadbeef", "artifact").unwrap();
        fixture.storage.clean_leftover_tmp_files().unwrap();
        assert_eq!(
            read_file_from_storage_to_string(&fixture.storage, "/dist/app.tmp.deadbeef").unwrap(),
            "artifact"
        );
    }

    #[test]
    fn test_staging_files_are_not_addressable() {
        let fixture = FilesystemStorageTestFixture::new();
        let mut writer = fixture.storage.put("/dist/app").unwrap();
        writer.write_all(b"partial").unwrap();
        let staging_file = files_below(fixture._tempdir.path()).pop().unwrap();
        let staging_name = staging_file.file_name().unwrap().to_str().unwrap().to_string();
        let suffix = staging_name.rsplit('.').next().unwrap();

        assert!(!fixture.storage.exists_file("/dist/app").unwrap());
        assert!(
            !fixture
                .storage
                .exists_file(&format!("/dist/app.tmp.{suffix}"))
                .unwrap()
        );
        assert!(
            !fixture
                .storage
                .exists_file(&format!("/{staging_name}"))
                .unwrap()
        );
        writer.close().unwrap();
    }

    #[test]
    fn test_clean_leftover_tmp_files_keeps_stored_files() {
        let fixture = FilesystemStorageTestFixture::new();
        write_file_to_storage(&fixture.storage, "/dir/file.txt", "Hello, world!").unwrap();
        fixture.storage.clean_leftover_tmp_files().unwrap();
        assert_eq!(
            read_file_from_storage_to_string(&fixture.storage, "/dir/file.txt").unwrap(),
            "Hello, world!"
        );
    }

    struct PushCwd {
        old_cwd: PathBuf,
    }

    impl PushCwd {
        fn new<P: AsRef<Path>>(new_cwd: P) -> io::Result<Self> {
            let old_cwd = std::env::current_dir()?;
            std::env::set_current_dir(new_cwd)?;
            Ok(Self { old_cwd })
        }
    }

    impl Drop for PushCwd {
        fn drop(&mut self) {
            std::env::set_current_dir(&self.old_cwd).unwrap();
        }
    }

    #[test]
    fn test_with_relative_root() {
        let tempdir = tempdir().unwrap();
        let _push_cwd = PushCwd::new(tempdir.path()).unwrap();
        let storage_path = PathBuf::from("dir/storage-root");
        create_dir_all(&storage_path).unwrap();
        let storage = FilesystemStorage::new(storage_path.clone());
        let mut writer = storage.put("/some/subdir/file.txt").unwrap();
        writer.write_all(b"Hello, world!").unwrap();
        writer.close().unwrap();
        assert_eq!(
            read_file_from_storage_to_string(&storage, "/some/subdir/file.txt").unwrap(),
            "Hello, world!"
        );
    }
}
