use crate::util::close::Close;
use data_encoding::HEXLOWER;
use fs2::FileExt;
use rand::{CryptoRng, RngCore};
use std::ffi::OsStr;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::{fs, io};

const TMP_FILE_SUFFIX_BYTES: usize = 4;
const TMP_FILE_SUFFIX_ENCODED_LEN: usize = 2 * TMP_FILE_SUFFIX_BYTES;

/// A file that is staged to be atomically moved to a target path.
///
/// The file is created with a temporary name in the same directory as the target path.
/// Once [Close::close] is called, the file is moved to the target path. If the instance is
/// dropped without being closed, the temporary file is removed and the target path is left
/// untouched.
pub struct StagedFile<P: AsRef<Path>> {
    file: File,
    tmp_path: PathBuf,
    target_path: P,
    done: bool,
}

impl<P: AsRef<Path>> StagedFile<P> {
    pub fn new<R: CryptoRng + RngCore>(target_path: P, rng: &mut R) -> io::Result<Self> {
        let mut bytes = [0; TMP_FILE_SUFFIX_BYTES];
        rng.fill_bytes(&mut bytes);
        Self::new_with_suffix(target_path, &HEXLOWER.encode(&bytes))
    }

    fn new_with_suffix(target_path: P, suffix: &str) -> io::Result<Self> {
        let filename = target_path
            .as_ref()
            .file_name()
            .and_then(OsStr::to_str)
            .ok_or(io::Error::new(ErrorKind::InvalidInput, "Invalid filename"))?;
        let tmp_path = target_path
            .as_ref()
            .with_file_name(format!("{filename}.tmp.{suffix}"));
        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&tmp_path)?;
        file.lock_exclusive()?;
        if !tmp_path.exists() {
            // Removed by clean_leftover_tmp_files before the lock was acquired.
            return Err(io::Error::new(
                ErrorKind::Interrupted,
                "Temporary file was removed concurrently",
            ));
        }
        Ok(Self {
            file,
            tmp_path,
            target_path,
            done: false,
        })
    }

    fn discard(&mut self) -> io::Result<()> {
        self.done = true;
        fs::remove_file(&self.tmp_path)
    }
}

impl<P: AsRef<Path>> Write for StagedFile<P> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl<P: AsRef<Path>> Close for StagedFile<P> {
    fn close(mut self) -> io::Result<()> {
        let result = self
            .file
            .sync_all()
            .and_then(|_| fs::rename(&self.tmp_path, self.target_path.as_ref()));
        match result {
            Ok(()) => {
                self.done = true;
                Ok(())
            }
            Err(err) => {
                let _ = self.discard();
                Err(err)
            }
        }
    }
}

impl<P: AsRef<Path>> Drop for StagedFile<P> {
    fn drop(&mut self) {
        if !self.done {
            let _ = self.discard();
        }
    }
}

/// Cleans up leftover temporary files of [StagedFile] in the given directory and its
/// subdirectories.
///
/// Files still locked by a live [StagedFile] are kept.
pub fn clean_leftover_tmp_files<P_: AsRef<Path>>(path: P_) -> io::Result<()> {
    for entry in path.as_ref().read_dir()? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_file() {
            if let Some(file_name) = entry.file_name().to_str() {
                let mut parts = file_name.rsplitn(3, '.');
                let suffix = parts.next();
                let ext = parts.next();
                if ext == Some("tmp")
                    && suffix.map(|s| s.len()) == Some(TMP_FILE_SUFFIX_ENCODED_LEN)
                {
                    let is_unused = OpenOptions::new()
                        .read(true)
                        .open(entry.path())
                        .and_then(|file_handle| file_handle.try_lock_exclusive())
                        .is_ok();
                    if is_unused {
                        fs::remove_file(entry.path())?;
                    }
                }
            }
        } else if file_type.is_dir() {
            clean_leftover_tmp_files(entry.path())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn test_tmp_file_suffix_encoded_len_is_accurate() {
        assert_eq!(
            TMP_FILE_SUFFIX_ENCODED_LEN,
            HEXLOWER.encode(&[0; TMP_FILE_SUFFIX_BYTES]).len()
        );
    }

    #[test]
    fn test_file_not_available_until_close() {
        let tempdir = tempdir().unwrap();
        let path = tempdir.path().join("test.txt");
        let mut file = StagedFile::new(&path, &mut StdRng::seed_from_u64(0)).unwrap();
        file.write_all("Hello, world!".as_bytes()).unwrap();
        assert!(!path.exists());

        file.close().unwrap();
        let mut buf = String::new();
        File::open(path).unwrap().read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "Hello, world!");
    }

    #[test]
    fn test_drop_discards_file() {
        let tempdir = tempdir().unwrap();
        let path = tempdir.path().join("test.txt");
        let mut file = StagedFile::new(&path, &mut StdRng::seed_from_u64(0)).unwrap();
        file.write_all("Hello, world!".as_bytes()).unwrap();
        drop(file);
        assert!(!path.exists());
        assert_eq!(tempdir.path().read_dir().unwrap().count(), 0);
    }

    #[test]
    fn test_fails_if_staging_file_exists() {
        let tempdir = tempdir().unwrap();
        let path = tempdir.path().join("test.txt");
        let suffix = "suffix";
        let mut file = StagedFile::new_with_suffix(&path, suffix).unwrap();
        file.write_all("Hello, world!".as_bytes()).unwrap();
        assert!(StagedFile::new_with_suffix(&path, suffix).is_err());
    }

    #[test]
    fn test_failed_close_removes_staging_file() {
        let tempdir = tempdir().unwrap();
        let path = tempdir.path().join("occupied");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("child"), "content").unwrap();
        let file = StagedFile::new(&path, &mut StdRng::seed_from_u64(0)).unwrap();
        assert!(file.close().is_err());
        assert_eq!(tempdir.path().read_dir().unwrap().count(), 1);
    }

    #[test]
    fn test_clean_leftover_tmp_files_removes_leftover_tmp_files() {
        let tempdir = tempdir().unwrap();
        let subdir_path = tempdir.path().join("subdir");
        fs::create_dir(&subdir_path).unwrap();
        let path = subdir_path.join(format!(
            "test.tmp.{}",
            HEXLOWER.encode(&[0; TMP_FILE_SUFFIX_BYTES])
        ));
        File::create(&path).unwrap();
        clean_leftover_tmp_files(tempdir.path()).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_clean_leftover_tmp_files_does_not_remove_files_still_in_use() {
        let tempdir = tempdir().unwrap();
        let target_path = tempdir.path().join("test.txt");
        let file = StagedFile::new(&target_path, &mut StdRng::seed_from_u64(0)).unwrap();
        clean_leftover_tmp_files(tempdir.path()).unwrap();
        assert!(tempdir.path().read_dir().unwrap().any(|entry| {
            entry
                .unwrap()
                .file_name()
                .to_str()
                .unwrap()
                .starts_with("test.txt.tmp.")
        }));
        file.close().unwrap();
        assert!(target_path.exists());
    }
}
