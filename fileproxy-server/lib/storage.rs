use crate::config::StorageConfig;
use fileproxy::storage::dispatcher::StorageDispatcher;
use fileproxy::storage::in_memory::InMemoryStorage;
use std::fs;
use std::io;
use tracing::info;

/// Creates the configured storage and prepares it for use.
///
/// The root directory of a filesystem storage is created if missing, and staging files left
/// behind by a previous process are removed.
pub fn create_storage(config: &StorageConfig) -> io::Result<StorageDispatcher> {
    match config {
        StorageConfig::InMemory => {
            info!("using in-memory storage");
            Ok(InMemoryStorage::new().into())
        }
        StorageConfig::Filesystem { path } => {
            info!(path = %path, "using filesystem storage");
            fs::create_dir_all(path)?;
            let storage = StorageDispatcher::filesystem(path);
            storage.clean_leftover_tmp_files()?;
            Ok(storage)
        }
    }
}
