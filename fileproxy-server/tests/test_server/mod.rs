//! Test helpers running the fileproxy server route in-process.

use fileproxy::storage::Storage;
use fileproxy::storage::filesystem::FilesystemStorage;
use fileproxy::test_util::origin::TestOrigin;
use fileproxy::util::close::Close;
use fileproxy_server_lib::app::create_route;
use fileproxy_server_lib::config::{ConfigLoader, FileproxyServerConfig, StorageConfig};
use fileproxy_server_lib::setup::create_proxy;
use poem::Route;
use poem::test::TestClient;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use tempfile::{TempDir, tempdir};

/// A fileproxy server with filesystem storage in a temporary directory.
pub struct TestProxy {
    pub client: TestClient<Route>,
    storage_dir: TempDir,
}

impl TestProxy {
    /// Creates the default configuration for a proxy in front of `origin`.
    pub fn config(origin: &TestOrigin) -> (FileproxyServerConfig, TempDir) {
        let storage_dir = tempdir().unwrap();
        let mut config = ConfigLoader::new().load().unwrap();
        config.origin.url = origin.base_url().to_string();
        config.origin.timeout = "2s".to_string();
        config.storage = StorageConfig::Filesystem {
            path: storage_dir.path().to_string_lossy().into_owned(),
        };
        (config, storage_dir)
    }

    pub fn new(config: &FileproxyServerConfig, storage_dir: TempDir) -> Self {
        let proxy = create_proxy(config).unwrap();
        Self {
            client: TestClient::new(create_route(Arc::new(proxy), config.enable_api_docs)),
            storage_dir,
        }
    }

    /// A proxy with default configuration in front of `origin`.
    pub fn with_defaults(origin: &TestOrigin) -> Self {
        let (config, storage_dir) = Self::config(origin);
        Self::new(&config, storage_dir)
    }

    fn storage(&self) -> FilesystemStorage {
        FilesystemStorage::new(self.storage_dir.path().to_path_buf())
    }

    /// Places a file into the proxy's storage.
    #[allow(unused)]
    pub fn store(&self, key: &str, content: &str) {
        let mut writer = self.storage().put(&format!("/{key}")).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
        writer.close().unwrap();
    }

    #[allow(unused)]
    pub fn stored(&self, key: &str) -> Option<String> {
        let mut content = String::new();
        self.storage()
            .get(&format!("/{key}"))
            .ok()?
            .read_to_string(&mut content)
            .ok()?;
        Some(content)
    }

    /// Whether the storage directory holds no files, not counting empty directories.
    #[allow(unused)]
    pub fn storage_is_empty(&self) -> bool {
        fn is_empty(dir: &Path) -> bool {
            fs::read_dir(dir).unwrap().all(|entry| {
                let path = entry.unwrap().path();
                path.is_dir() && is_empty(&path)
            })
        }
        is_empty(self.storage_dir.path())
    }
}
