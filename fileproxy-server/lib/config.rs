use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, Map, Source};
use fileproxy::handler::OriginErrorPolicy;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use zeroize::Zeroize;

#[derive(Clone, Debug, serde::Deserialize, PartialEq, Eq)]
pub struct FileproxyServerConfig {
    pub bind_addrs: Vec<String>,
    pub enable_api_docs: bool,
    pub log_format: LogFormat,

    pub origin: OriginConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
}

impl FileproxyServerConfig {
    pub fn load() -> Result<Self, LoadConfigError> {
        ConfigLoader::new().add_default_sources().load()
    }
}

#[derive(Clone, Copy, Debug, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug, serde::Deserialize, PartialEq, Eq)]
pub struct OriginConfig {
    pub url: String,
    pub timeout: String,
    pub error_policy: ErrorPolicyConfig,
    pub auth: OriginAuthConfig,
}

#[derive(Clone, Copy, Debug, serde::Deserialize, PartialEq, Eq)]
pub enum ErrorPolicyConfig {
    BadGateway,
    PassThrough,
}

impl From<ErrorPolicyConfig> for OriginErrorPolicy {
    fn from(config: ErrorPolicyConfig) -> Self {
        match config {
            ErrorPolicyConfig::BadGateway => OriginErrorPolicy::BadGateway,
            ErrorPolicyConfig::PassThrough => OriginErrorPolicy::PassThrough,
        }
    }
}

/// Credentials of the proxy towards the origin.
#[derive(Clone, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum OriginAuthConfig {
    None,
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl Debug for OriginAuthConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OriginAuthConfig::None => f.write_str("None"),
            OriginAuthConfig::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            OriginAuthConfig::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"[REDACTED]")
                .finish(),
        }
    }
}

impl Drop for OriginAuthConfig {
    fn drop(&mut self) {
        match self {
            OriginAuthConfig::None => {}
            OriginAuthConfig::Basic { password, .. } => password.zeroize(),
            OriginAuthConfig::Bearer { token } => token.zeroize(),
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum StorageConfig {
    InMemory,
    Filesystem { path: String },
}

/// Client-facing authentication and authorization.
#[derive(Clone, serde::Deserialize, PartialEq, Eq)]
pub struct AuthConfig {
    /// Username to password.
    pub users: HashMap<String, String>,
    /// Identity to bearer token.
    pub tokens: HashMap<String, String>,
    pub allowed_readers: Vec<String>,
}

impl Debug for AuthConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("users", &self.users.keys().collect::<Vec<_>>())
            .field("tokens", &self.tokens.keys().collect::<Vec<_>>())
            .field("allowed_readers", &self.allowed_readers)
            .finish()
    }
}

impl Drop for AuthConfig {
    fn drop(&mut self) {
        self.users.values_mut().for_each(Zeroize::zeroize);
        self.tokens.values_mut().for_each(Zeroize::zeroize);
    }
}

#[derive(Debug)]
pub enum LoadConfigError {
    ConfigError(ConfigError),
}

impl Display for LoadConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadConfigError::ConfigError(err) => write!(f, "configuration error: {err}"),
        }
    }
}

impl From<ConfigError> for LoadConfigError {
    fn from(err: ConfigError) -> Self {
        LoadConfigError::ConfigError(err)
    }
}

impl std::error::Error for LoadConfigError {}

pub struct ConfigLoader(ConfigBuilder<DefaultState>);

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        ConfigLoader(Config::builder())
    }

    pub fn add_default_sources(self) -> Self {
        self.add_file_source(
            File::with_name(
                &std::env::var("FILEPROXY_SERVER_CONFIG_FILE")
                    .map(Cow::Owned)
                    .unwrap_or(Cow::Borrowed("/etc/fileproxy-server/config.toml")),
            )
            .required(false),
        )
        .add_environment_source(None)
    }

    pub fn add_file_source<T, F>(mut self, file: File<T, F>) -> Self
    where
        File<T, F>: Source + Send + Sync + 'static,
    {
        self.0 = self.0.add_source(file);
        self
    }

    pub fn add_environment_source(mut self, source: Option<Map<String, String>>) -> Self {
        self.0 = self.0.add_source(
            Environment::with_prefix("FILEPROXY")
                .separator("__")
                .prefix_separator("_")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("bind_addrs")
                .with_list_parse_key("auth.allowed_readers")
                .source(source),
        );
        self
    }

    pub fn load(self) -> Result<FileproxyServerConfig, LoadConfigError> {
        self.0
            .set_default("bind_addrs", vec!["0.0.0.0:8708".to_string()])?
            .set_default("enable_api_docs", true)?
            .set_default("log_format", "text")?
            .set_default("origin.url", "")?
            .set_default("origin.timeout", "60s")?
            .set_default("origin.error_policy", "BadGateway")?
            .set_default("origin.auth.type", "None")?
            .set_default("storage.type", "InMemory")?
            .set_default("auth.users", HashMap::<String, String>::new())?
            .set_default("auth.tokens", HashMap::<String, String>::new())?
            .set_default("auth.allowed_readers", Vec::<String>::new())?
            .build()?
            .try_deserialize()
            .map_err(LoadConfigError::from)
    }
}
