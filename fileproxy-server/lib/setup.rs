//! Assembles the proxy from its configuration.

use crate::config::{AuthConfig, FileproxyServerConfig, OriginAuthConfig, OriginConfig};
use crate::storage::create_storage;
use anyhow::{Context, Result, bail};
use fileproxy::auth::{Action, AllowList, Anonymous, Authentication, Authorization, Identity, Users};
use fileproxy::coordinator::CacheCoordinator;
use fileproxy::handler::ProxyHandler;
use fileproxy::origin::auth::{Authenticator, BasicAuth, BearerAuth, NoAuth};
use fileproxy::origin::http::HttpOrigin;
use fileproxy::storage::dispatcher::StorageDispatcher;
use fileproxy::store::ContentStore;
use tracing::info;
use url::Url;

/// The proxy as run by the server.
pub type Proxy = ProxyHandler<StorageDispatcher, HttpOrigin>;

/// Creates the proxy handler described by `config`.
pub fn create_proxy(config: &FileproxyServerConfig) -> Result<Proxy> {
    let storage = create_storage(&config.storage).context("failed to set up storage")?;
    let origin = create_origin(&config.origin)?;
    let coordinator = CacheCoordinator::new(ContentStore::new(storage), origin);
    Ok(ProxyHandler::new(
        coordinator,
        create_authentication(&config.auth),
        create_authorization(&config.auth),
    )
    .with_origin_error_policy(config.origin.error_policy.into()))
}

pub fn create_origin(config: &OriginConfig) -> Result<HttpOrigin> {
    if config.url.is_empty() {
        bail!("no origin URL configured");
    }
    let url = Url::parse(&config.url)
        .with_context(|| format!("invalid origin URL '{}'", config.url))?;
    let timeout = humantime::parse_duration(&config.timeout)
        .with_context(|| format!("invalid origin timeout '{}'", config.timeout))?;
    let authenticator: Box<dyn Authenticator> = match &config.auth {
        OriginAuthConfig::None => Box::new(NoAuth),
        OriginAuthConfig::Basic { username, password } => Box::new(
            BasicAuth::new(username, password).context("invalid origin credentials")?,
        ),
        OriginAuthConfig::Bearer { token } => {
            Box::new(BearerAuth::new(token).context("invalid origin token")?)
        }
    };
    info!(origin = %url, ?timeout, "using origin");
    Ok(HttpOrigin::new(url, timeout, authenticator)?)
}

fn create_authentication(config: &AuthConfig) -> Box<dyn Authentication> {
    let mut users = Users::default();
    for (username, password) in &config.users {
        users = users.with_user(username.as_str(), password.as_str());
    }
    for (identity, token) in &config.tokens {
        users = users.with_token(token.as_str(), identity.as_str());
    }
    if users.is_empty() {
        info!("client authentication disabled, serving anonymous clients");
        Box::new(Anonymous)
    } else {
        Box::new(users)
    }
}

fn create_authorization(config: &AuthConfig) -> impl Authorization + 'static {
    let allow_list =
        (!config.allowed_readers.is_empty()).then(|| AllowList::new(&config.allowed_readers));
    move |identity: &Identity, action: Action| {
        allow_list
            .as_ref()
            .is_none_or(|allow_list| allow_list.authorize(identity, action))
    }
}
