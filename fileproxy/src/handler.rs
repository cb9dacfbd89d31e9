//! The proxy request handler, tying authentication, authorization and the cache together.
//!
//! The handler is independent of any HTTP server framework: it consumes a [ProxyRequest] and
//! produces a [ProxyResponse], which the server converts from and to its own types.

use crate::auth::{Action, Authentication, Authorization, Credentials, Gate, Identity};
use crate::content::Content;
use crate::coordinator::{CacheCoordinator, ResolveError, ResolvedContent};
use crate::key::{Key, KeyError};
use crate::origin::Fetch;
use crate::storage::Storage;
use http::header::{ALLOW, CONTENT_TYPE, InvalidHeaderValue, WWW_AUTHENTICATE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use tracing::{field, info};

/// An inbound request. The body is ignored.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Request path, still percent-encoded.
    pub path: String,
    pub headers: HeaderMap,
}

impl ProxyRequest {
    /// A `GET` request for `path` without headers.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            headers: HeaderMap::new(),
        }
    }

    pub fn with_header(mut self, name: http::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// The response to a [ProxyRequest].
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Body of successful responses. Error responses have no body.
    pub body: Option<Content>,
}

impl ProxyResponse {
    fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// How error responses of the origin are reported to clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OriginErrorPolicy {
    /// Respond with `502 Bad Gateway`.
    #[default]
    BadGateway,
    /// Respond with the status code the origin responded with.
    PassThrough,
}

/// Reasons a request was not answered with content.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),
    #[error("client not authenticated")]
    Unauthenticated,
    #[error("{identity} may not {action} artifacts")]
    Unauthorized { identity: Identity, action: Action },
    #[error("invalid key: {0}")]
    InvalidKey(#[from] KeyError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl ProxyError {
    /// The status code this error is reported with.
    pub fn status(&self, policy: OriginErrorPolicy) -> StatusCode {
        match self {
            ProxyError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ProxyError::Unauthorized { .. } => StatusCode::FORBIDDEN,
            ProxyError::InvalidKey(_) => StatusCode::NOT_FOUND,
            ProxyError::Resolve(err) => match err {
                ResolveError::NotFound(_) => StatusCode::NOT_FOUND,
                ResolveError::Origin { status, .. } => match policy {
                    OriginErrorPolicy::BadGateway => StatusCode::BAD_GATEWAY,
                    OriginErrorPolicy::PassThrough => *status,
                },
                ResolveError::Transport { .. } => StatusCode::GATEWAY_TIMEOUT,
                ResolveError::Storage(_)
                | ResolveError::CacheWrite { .. }
                | ResolveError::FlightAborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

/// Handles proxy requests: `GET` only, authenticated, authorized for [Action::Read], and
/// answered from the [CacheCoordinator].
pub struct ProxyHandler<S, F> {
    coordinator: CacheCoordinator<S, F>,
    authentication: Box<dyn Authentication>,
    gate: Gate,
    origin_error_policy: OriginErrorPolicy,
    challenge: HeaderValue,
}

impl<S, F> ProxyHandler<S, F>
where
    S: Storage + Send + Sync + 'static,
    S::Reader: Send + 'static,
    F: Fetch + 'static,
{
    pub fn new(
        coordinator: CacheCoordinator<S, F>,
        authentication: impl Authentication + 'static,
        authorization: impl Authorization + 'static,
    ) -> Self {
        Self {
            coordinator,
            authentication: Box::new(authentication),
            gate: Gate::new(authorization),
            origin_error_policy: OriginErrorPolicy::default(),
            challenge: HeaderValue::from_static("Basic realm=\"fileproxy\""),
        }
    }

    pub fn with_origin_error_policy(mut self, policy: OriginErrorPolicy) -> Self {
        self.origin_error_policy = policy;
        self
    }

    /// Sets the realm announced in the `WWW-Authenticate` challenge of `401` responses.
    pub fn with_realm(mut self, realm: &str) -> Result<Self, InvalidHeaderValue> {
        self.challenge =
            HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm.replace('"', "")))?;
        Ok(self)
    }

    pub fn coordinator(&self) -> &CacheCoordinator<S, F> {
        &self.coordinator
    }

    /// Handles a single request. Every request is answered; failures map to status codes.
    pub async fn handle(&self, request: ProxyRequest) -> ProxyResponse {
        let method = request.method.clone();
        let path = request.path.clone();
        let (response, error) = match self.try_handle(request).await {
            Ok(resolved) => (Self::content_response(resolved), None),
            Err(err) => (self.error_response(&err), Some(err)),
        };
        info!(
            %method,
            path = %path,
            status = response.status.as_u16(),
            error = error.as_ref().map(field::display),
            "handled request"
        );
        response
    }

    async fn try_handle(&self, request: ProxyRequest) -> Result<ResolvedContent, ProxyError> {
        if request.method != Method::GET {
            return Err(ProxyError::MethodNotAllowed(request.method));
        }

        let credentials = Credentials::from_headers(&request.headers);
        let identity = self
            .authentication
            .authenticate(credentials.as_ref())
            .ok_or(ProxyError::Unauthenticated)?;
        if !self.gate.admit(&identity, Action::Read) {
            return Err(ProxyError::Unauthorized {
                identity,
                action: Action::Read,
            });
        }

        let key = Key::from_path(&request.path)?;
        Ok(self.coordinator.resolve(&key).await?)
    }

    fn content_response(resolved: ResolvedContent) -> ProxyResponse {
        let mut headers = HeaderMap::new();
        if let Some(content_type) = resolved
            .content_type
            .as_deref()
            .and_then(|content_type| HeaderValue::from_str(content_type).ok())
        {
            headers.insert(CONTENT_TYPE, content_type);
        }
        ProxyResponse {
            status: StatusCode::OK,
            headers,
            body: Some(resolved.content),
        }
    }

    fn error_response(&self, err: &ProxyError) -> ProxyResponse {
        let mut response = ProxyResponse::empty(err.status(self.origin_error_policy));
        match err {
            ProxyError::MethodNotAllowed(_) => {
                response
                    .headers
                    .insert(ALLOW, HeaderValue::from_static("GET"));
            }
            ProxyError::Unauthenticated => {
                response
                    .headers
                    .insert(WWW_AUTHENTICATE, self.challenge.clone());
            }
            _ => {}
        }
        response
    }
}
