//! Authentication of the proxy against the origin.
//!
//! These credentials are independent of the credentials clients present to the proxy.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use http::header::{AUTHORIZATION, InvalidHeaderValue};
use http::{HeaderMap, HeaderValue, Method};
use url::Url;
use zeroize::Zeroizing;

/// An outbound request to the origin, before it is sent.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
}

impl OutboundRequest {
    /// A `GET` request without headers.
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
        }
    }
}

/// Attaches origin credentials to outbound requests.
///
/// Decorating must be deterministic for a given request, i.e. it only depends on the method,
/// URL, and headers of the request and the credentials of the authenticator.
pub trait Authenticator: Send + Sync {
    fn decorate(&self, request: OutboundRequest) -> OutboundRequest;
}

/// Sends requests without credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl Authenticator for NoAuth {
    fn decorate(&self, request: OutboundRequest) -> OutboundRequest {
        request
    }
}

/// HTTP Basic authentication with a username and password.
///
/// # Examples
///
/// ```rust
/// use fileproxy::origin::auth::{Authenticator, BasicAuth, OutboundRequest};
///
/// let auth = BasicAuth::new("alice", "qwerty").unwrap();
/// let request = auth.decorate(OutboundRequest::get("http://origin/foo".parse().unwrap()));
/// assert_eq!(request.headers["authorization"], "Basic YWxpY2U6cXdlcnR5");
/// ```
#[derive(Clone)]
pub struct BasicAuth {
    header: HeaderValue,
}

impl BasicAuth {
    pub fn new(username: &str, password: &str) -> Result<Self, InvalidHeaderValue> {
        let credentials = Zeroizing::new(format!("{username}:{password}"));
        let value = Zeroizing::new(format!("Basic {}", BASE64.encode(credentials.as_bytes())));
        Ok(Self {
            header: sensitive_header(&value)?,
        })
    }
}

impl Authenticator for BasicAuth {
    fn decorate(&self, mut request: OutboundRequest) -> OutboundRequest {
        request.headers.insert(AUTHORIZATION, self.header.clone());
        request
    }
}

/// Bearer token authentication.
#[derive(Clone)]
pub struct BearerAuth {
    header: HeaderValue,
}

impl BearerAuth {
    pub fn new(token: &str) -> Result<Self, InvalidHeaderValue> {
        let value = Zeroizing::new(format!("Bearer {token}"));
        Ok(Self {
            header: sensitive_header(&value)?,
        })
    }
}

impl Authenticator for BearerAuth {
    fn decorate(&self, mut request: OutboundRequest) -> OutboundRequest {
        request.headers.insert(AUTHORIZATION, self.header.clone());
        request
    }
}

fn sensitive_header(value: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut header = HeaderValue::from_str(value)?;
    header.set_sensitive(true);
    Ok(header)
}

impl<A: Authenticator + ?Sized> Authenticator for Box<A> {
    fn decorate(&self, request: OutboundRequest) -> OutboundRequest {
        (**self).decorate(request)
    }
}
