use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use http::HeaderMap;
use http::header::AUTHORIZATION;
use std::fmt::{Debug, Formatter};
use tracing::debug;
use zeroize::Zeroizing;

/// Credentials presented by a client in the `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic {
        username: String,
        password: Zeroizing<String>,
    },
    Bearer(Zeroizing<String>),
}

impl Credentials {
    /// Extracts the credentials from the `Authorization` header.
    ///
    /// Returns `None` if the header is missing or cannot be parsed. Only the `Basic` and
    /// `Bearer` schemes are supported; scheme names are case-insensitive.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fileproxy::auth::Credentials;
    /// use http::{HeaderMap, HeaderValue};
    ///
    /// let mut headers = HeaderMap::new();
    /// headers.insert("authorization", HeaderValue::from_static("Basic YWxpY2U6cXdlcnR5"));
    /// assert_eq!(
    ///     Credentials::from_headers(&headers),
    ///     Some(Credentials::basic("alice", "qwerty"))
    /// );
    /// ```
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(AUTHORIZATION)?;
        let credentials = value.to_str().ok().and_then(Self::parse);
        if credentials.is_none() {
            debug!("ignoring malformed authorization header");
        }
        credentials
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer(Zeroizing::new(token.into()))
    }

    fn parse(value: &str) -> Option<Self> {
        let (scheme, param) = value.trim().split_once(' ')?;
        let param = param.trim();
        if scheme.eq_ignore_ascii_case("basic") {
            let decoded = Zeroizing::new(BASE64.decode(param).ok()?);
            let decoded = std::str::from_utf8(&decoded).ok()?;
            let (username, password) = decoded.split_once(':')?;
            Some(Self::basic(username, password))
        } else if scheme.eq_ignore_ascii_case("bearer") && !param.is_empty() {
            Some(Self::bearer(param))
        } else {
            None
        }
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::Bearer(_) => f.debug_tuple("Bearer").field(&"[REDACTED]").finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(authorization: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(authorization));
        headers
    }

    #[test]
    fn test_no_header_yields_no_credentials() {
        assert_eq!(Credentials::from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn test_parses_basic_credentials() {
        assert_eq!(
            Credentials::from_headers(&headers("basic YWxpY2U6cXdlcnR5")),
            Some(Credentials::basic("alice", "qwerty"))
        );
    }

    #[test]
    fn test_password_may_contain_colons() {
        // "alice:qw:er"
        assert_eq!(
            Credentials::from_headers(&headers("Basic YWxpY2U6cXc6ZXI=")),
            Some(Credentials::basic("alice", "qw:er"))
        );
    }

    #[test]
    fn test_parses_bearer_token() {
        assert_eq!(
            Credentials::from_headers(&headers("Bearer tok-123")),
            Some(Credentials::bearer("tok-123"))
        );
    }

    #[test]
    fn test_rejects_malformed_headers() {
        for value in [
            "Basic",
            "Basic !!!",
            "Basic YWxpY2U=",
            "Bearer ",
            "Digest username=alice",
        ] {
            assert_eq!(Credentials::from_headers(&headers(value)), None, "{value}");
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", Credentials::basic("alice", "qwerty"));
        assert!(debug.contains("alice"));
        assert!(!debug.contains("qwerty"));
        assert!(!format!("{:?}", Credentials::bearer("tok-123")).contains("tok-123"));
    }
}
