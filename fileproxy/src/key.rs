//! Hierarchical keys identifying artifacts.

use std::fmt::{Display, Formatter};

/// Identifies an artifact by an ordered sequence of path segments, e.g. `["foo", "bar"]`.
///
/// The same key is used as index into the local content store and as suffix of the origin
/// URL. Keys are validated on construction: there is at least one segment, and no segment is
/// empty, `.`, `..`, or contains a `/` or NUL character. Thus, a key can never address anything
/// outside the store it is used with.
///
/// # Examples
///
/// ```rust
/// use fileproxy::key::Key;
///
/// let key = Key::from_path("/foo//bar%20baz").unwrap();
/// assert_eq!(key.segments(), ["foo", "bar baz"]);
/// assert_eq!(key.to_string(), "foo/bar baz");
/// assert!(Key::from_path("/foo/../bar").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    segments: Vec<String>,
}

/// Error returned for paths or segments that do not form a valid [Key].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("key must contain at least one segment")]
    Empty,
    #[error("invalid key segment: {0:?}")]
    InvalidSegment(String),
    #[error("key segment is not valid percent-encoded UTF-8: {0:?}")]
    InvalidEncoding(String),
}

impl Key {
    /// Creates a key from already decoded segments.
    pub fn new<I, S>(segments: I) -> Result<Self, KeyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments = segments
            .into_iter()
            .map(Into::into)
            .map(validate_segment)
            .collect::<Result<Vec<_>, _>>()?;
        if segments.is_empty() {
            return Err(KeyError::Empty);
        }
        Ok(Self { segments })
    }

    /// Parses a key from the path of a request.
    ///
    /// Empty segments, as produced by leading, trailing, or repeated slashes, are ignored.
    /// Each remaining segment is percent-decoded.
    pub fn from_path(path: &str) -> Result<Self, KeyError> {
        Self::new(
            path.split('/')
                .filter(|segment| !segment.is_empty())
                .map(|segment| {
                    urlencoding::decode(segment)
                        .map(|decoded| decoded.into_owned())
                        .map_err(|_| KeyError::InvalidEncoding(segment.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?,
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Absolute, `/`-separated path of this key as used by [crate::storage::Storage].
    pub fn storage_path(&self) -> String {
        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            path.push_str(segment);
        }
        path
    }
}

fn validate_segment(segment: String) -> Result<String, KeyError> {
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\0'])
    {
        return Err(KeyError::InvalidSegment(segment));
    }
    Ok(segment)
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}
