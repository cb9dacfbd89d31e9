use super::{Authentication, Credentials, Identity};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Treats every client as [Identity::anonymous], with or without credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl Authentication for Anonymous {
    fn authenticate(&self, _credentials: Option<&Credentials>) -> Option<Identity> {
        Some(Identity::anonymous())
    }
}

/// A static table of users authenticating with a password (Basic) or a token (Bearer).
///
/// # Examples
///
/// ```rust
/// use fileproxy::auth::{Authentication, Credentials, Identity, Users};
///
/// let users = Users::default()
///     .with_user("alice", "qwerty")
///     .with_token("tok-123", "ci");
/// assert_eq!(
///     users.authenticate(Some(&Credentials::basic("alice", "qwerty"))),
///     Some(Identity::new("alice"))
/// );
/// assert_eq!(
///     users.authenticate(Some(&Credentials::bearer("tok-123"))),
///     Some(Identity::new("ci"))
/// );
/// assert_eq!(users.authenticate(None), None);
/// ```
#[derive(Clone, Default)]
pub struct Users {
    passwords: HashMap<String, Zeroizing<String>>,
    tokens: Vec<(Zeroizing<String>, Identity)>,
}

impl Users {
    /// A table with a single user.
    pub fn single(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::default().with_user(username, password)
    }

    pub fn with_user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.passwords
            .insert(username.into(), Zeroizing::new(password.into()));
        self
    }

    pub fn with_token(mut self, token: impl Into<String>, identity: impl Into<String>) -> Self {
        self.tokens
            .push((Zeroizing::new(token.into()), Identity::new(identity)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.passwords.is_empty() && self.tokens.is_empty()
    }
}

impl Authentication for Users {
    fn authenticate(&self, credentials: Option<&Credentials>) -> Option<Identity> {
        match credentials? {
            Credentials::Basic { username, password } => {
                let expected = self.passwords.get(username);
                // Compare against the password itself for unknown users to keep the timing
                // independent of whether the user exists.
                let matches = secret_eq(password, expected.unwrap_or(password));
                if expected.is_some() && matches {
                    Some(Identity::new(username.as_str()))
                } else {
                    None
                }
            }
            Credentials::Bearer(token) => {
                let mut found = None;
                for (expected, identity) in &self.tokens {
                    if secret_eq(token, expected) {
                        found = Some(identity.clone());
                    }
                }
                found
            }
        }
    }
}

/// Constant-time comparison of secrets.
fn secret_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

impl Debug for Users {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Users")
            .field("users", &self.passwords.keys().collect::<Vec<_>>())
            .field("tokens", &self.tokens.len())
            .finish()
    }
}
