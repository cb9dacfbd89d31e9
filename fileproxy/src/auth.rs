//! Client-facing authentication and authorization.
//!
//! Authentication turns the [Credentials] of a request into an [Identity] (or rejects them),
//! authorization decides whether an identity may perform an [Action]. Both are traits, so that
//! the proxy can be combined with any identity provider or policy. The credentials used towards
//! the origin are unrelated and live in [crate::origin::auth].

mod credentials;
mod policy;
mod users;

pub use credentials::Credentials;
pub use policy::{AllowAll, AllowList};
pub use users::{Anonymous, Users};

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tracing::info;

/// An authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    name: String,
}

impl Identity {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The identity of clients when authentication is disabled.
    pub fn anonymous() -> Self {
        Self::new("anonymous")
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// An action a client wants to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Action {
    /// Reading an artifact.
    Read,
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Read => f.write_str("read"),
        }
    }
}

/// Establishes the identity of a client.
pub trait Authentication: Send + Sync {
    /// Returns the identity the credentials belong to, or `None` if the client could not be
    /// authenticated. `credentials` is `None` if the client did not send any.
    fn authenticate(&self, credentials: Option<&Credentials>) -> Option<Identity>;
}

impl<A: Authentication + ?Sized> Authentication for Box<A> {
    fn authenticate(&self, credentials: Option<&Credentials>) -> Option<Identity> {
        (**self).authenticate(credentials)
    }
}

/// Decides whether an identity may perform an action.
///
/// Any `Fn(&Identity, Action) -> bool` closure is an authorization:
///
/// ```rust
/// use fileproxy::auth::{Action, Authorization, Identity};
///
/// let only_alice = |identity: &Identity, _action: Action| identity.name() == "alice";
/// assert!(only_alice.authorize(&Identity::new("alice"), Action::Read));
/// assert!(!only_alice.authorize(&Identity::new("bob"), Action::Read));
/// ```
pub trait Authorization: Send + Sync {
    fn authorize(&self, identity: &Identity, action: Action) -> bool;
}

impl<F> Authorization for F
where
    F: Fn(&Identity, Action) -> bool + Send + Sync,
{
    fn authorize(&self, identity: &Identity, action: Action) -> bool {
        self(identity, action)
    }
}

/// Admits requests based on an injected [Authorization] decision.
#[derive(Clone)]
pub struct Gate {
    authorization: Arc<dyn Authorization>,
}

impl Gate {
    pub fn new(authorization: impl Authorization + 'static) -> Self {
        Self {
            authorization: Arc::new(authorization),
        }
    }

    /// Checks whether `identity` may perform `action`. Denials are logged.
    pub fn admit(&self, identity: &Identity, action: Action) -> bool {
        let allowed = self.authorization.authorize(identity, action);
        if !allowed {
            info!(%identity, %action, "access denied");
        }
        allowed
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new(AllowAll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_gate_delegates_to_authorization() {
        let gate = Gate::new(|identity: &Identity, action: Action| {
            identity.name() == "alice" && action == Action::Read
        });
        assert!(gate.admit(&Identity::new("alice"), Action::Read));
        assert!(!gate.admit(&Identity::new("bob"), Action::Read));
    }

    #[test]
    fn test_gate_asks_authorization_on_every_request() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = {
            let calls = Arc::clone(&calls);
            Gate::new(move |_: &Identity, _: Action| {
                calls.fetch_add(1, Ordering::SeqCst);
                true
            })
        };
        gate.admit(&Identity::anonymous(), Action::Read);
        gate.admit(&Identity::anonymous(), Action::Read);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_default_gate_admits_everyone() {
        assert!(Gate::default().admit(&Identity::anonymous(), Action::Read));
    }

    #[test]
    fn test_action_display() {
        assert_eq!(Action::Read.to_string(), "read");
    }
}
