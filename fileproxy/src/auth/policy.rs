use super::{Action, Authorization, Identity};
use std::collections::HashSet;

/// Allows every identity every action.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorization for AllowAll {
    fn authorize(&self, _identity: &Identity, _action: Action) -> bool {
        true
    }
}

/// Allows only the listed identities to read.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    readers: HashSet<String>,
}

impl AllowList {
    pub fn new<I, S>(readers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            readers: readers.into_iter().map(Into::into).collect(),
        }
    }
}

impl Authorization for AllowList {
    fn authorize(&self, identity: &Identity, action: Action) -> bool {
        match action {
            Action::Read => self.readers.contains(identity.name()),
        }
    }
}
