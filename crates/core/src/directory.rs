//! User directory lookup seam.
//!
//! The override service resolves recipients through [`UserDirectory`]; hosts
//! plug in whatever user store they have. [`InMemoryDirectory`] covers tests
//! and hosts without one.

use std::collections::HashMap;

use crate::models::Recipient;

/// Lookup of directory users by email address.
pub trait UserDirectory: Send + Sync {
    /// Find the user registered under the given address, if any.
    fn find_by_email(&self, email: &str) -> Option<Recipient>;
}

/// A directory backed by an in-memory map, keyed by lowercased address.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: HashMap<String, Recipient>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a user, keyed by their email address.
    pub fn insert(&mut self, user: Recipient) {
        self.users.insert(user.email.to_lowercase(), user);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserDirectory for InMemoryDirectory {
    fn find_by_email(&self, email: &str) -> Option<Recipient> {
        self.users.get(&email.to_lowercase()).cloned()
    }
}

/// A directory that knows nobody.
#[derive(Debug, Default)]
pub struct EmptyDirectory;

impl UserDirectory for EmptyDirectory {
    fn find_by_email(&self, _email: &str) -> Option<Recipient> {
        None
    }
}
