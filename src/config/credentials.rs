//! Session credential storage.
//!
//! Holds the bearer token and user role issued at login. The token is
//! read on every outgoing request and when the push channel connects.

use std::sync::Arc;

use super::store::{KeyValueStore, MemoryStore};

/// Storage key for the bearer token.
pub const TOKEN_KEY: &str = "auth_token";
/// Storage key for the user role.
pub const ROLE_KEY: &str = "user_role";

/// Wrapper for sensitive strings that prevents accidental logging.
///
/// The inner value is never exposed via Debug or Display traits.
/// Use `expose()` to access the actual value when needed for API calls.
#[derive(Clone, PartialEq, Eq)]
pub struct SecureString(String);

impl SecureString {
    /// Create a new secure string.
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// Expose the inner value.
    ///
    /// Use sparingly and only when actually sending to APIs.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureString(••••••••)")
    }
}

impl std::fmt::Display for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "••••••••")
    }
}

/// Durable holder of the session's bearer token and role.
///
/// Cheap to clone; every clone shares the same backing store. Clearing
/// the token and clearing the role are two separate atomic writes.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Store backed by process memory only.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Current bearer token. Blank values count as absent.
    pub fn token(&self) -> Option<SecureString> {
        non_blank(self.backend.get(TOKEN_KEY)).map(SecureString::new)
    }

    pub fn set_token(&self, token: &str) {
        if token.trim().is_empty() {
            self.clear_token();
            return;
        }
        self.backend.set(TOKEN_KEY, token);
    }

    pub fn clear_token(&self) {
        self.backend.remove(TOKEN_KEY);
    }

    pub fn role(&self) -> Option<String> {
        non_blank(self.backend.get(ROLE_KEY))
    }

    pub fn set_role(&self, role: &str) {
        if role.trim().is_empty() {
            self.clear_role();
            return;
        }
        self.backend.set(ROLE_KEY, role);
    }

    pub fn clear_role(&self) {
        self.backend.remove(ROLE_KEY);
    }

    /// Forget the whole session.
    pub fn clear(&self) {
        self.clear_token();
        self.clear_role();
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_string_does_not_leak() {
        let secret = SecureString::new("my-secret-key".to_string());

        // Debug should mask
        let debug_output = format!("{:?}", secret);
        assert!(!debug_output.contains("my-secret-key"));
        assert!(debug_output.contains("••••••••"));

        // Display should mask
        let display_output = format!("{}", secret);
        assert!(!display_output.contains("my-secret-key"));
        assert!(display_output.contains("••••••••"));

        // expose() should reveal
        assert_eq!(secret.expose(), "my-secret-key");
    }

    #[test]
    fn blank_token_is_absent() {
        let store = CredentialStore::in_memory();
        store.set_token("   ");
        assert!(store.token().is_none());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn clear_removes_token_and_role() {
        let store = CredentialStore::in_memory();
        store.set_token("tok");
        store.set_role("Admin");
        store.clear();
        assert!(store.token().is_none());
        assert!(store.role().is_none());
    }
}
