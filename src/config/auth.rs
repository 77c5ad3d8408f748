//! Authentication header building for API requests.

use super::credentials::CredentialStore;

/// Header name and value for authentication.
pub type AuthHeader = (String, String);

/// Build the bearer header from the stored session token.
///
/// Returns `None` when no token is stored, so callers omit the header
/// entirely instead of sending an empty bearer.
pub fn bearer_header(credentials: &CredentialStore) -> Option<AuthHeader> {
    let token = credentials.token()?;
    Some((
        "Authorization".to_string(),
        format!("Bearer {}", token.expose()),
    ))
}
