//! User registration, login, and session tokens.
//!
//! Passwords are stored as SHA-256 hex digests and session tokens are
//! 32 random bytes in URL-safe base64, matching the service's original
//! account scheme. Registering a user also provisions the tenant's graph
//! tables, so a fresh login can always query.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::{GraphError, Result};
use crate::store::{validate_tenant, SqliteStore};

/// Successful login: the session token to hand back to the client.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    /// Authenticated user and tenant name.
    pub username: String,
    /// Opaque bearer token.
    pub token: String,
}

/// Hex digest used for password storage and comparison.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Creates a user account and provisions its tenant tables.
pub fn register(store: &SqliteStore, username: &str, password: &str) -> Result<()> {
    validate_tenant(username)?;
    if password.is_empty() {
        return Err(GraphError::Auth("password must not be empty".to_string()));
    }
    if store.find_user(username)?.is_some() {
        return Err(GraphError::Auth("username already exists".to_string()));
    }

    store.create_user(username, &hash_password(password), unix_now())?;
    store.provision_tenant(username)?;
    info!(username, "user registered");
    Ok(())
}

/// Verifies credentials and mints a fresh session token.
///
/// Missing tenant tables are re-provisioned on the way in, so an account
/// restored from a backup of the system table still works.
pub fn login(store: &SqliteStore, username: &str, password: &str) -> Result<Session> {
    let Some(user) = store.find_user(username)? else {
        return Err(GraphError::Auth("wrong username or password".to_string()));
    };
    if user.password_hash != hash_password(password) {
        return Err(GraphError::Auth("wrong username or password".to_string()));
    }

    if !store.tenant_exists(username)? {
        store.provision_tenant(username)?;
    }

    let token = generate_token();
    store.record_login(user.user_id, unix_now(), &token)?;
    info!(username, "user logged in");
    Ok(Session {
        username: user.username,
        token,
    })
}

/// Resolves a session token to its username, if the token is live.
pub fn verify_token(store: &SqliteStore, token: &str) -> Result<Option<String>> {
    if token.is_empty() {
        return Ok(None);
    }
    store.username_for_token(token)
}

/// Revokes a session token; called on logout.
pub fn logout(store: &SqliteStore, token: &str) -> Result<()> {
    store.clear_token(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_login_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();

        register(&store, "alice", "secret").unwrap();
        assert!(store.tenant_exists("alice").unwrap());

        // Duplicate registration is rejected.
        assert!(register(&store, "alice", "other").is_err());
        // Names that cannot become table names are rejected.
        assert!(register(&store, "no spaces", "pw").is_err());

        let session = login(&store, "alice", "secret").unwrap();
        assert_eq!(session.username, "alice");
        assert!(!session.token.is_empty());

        assert_eq!(
            verify_token(&store, &session.token).unwrap().as_deref(),
            Some("alice")
        );

        logout(&store, &session.token).unwrap();
        assert!(verify_token(&store, &session.token).unwrap().is_none());
    }

    #[test]
    fn test_login_rejects_bad_credentials() {
        let store = SqliteStore::open_in_memory().unwrap();
        register(&store, "bob", "hunter2").unwrap();

        assert!(login(&store, "bob", "wrong").is_err());
        assert!(login(&store, "nobody", "hunter2").is_err());
    }

    #[test]
    fn test_login_refreshes_token() {
        let store = SqliteStore::open_in_memory().unwrap();
        register(&store, "carol", "pw").unwrap();

        let first = login(&store, "carol", "pw").unwrap();
        let second = login(&store, "carol", "pw").unwrap();
        assert_ne!(first.token, second.token);

        // Only the latest token resolves.
        assert!(verify_token(&store, &first.token).unwrap().is_none());
        assert_eq!(
            verify_token(&store, &second.token).unwrap().as_deref(),
            Some("carol")
        );
    }
}
