//! Token persistence.
//!
//! The `CredentialStore` trait is the single source of truth for whether a
//! session is present. Every backend stores the two tokens under fixed names
//! with an absolute expiry and cookie-style security flags. Writes are
//! unconditional overwrites: concurrent writers resolve to last-writer-wins.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Default lifetime of an access token in days.
pub const ACCESS_TOKEN_TTL_DAYS: i64 = 1;

/// Default lifetime of a refresh token in days.
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    #[serde(rename = "accessToken")]
    AccessToken,
    #[serde(rename = "refreshToken")]
    RefreshToken,
}

impl TokenKind {
    pub const ALL: [TokenKind; 2] = [TokenKind::AccessToken, TokenKind::RefreshToken];

    /// Name the token is stored under
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::AccessToken => "accessToken",
            TokenKind::RefreshToken => "refreshToken",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// Security flags recorded alongside every stored token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookiePolicy {
    pub secure: bool,
    pub same_site: SameSite,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            secure: true,
            same_site: SameSite::Strict,
        }
    }
}

/// A persisted token value with its absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub value: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub policy: CookiePolicy,
}

impl StoredCredential {
    /// Stamp `value` with an expiry `ttl_days` from now.
    /// Fails with `InvalidLifetime` when the expiry is out of range.
    pub fn new(value: &str, ttl_days: i64, policy: CookiePolicy) -> Result<Self, CredentialError> {
        let expires_at = Duration::try_days(ttl_days)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or(CredentialError::InvalidLifetime(ttl_days))?;
        Ok(Self {
            value: value.to_string(),
            expires_at,
            policy,
        })
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Credential file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Failed to encode credential: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Token lifetime of {0} days is out of range")]
    InvalidLifetime(i64),
}

/// Durable key-value persistence for the access/refresh token pair.
pub trait CredentialStore: Send + Sync {
    /// Store a token, overwriting any previous value.
    fn set(&self, kind: TokenKind, value: &str, ttl_days: i64) -> Result<(), CredentialError>;

    /// Current value, or `None` when absent, expired or unreadable.
    fn get(&self, kind: TokenKind) -> Option<String>;

    /// Delete a token. Removing an absent token is not an error.
    fn remove(&self, kind: TokenKind) -> Result<(), CredentialError>;

    /// Remove both tokens. Failures are logged, never propagated.
    fn clear(&self) {
        for kind in TokenKind::ALL {
            if let Err(e) = self.remove(kind) {
                warn!(token = %kind, error = %e, "Failed to remove credential");
            }
        }
    }
}

/// Process-local store. Used by tests and short-lived tools.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: RwLock<HashMap<TokenKind, StoredCredential>>,
    policy: CookiePolicy,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw entry including expiry metadata
    pub fn entry(&self, kind: TokenKind) -> Option<StoredCredential> {
        self.entries.read().get(&kind).cloned()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn set(&self, kind: TokenKind, value: &str, ttl_days: i64) -> Result<(), CredentialError> {
        let credential = StoredCredential::new(value, ttl_days, self.policy)?;
        self.entries.write().insert(kind, credential);
        debug!(token = %kind, ttl_days, "Stored credential");
        Ok(())
    }

    fn get(&self, kind: TokenKind) -> Option<String> {
        let expired = match self.entries.read().get(&kind) {
            Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.write().remove(&kind);
            debug!(token = %kind, "Dropped expired credential");
        }
        None
    }

    fn remove(&self, kind: TokenKind) -> Result<(), CredentialError> {
        self.entries.write().remove(&kind);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get() {
        let store = MemoryCredentialStore::new();
        store.set(TokenKind::AccessToken, "abc", 1).unwrap();
        assert_eq!(store.get(TokenKind::AccessToken).as_deref(), Some("abc"));
        assert_eq!(store.get(TokenKind::RefreshToken), None);
    }

    #[test]
    fn test_set_overwrites() {
        let store = MemoryCredentialStore::new();
        store.set(TokenKind::RefreshToken, "old", 7).unwrap();
        store.set(TokenKind::RefreshToken, "new", 7).unwrap();
        assert_eq!(store.get(TokenKind::RefreshToken).as_deref(), Some("new"));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let store = MemoryCredentialStore::new();
        store.set(TokenKind::AccessToken, "abc", 1).unwrap();
        store.remove(TokenKind::AccessToken).unwrap();
        store.remove(TokenKind::AccessToken).unwrap();
        assert_eq!(store.get(TokenKind::AccessToken), None);
    }

    #[test]
    fn test_expired_entry_reads_as_absent() {
        let store = MemoryCredentialStore::new();
        store.set(TokenKind::AccessToken, "abc", 0).unwrap();
        assert_eq!(store.get(TokenKind::AccessToken), None);
        assert!(store.entry(TokenKind::AccessToken).is_none());
    }

    #[test]
    fn test_entry_carries_policy_and_expiry() {
        let store = MemoryCredentialStore::new();
        store.set(TokenKind::RefreshToken, "r", REFRESH_TOKEN_TTL_DAYS).unwrap();
        let entry = store.entry(TokenKind::RefreshToken).unwrap();
        assert!(entry.policy.secure);
        assert_eq!(entry.policy.same_site, SameSite::Strict);
        let remaining = entry.expires_at - Utc::now();
        assert!(remaining > Duration::days(6));
        assert!(remaining <= Duration::days(7));
    }

    #[test]
    fn test_out_of_range_lifetime_is_rejected() {
        let store = MemoryCredentialStore::new();
        store.set(TokenKind::AccessToken, "keep", 1).unwrap();

        let err = store.set(TokenKind::AccessToken, "huge", i64::MAX).unwrap_err();
        assert!(matches!(err, CredentialError::InvalidLifetime(i64::MAX)));
        assert!(store.set(TokenKind::RefreshToken, "r", i64::MIN).is_err());

        // Rejected writes leave the previous value in place
        assert_eq!(store.get(TokenKind::AccessToken).as_deref(), Some("keep"));
        assert_eq!(store.get(TokenKind::RefreshToken), None);
    }

    #[test]
    fn test_clear_removes_both() {
        let store = MemoryCredentialStore::new();
        store.set(TokenKind::AccessToken, "a", 1).unwrap();
        store.set(TokenKind::RefreshToken, "r", 7).unwrap();
        store.clear();
        assert_eq!(store.get(TokenKind::AccessToken), None);
        assert_eq!(store.get(TokenKind::RefreshToken), None);
    }

    #[test]
    fn test_token_names() {
        assert_eq!(TokenKind::AccessToken.name(), "accessToken");
        assert_eq!(TokenKind::RefreshToken.to_string(), "refreshToken");
    }
}
