use keyring::Entry;
use tracing::{debug, warn};

use super::credentials::{
    CookiePolicy, CredentialError, CredentialStore, StoredCredential, TokenKind,
};

const SERVICE_NAME: &str = "storefront";

/// Token store backed by the OS keychain, one entry per token kind.
///
/// Entries are resolved once and reused, so every operation on a token kind
/// addresses the same keychain item.
pub struct KeyringCredentialStore {
    access: Entry,
    refresh: Entry,
    policy: CookiePolicy,
}

impl KeyringCredentialStore {
    pub fn new() -> Result<Self, CredentialError> {
        Self::with_service(SERVICE_NAME)
    }

    /// Use a custom keychain service name (one per backend origin, for example)
    pub fn with_service(service: &str) -> Result<Self, CredentialError> {
        Ok(Self::from_entries(
            Entry::new(service, TokenKind::AccessToken.name())?,
            Entry::new(service, TokenKind::RefreshToken.name())?,
        ))
    }

    fn from_entries(access: Entry, refresh: Entry) -> Self {
        Self {
            access,
            refresh,
            policy: CookiePolicy::default(),
        }
    }

    fn entry(&self, kind: TokenKind) -> &Entry {
        match kind {
            TokenKind::AccessToken => &self.access,
            TokenKind::RefreshToken => &self.refresh,
        }
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn set(&self, kind: TokenKind, value: &str, ttl_days: i64) -> Result<(), CredentialError> {
        let payload = serde_json::to_string(&StoredCredential::new(value, ttl_days, self.policy)?)?;
        self.entry(kind).set_password(&payload)?;
        debug!(token = %kind, ttl_days, "Stored credential in keychain");
        Ok(())
    }

    fn get(&self, kind: TokenKind) -> Option<String> {
        let payload = match self.entry(kind).get_password() {
            Ok(payload) => payload,
            Err(keyring::Error::NoEntry) => return None,
            Err(e) => {
                warn!(token = %kind, error = %e, "Failed to read credential from keychain");
                return None;
            }
        };
        match serde_json::from_str::<StoredCredential>(&payload) {
            Ok(stored) if !stored.is_expired() => Some(stored.value),
            Ok(_) => {
                debug!(token = %kind, "Keychain credential expired");
                None
            }
            Err(e) => {
                warn!(token = %kind, error = %e, "Malformed keychain credential");
                None
            }
        }
    }

    fn remove(&self, kind: TokenKind) -> Result<(), CredentialError> {
        match self.entry(kind).delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
