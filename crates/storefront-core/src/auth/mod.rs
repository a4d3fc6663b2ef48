//! Authentication state: token persistence and the session projection.
//!
//! This module provides:
//! - `CredentialStore`: access/refresh token persistence with expiry, backed by
//!   memory, a JSON file in the cache directory, or the OS keychain
//! - `SharedSession`: the in-memory authenticated-user projection
//! - `SessionEvent`: notifications for whoever owns navigation
//!
//! Access tokens live for 1 day and refresh tokens for 7 days by default.

pub mod credentials;
pub mod file_store;
pub mod keyring_store;
pub mod session;

pub use credentials::{
    CookiePolicy, CredentialError, CredentialStore, MemoryCredentialStore, SameSite,
    StoredCredential, TokenKind, ACCESS_TOKEN_TTL_DAYS, REFRESH_TOKEN_TTL_DAYS,
};
pub use file_store::FileCredentialStore;
pub use keyring_store::KeyringCredentialStore;
pub use session::{SessionEvent, SessionSnapshot, SessionStatus, SharedSession};
