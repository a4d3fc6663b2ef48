//! Session core for the storefront client.
//!
//! - `auth`: token persistence and the in-memory session projection
//! - `api`: the authenticated HTTP pipeline with single-retry token refresh
//! - `controller`: startup recovery, login, logout and profile state
//! - `models`: wire types for the auth API
//! - `config`: backend origin, navigation paths and token lifetimes

pub mod api;
pub mod auth;
pub mod config;
pub mod controller;
pub mod models;

pub use api::{ApiClient, ApiError, ApiRequest};
pub use auth::{
    CredentialStore, FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore,
    SessionEvent, SessionStatus, TokenKind,
};
pub use config::Config;
pub use controller::{LoginOutcome, NavTarget, SessionController};
pub use models::UserProfile;
