//! REST API client for the storefront backend.
//!
//! This module provides the `ApiClient` and its request pipeline:
//! - `RequestAuthenticator` attaches the stored access token to each request
//! - `RefreshCoordinator` exchanges the refresh token after a 401 and hands
//!   the request back for a single replay
//!
//! The backend authenticates with JWT bearer tokens issued by
//! `/api/auth/login` and renewed by `/api/auth/refresh-token`.

pub mod authenticator;
pub mod client;
pub mod error;
mod refresh;
pub mod request;

pub use authenticator::RequestAuthenticator;
pub use client::ApiClient;
pub use error::ApiError;
pub use request::ApiRequest;
