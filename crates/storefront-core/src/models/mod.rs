//! Wire models for the storefront auth API.
//!
//! - `UserProfile`: the signed-in user, with unmodeled fields preserved
//! - Request/response bodies for login, registration, refresh, logout and
//!   password reset

pub mod auth;
pub mod user;

pub use auth::{
    AuthResponse, ForgotPasswordRequest, LoginRequest, LogoutRequest, MeResponse,
    MessageResponse, RefreshRequest, RefreshResponse, RegisterRequest, ResetPasswordRequest,
};
pub use user::UserProfile;
