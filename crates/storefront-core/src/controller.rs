//! Application-facing session lifecycle.
//!
//! The `SessionController` is built once per process over an injected
//! credential store. It recovers the session at startup, performs login and
//! logout, and exposes the current user. Navigation is left to the caller:
//! operations return a `NavTarget` and expiry is broadcast as
//! `SessionEvent::Expired`.

use std::sync::Arc;

use tokio::sync::{broadcast, OnceCell};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::auth::{CredentialStore, SessionEvent, SessionStatus, TokenKind};
use crate::config::Config;
use crate::models::{AuthResponse, RegisterRequest, UserProfile};

/// Where the caller should send the user next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavTarget {
    Home,
    Admin,
    Login,
}

impl NavTarget {
    pub fn path<'a>(&self, config: &'a Config) -> &'a str {
        match self {
            NavTarget::Home => &config.home_path,
            NavTarget::Admin => &config.admin_path,
            NavTarget::Login => &config.login_path,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: UserProfile,
    pub landing: NavTarget,
}

pub struct SessionController {
    api: ApiClient,
    restored: OnceCell<SessionStatus>,
}

impl SessionController {
    pub fn new(config: Config, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        Ok(Self::with_client(ApiClient::new(config, store)?))
    }

    pub fn with_client(api: ApiClient) -> Self {
        Self {
            api,
            restored: OnceCell::new(),
        }
    }

    /// Client for application requests; shares this controller's session
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn config(&self) -> &Config {
        self.api.config()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.api.subscribe()
    }

    pub async fn status(&self) -> SessionStatus {
        self.api.session().status().await
    }

    pub async fn is_authenticated(&self) -> bool {
        self.status().await == SessionStatus::Authenticated
    }

    pub async fn current_user(&self) -> Option<UserProfile> {
        self.api.session().user().await
    }

    // =========================================================================
    // Startup Recovery
    // =========================================================================

    /// Recover the session from stored tokens. Runs once per controller;
    /// later calls return the status without touching the network.
    ///
    /// Never redirects: a failed recovery simply leaves the session anonymous.
    pub async fn restore(&self) -> SessionStatus {
        self.restored.get_or_init(|| self.recover()).await;
        self.status().await
    }

    async fn recover(&self) -> SessionStatus {
        let store = self.api.store();
        if store.get(TokenKind::AccessToken).is_none() {
            debug!("No stored access token");
            self.api.session().clear().await;
            return SessionStatus::Anonymous;
        }

        match self.api.fetch_current_user_once().await {
            Ok(user) => {
                info!(user_id = %user.id, "Session restored");
                self.api.session().set_authenticated(user).await;
                return SessionStatus::Authenticated;
            }
            Err(e) => debug!(error = %e, "Stored access token rejected"),
        }

        let Some(refresh_token) = store.get(TokenKind::RefreshToken) else {
            debug!("No refresh token, session not recoverable");
            return self.abandon().await;
        };

        let tokens = match self.api.refresh_tokens(&refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "Refresh during startup failed");
                return self.abandon().await;
            }
        };
        if let Err(e) = self.api.persist_refreshed(&tokens) {
            warn!(error = %e, "Failed to persist refreshed tokens");
            return self.abandon().await;
        }

        let user = match self.api.fetch_current_user_once().await {
            Ok(user) => user,
            Err(e) => match tokens.user {
                Some(user) => {
                    warn!(error = %e, "Profile fetch failed after refresh, using refresh profile");
                    user
                }
                None => {
                    warn!(error = %e, "Profile fetch failed after refresh");
                    return self.abandon().await;
                }
            },
        };
        info!(user_id = %user.id, "Session restored after refresh");
        self.api.session().set_authenticated(user).await;
        SessionStatus::Authenticated
    }

    async fn abandon(&self) -> SessionStatus {
        self.api.store().clear();
        self.api.session().clear().await;
        SessionStatus::Anonymous
    }

    // =========================================================================
    // Login / Logout
    // =========================================================================

    /// Log in and persist both tokens.
    ///
    /// The full profile is fetched and laid over the one login returned; if
    /// that fetch fails the login profile is used as-is. On failure the
    /// session is left untouched and the server's message is in the error.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        let auth = match self.api.login(email, password).await {
            Ok(auth) => auth,
            Err(e) => {
                warn!(error = %e, "Login failed");
                return Err(e);
            }
        };
        self.api
            .persist_tokens(&auth.access_token, Some(&auth.refresh_token))?;

        // Single attempt: tokens were just issued, a refresh cannot help here
        let user = match self.api.fetch_current_user_once().await {
            Ok(full) => full.merged_over(&auth.user),
            Err(e) => {
                warn!(error = %e, "Failed to fetch full profile after login");
                auth.user
            }
        };

        let landing = if user.has_role(&self.config().admin_role) {
            NavTarget::Admin
        } else {
            NavTarget::Home
        };
        info!(user_id = %user.id, ?landing, "Login successful");

        self.api.session().set_authenticated(user.clone()).await;
        let _ = self.api.events().send(SessionEvent::SignedIn(user.clone()));
        Ok(LoginOutcome { user, landing })
    }

    /// Log out. Local state is always cleared; the backend is notified on a
    /// best-effort basis.
    pub async fn logout(&self) -> NavTarget {
        if let Some(refresh_token) = self.api.store().get(TokenKind::RefreshToken) {
            if let Err(e) = self.api.logout(&refresh_token).await {
                warn!(error = %e, "Logout notification failed");
            }
        }
        self.api.store().clear();
        self.api.session().clear().await;
        let _ = self.api.events().send(SessionEvent::SignedOut);
        info!("Logged out");
        NavTarget::Login
    }

    // =========================================================================
    // Account
    // =========================================================================

    /// Create an account. Does not sign in; the caller logs in afterwards.
    pub async fn register(&self, registration: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        self.api.register(registration).await
    }

    /// Ask the backend to send a reset code; returns the server's message
    pub async fn forgot_password(&self, email: &str) -> Result<String, ApiError> {
        Ok(self.api.forgot_password(email).await?.message)
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<String, ApiError> {
        Ok(self.api.reset_password(token, new_password).await?.message)
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Re-fetch the profile from the server and replace the local copy
    pub async fn refresh_profile(&self) -> Result<UserProfile, ApiError> {
        let user = self.api.fetch_current_user().await?;
        self.api.session().set_authenticated(user.clone()).await;
        Ok(user)
    }

    /// Replace the local profile, e.g. after the caller saved account edits.
    /// Ignored (returns false) when nobody is signed in.
    pub async fn update_profile(&self, user: UserProfile) -> bool {
        self.api.session().replace_user(user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nav_target_paths_follow_config() {
        let mut config = Config::default();
        assert_eq!(NavTarget::Home.path(&config), "/");
        assert_eq!(NavTarget::Admin.path(&config), "/admin/dashboard");
        assert_eq!(NavTarget::Login.path(&config), "/auth/login");

        config.login_path = "/signin".to_string();
        assert_eq!(NavTarget::Login.path(&config), "/signin");
    }
}
