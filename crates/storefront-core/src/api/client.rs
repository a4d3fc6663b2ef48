//! API client for the storefront backend.
//!
//! Every authenticated call goes through `ApiClient::execute`, which attaches
//! the current access token and, on a first 401, refreshes the token and
//! replays the call exactly once. Auth endpoints that must never recurse into
//! a refresh are sent with `dispatch`/`dispatch_public` instead.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::auth::{CredentialStore, SessionEvent, SharedSession, TokenKind};
use crate::config::Config;
use crate::models::{
    AuthResponse, ForgotPasswordRequest, LoginRequest, LogoutRequest, MeResponse,
    MessageResponse, RefreshRequest, RefreshResponse, RegisterRequest, ResetPasswordRequest,
    UserProfile,
};

use super::authenticator::RequestAuthenticator;
use super::refresh::RefreshCoordinator;
use super::{ApiError, ApiRequest};

// ============================================================================
// Constants
// ============================================================================

const LOGIN_PATH: &str = "/api/auth/login";
const REGISTER_PATH: &str = "/api/auth/register";
const REFRESH_PATH: &str = "/api/auth/refresh-token";
const LOGOUT_PATH: &str = "/api/auth/logout";
const FORGOT_PASSWORD_PATH: &str = "/api/auth/forgot-password";
const RESET_PASSWORD_PATH: &str = "/api/auth/reset-password";
const CURRENT_USER_PATH: &str = "/api/users/me";

/// Buffer size for the session event channel.
/// Events are rare (sign-in, sign-out, expiry); 16 leaves headroom for slow
/// subscribers.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// API client for the storefront backend.
/// Clone is cheap - reqwest::Client and the store are shared.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    config: Arc<Config>,
    store: Arc<dyn CredentialStore>,
    session: SharedSession,
    events: broadcast::Sender<SessionEvent>,
}

impl ApiClient {
    /// Create a new API client over the given credential store
    pub fn new(config: Config, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            http,
            config: Arc::new(config),
            store,
            session: SharedSession::new(),
            events,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &dyn CredentialStore {
        self.store.as_ref()
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub(crate) fn events(&self) -> &broadcast::Sender<SessionEvent> {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn authenticator(&self) -> RequestAuthenticator<'_> {
        RequestAuthenticator::new(&self.http, &self.config, self.store.as_ref())
    }

    // ===== Request Pipeline =====

    /// Send once with the current access token attached. No refresh.
    pub async fn dispatch(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        let built = self.authenticator().build(request)?;
        debug!(
            method = %request.method,
            path = %request.path,
            attempt = request.attempt(),
            "Dispatching request"
        );
        Ok(self.http.execute(built).await?)
    }

    /// Send once without credentials
    async fn dispatch_public(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        let built = self.authenticator().build_public(request)?;
        debug!(method = %request.method, path = %request.path, "Dispatching public request");
        Ok(self.http.execute(built).await?)
    }

    /// Send an authenticated request, recovering once from an expired token.
    ///
    /// Any response other than 401 is returned unchanged, success or not.
    /// A first-attempt 401 refreshes the token and replays the request once;
    /// whatever the replay returns is final, and a replay that is again 401
    /// becomes `ApiError::Unauthorized`.
    pub async fn execute(&self, request: ApiRequest) -> Result<Response, ApiError> {
        let response = self.dispatch(&request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        if request.is_retry() {
            return Err(ApiError::from_response(response).await);
        }

        let original = ApiError::from_response(response).await;
        let retry = RefreshCoordinator::new(self).recover(request, original).await?;

        let response = self.dispatch(&retry).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(path = %retry.path, "Request still unauthorized after token refresh");
            return Err(ApiError::from_response(response).await);
        }
        Ok(response)
    }

    /// Parse a successful JSON response, or turn the status into an error
    async fn expect_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        if !response.status().is_success() {
            return Err(ApiError::from_response(response).await);
        }
        let url = response.url().path().to_string();
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", url, e)))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        Self::expect_json(self.execute(ApiRequest::get(path)).await?).await
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = ApiRequest::post(path).json(body)?;
        Self::expect_json(self.execute(request).await?).await
    }

    pub async fn put_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = ApiRequest::put(path).json(body)?;
        Self::expect_json(self.execute(request).await?).await
    }

    pub async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        Self::expect_json(self.execute(ApiRequest::delete(path)).await?).await
    }

    // ===== Auth Endpoints =====

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let request = ApiRequest::post(LOGIN_PATH).json(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        Self::expect_json(self.dispatch_public(&request).await?).await
    }

    pub async fn register(&self, registration: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        let request = ApiRequest::post(REGISTER_PATH).json(registration)?;
        Self::expect_json(self.dispatch_public(&request).await?).await
    }

    /// Exchange a refresh token for a new access token. Never refreshes itself.
    pub async fn refresh_tokens(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError> {
        let request = ApiRequest::post(REFRESH_PATH).json(&RefreshRequest {
            refresh_token: refresh_token.to_string(),
        })?;
        Self::expect_json(self.dispatch_public(&request).await?).await
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<MessageResponse, ApiError> {
        let request = ApiRequest::post(LOGOUT_PATH).json(&LogoutRequest {
            refresh_token: refresh_token.to_string(),
        })?;
        Self::expect_json(self.dispatch(&request).await?).await
    }

    /// Current user through the full pipeline (refreshes on 401)
    pub async fn fetch_current_user(&self) -> Result<UserProfile, ApiError> {
        let me: MeResponse = self.get_json(CURRENT_USER_PATH).await?;
        Ok(me.user)
    }

    /// Current user with the stored access token, single attempt
    pub async fn fetch_current_user_once(&self) -> Result<UserProfile, ApiError> {
        let response = self.dispatch(&ApiRequest::get(CURRENT_USER_PATH)).await?;
        let me: MeResponse = Self::expect_json(response).await?;
        Ok(me.user)
    }

    pub async fn forgot_password(&self, email: &str) -> Result<MessageResponse, ApiError> {
        let request = ApiRequest::post(FORGOT_PASSWORD_PATH).json(&ForgotPasswordRequest {
            email: email.to_string(),
        })?;
        Self::expect_json(self.dispatch_public(&request).await?).await
    }

    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<MessageResponse, ApiError> {
        let request = ApiRequest::post(RESET_PASSWORD_PATH).json(&ResetPasswordRequest {
            token: token.to_string(),
            new_password: new_password.to_string(),
        })?;
        Self::expect_json(self.dispatch_public(&request).await?).await
    }

    // ===== Token Persistence =====

    /// Overwrite stored tokens. A `None` refresh token leaves the stored one.
    pub(crate) fn persist_tokens(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), ApiError> {
        self.store.set(
            TokenKind::AccessToken,
            access_token,
            self.config.access_token_ttl_days,
        )?;
        if let Some(refresh_token) = refresh_token {
            self.store.set(
                TokenKind::RefreshToken,
                refresh_token,
                self.config.refresh_token_ttl_days,
            )?;
        }
        Ok(())
    }

    pub(crate) fn persist_refreshed(&self, tokens: &RefreshResponse) -> Result<(), ApiError> {
        self.persist_tokens(&tokens.access_token, tokens.refresh_token.as_deref())
    }
}
