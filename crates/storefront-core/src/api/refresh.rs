use tracing::{debug, info, warn};

use crate::auth::{SessionEvent, TokenKind};

use super::{ApiClient, ApiError, ApiRequest};

/// Recovers from a rejected access token by exchanging the refresh token.
///
/// Runs at most once per logical request: only first-attempt requests reach
/// it, and the request it hands back is marked as a retry. Concurrent
/// requests each refresh independently; calls are not deduplicated.
pub(crate) struct RefreshCoordinator<'a> {
    client: &'a ApiClient,
}

impl<'a> RefreshCoordinator<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Refresh credentials for `request`, which failed with `original`.
    ///
    /// On success the new tokens are already persisted when the retry request
    /// is returned. On failure the session is expired and the error the caller
    /// should see is returned.
    pub(crate) async fn recover(
        &self,
        request: ApiRequest,
        original: ApiError,
    ) -> Result<ApiRequest, ApiError> {
        let Some(refresh_token) = self.client.store().get(TokenKind::RefreshToken) else {
            warn!(path = %request.path, "Access token rejected and no refresh token stored");
            self.expire_session().await;
            return Err(original);
        };

        info!(path = %request.path, "Access token rejected, refreshing");
        match self.client.refresh_tokens(&refresh_token).await {
            Ok(tokens) => {
                self.client.persist_refreshed(&tokens)?;
                debug!(
                    path = %request.path,
                    rotated = tokens.refresh_token.is_some(),
                    "Token refreshed, replaying request"
                );
                Ok(request.into_retry())
            }
            Err(e) => {
                warn!(path = %request.path, error = %e, "Token refresh failed");
                self.expire_session().await;
                Err(e)
            }
        }
    }

    /// Terminal session loss: drop tokens and profile, tell listeners
    async fn expire_session(&self) {
        self.client.store().clear();
        self.client.session().clear().await;
        let redirect_to = self.client.config().login_path.clone();
        info!(redirect_to = %redirect_to, "Session expired");
        // No subscribers is fine
        let _ = self.client.events().send(SessionEvent::Expired { redirect_to });
    }
}
