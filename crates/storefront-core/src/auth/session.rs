use std::sync::Arc;

use tokio::sync::RwLock;

use crate::models::UserProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Startup recovery has not finished yet
    Loading,
    Authenticated,
    Anonymous,
}

/// In-memory projection of the session. The profile is a cache of server
/// truth, never authoritative.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub user: Option<UserProfile>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            status: SessionStatus::Loading,
            user: None,
        }
    }
}

/// Notifications broadcast to whoever drives navigation.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SignedIn(UserProfile),
    SignedOut,
    /// Credentials could not be recovered; the caller should send the user
    /// to `redirect_to`.
    Expired { redirect_to: String },
}

/// Handle to the session projection shared by the controller and the
/// refresh path. Clone is cheap.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<RwLock<SessionSnapshot>>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.read().await.clone()
    }

    pub async fn status(&self) -> SessionStatus {
        self.inner.read().await.status
    }

    pub async fn user(&self) -> Option<UserProfile> {
        self.inner.read().await.user.clone()
    }

    pub async fn set_authenticated(&self, user: UserProfile) {
        let mut guard = self.inner.write().await;
        guard.status = SessionStatus::Authenticated;
        guard.user = Some(user);
    }

    /// Swap the profile of an authenticated session
    pub async fn replace_user(&self, user: UserProfile) -> bool {
        let mut guard = self.inner.write().await;
        if guard.status != SessionStatus::Authenticated {
            return false;
        }
        guard.user = Some(user);
        true
    }

    /// Drop the profile and mark the session anonymous
    pub async fn clear(&self) {
        let mut guard = self.inner.write().await;
        guard.status = SessionStatus::Anonymous;
        guard.user = None;
    }
}
