#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use storefront_core::auth::{CredentialError, CredentialStore, MemoryCredentialStore, TokenKind};
use storefront_core::{Config, SessionController};
use wiremock::MockServer;

pub fn user_json(id: &str, email: &str, role: &str) -> Value {
    json!({ "id": id, "email": email, "role": role })
}

pub fn config_for(server: &MockServer) -> Config {
    Config::default().with_base_url(&server.uri())
}

/// Controller over a fresh memory store seeded with the given tokens
pub fn controller(
    server: &MockServer,
    access: Option<&str>,
    refresh: Option<&str>,
) -> (SessionController, Arc<MemoryCredentialStore>) {
    let store = Arc::new(MemoryCredentialStore::new());
    if let Some(token) = access {
        store.set(TokenKind::AccessToken, token, 1).unwrap();
    }
    if let Some(token) = refresh {
        store.set(TokenKind::RefreshToken, token, 7).unwrap();
    }
    let shared: Arc<dyn CredentialStore> = store.clone();
    let controller = SessionController::new(config_for(server), shared).unwrap();
    (controller, store)
}

/// Store that appends every write to a shared log
pub struct RecordingStore {
    inner: MemoryCredentialStore,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl RecordingStore {
    pub fn new(log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            inner: MemoryCredentialStore::new(),
            log,
        }
    }
}

impl CredentialStore for RecordingStore {
    fn set(&self, kind: TokenKind, value: &str, ttl_days: i64) -> Result<(), CredentialError> {
        self.log.lock().push(format!("set {}={}", kind, value));
        self.inner.set(kind, value, ttl_days)
    }

    fn get(&self, kind: TokenKind) -> Option<String> {
        self.inner.get(kind)
    }

    fn remove(&self, kind: TokenKind) -> Result<(), CredentialError> {
        self.log.lock().push(format!("remove {}", kind));
        self.inner.remove(kind)
    }
}

pub async fn authorization_headers(server: &MockServer, path: &str) -> Vec<Option<String>> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == path)
        .map(|r| {
            r.headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .collect()
}
