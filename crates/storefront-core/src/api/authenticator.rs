use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Client;

use crate::auth::{CredentialStore, TokenKind};
use crate::config::Config;

use super::{ApiError, ApiRequest};

/// Turns an `ApiRequest` into a wire request, attaching the access token
/// that is current at build time.
pub struct RequestAuthenticator<'a> {
    http: &'a Client,
    config: &'a Config,
    store: &'a dyn CredentialStore,
}

impl<'a> RequestAuthenticator<'a> {
    pub fn new(http: &'a Client, config: &'a Config, store: &'a dyn CredentialStore) -> Self {
        Self {
            http,
            config,
            store,
        }
    }

    /// Build the request with `Authorization: Bearer <accessToken>` when a
    /// token is stored, and without it otherwise.
    pub fn build(&self, request: &ApiRequest) -> Result<reqwest::Request, ApiError> {
        let mut built = self.build_public(request)?;
        self.authorize(built.headers_mut())?;
        Ok(built)
    }

    /// Build the request without credentials
    pub fn build_public(&self, request: &ApiRequest) -> Result<reqwest::Request, ApiError> {
        let mut builder = self
            .http
            .request(request.method.clone(), self.config.url(&request.path))
            .header(header::ACCEPT, "application/json");
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }
        Ok(builder.build()?)
    }

    fn authorize(&self, headers: &mut HeaderMap) -> Result<(), ApiError> {
        // Read on every call so a token refreshed by a concurrent request is
        // picked up immediately
        if let Some(token) = self.store.get(TokenKind::AccessToken) {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ApiError::Request(format!("Invalid access token header: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryCredentialStore;
    use serde_json::json;

    fn auth_header(request: &reqwest::Request) -> Option<String> {
        request
            .headers()
            .get(header::AUTHORIZATION)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[test]
    fn test_attaches_bearer_when_token_present() {
        let http = Client::new();
        let config = Config::default();
        let store = MemoryCredentialStore::new();
        store.set(TokenKind::AccessToken, "tok-1", 1).unwrap();

        let auth = RequestAuthenticator::new(&http, &config, &store);
        let built = auth.build(&ApiRequest::get("/api/users/me")).unwrap();
        assert_eq!(auth_header(&built).as_deref(), Some("Bearer tok-1"));
        assert_eq!(built.url().as_str(), "http://localhost:5000/api/users/me");
    }

    #[test]
    fn test_no_header_without_token() {
        let http = Client::new();
        let config = Config::default();
        let store = MemoryCredentialStore::new();

        let auth = RequestAuthenticator::new(&http, &config, &store);
        let built = auth.build(&ApiRequest::get("/api/products")).unwrap();
        assert!(auth_header(&built).is_none());
    }

    #[test]
    fn test_token_is_read_per_request() {
        let http = Client::new();
        let config = Config::default();
        let store = MemoryCredentialStore::new();
        let auth = RequestAuthenticator::new(&http, &config, &store);

        store.set(TokenKind::AccessToken, "first", 1).unwrap();
        let one = auth.build(&ApiRequest::get("/api/cart")).unwrap();
        store.set(TokenKind::AccessToken, "second", 1).unwrap();
        let two = auth.build(&ApiRequest::get("/api/cart")).unwrap();

        assert_eq!(auth_header(&one).as_deref(), Some("Bearer first"));
        assert_eq!(auth_header(&two).as_deref(), Some("Bearer second"));
    }

    #[test]
    fn test_public_build_skips_token_and_keeps_body() {
        let http = Client::new();
        let config = Config::default();
        let store = MemoryCredentialStore::new();
        store.set(TokenKind::AccessToken, "tok", 1).unwrap();

        let auth = RequestAuthenticator::new(&http, &config, &store);
        let request = ApiRequest::post("/api/auth/refresh-token")
            .json(&json!({"refreshToken": "r"}))
            .unwrap();
        let built = auth.build_public(&request).unwrap();
        assert!(auth_header(&built).is_none());
        assert!(built.body().is_some());
    }

    #[test]
    fn test_unencodable_token_is_a_request_error() {
        let http = Client::new();
        let config = Config::default();
        let store = MemoryCredentialStore::new();
        store.set(TokenKind::AccessToken, "bad\ntoken", 1).unwrap();

        let auth = RequestAuthenticator::new(&http, &config, &store);
        let err = auth.build(&ApiRequest::get("/api/cart")).unwrap_err();
        assert!(matches!(err, ApiError::Request(_)));
    }
}
