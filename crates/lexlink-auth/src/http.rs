//! Authorized HTTP wrapper with 401 recovery.

use crate::error::{AuthError, AuthResult};
use crate::session::SessionManager;
use reqwest::{Method, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for marketplace endpoints.
///
/// Attaches the current bearer token when one exists, recovers from a 401 by
/// refreshing once through the session's shared refresh, and returns every
/// other status untouched. Business errors are the caller's to interpret.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionManager,
}

impl ApiClient {
    pub fn new(session: SessionManager) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: session.base_url().to_string(),
            session,
        }
    }

    pub async fn get(&self, path: &str) -> AuthResult<Response> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> AuthResult<Response> {
        self.request(Method::POST, path, Some(body.clone())).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> AuthResult<Response> {
        self.request(Method::PUT, path, Some(body.clone())).await
    }

    pub async fn delete(&self, path: &str) -> AuthResult<Response> {
        self.request(Method::DELETE, path, None).await
    }

    /// Issue a request with bearer attachment and single-retry 401 recovery.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> AuthResult<Response> {
        let url = self.url_for(path);

        // A refresh already in flight settles first, so the request goes out
        // with the token it produces instead of the stale one.
        self.session.settle_inflight_refresh().await;

        let response = self
            .send(method.clone(), &url, body.as_ref(), self.session.access_token())
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!(url = %url, "Request came back 401, refreshing");
        let access_token = match self.session.refresh_access_token().await {
            Ok(token) => token,
            Err(error) => {
                warn!(error = %error, "Refresh after 401 failed");
                return Err(AuthError::RefreshFailed(error));
            }
        };

        // Exactly one retry with the fresh token; a second 401 is returned
        // to the caller as-is.
        self.send(method, &url, body.as_ref(), Some(access_token))
            .await
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        token: Option<String>,
    ) -> AuthResult<Response> {
        let mut builder = self.http.request(method, url);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use lexlink_storage::{StorageResult, TokenStorage, TokenStore};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MemoryStorage {
        data: Mutex<HashMap<String, String>>,
    }

    impl TokenStorage for MemoryStorage {
        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            self.data
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            Ok(self.data.lock().unwrap().get(key).cloned())
        }

        fn delete(&self, key: &str) -> StorageResult<bool> {
            Ok(self.data.lock().unwrap().remove(key).is_some())
        }
    }

    fn test_client() -> ApiClient {
        let config = AuthConfig::new("https://api.lexlink.app").unwrap();
        let store = TokenStore::new(Arc::new(MemoryStorage::default()));
        ApiClient::new(SessionManager::new(config, store))
    }

    #[test]
    fn test_relative_paths_join_base_url() {
        let client = test_client();
        assert_eq!(
            client.url_for("/lawyers/123"),
            "https://api.lexlink.app/lawyers/123"
        );
    }

    #[test]
    fn test_absolute_urls_pass_through() {
        let client = test_client();
        assert_eq!(
            client.url_for("https://elsewhere.example/x"),
            "https://elsewhere.example/x"
        );
    }
}
