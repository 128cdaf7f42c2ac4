//! Syncthing folder status client.
//!
//! Queries `GET {url}/rest/db/status?folder={id}` and reports the folder's
//! `state` field (`idle`, `scanning`, `syncing`, ...).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::errors::StatusError;

/// State string Syncthing reports for a folder with nothing to do.
pub const IDLE_STATE: &str = "idle";

/// Source of the sync engine's state for the monitored folder.
#[async_trait]
pub trait SyncMonitor: Send + Sync {
    async fn folder_state(&self) -> Result<String, StatusError>;
}

#[derive(Debug, Deserialize)]
struct FolderStatus {
    state: String,
}

/// REST client for a local Syncthing instance.
///
/// A client built without a folder ID or API key still constructs; every
/// status query then fails with [`StatusError::NotConfigured`] so the gate
/// reports it like any other status error.
#[derive(Debug, Clone)]
pub struct SyncthingClient {
    base_url: String,
    folder_id: String,
    has_key: bool,
    http: reqwest::Client,
}

impl SyncthingClient {
    /// Create a client that authenticates with `api_key` when one is given.
    pub fn new(
        base_url: impl Into<String>,
        folder_id: impl Into<String>,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, StatusError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let folder_id = folder_id.into();

        let mut headers = HeaderMap::new();
        if let Some(api_key) = api_key {
            let key = HeaderValue::from_str(api_key).map_err(|_| {
                StatusError::ParseError("API key is not a valid header value".into())
            })?;
            headers.insert("x-api-key", key);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .no_proxy()
            .build()?;

        info!(url = %base_url, folder = %folder_id, "created SyncthingClient");
        Ok(Self {
            base_url,
            folder_id,
            has_key: api_key.is_some(),
            http,
        })
    }

    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }
}

#[async_trait]
impl SyncMonitor for SyncthingClient {
    async fn folder_state(&self) -> Result<String, StatusError> {
        if self.folder_id.is_empty() {
            return Err(StatusError::NotConfigured("no folder ID".into()));
        }
        if !self.has_key {
            return Err(StatusError::NotConfigured("no API key".into()));
        }

        let url = format!("{}/rest/db/status", self.base_url);
        debug!(%url, folder = %self.folder_id, "querying folder status");

        let resp = self
            .http
            .get(&url)
            .query(&[("folder", self.folder_id.as_str())])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            warn!(status, %body, "folder status request rejected");
            return Err(StatusError::ApiError { status, body });
        }

        let body = resp.text().await?;
        let parsed: FolderStatus =
            serde_json::from_str(&body).map_err(|e| StatusError::ParseError(e.to_string()))?;

        debug!(state = %parsed.state, "folder status received");
        Ok(parsed.state)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::SocketAddr;

    use axum::extract::Query;
    use axum::http::{HeaderMap as AxumHeaders, StatusCode};
    use axum::routing::get;
    use axum::Router;

    use super::*;

    async fn status_handler(
        headers: AxumHeaders,
        Query(params): Query<HashMap<String, String>>,
    ) -> (StatusCode, String) {
        if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some("secret") {
            return (StatusCode::FORBIDDEN, "Forbidden".into());
        }
        match params.get("folder").map(String::as_str) {
            Some("notes") => (StatusCode::OK, r#"{"state":"idle","needFiles":0}"#.into()),
            Some("busy") => (StatusCode::OK, r#"{"state":"syncing"}"#.into()),
            Some("garbled") => (StatusCode::OK, "<html>not json</html>".into()),
            _ => (StatusCode::NOT_FOUND, "no such folder".into()),
        }
    }

    async fn spawn_server() -> SocketAddr {
        let app = Router::new().route("/rest/db/status", get(status_handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn client(addr: SocketAddr, folder: &str, key: &str) -> SyncthingClient {
        SyncthingClient::new(
            format!("http://{}/", addr),
            folder,
            Some(key),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_idle_folder() {
        let addr = spawn_server().await;
        let state = client(addr, "notes", "secret").folder_state().await.unwrap();
        assert_eq!(state, IDLE_STATE);
    }

    #[tokio::test]
    async fn test_syncing_folder() {
        let addr = spawn_server().await;
        let state = client(addr, "busy", "secret").folder_state().await.unwrap();
        assert_eq!(state, "syncing");
    }

    #[tokio::test]
    async fn test_wrong_key_is_api_error() {
        let addr = spawn_server().await;
        let err = client(addr, "notes", "wrong").folder_state().await.unwrap_err();
        assert!(matches!(err, StatusError::ApiError { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let addr = spawn_server().await;
        let err = client(addr, "garbled", "secret").folder_state().await.unwrap_err();
        assert!(matches!(err, StatusError::ParseError(_)));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(addr, "notes", "secret").folder_state().await.unwrap_err();
        assert!(matches!(err, StatusError::HttpError(_)));
    }

    #[test]
    fn test_rejects_unprintable_key() {
        let result = SyncthingClient::new(
            "http://localhost:8384",
            "f",
            Some("bad\nkey"),
            Duration::from_secs(5),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_without_request() {
        let addr = spawn_server().await;
        let base = format!("http://{}", addr);

        let no_folder = SyncthingClient::new(&base, "", Some("secret"), Duration::from_secs(5))
            .unwrap();
        let err = no_folder.folder_state().await.unwrap_err();
        assert!(matches!(err, StatusError::NotConfigured(ref m) if m == "no folder ID"));

        let no_key = SyncthingClient::new(&base, "notes", None, Duration::from_secs(5)).unwrap();
        let err = no_key.folder_state().await.unwrap_err();
        assert!(matches!(err, StatusError::NotConfigured(ref m) if m == "no API key"));
        assert_eq!(err.to_string(), "Syncthing is not configured: no API key");
    }
}
