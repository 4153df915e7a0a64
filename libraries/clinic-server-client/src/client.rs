//! Main clinic server client.

use crate::error::{Result, ServerClientError};
use crate::routes::{Route, IDEMPOTENCY_HEADER};
use crate::types::ServerConfig;
use async_trait::async_trait;
use clinic_core::{
    Operation, ReachabilityProbe, RemoteApi, RemoteError, RemoteReceipt, RemoteRequest, ServerId,
};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

/// Client for the clinic records API.
///
/// One instance is shared by the sync engine (as its [`RemoteApi`]) and the
/// connectivity monitor (as its [`ReachabilityProbe`]).
///
/// # Example
///
/// ```ignore
/// use clinic_server_client::{ClinicServerClient, ServerConfig};
///
/// let client = ClinicServerClient::new(ServerConfig::new("https://clinic.example.com"))?;
/// client.set_token("secret").await;
/// client.health().await?;
/// ```
pub struct ClinicServerClient {
    http: Client,
    base: Url,
    config: ServerConfig,
    access_token: Arc<RwLock<Option<String>>>,
}

impl ClinicServerClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ServerConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(ServerClientError::InvalidUrl("URL cannot be empty".into()));
        }

        let url = config.url.trim_end_matches('/').to_string();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ServerClientError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }
        let base = Url::parse(&url).map_err(|e| ServerClientError::InvalidUrl(e.to_string()))?;

        let http = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(format!("ClinicOutbox/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        let access_token = Arc::new(RwLock::new(config.access_token.clone()));
        let config = ServerConfig { url, ..config };

        Ok(Self {
            http,
            base,
            config,
            access_token,
        })
    }

    /// Get the normalized server URL.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Replace the bearer token used for subsequent requests.
    pub async fn set_token(&self, token: impl Into<String>) {
        *self.access_token.write().await = Some(token.into());
    }

    /// Stop sending a bearer token.
    pub async fn clear_token(&self) {
        *self.access_token.write().await = None;
        info!("Cleared access token");
    }

    /// Check if the client has an access token.
    pub async fn is_authenticated(&self) -> bool {
        self.access_token.read().await.is_some()
    }

    /// Send one queue item to the server.
    ///
    /// The receipt carries the server identifier for creates. A `DELETE`
    /// answered with 404 counts as done: the record is already gone.
    pub async fn submit_request(&self, request: &RemoteRequest) -> Result<RemoteReceipt> {
        let route = Route::for_request(request.resource, request.operation, &request.payload)?;
        let url = route.url(&self.base, &self.config.api_prefix)?;

        debug!(
            item_id = %request.idempotency_key,
            route = %route.describe(),
            "Submitting queue item"
        );

        let mut builder = self.http.request(route.method.clone(), url);
        if self.config.send_idempotency_key {
            builder = builder.header(IDEMPOTENCY_HEADER, request.idempotency_key.as_str());
        }
        if let Some(token) = self.access_token.read().await.as_deref() {
            builder = builder.bearer_auth(token);
        }
        if route.has_body {
            builder = builder.json(&request.payload);
        }

        let response = builder.send().await.map_err(|e| self.classify_send_error(e))?;
        let status = response.status();

        if status.is_success() {
            let server_id = match request.operation {
                Operation::Create => Some(read_identifier(response).await?),
                Operation::Update | Operation::Delete => None,
            };
            debug!(
                item_id = %request.idempotency_key,
                status = status.as_u16(),
                server_id = ?server_id,
                "Server accepted queue item"
            );
            Ok(RemoteReceipt {
                status: status.as_u16(),
                server_id,
            })
        } else if status == StatusCode::NOT_FOUND && request.operation == Operation::Delete {
            debug!(
                item_id = %request.idempotency_key,
                "Record already deleted on server"
            );
            Ok(RemoteReceipt {
                status: status.as_u16(),
                server_id: None,
            })
        } else {
            let message = response.text().await.unwrap_or_default();
            warn!(
                item_id = %request.idempotency_key,
                status = status.as_u16(),
                "Server refused queue item"
            );
            Err(ServerClientError::from_status(status.as_u16(), message))
        }
    }

    /// Check that the API answers `GET /health`.
    ///
    /// This does not require authentication.
    pub async fn health(&self) -> Result<()> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| ServerClientError::InvalidUrl(self.config.url.clone()))?;
            path.pop_if_empty();
            path.extend(self.config.api_prefix.split('/').filter(|s| !s.is_empty()));
            path.push("health");
        }

        debug!(url = %url, "Probing server health");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify_send_error(e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(ServerClientError::ServerError {
                status: status.as_u16(),
                message,
            })
        }
    }

    fn classify_send_error(&self, e: reqwest::Error) -> ServerClientError {
        if e.is_timeout() {
            ServerClientError::Timeout(self.config.timeout_ms)
        } else if e.is_connect() {
            ServerClientError::ServerUnreachable(e.to_string())
        } else {
            ServerClientError::Request(e)
        }
    }
}

/// Pull the new record's id out of a create response.
///
/// Accepts `{"id": ..}` and the wrapped `{"data": {"id": ..}}` form.
async fn read_identifier(response: Response) -> Result<ServerId> {
    let body: Value = response
        .json()
        .await
        .map_err(|e| {
            ServerClientError::ParseError(format!("Failed to parse create response: {}", e))
        })?;

    body.get("id")
        .and_then(ServerId::from_json)
        .or_else(|| {
            body.get("data")
                .and_then(|data| data.get("id"))
                .and_then(ServerId::from_json)
        })
        .ok_or(ServerClientError::MissingIdentifier)
}

#[async_trait]
impl RemoteApi for ClinicServerClient {
    async fn submit(
        &self,
        request: &RemoteRequest,
    ) -> std::result::Result<RemoteReceipt, RemoteError> {
        self.submit_request(request).await.map_err(RemoteError::from)
    }
}

#[async_trait]
impl ReachabilityProbe for ClinicServerClient {
    async fn probe(&self) -> bool {
        match self.health().await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Reachability probe failed");
                false
            }
        }
    }
}
