//! HTTP client for the platform REST API

use super::{ApiResponse, PlatformError};
use crate::config::PlatformConfig;
use reqwest::header::AUTHORIZATION;
use serde_json::{json, Map, Value};
use url::Url;

/// Authenticated client for the platform REST API
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    forward_url: Option<Url>,
}

impl PlatformClient {
    /// Create a client from configuration
    pub fn new(config: &PlatformConfig) -> Result<Self, PlatformError> {
        Url::parse(&config.api_base_url)
            .map_err(|e| PlatformError::InvalidUrl(format!("{}: {e}", config.api_base_url)))?;

        let forward_url = config
            .forward_url
            .as_deref()
            .map(|raw| Url::parse(raw).map_err(|e| PlatformError::InvalidUrl(format!("{raw}: {e}"))))
            .transpose()?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            forward_url,
        })
    }

    /// Absolute URL of an API path such as `/message/create`
    pub fn endpoint(&self, path: &str) -> Result<Url, PlatformError> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&raw).map_err(|e| PlatformError::InvalidUrl(format!("{raw}: {e}")))
    }

    /// Whether requests are relayed through a forwarding endpoint
    pub fn is_forwarding(&self) -> bool {
        self.forward_url.is_some()
    }

    /// `GET` an API path
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<ApiResponse, PlatformError> {
        let mut url = self.endpoint(path)?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }

        if let Some(forward) = &self.forward_url {
            return self.forward(forward, "get", &url, &Value::Null).await;
        }

        tracing::debug!(url = %url, "GET");
        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, self.authorization())
            .send()
            .await?;
        Self::decode(response).await
    }

    /// `POST` a JSON body to an API path
    pub async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse, PlatformError> {
        let url = self.endpoint(path)?;

        if let Some(forward) = &self.forward_url {
            return self.forward(forward, "post", &url, body).await;
        }

        tracing::debug!(url = %url, "POST");
        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, self.authorization())
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Relay a request through the forwarding endpoint.
    ///
    /// The relay receives `{ headers, url, method, ...payload }` and performs the call itself.
    async fn forward(
        &self,
        forward: &Url,
        method: &str,
        url: &Url,
        payload: &Value,
    ) -> Result<ApiResponse, PlatformError> {
        let mut body = match payload {
            Value::Object(fields) => fields.clone(),
            _ => Map::new(),
        };
        body.insert(
            "headers".to_string(),
            json!({
                "Authorization": self.authorization(),
                "Content-Type": "application/json",
            }),
        );
        body.insert("url".to_string(), Value::String(url.to_string()));
        body.insert("method".to_string(), Value::String(method.to_string()));

        tracing::debug!(url = %url, forward = %forward, method, "Forwarding request");
        let response = self.http.post(forward.clone()).json(&body).send().await?;
        Self::decode(response).await
    }

    async fn decode(response: reqwest::Response) -> Result<ApiResponse, PlatformError> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(ApiResponse::from_body(status, &body))
    }

    fn authorization(&self) -> String {
        format!("Bot {}", self.token)
    }
}

impl std::fmt::Debug for PlatformClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformClient")
            .field("base_url", &self.base_url)
            .field("forward_url", &self.forward_url)
            .finish()
    }
}
