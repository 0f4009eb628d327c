//! Gateway endpoint discovery
//!
//! Every connection attempt resolves a fresh endpoint; the session is carried
//! in the query string when resuming.

use crate::connection::Session;
use crate::error::{GatewayError, GatewayResult};
use async_trait::async_trait;
use bridge_common::{PlatformClient, PlatformError};
use url::Url;

/// Resolves the WebSocket endpoint to connect to
#[async_trait]
pub trait GatewayDiscovery: Send + Sync {
    async fn resolve(&self) -> GatewayResult<String>;
}

/// Discovery through `GET /gateway/index`
#[derive(Debug, Clone)]
pub struct HttpDiscovery {
    client: PlatformClient,
    compress: bool,
}

impl HttpDiscovery {
    pub fn new(client: PlatformClient, compress: bool) -> Self {
        Self { client, compress }
    }
}

#[async_trait]
impl GatewayDiscovery for HttpDiscovery {
    async fn resolve(&self) -> GatewayResult<String> {
        let compress = u8::from(self.compress).to_string();
        let response = self
            .client
            .get("/gateway/index", &[("compress", compress)])
            .await?;

        if !response.is_success() {
            return Err(PlatformError::from_response(&response).into());
        }

        response
            .data_str("url")
            .map(str::to_owned)
            .ok_or(GatewayError::MissingGatewayUrl)
    }
}

/// Fixed endpoint, for tests and local setups
#[derive(Debug, Clone)]
pub struct StaticDiscovery(pub String);

#[async_trait]
impl GatewayDiscovery for StaticDiscovery {
    async fn resolve(&self) -> GatewayResult<String> {
        Ok(self.0.clone())
    }
}

/// Build the URL to open for `session`.
///
/// A resumable session adds `sessionId` and `resume=1`; `sn` is always sent.
pub fn connect_url(base: &str, session: &Session, compress: bool) -> GatewayResult<Url> {
    let mut url = Url::parse(base)?;

    // The discovered URL may already carry `compress` and a token
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !matches!(key.as_ref(), "compress" | "sn" | "sessionId" | "resume"))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut query = url.query_pairs_mut();
        query.clear();
        for (key, value) in &retained {
            query.append_pair(key, value);
        }
        query.append_pair("compress", if compress { "1" } else { "0" });
        query.append_pair("sn", &session.sequence.to_string());
        if session.is_resumable() {
            query.append_pair("sessionId", &session.session_id);
            query.append_pair("resume", "1");
        }
    }

    Ok(url)
}
