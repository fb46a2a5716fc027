//! Off-chain token metadata fetching.

use std::time::Duration;

use eyre::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

const IPFS_SCHEME: &str = "ipfs://";

/// Resolve a token URI to a fetchable URL, rewriting `ipfs://` through `gateway`.
pub fn resolve_uri(uri: &str, gateway: &str) -> String {
    match uri.strip_prefix(IPFS_SCHEME) {
        Some(path) => format!("{}/{}", gateway.trim_end_matches('/'), path.trim_start_matches('/')),
        None => uri.to_owned(),
    }
}

/// Fetches JSON documents behind token URIs.
#[derive(Debug, Clone)]
pub struct MetadataClient {
    http: Client,
    gateway: String,
}

impl MetadataClient {
    /// Create a new client. Each fetch is abandoned after `timeout`.
    pub fn new(gateway: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .wrap_err("failed to build metadata http client")?;
        Ok(Self { http, gateway: gateway.into() })
    }

    /// Fetch the document behind `uri`.
    ///
    /// Any failure (timeout, non-2xx, body that is not JSON) yields `None`.
    pub async fn fetch(&self, uri: &str) -> Option<Value> {
        let url = resolve_uri(uri, &self.gateway);
        let resp = match self.http.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                debug!(url = %url, error = %e, "metadata fetch failed");
                return None;
            }
        };
        if !resp.status().is_success() {
            debug!(url = %url, status = %resp.status(), "metadata fetch rejected");
            return None;
        }
        resp.json::<Value>()
            .await
            .map_err(|e| debug!(url = %url, error = %e, "metadata is not JSON"))
            .ok()
    }
}
