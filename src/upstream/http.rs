// src/upstream/http.rs — reqwest-backed catalog transport

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use super::{CatalogTransport, Method, RawResponse, UpstreamRequest};
use crate::infra::config::ApiConfig;
use crate::infra::errors::HarvestError;

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    domain: String,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> Result<Self, HarvestError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| HarvestError::Config("No API key. Set HARVESTER_API_KEY.".into()))?;
        Self::with_timeout(config, api_key, config.timeout())
    }

    fn with_timeout(
        config: &ApiConfig,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, HarvestError> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| HarvestError::Config(format!("Invalid api.base_url '{base}': {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HarvestError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key,
            domain: config.domain.clone(),
        })
    }

    /// Full URL for a request, including the account parameters.
    pub fn url_for(&self, request: &UpstreamRequest) -> Result<Url, HarvestError> {
        let mut url = self
            .base_url
            .join(request.path.trim_start_matches('/'))
            .map_err(|e| HarvestError::Config(format!("Invalid path '{}': {e}", request.path)))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("domain", &self.domain);
            pairs.append_pair("key", &self.api_key);
            for (k, v) in &request.query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl CatalogTransport for HttpTransport {
    async fn send(&self, request: &UpstreamRequest) -> Result<RawResponse, HarvestError> {
        let url = self.url_for(request)?;

        let builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => {
                let builder = self.client.post(url);
                match &request.body {
                    Some(body) => builder.json(body),
                    None => builder,
                }
            }
        };

        let response = builder.send().await.map_err(|e| {
            let kind = if e.is_timeout() {
                "timeout"
            } else if e.is_connect() {
                "connect"
            } else {
                "request"
            };
            HarvestError::Transport(format!("{kind}: {e}"))
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| HarvestError::Transport(format!("reading body: {e}")))?;

        tracing::debug!(path = %request.path, status, bytes = body.len(), "Upstream responded");
        Ok(RawResponse { status, body })
    }
}
