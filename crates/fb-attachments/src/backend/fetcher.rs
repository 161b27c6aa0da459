//! HTTP fetchers

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::{FetchResponse, HttpFetcher};
use crate::error::{AttachmentError, AttachmentResult};

/// Fetcher backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> AttachmentResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| AttachmentError::config(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    #[instrument(skip(self), fields(fetcher = "reqwest"))]
    async fn get(&self, url: &str) -> AttachmentResult<FetchResponse> {
        let transport = |e: reqwest::Error| AttachmentError::Fetch {
            url: url.to_string(),
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(transport)?;

        debug!(status, size = body.len(), "Fetched");
        Ok(FetchResponse {
            status,
            headers,
            body,
        })
    }

    fn name(&self) -> &str {
        "reqwest"
    }
}

/// In-memory fetcher serving canned responses (for testing)
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    responses: HashMap<String, FetchResponse>,
    requests: RwLock<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(
        mut self,
        url: impl Into<String>,
        status: u16,
        body: impl Into<Bytes>,
    ) -> Self {
        self.responses.insert(
            url.into(),
            FetchResponse {
                status,
                headers: HashMap::new(),
                body: body.into(),
            },
        );
        self
    }

    /// URLs requested so far, in order
    pub async fn requests(&self) -> Vec<String> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl HttpFetcher for MemoryFetcher {
    async fn get(&self, url: &str) -> AttachmentResult<FetchResponse> {
        self.requests.write().await.push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| AttachmentError::Fetch {
                url: url.to_string(),
                status: None,
                message: "connection refused".to_string(),
            })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
