//! History over the metrics HTTP API.
//!
//! `GET {endpoint}/metrics?type=<metric>&from=<iso>&to=<iso>` answering
//! `{"series": [MetricPoint, ...]}`. The current credential, if any, is sent
//! as a bearer token.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pulsedash_types::{MetricPoint, MetricSeriesResponse};
use reqwest::Client;
use tracing::debug;

use super::{HistoryQuery, HistorySource};
use crate::error::FetchError;
use crate::stream::CredentialProvider;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP history source for the metrics API.
#[derive(Debug, Clone)]
pub struct HttpHistorySource {
    client: Client,
    endpoint: String,
    credentials: Option<Arc<dyn CredentialProvider>>,
    description: String,
}

impl HttpHistorySource {
    /// Create a new builder for configuring the source.
    pub fn builder() -> HttpHistorySourceBuilder {
        HttpHistorySourceBuilder::default()
    }

    fn url(&self) -> String {
        format!("{}/metrics", self.endpoint)
    }
}

#[async_trait]
impl HistorySource for HttpHistorySource {
    async fn fetch(&self, query: &HistoryQuery) -> Result<Vec<MetricPoint>, FetchError> {
        let mut request = self.client.get(self.url()).query(&[
            ("type", query.metric.as_str().to_string()),
            ("from", query.bounds.from_param()),
            ("to", query.bounds.to_param()),
        ]);
        if let Some(token) = self.credentials.as_ref().and_then(|c| c.current()) {
            request = request.bearer_auth(token);
        }

        debug!(query = %query, "Fetching history");
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let body: MetricSeriesResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        Ok(body.series)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Builder for HttpHistorySource.
#[derive(Debug, Default)]
pub struct HttpHistorySourceBuilder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
    credentials: Option<Arc<dyn CredentialProvider>>,
}

impl HttpHistorySourceBuilder {
    /// Set the API base URL (e.g., "http://localhost:8000").
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Send the provider's current token with every request.
    pub fn credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Build the source.
    pub fn build(self) -> Result<HttpHistorySource, FetchError> {
        let client = Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;

        let endpoint = self
            .endpoint
            .unwrap_or_else(|| "http://localhost:8000".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(HttpHistorySource {
            client,
            description: format!("{}/metrics", endpoint),
            endpoint,
            credentials: self.credentials,
        })
    }
}
