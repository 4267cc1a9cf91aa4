use std::time::Duration;

use tether_core::ToolSource;

use crate::error::ServiceError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the tool registry's server listing.
pub struct RegistryClient {
    url: String,
    http: reqwest::Client,
}

impl RegistryClient {
    pub fn new(url: impl Into<String>) -> Result<Self, ServiceError> {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    /// Client whose listing request gives up after `timeout`.
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Registry(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(url, http))
    }

    pub fn with_client(url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            http,
        }
    }

    /// All registered tool sources.
    ///
    /// An unreachable or misbehaving registry is not fatal: the failure is
    /// logged and the service starts with no sources.
    pub async fn fetch_sources(&self) -> Vec<ToolSource> {
        match self.try_fetch().await {
            Ok(sources) => {
                tracing::info!(
                    registry = %self.url,
                    count = sources.len(),
                    "Tool sources discovered"
                );
                sources
            }
            Err(e) => {
                tracing::warn!(registry = %self.url, error = %e, "Registry unavailable; no tool sources");
                Vec::new()
            }
        }
    }

    async fn try_fetch(&self) -> Result<Vec<ToolSource>, ServiceError> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ServiceError::Registry(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ServiceError::Registry(format!("registry returned {status}")));
        }

        resp.json()
            .await
            .map_err(|e| ServiceError::Registry(format!("malformed server list: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn registry_with(response: ResponseTemplate) -> (MockServer, RegistryClient) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/servers"))
            .respond_with(response)
            .mount(&server)
            .await;
        let client = RegistryClient::new(format!("{}/api/v1/servers", server.uri())).unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn lists_sources_ignoring_extra_fields() {
        let (_server, client) = registry_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 1,
                "name": "weather-tool",
                "description": "Current weather",
                "version": "1.0.0",
                "binaryUrl": "http://localhost:8001/binaries/weather-tool.wasm",
                "runtimeConfig": { "TETHER_WASI_NETWORK": "true", "RETRIES": 3 },
                "createdAt": "2026-01-01T00:00:00Z"
            },
            {
                "name": "activity-advisor",
                "binaryUrl": "http://localhost:8001/binaries/activity-advisor.wasm",
                "runtimeConfig": null
            }
        ])))
        .await;

        let sources = client.fetch_sources().await;
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].name, "weather-tool");
        assert_eq!(sources[0].runtime_config["RETRIES"], "3");
        assert_eq!(sources[1].binary_url, "http://localhost:8001/binaries/activity-advisor.wasm");
        assert!(sources[1].runtime_config.is_empty());
    }

    #[tokio::test]
    async fn server_error_yields_no_sources() {
        let (_server, client) = registry_with(ResponseTemplate::new(503)).await;
        assert!(client.fetch_sources().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_body_yields_no_sources() {
        let (_server, client) =
            registry_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>")).await;
        assert!(client.fetch_sources().await.is_empty());
    }

    #[tokio::test]
    async fn unreachable_registry_yields_no_sources() {
        let client = RegistryClient::new("http://127.0.0.1:9/api/v1/servers").unwrap();
        assert!(client.fetch_sources().await.is_empty());
    }

    #[tokio::test]
    async fn slow_registry_is_cut_off_by_the_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/servers"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = RegistryClient::with_timeout(
            format!("{}/api/v1/servers", server.uri()),
            Duration::from_millis(200),
        )
        .unwrap();
        let started = std::time::Instant::now();
        assert!(client.fetch_sources().await.is_empty());
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
