/// HTTP client for the accounting API's read endpoints.
/// Uses reqwest-middleware for transient retries.
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::time::Duration;

pub struct UpstreamClient {
    client: ClientWithMiddleware,
}

impl UpstreamClient {
    pub fn new(max_retries: u32, timeout: Duration) -> Result<Self, reqwest::Error> {
        let reqwest_client = reqwest::Client::builder()
            .use_rustls_tls()
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("qbo-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // Retries 5xx, 408, 429 and connection errors with exponential backoff.
        // Only ever wrapped around idempotent GETs.
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);

        let client = ClientBuilder::new(reqwest_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { client })
    }

    /// GET `url` with a bearer token, asking for JSON.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        bearer: &str,
    ) -> Result<reqwest::Response, reqwest_middleware::Error> {
        self.client
            .get(url)
            .query(query)
            .bearer_auth(bearer)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(url, "Upstream request failed after retries: {}", e);
                e
            })
    }
}
