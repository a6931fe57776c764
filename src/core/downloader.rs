use std::time::Duration;

use anyhow::Result;
use tracing::warn;

use crate::core::ResourceDescriptor;

/// Streaming fetch of an already-resolved resource, for proxying to the
/// client. Retries transient upstream refusals with exponential backoff.
pub struct Downloader {
    client: reqwest::Client,
    retries: u32,
}

impl Downloader {
    pub fn new(user_agent: &str, retries: u32) -> Self {
        // No overall timeout: response bodies can stream for minutes.
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(10))
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .expect("failed to build HTTP client");

        Self { client, retries }
    }

    pub async fn fetch(&self, descriptor: &ResourceDescriptor) -> Result<reqwest::Response> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let request = self
                .client
                .get(&descriptor.resolved_url)
                .header("Accept", "*/*")
                .header("Accept-Language", "en-US,en;q=0.9");

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    if attempt >= self.retries {
                        return Err(e.into());
                    }
                    warn!("Fetch failed (attempt {}): {}", attempt, e);
                    tokio::time::sleep(Duration::from_secs(2_u64.pow(attempt))).await;
                    continue;
                }
            };

            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            // Media CDNs intermittently answer 403 for fresh URLs; a short
            // backoff usually clears it.
            if (status.as_u16() == 403 || status.is_server_error()) && attempt < self.retries {
                warn!(
                    "HTTP {} fetching resource (attempt {}), retrying in {}s",
                    status,
                    attempt,
                    2_u64.pow(attempt)
                );
                tokio::time::sleep(Duration::from_secs(2_u64.pow(attempt))).await;
                continue;
            }

            anyhow::bail!(
                "failed to fetch resource after {} attempts: HTTP {}",
                attempt,
                status
            );
        }
    }
}
