use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use crate::core::{
    BackendError, BackendRegistry, ResolutionRequest, ResolveFailure, ResourceDescriptor,
};

/// Tries the registered backends in priority order until one resolves the
/// request, collecting every per-backend failure along the way. Sequential
/// on purpose: first-success short-circuit makes trial-by-priority cheaper
/// than racing lower-priority backends that would be thrown away.
pub struct Orchestrator {
    registry: Arc<BackendRegistry>,
    per_call_timeout: Duration,
}

impl Orchestrator {
    pub fn new(registry: Arc<BackendRegistry>, per_call_timeout: Duration) -> Self {
        Self {
            registry,
            per_call_timeout,
        }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub async fn resolve(
        &self,
        request: &ResolutionRequest,
    ) -> Result<ResourceDescriptor, ResolveFailure> {
        let url = match parse_source_url(&request.source_url) {
            Ok(url) => url,
            Err(err) => return Err(ResolveFailure::Invalid(err)),
        };

        let mut failures = Vec::new();

        for entry in self.registry.entries() {
            let backend = entry.backend();

            if !entry.available(self.registry.policy()) {
                debug!("Skipping backend {} (cooling down)", backend.id());
                continue;
            }

            if !backend.suitable(&url) {
                failures.push(BackendError::unsupported(
                    backend.id(),
                    format!("URL not recognized: {url}"),
                ));
                continue;
            }

            debug!("Trying backend {} for {}", backend.id(), url);

            let outcome = match timeout(self.per_call_timeout, backend.resolve(&url, request)).await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(BackendError::timeout(
                    backend.id(),
                    format!("no response within {:?}", self.per_call_timeout),
                )),
            };

            match outcome {
                Ok(descriptor) => {
                    entry.record_success();
                    info!("Resolved {} via backend {}", url, backend.id());
                    return Ok(descriptor);
                }
                Err(err) => {
                    warn!("Backend {} failed: {}", backend.id(), err.message);
                    entry.record_failure(err.retriable());
                    failures.push(err);
                }
            }
        }

        Err(ResolveFailure::Exhausted(failures))
    }
}

fn parse_source_url(raw: &str) -> Result<Url, BackendError> {
    if raw.trim().is_empty() {
        return Err(BackendError::invalid("source URL is empty"));
    }
    let url =
        Url::parse(raw).map_err(|e| BackendError::invalid(format!("malformed source URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(BackendError::invalid(format!(
            "unsupported URL scheme: {}",
            url.scheme()
        )));
    }
    Ok(url)
}
