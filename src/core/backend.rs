use async_trait::async_trait;
use url::Url;

use crate::core::{BackendError, ResolutionRequest, ResourceDescriptor};

/// One interchangeable strategy for turning a media URL into a
/// [`ResourceDescriptor`]. Implementations are stateless and safe to call
/// concurrently from different requests.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Stable identifier, unique within a registry.
    fn id(&self) -> &str;

    /// Cheap pre-check: does this backend recognize the URL at all?
    fn suitable(&self, url: &Url) -> bool;

    /// Attempt the resolution. Failures are values, never panics, so the
    /// caller can continue deterministically with the next backend.
    async fn resolve(
        &self,
        url: &Url,
        request: &ResolutionRequest,
    ) -> Result<ResourceDescriptor, BackendError>;
}
