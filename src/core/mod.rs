pub mod backend;
pub mod downloader;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod resource;

pub use backend::Backend;
pub use downloader::Downloader;
pub use error::{BackendError, ErrorKind, ResolveFailure};
pub use orchestrator::Orchestrator;
pub use registry::{BackendRegistry, BackendStatus, HealthPolicy, RegistryEntry};
pub use resource::{
    select_format, MediaFormat, ResolutionRequest, ResourceDescriptor, SUPPORTED_QUALITIES,
};
