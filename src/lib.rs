pub mod backends;
pub mod cli;
pub mod config;
pub mod core;
pub mod server;
pub mod utils;

pub use crate::backends::{InvidiousBackend, PipedBackend, ScrapeBackend};
pub use crate::core::{
    Backend, BackendError, BackendRegistry, Downloader, ErrorKind, Orchestrator,
    ResolutionRequest, ResolveFailure, ResourceDescriptor,
};
