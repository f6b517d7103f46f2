//! Docker image resolution: reference normalization and registry metadata.

pub mod metadata;
pub mod registry;
pub mod repository_name;

pub use metadata::{
    DockerMetadataFetcher, ImageMetadata, PortConfig, RegistrySession, RegistrySessionFactory,
    RepositoryData,
};
pub use registry::{HttpRegistrySession, HttpRegistrySessionFactory};
pub use repository_name::{ImageReference, format_for_receptor};
