//! Domain layer with core entities, errors, events and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Pipeline events.
pub mod events;
/// Port definitions.
pub mod ports;
/// Pure domain services.
pub mod services;

pub use entities::{Artifact, ArtifactIdentity, CacheKey, ProcessedResult, ProcessingParameters};
pub use errors::{PipelineError, ProcessingError, StoreError};
pub use events::PipelineEvent;
pub use ports::{BlobStorePort, ImageProcessorPort, RecordStorePort, UploadSinkPort};
