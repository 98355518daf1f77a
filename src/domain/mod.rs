//! Domain layer with core business entities and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{CacheKey, EncodeFormat, ImageMetadata, ProxyImage, SourceFormat};
pub use errors::{CacheError, FetchError, ProxyError, SegmentationError};
pub use ports::{FetchPort, FetchedImage, SegmentationPort};
