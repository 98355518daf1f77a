//! Domain entity definitions.

mod cache;
mod image;
mod transform;

pub use cache::CacheKey;
pub use image::{ColorMode, EncodeFormat, ImageMetadata, ProxyImage, SourceFormat};
pub use transform::{DEFAULT_QUALITY, Operation, TransformRequest};
