//! Port definition for the foreground-segmentation capability.

use crate::domain::entities::ProxyImage;
use crate::domain::errors::SegmentationError;

/// Port for background removal. The pipeline treats this as an opaque
/// external capability: input is a canonical image, output is the same image
/// with its background made transparent, or a failure.
/// Implementations must be thread-safe.
#[async_trait::async_trait]
pub trait SegmentationPort: Send + Sync {
    /// Isolates the foreground of `image`, producing an RGBA result with a
    /// transparent background.
    ///
    /// # Errors
    /// Returns [`SegmentationError::Unavailable`] when no backend is
    /// configured, or [`SegmentationError::Failed`] when the backend errors.
    async fn remove_background(&self, image: ProxyImage) -> Result<ProxyImage, SegmentationError>;
}
