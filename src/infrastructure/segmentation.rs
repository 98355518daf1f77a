//! Segmentation backend stubs.

use crate::domain::entities::ProxyImage;
use crate::domain::errors::SegmentationError;
use crate::domain::ports::SegmentationPort;

/// Backend used when no segmentation capability is wired in. Every
/// `remove-bg` request fails with [`SegmentationError::Unavailable`], which
/// the pipeline surfaces as a transform error.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSegmentation;

#[async_trait::async_trait]
impl SegmentationPort for DisabledSegmentation {
    async fn remove_background(
        &self,
        _image: ProxyImage,
    ) -> Result<ProxyImage, SegmentationError> {
        Err(SegmentationError::Unavailable)
    }
}
