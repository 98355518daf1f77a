//! Port definitions for externally provided capabilities.

mod fetch_port;
mod segmentation_port;

pub use fetch_port::{FetchPort, FetchedImage};
pub use segmentation_port::SegmentationPort;
