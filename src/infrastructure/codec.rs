//! Decode raw bytes into the canonical image and encode it back out.

use std::io::Cursor;

use bytes::Bytes;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use tracing::debug;

use crate::domain::entities::{EncodeFormat, ProxyImage};
use crate::domain::errors::ProxyError;

/// Decodes raw bytes into the canonical representation, normalizing the
/// color mode and stamping traceability metadata.
///
/// # Errors
/// Returns [`ProxyError::UnsupportedFormat`] if the bytes are corrupt or not
/// a recognized image format.
pub fn decode(bytes: &[u8], source_url: &str) -> Result<ProxyImage, ProxyError> {
    let decoded = image::load_from_memory(bytes).map_err(ProxyError::unsupported_format)?;

    debug!(
        source_url,
        width = decoded.width(),
        height = decoded.height(),
        "Decoded source image"
    );

    Ok(ProxyImage::from_decoded(decoded, source_url))
}

/// Encodes the canonical image in its target format: PNG by default, JPEG
/// when a quality round trip has switched the target.
///
/// # Errors
/// Returns [`ProxyError::Internal`] if the encoder fails; the canonical
/// buffer is always encodable, so this indicates a bug, not bad input.
pub fn encode(img: &ProxyImage) -> Result<Bytes, ProxyError> {
    let mut buf = Vec::new();

    match img.target {
        EncodeFormat::Png => {
            img.image
                .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
                .map_err(|e| ProxyError::internal(format!("PNG encode failed: {e}")))?;
        }
        EncodeFormat::Jpeg { quality } => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            // JPEG has no alpha channel; flatten if one is present.
            if img.image.color().has_alpha() {
                DynamicImage::ImageRgb8(img.image.to_rgb8())
                    .write_with_encoder(encoder)
                    .map_err(|e| ProxyError::internal(format!("JPEG encode failed: {e}")))?;
            } else {
                img.image
                    .write_with_encoder(encoder)
                    .map_err(|e| ProxyError::internal(format!("JPEG encode failed: {e}")))?;
            }
        }
    }

    Ok(Bytes::from(buf))
}
