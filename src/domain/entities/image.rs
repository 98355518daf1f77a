//! Canonical in-memory image representation.

use image::DynamicImage;

/// Upstream-declared encoded format of fetched source bytes.
///
/// Only these formats are accepted at fetch time; anything else is rejected
/// before any bytes reach the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// JPEG (`image/jpeg`, `image/jpg`).
    Jpeg,
    /// PNG (`image/png`).
    Png,
    /// WebP (`image/webp`).
    Webp,
}

impl SourceFormat {
    /// Resolves a MIME subtype (the part after `image/`) to a format.
    /// Returns `None` for subtypes outside the allow-list.
    #[must_use]
    pub fn from_subtype(subtype: &str) -> Option<Self> {
        match subtype {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// File extension used for cache entries of this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }
}

/// Target format for the final encode.
///
/// Defaults to PNG; the quality operation's lossy round trip switches the
/// target to JPEG at the requested quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeFormat {
    /// Lossless PNG output.
    Png,
    /// Lossy JPEG output at the given quality (0-100).
    Jpeg {
        /// JPEG quality, already clamped to 0-100.
        quality: u8,
    },
}

impl EncodeFormat {
    /// MIME content type of the encoded bytes.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg { .. } => "image/jpeg",
        }
    }
}

/// Color mode of the canonical pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// Three-channel color, no alpha.
    Rgb,
    /// Four-channel color with alpha.
    Rgba,
    /// Single-luminance (with or without alpha).
    Greyscale,
}

/// Traceability metadata stamped on every decoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMetadata {
    /// Author tag identifying the processing service.
    pub author: String,
    /// URL the source bytes were fetched from.
    pub source_url: String,
}

impl ImageMetadata {
    /// Creates metadata for an image sourced from `source_url`.
    #[must_use]
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            author: crate::NAME.to_owned(),
            source_url: source_url.into(),
        }
    }
}

/// Canonical decoded image: pixel buffer, color mode, and metadata.
///
/// All transform operations consume and produce this type. The color mode
/// invariant holds from construction onward: RGBA whenever the source carries
/// an alpha channel, RGB otherwise, with greyscale only ever introduced by
/// the greyscale operation.
#[derive(Debug, Clone)]
pub struct ProxyImage {
    /// Decoded pixel buffer.
    pub image: DynamicImage,
    /// Current color mode, kept in sync with the buffer.
    pub mode: ColorMode,
    /// Traceability metadata.
    pub metadata: ImageMetadata,
    /// Format the final encode will use.
    pub target: EncodeFormat,
}

impl ProxyImage {
    /// Wraps a freshly decoded buffer, normalizing the color mode: sources
    /// with an alpha channel (including palette transparency, which the
    /// decoder expands) become RGBA, everything else RGB.
    #[must_use]
    pub fn from_decoded(decoded: DynamicImage, source_url: &str) -> Self {
        let (image, mode) = if decoded.color().has_alpha() {
            (DynamicImage::ImageRgba8(decoded.to_rgba8()), ColorMode::Rgba)
        } else {
            (DynamicImage::ImageRgb8(decoded.to_rgb8()), ColorMode::Rgb)
        };

        Self {
            image,
            mode,
            metadata: ImageMetadata::new(source_url),
            target: EncodeFormat::Png,
        }
    }

    /// Image width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Image height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Replaces the pixel buffer, leaving metadata and target untouched.
    #[must_use]
    pub fn with_buffer(self, image: DynamicImage, mode: ColorMode) -> Self {
        Self {
            image,
            mode,
            ..self
        }
    }

    /// Converts the buffer to RGBA, updating the mode.
    #[must_use]
    pub fn into_rgba(self) -> Self {
        let rgba = DynamicImage::ImageRgba8(self.image.to_rgba8());
        self.with_buffer(rgba, ColorMode::Rgba)
    }

    /// Flattens the buffer to RGB, discarding any alpha channel. Used before
    /// lossy JPEG encodes, which have no alpha.
    #[must_use]
    pub fn into_rgb(self) -> Self {
        let rgb = DynamicImage::ImageRgb8(self.image.to_rgb8());
        self.with_buffer(rgb, ColorMode::Rgb)
    }
}
