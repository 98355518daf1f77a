//! Typed transform operations parsed from request query parameters.

use crate::domain::errors::ProxyError;

/// Default JPEG quality when the `quality` parameter is present without a
/// value.
pub const DEFAULT_QUALITY: u8 = 50;

/// A single validated transform operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Resize so width equals the given pixel count; height is whatever the
    /// image's height is when this operation runs.
    Width(u32),
    /// Resize so height equals the given pixel count; width is whatever the
    /// image's width is when this operation runs.
    Height(u32),
    /// Lossy JPEG round trip at the given quality (0-100).
    Quality(u8),
    /// Gaussian blur with the given radius; radius <= 0 is a no-op.
    Blur(i32),
    /// Desaturate to single-luminance.
    Greyscale,
    /// Vertical mirror.
    Flip,
    /// Rotate by the given degrees, expanding the canvas so no corner is
    /// cropped.
    Rotate(i32),
    /// Composite semi-transparent white text at the lower-right corner.
    Watermark(String),
    /// Delegate to the foreground-segmentation capability.
    RemoveBg,
}

impl Operation {
    /// Short name of the operation, used in error messages and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Width(_) => "width",
            Self::Height(_) => "height",
            Self::Quality(_) => "quality",
            Self::Blur(_) => "blur",
            Self::Greyscale => "greyscale",
            Self::Flip => "flip",
            Self::Rotate(_) => "rotate",
            Self::Watermark(_) => "watermark",
            Self::RemoveBg => "remove-bg",
        }
    }
}

/// An ordered sequence of validated operations.
///
/// Order equals the order the parameters appeared in the original request,
/// not the order of the allow-list. Validation is a separate pass from
/// application: every parameter is checked here, before any transform runs,
/// so a failure never leaves a partially transformed image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformRequest {
    operations: Vec<Operation>,
}

impl TransformRequest {
    /// Parses query pairs into validated operations, preserving request
    /// order and ignoring unrecognized parameter names.
    ///
    /// # Errors
    /// Returns [`ProxyError::InvalidParameter`] for any malformed or
    /// out-of-range numeric value.
    pub fn from_query_pairs<'a, I>(pairs: I) -> Result<Self, ProxyError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut operations = Vec::new();

        for (name, value) in pairs {
            match name {
                "width" => operations.push(Operation::Width(parse_dimension(name, value)?)),
                "height" => operations.push(Operation::Height(parse_dimension(name, value)?)),
                "quality" => operations.push(Operation::Quality(parse_quality(value)?)),
                "blur" => operations.push(Operation::Blur(parse_integer(name, value)?)),
                "rotate" => operations.push(Operation::Rotate(parse_integer(name, value)?)),
                "greyscale" => operations.push(Operation::Greyscale),
                "flip" => operations.push(Operation::Flip),
                "remove-bg" => operations.push(Operation::RemoveBg),
                "watermark" => operations.push(Operation::Watermark(value.to_owned())),
                // Accepted for forward compatibility; no pipeline effect.
                "format" => {}
                // Unrecognized parameter names are ignored.
                _ => {}
            }
        }

        Ok(Self { operations })
    }

    /// The operations in request order.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Returns true if no operations were requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

fn parse_dimension(name: &str, value: &str) -> Result<u32, ProxyError> {
    let pixels: u32 = value.parse().map_err(|_| {
        ProxyError::invalid_parameter(format!("{name} must be a positive integer"))
    })?;
    if pixels == 0 {
        return Err(ProxyError::invalid_parameter(format!(
            "{name} must be a positive integer"
        )));
    }
    Ok(pixels)
}

fn parse_quality(value: &str) -> Result<u8, ProxyError> {
    if value.is_empty() {
        return Ok(DEFAULT_QUALITY);
    }
    let quality: i64 = value
        .parse()
        .map_err(|_| ProxyError::invalid_parameter("quality must be an integer"))?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(quality.clamp(0, 100) as u8)
}

fn parse_integer(name: &str, value: &str) -> Result<i32, ProxyError> {
    value
        .parse()
        .map_err(|_| ProxyError::invalid_parameter(format!("{name} must be an integer")))
}
