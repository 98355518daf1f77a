//! Ordered transform pipeline over the canonical image.
//!
//! Operations run strictly in request order; any failure aborts the whole
//! request and discards everything applied so far, so a partial result is
//! never served. CPU-bound operations run on the blocking pool; background
//! removal awaits the segmentation capability.

use std::sync::Arc;
use std::sync::OnceLock;

use ab_glyph::{FontRef, PxScale};
use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use tokio::task;
use tracing::{trace, warn};

use crate::domain::entities::{
    ColorMode, EncodeFormat, Operation, ProxyImage, TransformRequest,
};
use crate::domain::errors::ProxyError;
use crate::domain::ports::SegmentationPort;

/// Fixed padding between the watermark text and the image's lower-right
/// corner, in pixels.
const WATERMARK_PADDING: u32 = 10;

/// Semi-transparent white used for watermark text.
const WATERMARK_COLOR: Rgba<u8> = Rgba([255, 255, 255, 180]);

static WATERMARK_FONT: OnceLock<Option<FontRef<'static>>> = OnceLock::new();

/// Applies the requested operations in order.
///
/// # Errors
/// Returns the first operation's error; no partially transformed image is
/// ever returned.
pub async fn apply(
    image: ProxyImage,
    request: &TransformRequest,
    segmentation: &Arc<dyn SegmentationPort>,
) -> Result<ProxyImage, ProxyError> {
    let mut current = image;

    for operation in request.operations().iter().cloned() {
        trace!(
            operation = operation.name(),
            width = current.width(),
            height = current.height(),
            "Applying transform"
        );

        current = match operation {
            Operation::RemoveBg => segmentation
                .remove_background(current)
                .await
                .map_err(|e| {
                    warn!(error = %e, "Background removal failed");
                    ProxyError::transform("remove-bg", e)
                })?,
            op => {
                task::spawn_blocking(move || apply_blocking(current, &op))
                    .await
                    .map_err(|e| ProxyError::internal(format!("transform task panicked: {e}")))??
            }
        };
    }

    Ok(current)
}

/// Applies one CPU-bound operation. `RemoveBg` never reaches this function;
/// it is dispatched to the segmentation port in [`apply`].
fn apply_blocking(img: ProxyImage, operation: &Operation) -> Result<ProxyImage, ProxyError> {
    match operation {
        Operation::Width(pixels) => {
            let height = img.height();
            let mode = img.mode;
            let resized = img.image.resize_exact(*pixels, height, FilterType::Lanczos3);
            Ok(img.with_buffer(resized, mode))
        }
        Operation::Height(pixels) => {
            let width = img.width();
            let mode = img.mode;
            let resized = img.image.resize_exact(width, *pixels, FilterType::Lanczos3);
            Ok(img.with_buffer(resized, mode))
        }
        Operation::Quality(quality) => lossy_round_trip(img, *quality),
        Operation::Blur(radius) => {
            if *radius <= 0 {
                return Ok(img);
            }
            let mode = img.mode;
            #[allow(clippy::cast_precision_loss)]
            let blurred = img.image.blur(*radius as f32);
            Ok(img.with_buffer(blurred, mode))
        }
        Operation::Greyscale => {
            let grey = img.image.grayscale();
            Ok(img.with_buffer(grey, ColorMode::Greyscale))
        }
        Operation::Flip => {
            let mode = img.mode;
            let flipped = img.image.flipv();
            Ok(img.with_buffer(flipped, mode))
        }
        Operation::Rotate(degrees) => rotate_expanded(img, *degrees),
        Operation::Watermark(text) => draw_watermark(img, text),
        Operation::RemoveBg => Err(ProxyError::transform(
            "remove-bg",
            "segmentation must run through the capability port",
        )),
    }
}

/// Forces a lossy JPEG encode/decode round trip so later operations see the
/// lossy artifact rather than the original pixels. Drops any alpha channel
/// (JPEG has none) and switches the final encode target to JPEG at the same
/// quality.
fn lossy_round_trip(img: ProxyImage, quality: u8) -> Result<ProxyImage, ProxyError> {
    let flat = img.into_rgb();

    let mut buf = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    flat.image
        .write_with_encoder(encoder)
        .map_err(|e| ProxyError::transform("quality", e))?;

    let lossy = image::load_from_memory(&buf).map_err(|e| ProxyError::transform("quality", e))?;

    let mut out = flat.with_buffer(DynamicImage::ImageRgb8(lossy.to_rgb8()), ColorMode::Rgb);
    out.target = EncodeFormat::Jpeg { quality };
    Ok(out)
}

/// Rotates counter-clockwise by `degrees`, first padding the canvas to the
/// rotated bounding box so no corner is cropped. The padding is transparent,
/// so the result is always RGBA.
fn rotate_expanded(img: ProxyImage, degrees: i32) -> Result<ProxyImage, ProxyError> {
    let rgba = img.image.to_rgba8();
    let (width, height) = rgba.dimensions();

    #[allow(clippy::cast_precision_loss)]
    let theta = (degrees as f32).to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());

    #[allow(clippy::cast_precision_loss)]
    let (w, h) = (width as f32, height as f32);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let new_width = (w.mul_add(cos, h * sin)).ceil().max(1.0) as u32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let new_height = (w.mul_add(sin, h * cos)).ceil().max(1.0) as u32;

    // The working canvas must hold the image both before and after the
    // rotation; the result is then cropped to the rotated bounding box.
    let canvas_width = width.max(new_width);
    let canvas_height = height.max(new_height);

    let mut canvas = RgbaImage::from_pixel(canvas_width, canvas_height, Rgba([0, 0, 0, 0]));
    image::imageops::overlay(
        &mut canvas,
        &rgba,
        i64::from((canvas_width - width) / 2),
        i64::from((canvas_height - height) / 2),
    );

    let rotated = rotate_about_center(&canvas, -theta, Interpolation::Bilinear, Rgba([0, 0, 0, 0]));

    let cropped = image::imageops::crop_imm(
        &rotated,
        (canvas_width - new_width) / 2,
        (canvas_height - new_height) / 2,
        new_width,
        new_height,
    )
    .to_image();

    Ok(img.with_buffer(DynamicImage::ImageRgba8(cropped), ColorMode::Rgba))
}

/// Composites semi-transparent white text at the lower-right corner with
/// fixed padding, sized relative to the image height. Forces RGBA mode.
fn draw_watermark(img: ProxyImage, text: &str) -> Result<ProxyImage, ProxyError> {
    let font = watermark_font()?;

    let mut rgba = img.image.to_rgba8();
    let (width, height) = rgba.dimensions();

    #[allow(clippy::cast_precision_loss)]
    let scale = PxScale::from((height as f32 / 12.0).clamp(12.0, 64.0));
    let (text_width, text_height) = imageproc::drawing::text_size(scale, font, text);

    #[allow(clippy::cast_possible_wrap)]
    let x = width.saturating_sub(text_width + WATERMARK_PADDING) as i32;
    #[allow(clippy::cast_possible_wrap)]
    let y = height.saturating_sub(text_height + WATERMARK_PADDING) as i32;

    imageproc::drawing::draw_text_mut(&mut rgba, WATERMARK_COLOR, x, y, scale, font, text);

    Ok(img.with_buffer(DynamicImage::ImageRgba8(rgba), ColorMode::Rgba))
}

/// The memoized watermark font, parsed once per process from the embedded
/// asset.
fn watermark_font() -> Result<&'static FontRef<'static>, ProxyError> {
    WATERMARK_FONT
        .get_or_init(|| {
            FontRef::try_from_slice(include_bytes!("../../assets/DejaVuSans.ttf")).ok()
        })
        .as_ref()
        .ok_or_else(|| ProxyError::transform("watermark", "font resource unavailable"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::SegmentationError;
    use crate::infrastructure::segmentation::DisabledSegmentation;
    use image::{GenericImageView, Rgb, RgbImage};

    fn test_image(width: u32, height: u32) -> ProxyImage {
        let buffer = RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                u8::try_from(x % 256).unwrap(),
                u8::try_from(y % 256).unwrap(),
                40,
            ])
        });
        ProxyImage::from_decoded(DynamicImage::ImageRgb8(buffer), "http://example.com/t.png")
    }

    fn request(pairs: &[(&str, &str)]) -> TransformRequest {
        TransformRequest::from_query_pairs(pairs.iter().copied()).unwrap()
    }

    fn segmentation() -> Arc<dyn SegmentationPort> {
        Arc::new(DisabledSegmentation)
    }

    struct TransparentBackground;

    #[async_trait::async_trait]
    impl SegmentationPort for TransparentBackground {
        async fn remove_background(
            &self,
            image: ProxyImage,
        ) -> Result<ProxyImage, SegmentationError> {
            Ok(image.into_rgba())
        }
    }

    #[tokio::test]
    async fn width_resize_keeps_current_height() {
        let result = apply(test_image(200, 80), &request(&[("width", "100")]), &segmentation())
            .await
            .unwrap();
        assert_eq!((result.width(), result.height()), (100, 80));
    }

    #[tokio::test]
    async fn width_then_height_is_order_dependent() {
        let result = apply(
            test_image(200, 80),
            &request(&[("width", "100"), ("height", "40")]),
            &segmentation(),
        )
        .await
        .unwrap();
        assert_eq!((result.width(), result.height()), (100, 40));
    }

    #[tokio::test]
    async fn greyscale_produces_single_luminance() {
        let result = apply(test_image(8, 8), &request(&[("greyscale", "")]), &segmentation())
            .await
            .unwrap();
        assert_eq!(result.mode, ColorMode::Greyscale);

        // Every channel of an RGB view of the result is equal.
        let rgb = result.image.to_rgb8();
        for pixel in rgb.pixels() {
            assert_eq!(pixel[0], pixel[1]);
            assert_eq!(pixel[1], pixel[2]);
        }
    }

    #[tokio::test]
    async fn flip_mirrors_vertically() {
        let source = test_image(4, 4);
        let top_left = source.image.get_pixel(0, 0);

        let result = apply(source, &request(&[("flip", "")]), &segmentation())
            .await
            .unwrap();

        assert_eq!(result.image.get_pixel(0, 3), top_left);
    }

    #[tokio::test]
    async fn blur_with_non_positive_radius_is_a_no_op() {
        let source = test_image(6, 6);
        let original = source.image.clone();

        let result = apply(source, &request(&[("blur", "0")]), &segmentation())
            .await
            .unwrap();

        assert_eq!(result.image.to_rgb8(), original.to_rgb8());
    }

    #[tokio::test]
    async fn quality_switches_target_to_jpeg_and_drops_alpha() {
        let source = test_image(16, 16).into_rgba();

        let result = apply(source, &request(&[("quality", "30")]), &segmentation())
            .await
            .unwrap();

        assert_eq!(result.mode, ColorMode::Rgb);
        assert_eq!(result.target, EncodeFormat::Jpeg { quality: 30 });
    }

    #[tokio::test]
    async fn rotate_90_swaps_dimensions() {
        let result = apply(test_image(100, 40), &request(&[("rotate", "90")]), &segmentation())
            .await
            .unwrap();

        assert_eq!(result.mode, ColorMode::Rgba);
        // Float rounding may pad the bounding box by a pixel.
        assert!(result.width().abs_diff(40) <= 1, "width was {}", result.width());
        assert!(result.height().abs_diff(100) <= 1, "height was {}", result.height());
    }

    #[tokio::test]
    async fn rotate_45_expands_the_canvas() {
        let result = apply(test_image(100, 100), &request(&[("rotate", "45")]), &segmentation())
            .await
            .unwrap();

        assert!(result.width() > 100);
        assert!(result.height() > 100);
    }

    #[tokio::test]
    async fn watermark_forces_rgba_and_keeps_dimensions() {
        let result = apply(
            test_image(120, 60),
            &request(&[("watermark", "hello")]),
            &segmentation(),
        )
        .await
        .unwrap();

        assert_eq!(result.mode, ColorMode::Rgba);
        assert_eq!((result.width(), result.height()), (120, 60));
    }

    #[tokio::test]
    async fn watermark_changes_lower_right_region() {
        let source = test_image(120, 60);
        let before = source.image.to_rgba8();

        let result = apply(source, &request(&[("watermark", "WM")]), &segmentation())
            .await
            .unwrap();
        let after = result.image.to_rgba8();

        let changed = before
            .pixels()
            .zip(after.pixels())
            .any(|(a, b)| a != b);
        assert!(changed, "watermark drew nothing");
    }

    #[tokio::test]
    async fn remove_bg_uses_the_capability_port() {
        let port: Arc<dyn SegmentationPort> = Arc::new(TransparentBackground);

        let result = apply(test_image(8, 8), &request(&[("remove-bg", "")]), &port)
            .await
            .unwrap();

        assert_eq!(result.mode, ColorMode::Rgba);
    }

    #[tokio::test]
    async fn remove_bg_failure_aborts_the_request() {
        let err = apply(test_image(8, 8), &request(&[("remove-bg", "")]), &segmentation())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProxyError::Transform {
                operation: "remove-bg",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn operations_apply_in_request_order() {
        // greyscale before quality: the lossy artifact is of the grey image,
        // so the final mode is RGB (JPEG round trip) and the target is JPEG.
        let result = apply(
            test_image(16, 16),
            &request(&[("greyscale", ""), ("quality", "80")]),
            &segmentation(),
        )
        .await
        .unwrap();

        assert_eq!(result.target, EncodeFormat::Jpeg { quality: 80 });
        assert_eq!(result.mode, ColorMode::Rgb);
    }
}
