//! Local image processor built on the `image` crate.

use async_trait::async_trait;
use bytes::Bytes;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use tracing::{debug, error};

use crate::domain::entities::{Artifact, ProcessedImage, ProcessingParameters};
use crate::domain::errors::ProcessingError;
use crate::domain::ports::ImageProcessorPort;

const OUTPUT_EXTENSION: &str = "jpg";

/// Decodes, downscales to fit and re-encodes as JPEG.
///
/// Background removal needs a remote model and is not available here.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateProcessor;

impl ImageCrateProcessor {
    /// Creates the processor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageProcessorPort for ImageCrateProcessor {
    async fn process(
        &self,
        artifact: &Artifact,
        params: &ProcessingParameters,
    ) -> Result<ProcessedImage, ProcessingError> {
        if params.background_removal() {
            return Err(ProcessingError::unsupported(format!(
                "background removal with model {} is not available locally",
                params.model_name()
            )));
        }

        let bytes = artifact.bytes().clone();
        let params = params.clone();
        let name = artifact.name().to_string();

        tokio::task::spawn_blocking(move || encode(&bytes, &params))
            .await
            .map_err(|e| {
                error!(file = %name, error = %e, "Processing task panicked");
                ProcessingError::failed(format!("processing task failed: {e}"))
            })?
            .inspect(|image| {
                debug!(file = %name, width = image.width, height = image.height, size = image.bytes.len(), "Encoded image");
            })
    }
}

fn encode(bytes: &[u8], params: &ProcessingParameters) -> Result<ProcessedImage, ProcessingError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| ProcessingError::decode(e.to_string()))?;
    let resized = fit_within(decoded, params.max_width(), params.max_height());
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());

    let mut out = Vec::new();
    #[allow(clippy::cast_possible_truncation)]
    let quality = params.compression_level().clamp(1, 100) as u8;
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))
        .map_err(|e| ProcessingError::encode(e.to_string()))?;

    Ok(ProcessedImage {
        bytes: Bytes::from(out),
        width: rgb.width(),
        height: rgb.height(),
        extension: OUTPUT_EXTENSION.to_string(),
    })
}

/// Downscales to fit the bounding box, keeping the aspect ratio. A bound of
/// `0` is unbounded. Never upscales.
fn fit_within(image: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let bound_width = if max_width == 0 { u32::MAX } else { max_width };
    let bound_height = if max_height == 0 { u32::MAX } else { max_height };

    if image.width() <= bound_width && image.height() <= bound_height {
        return image;
    }
    image.resize(bound_width, bound_height, FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ArtifactIdentity;
    use image::{ImageBuffer, ImageFormat, Rgba};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Artifact {
        let buffer = ImageBuffer::from_pixel(width, height, Rgba([200u8, 40, 40, 255]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(buffer)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        let bytes = out.into_inner();
        Artifact::new(ArtifactIdentity::new("red.png", bytes.len() as u64, 0), bytes)
    }

    #[tokio::test]
    async fn test_downscales_to_fit() {
        let params = ProcessingParameters::new(70)
            .unwrap()
            .with_max_dimensions(100, 100);

        let image = ImageCrateProcessor::new()
            .process(&png(400, 200), &params)
            .await
            .unwrap();

        assert_eq!((image.width, image.height), (100, 50));
        assert_eq!(image.extension, "jpg");
        assert_eq!(
            image::guess_format(&image.bytes).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[tokio::test]
    async fn test_never_upscales() {
        let params = ProcessingParameters::default().with_max_dimensions(1920, 1080);

        let image = ImageCrateProcessor::new()
            .process(&png(64, 48), &params)
            .await
            .unwrap();

        assert_eq!((image.width, image.height), (64, 48));
    }

    #[tokio::test]
    async fn test_zero_bound_is_unbounded() {
        let params = ProcessingParameters::default().with_max_dimensions(0, 20);

        let image = ImageCrateProcessor::new()
            .process(&png(200, 100), &params)
            .await
            .unwrap();

        assert_eq!((image.width, image.height), (40, 20));
    }

    #[tokio::test]
    async fn test_garbage_input_fails_to_decode() {
        let artifact = Artifact::new(ArtifactIdentity::new("junk.png", 4, 0), vec![1u8, 2, 3, 4]);

        let err = ImageCrateProcessor::new()
            .process(&artifact, &ProcessingParameters::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ProcessingError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_background_removal_is_unsupported() {
        let params = ProcessingParameters::default().with_background_removal("u2net");

        let err = ImageCrateProcessor::new()
            .process(&png(8, 8), &params)
            .await
            .unwrap_err();

        assert!(matches!(err, ProcessingError::Unsupported { .. }));
    }
}
