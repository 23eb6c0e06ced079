//! Output format handling service
//!
//! Encodes flattened composites into the downloadable formats and derives the
//! default download name.

use crate::compose::Rgb;
use crate::config::{ExportOptions, OutputFormat};
use crate::error::Result;
#[cfg(not(feature = "webp-support"))]
use crate::error::StudioError;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};
use std::path::Path;

/// Suffix appended to the original base name for downloads
pub const DEFAULT_NAME_SUFFIX: &str = "_no_bg";

/// Service for handling output format conversions
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Encode an RGBA image with the given export options
    ///
    /// PNG and WebP keep the alpha channel (both lossless). JPEG has no alpha,
    /// so the image is flattened onto white first.
    ///
    /// # Errors
    /// - Encoder failure
    /// - WebP requested without the `webp-support` feature
    pub fn encode(image: &RgbaImage, options: &ExportOptions) -> Result<Vec<u8>> {
        options.validate()?;
        let (width, height) = image.dimensions();
        let mut buffer = Vec::new();

        match options.format {
            OutputFormat::Png => {
                PngEncoder::new(&mut buffer).write_image(
                    image.as_raw(),
                    width,
                    height,
                    ExtendedColorType::Rgba8,
                )?;
            },
            OutputFormat::Jpeg => {
                let flattened = Self::flatten_onto(image, Rgb::WHITE);
                JpegEncoder::new_with_quality(&mut buffer, options.jpeg_quality).write_image(
                    flattened.as_raw(),
                    width,
                    height,
                    ExtendedColorType::Rgb8,
                )?;
            },
            OutputFormat::WebP => {
                #[cfg(feature = "webp-support")]
                {
                    image::codecs::webp::WebPEncoder::new_lossless(&mut buffer).write_image(
                        image.as_raw(),
                        width,
                        height,
                        ExtendedColorType::Rgba8,
                    )?;
                }
                #[cfg(not(feature = "webp-support"))]
                {
                    return Err(StudioError::invalid_config(
                        "WebP output requires the webp-support feature",
                    ));
                }
            },
        }

        Ok(buffer)
    }

    /// Composite `image` over an opaque `color`, dropping the alpha channel
    #[must_use]
    pub fn flatten_onto(image: &RgbaImage, color: Rgb) -> RgbImage {
        let backdrop = [color.0, color.1, color.2];
        RgbImage::from_fn(image.width(), image.height(), |x, y| {
            let [r, g, b, a] = image.get_pixel(x, y).0;
            let alpha = f32::from(a) / 255.0;
            let mut out = [0u8; 3];
            for ((o, c), bg) in out.iter_mut().zip([r, g, b]).zip(backdrop) {
                *o = (f32::from(c) * alpha + f32::from(bg) * (1.0 - alpha))
                    .round()
                    .clamp(0.0, 255.0) as u8;
            }
            image::Rgb(out)
        })
    }

    /// Get the appropriate file extension for a given output format
    ///
    /// # Examples
    /// ```rust
    /// use imgly_bgstudio::{services::OutputFormatHandler, OutputFormat};
    ///
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Png), "png");
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Jpeg), "jpg");
    /// ```
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
        }
    }

    /// MIME type of a format
    #[must_use]
    pub fn mime_type(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::WebP => "image/webp",
        }
    }

    /// Check if a format supports transparency (alpha channel)
    #[must_use]
    pub fn supports_transparency(format: OutputFormat) -> bool {
        match format {
            OutputFormat::Png | OutputFormat::WebP => true,
            OutputFormat::Jpeg => false,
        }
    }

    /// Warn when the chosen format will discard transparency in the composite
    pub fn validate_for_composite(format: OutputFormat, has_transparency: bool) {
        if has_transparency && !Self::supports_transparency(format) {
            log::warn!(
                "Output format {:?} does not support transparency. Transparent areas will be flattened onto white.",
                format
            );
        }
    }

    /// Pick a format for an image when the caller asked for automatic selection
    ///
    /// Transparency forces PNG; photos that arrived as JPEG stay JPEG; anything
    /// else defaults to PNG.
    #[must_use]
    pub fn optimal_for(image: &RgbaImage, original_name: Option<&str>) -> OutputFormat {
        if image.pixels().any(|p| p.0[3] < 255) {
            return OutputFormat::Png;
        }

        let is_jpeg = original_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"));

        if is_jpeg {
            OutputFormat::Jpeg
        } else {
            OutputFormat::Png
        }
    }

    /// Default download name: `{originalBaseName}_no_bg`
    ///
    /// # Examples
    /// ```rust
    /// use imgly_bgstudio::services::OutputFormatHandler;
    ///
    /// assert_eq!(OutputFormatHandler::default_output_name("photos/cat.jpeg"), "cat_no_bg");
    /// ```
    #[must_use]
    pub fn default_output_name(original_name: &str) -> String {
        let base = Path::new(original_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("image");
        format!("{}{}", base, DEFAULT_NAME_SUFFIX)
    }

    /// Final file name: the caller's name (or the default) with the format's extension
    #[must_use]
    pub fn output_file_name(
        original_name: &str,
        custom_name: Option<&str>,
        format: OutputFormat,
    ) -> String {
        let stem = match custom_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => Path::new(name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(name)
                .to_string(),
            None => Self::default_output_name(original_name),
        };
        format!("{}.{}", stem, Self::get_extension(format))
    }
}
