//! The compositing pipeline: background fill, filtered source draw, encode
//!
//! Every invocation starts from an untouched [`SourceImage`] and produces a fresh
//! surface, so identical inputs always yield identical bytes.

use super::background::BackgroundSpec;
use super::filters::{apply_filters, FilterState, FloatRaster};
use crate::config::{ExportOptions, OutputFormat};
use crate::error::{Result, StudioError};
use crate::services::{ImageIOService, OutputFormatHandler};
use image::{Rgba, RgbaImage};
use std::path::Path;

/// Immutable decoded source raster
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    image: RgbaImage,
}

impl SourceImage {
    /// Wrap an already decoded RGBA raster
    ///
    /// # Errors
    /// - The raster has zero width or height
    pub fn from_rgba(image: RgbaImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(StudioError::decode(format!(
                "Source image has no pixels ({}x{})",
                image.width(),
                image.height()
            )));
        }
        Ok(Self { image })
    }

    /// Decode an encoded image (PNG, JPEG, WebP) from memory
    ///
    /// # Errors
    /// - Bytes are not a decodable image
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(bytes).map_err(|e| {
            StudioError::decode_error_with_source(&format!("{} byte buffer", bytes.len()), &e.to_string())
        })?;
        Self::from_rgba(decoded.to_rgba8())
    }

    /// Load and decode an image file
    ///
    /// # Errors
    /// - File unreadable or not a decodable image
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let bytes = ImageIOService::read_file(path_ref).map_err(|e| {
            StudioError::decode_error_with_source(&path_ref.display().to_string(), &e.to_string())
        })?;
        Self::decode(&bytes)
    }

    /// Natural width in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Natural height in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// `(width, height)`
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Read-only view of the pixels
    #[must_use]
    pub fn pixels(&self) -> &RgbaImage {
        &self.image
    }

    /// Whether any pixel is not fully opaque
    #[must_use]
    pub fn has_transparency(&self) -> bool {
        self.image.pixels().any(|p| p.0[3] < 255)
    }
}

/// Encoded result of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositedOutput {
    bytes: Vec<u8>,
    format: OutputFormat,
    width: u32,
    height: u32,
}

impl CompositedOutput {
    /// Encoded bytes
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Take ownership of the encoded bytes
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Encoding used
    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// `(width, height)` of the encoded raster
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Encoded size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the encoded buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Write the encoded bytes to `path`
    ///
    /// # Errors
    /// - Failed to write the file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        ImageIOService::write_file(&self.bytes, path)
    }
}

/// Flatten `source` over `background` with `filters` applied to the source draw only
///
/// Order: allocate a surface of the source's natural size, paint the background,
/// draw the filtered source at (0, 0) with source-over. The filter is scoped to
/// that single draw.
#[must_use]
pub fn compose(
    source: &SourceImage,
    filters: &FilterState,
    background: &BackgroundSpec,
) -> RgbaImage {
    let (width, height) = source.dimensions();
    let mut surface = RgbaImage::new(width, height);
    background.paint(&mut surface);

    let filtered = apply_filters(FloatRaster::from_rgba(source.pixels()), filters);
    draw_source_over(&mut surface, &filtered);

    log::trace!(
        "Composited {}x{} source over {} with {} filter stage(s)",
        width,
        height,
        background,
        filters.stages().len()
    );
    surface
}

/// Compose and encode in one step
///
/// # Errors
/// - Encoding failure
pub fn render(
    source: &SourceImage,
    filters: &FilterState,
    background: &BackgroundSpec,
    options: &ExportOptions,
) -> Result<CompositedOutput> {
    let surface = compose(source, filters, background);
    OutputFormatHandler::validate_for_composite(
        options.format,
        surface.pixels().any(|p| p.0[3] < 255),
    );
    let bytes = OutputFormatHandler::encode(&surface, options)?;

    Ok(CompositedOutput {
        bytes,
        format: options.format,
        width: surface.width(),
        height: surface.height(),
    })
}

fn to_u8(value: f32) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Porter-Duff source-over of unpremultiplied `src` onto `dst`
fn draw_source_over(dst: &mut RgbaImage, src: &FloatRaster) {
    for (d, s) in dst.pixels_mut().zip(&src.pixels) {
        let sa = s[3];
        if sa <= 0.0 {
            continue;
        }
        if sa >= 1.0 {
            *d = Rgba([to_u8(s[0]), to_u8(s[1]), to_u8(s[2]), 255]);
            continue;
        }

        let da = f32::from(d.0[3]) / 255.0;
        let out_a = sa + da * (1.0 - sa);
        let blend = |sc: f32, dc: u8| (sc * sa + f32::from(dc) / 255.0 * da * (1.0 - sa)) / out_a;
        *d = Rgba([
            to_u8(blend(s[0], d.0[0])),
            to_u8(blend(s[1], d.0[1])),
            to_u8(blend(s[2], d.0[2])),
            to_u8(out_a),
        ]);
    }
}
