//! Filter parameters, presets and the combined per-pixel transfer function
//!
//! Colour stages follow the CSS Filter Effects definitions evaluated in sRGB on
//! unpremultiplied colour, with the result clamped to `[0, 1]` after every stage.
//! Blur operates on premultiplied colour so transparent pixels do not bleed black.

use super::blur::gaussian_blur_premultiplied;
use crate::error::{Result, StudioError};
use serde::{Deserialize, Serialize};

/// One of the seven adjustable filter parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterParam {
    Brightness,
    Contrast,
    Saturation,
    Hue,
    Blur,
    Sepia,
    Grayscale,
}

impl FilterParam {
    /// All parameters in pipeline order
    pub const ALL: [FilterParam; 7] = [
        Self::Brightness,
        Self::Contrast,
        Self::Saturation,
        Self::Hue,
        Self::Blur,
        Self::Sepia,
        Self::Grayscale,
    ];

    /// Inclusive range accepted for this parameter
    #[must_use]
    pub fn range(self) -> (f32, f32) {
        match self {
            Self::Brightness | Self::Contrast => (50.0, 200.0),
            Self::Saturation => (0.0, 200.0),
            Self::Hue => (-180.0, 180.0),
            Self::Blur => (0.0, 10.0),
            Self::Sepia | Self::Grayscale => (0.0, 100.0),
        }
    }

    /// Value at which the parameter has no effect
    #[must_use]
    pub fn identity(self) -> f32 {
        match self {
            Self::Brightness | Self::Contrast | Self::Saturation => 100.0,
            Self::Hue | Self::Blur | Self::Sepia | Self::Grayscale => 0.0,
        }
    }

    /// Unit suffix used when displaying values
    #[must_use]
    pub fn unit(self) -> &'static str {
        match self {
            Self::Hue => "°",
            Self::Blur => "px",
            _ => "%",
        }
    }

    /// Clamp `value` into the declared range; NaN maps to the identity value
    #[must_use]
    pub fn clamp(self, value: f32) -> f32 {
        if value.is_nan() {
            return self.identity();
        }
        let (min, max) = self.range();
        value.clamp(min, max)
    }
}

impl std::fmt::Display for FilterParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Brightness => "brightness",
            Self::Contrast => "contrast",
            Self::Saturation => "saturation",
            Self::Hue => "hue",
            Self::Blur => "blur",
            Self::Sepia => "sepia",
            Self::Grayscale => "grayscale",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for FilterParam {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "brightness" => Ok(Self::Brightness),
            "contrast" => Ok(Self::Contrast),
            "saturation" | "saturate" => Ok(Self::Saturation),
            "hue" | "hue-rotate" => Ok(Self::Hue),
            "blur" => Ok(Self::Blur),
            "sepia" => Ok(Self::Sepia),
            "grayscale" | "greyscale" => Ok(Self::Grayscale),
            other => Err(StudioError::invalid_config(format!(
                "Unknown filter parameter '{}'",
                other
            ))),
        }
    }
}

/// The seven filter parameters applied to the source draw
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    /// Brightness percentage (100 = unchanged)
    pub brightness: f32,
    /// Contrast percentage (100 = unchanged)
    pub contrast: f32,
    /// Saturation percentage (100 = unchanged, 0 = no colour)
    pub saturation: f32,
    /// Hue rotation in degrees
    pub hue: f32,
    /// Gaussian blur radius in pixels
    pub blur: f32,
    /// Sepia blend percentage
    pub sepia: f32,
    /// Grayscale blend percentage
    pub grayscale: f32,
}

impl FilterState {
    /// Filter state that leaves the image untouched
    pub const IDENTITY: FilterState = FilterState {
        brightness: 100.0,
        contrast: 100.0,
        saturation: 100.0,
        hue: 0.0,
        blur: 0.0,
        sepia: 0.0,
        grayscale: 0.0,
    };

    /// Read a single parameter
    #[must_use]
    pub fn get(&self, param: FilterParam) -> f32 {
        match param {
            FilterParam::Brightness => self.brightness,
            FilterParam::Contrast => self.contrast,
            FilterParam::Saturation => self.saturation,
            FilterParam::Hue => self.hue,
            FilterParam::Blur => self.blur,
            FilterParam::Sepia => self.sepia,
            FilterParam::Grayscale => self.grayscale,
        }
    }

    /// Set a single parameter, clamped to its range; returns the stored value
    pub fn set(&mut self, param: FilterParam, value: f32) -> f32 {
        let value = param.clamp(value);
        let slot = match param {
            FilterParam::Brightness => &mut self.brightness,
            FilterParam::Contrast => &mut self.contrast,
            FilterParam::Saturation => &mut self.saturation,
            FilterParam::Hue => &mut self.hue,
            FilterParam::Blur => &mut self.blur,
            FilterParam::Sepia => &mut self.sepia,
            FilterParam::Grayscale => &mut self.grayscale,
        };
        *slot = value;
        value
    }

    /// Copy of this state with every parameter clamped to its range
    #[must_use]
    pub fn clamped(&self) -> Self {
        let mut clamped = *self;
        for param in FilterParam::ALL {
            clamped.set(param, self.get(param));
        }
        clamped
    }

    /// Whether every parameter sits at its identity value
    #[must_use]
    pub fn is_identity(&self) -> bool {
        FilterParam::ALL
            .iter()
            .all(|p| (self.get(*p) - p.identity()).abs() < f32::EPSILON)
    }

    /// Look up a named preset (case-insensitive)
    #[must_use]
    pub fn preset(name: &str) -> Option<Self> {
        find_preset(name).map(|p| p.filters)
    }

    /// The combined transfer function, in pipeline order, skipping identity stages
    #[must_use]
    pub fn stages(&self) -> Vec<FilterStage> {
        let mut stages = Vec::with_capacity(7);
        let is_set = |p: FilterParam| (self.get(p) - p.identity()).abs() >= f32::EPSILON;

        if is_set(FilterParam::Brightness) {
            stages.push(FilterStage::Linear {
                slope: self.brightness / 100.0,
                intercept: 0.0,
            });
        }
        if is_set(FilterParam::Contrast) {
            let c = self.contrast / 100.0;
            stages.push(FilterStage::Linear {
                slope: c,
                intercept: 0.5 - 0.5 * c,
            });
        }
        if is_set(FilterParam::Saturation) {
            stages.push(FilterStage::Matrix(ColorMatrix::saturate(
                self.saturation / 100.0,
            )));
        }
        if is_set(FilterParam::Hue) {
            stages.push(FilterStage::Matrix(ColorMatrix::hue_rotate(self.hue)));
        }
        if is_set(FilterParam::Blur) {
            stages.push(FilterStage::Blur(self.blur));
        }
        if is_set(FilterParam::Sepia) {
            stages.push(FilterStage::Matrix(ColorMatrix::sepia(self.sepia / 100.0)));
        }
        if is_set(FilterParam::Grayscale) {
            stages.push(FilterStage::Matrix(ColorMatrix::grayscale(
                self.grayscale / 100.0,
            )));
        }
        stages
    }
}

impl Default for FilterState {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A named constant filter state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preset {
    /// Display name
    pub name: &'static str,
    /// Filter values installed when the preset is applied
    pub filters: FilterState,
}

impl Preset {
    /// Lowercase, dash-separated form of the name (`black-white`)
    #[must_use]
    pub fn slug(&self) -> String {
        self.name
            .to_ascii_lowercase()
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("-")
    }
}

/// Built-in presets; `Original` restores the identity
pub const PRESETS: &[Preset] = &[
    Preset {
        name: "Original",
        filters: FilterState::IDENTITY,
    },
    Preset {
        name: "Vivid",
        filters: FilterState {
            brightness: 105.0,
            contrast: 115.0,
            saturation: 140.0,
            ..FilterState::IDENTITY
        },
    },
    Preset {
        name: "Vintage",
        filters: FilterState {
            brightness: 105.0,
            contrast: 90.0,
            saturation: 80.0,
            sepia: 45.0,
            ..FilterState::IDENTITY
        },
    },
    Preset {
        name: "Black & White",
        filters: FilterState {
            contrast: 110.0,
            grayscale: 100.0,
            ..FilterState::IDENTITY
        },
    },
    Preset {
        name: "Warm",
        filters: FilterState {
            brightness: 105.0,
            saturation: 115.0,
            hue: -10.0,
            sepia: 15.0,
            ..FilterState::IDENTITY
        },
    },
    Preset {
        name: "Cool",
        filters: FilterState {
            saturation: 105.0,
            hue: 15.0,
            ..FilterState::IDENTITY
        },
    },
    Preset {
        name: "Dramatic",
        filters: FilterState {
            brightness: 90.0,
            contrast: 150.0,
            saturation: 120.0,
            ..FilterState::IDENTITY
        },
    },
    Preset {
        name: "Soft",
        filters: FilterState {
            brightness: 110.0,
            contrast: 85.0,
            saturation: 90.0,
            blur: 1.0,
            ..FilterState::IDENTITY
        },
    },
];

/// Find a preset by display name (case-insensitive) or slug
#[must_use]
pub fn find_preset(name: &str) -> Option<&'static Preset> {
    let wanted = name.trim().to_ascii_lowercase();
    PRESETS
        .iter()
        .find(|p| p.name.to_ascii_lowercase() == wanted || p.slug() == wanted)
}

/// 3x3 colour matrix applied to unpremultiplied RGB
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMatrix(pub [[f32; 3]; 3]);

impl ColorMatrix {
    /// `saturate(s)`: 0 = luminance only, 1 = unchanged
    #[must_use]
    pub fn saturate(s: f32) -> Self {
        Self([
            [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
            [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
            [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
        ])
    }

    /// `hue-rotate(deg)`
    #[must_use]
    pub fn hue_rotate(degrees: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self([
            [
                0.213 + cos * 0.787 - sin * 0.213,
                0.715 - cos * 0.715 - sin * 0.715,
                0.072 - cos * 0.072 + sin * 0.928,
            ],
            [
                0.213 - cos * 0.213 + sin * 0.143,
                0.715 + cos * 0.285 + sin * 0.140,
                0.072 - cos * 0.072 - sin * 0.283,
            ],
            [
                0.213 - cos * 0.213 - sin * 0.787,
                0.715 - cos * 0.715 + sin * 0.715,
                0.072 + cos * 0.928 + sin * 0.072,
            ],
        ])
    }

    /// `sepia(amount)` with amount in `[0, 1]`
    #[must_use]
    pub fn sepia(amount: f32) -> Self {
        let inv = 1.0 - amount.clamp(0.0, 1.0);
        Self([
            [0.393 + 0.607 * inv, 0.769 - 0.769 * inv, 0.189 - 0.189 * inv],
            [0.349 - 0.349 * inv, 0.686 + 0.314 * inv, 0.168 - 0.168 * inv],
            [0.272 - 0.272 * inv, 0.534 - 0.534 * inv, 0.131 + 0.869 * inv],
        ])
    }

    /// `grayscale(amount)` with amount in `[0, 1]`
    #[must_use]
    pub fn grayscale(amount: f32) -> Self {
        let inv = 1.0 - amount.clamp(0.0, 1.0);
        Self([
            [0.2126 + 0.7874 * inv, 0.7152 - 0.7152 * inv, 0.0722 - 0.0722 * inv],
            [0.2126 - 0.2126 * inv, 0.7152 + 0.2848 * inv, 0.0722 - 0.0722 * inv],
            [0.2126 - 0.2126 * inv, 0.7152 - 0.7152 * inv, 0.0722 + 0.9278 * inv],
        ])
    }

    fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        let [r, g, b] = rgb;
        self.0.map(|row| (row[0] * r + row[1] * g + row[2] * b).clamp(0.0, 1.0))
    }
}

/// One step of the combined filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterStage {
    /// Per-channel `c * slope + intercept`
    Linear { slope: f32, intercept: f32 },
    /// Colour matrix
    Matrix(ColorMatrix),
    /// Gaussian blur with the given standard deviation in pixels
    Blur(f32),
}

/// Unpremultiplied RGBA raster with channels in `[0, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct FloatRaster {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[f32; 4]>,
}

impl FloatRaster {
    /// Convert an 8-bit RGBA image
    #[must_use]
    pub fn from_rgba(image: &image::RgbaImage) -> Self {
        let pixels = image
            .pixels()
            .map(|p| p.0.map(|c| f32::from(c) / 255.0))
            .collect();
        Self {
            width: image.width(),
            height: image.height(),
            pixels,
        }
    }
}

/// Run every stage of `filters` over `raster`, in order
#[must_use]
pub fn apply_filters(mut raster: FloatRaster, filters: &FilterState) -> FloatRaster {
    for stage in filters.stages() {
        match stage {
            FilterStage::Linear { slope, intercept } => {
                for px in &mut raster.pixels {
                    for c in px.iter_mut().take(3) {
                        *c = (*c * slope + intercept).clamp(0.0, 1.0);
                    }
                }
            },
            FilterStage::Matrix(matrix) => {
                for px in &mut raster.pixels {
                    let [r, g, b] = matrix.apply([px[0], px[1], px[2]]);
                    *px = [r, g, b, px[3]];
                }
            },
            FilterStage::Blur(sigma) => {
                raster.pixels = gaussian_blur_premultiplied(
                    &raster.pixels,
                    raster.width as usize,
                    raster.height as usize,
                    sigma,
                );
            },
        }
    }
    raster
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(rgba: [f32; 4]) -> FloatRaster {
        FloatRaster {
            width: 1,
            height: 1,
            pixels: vec![rgba],
        }
    }

    #[test]
    fn test_identity_has_no_stages() {
        assert!(FilterState::default().stages().is_empty());
        assert!(FilterState::default().is_identity());
    }

    #[test]
    fn test_stage_order_is_fixed() {
        let filters = FilterState {
            brightness: 120.0,
            contrast: 80.0,
            saturation: 50.0,
            hue: 90.0,
            blur: 2.0,
            sepia: 50.0,
            grayscale: 50.0,
        };
        let stages = filters.stages();
        assert_eq!(stages.len(), 7);
        assert!(matches!(stages[0], FilterStage::Linear { intercept, .. } if intercept == 0.0));
        assert!(matches!(stages[1], FilterStage::Linear { intercept, .. } if intercept > 0.0));
        assert_eq!(stages[2], FilterStage::Matrix(ColorMatrix::saturate(0.5)));
        assert_eq!(stages[3], FilterStage::Matrix(ColorMatrix::hue_rotate(90.0)));
        assert_eq!(stages[4], FilterStage::Blur(2.0));
        assert_eq!(stages[5], FilterStage::Matrix(ColorMatrix::sepia(0.5)));
        assert_eq!(stages[6], FilterStage::Matrix(ColorMatrix::grayscale(0.5)));
    }

    #[test]
    fn test_set_clamps_to_range() {
        let mut filters = FilterState::default();
        assert_eq!(filters.set(FilterParam::Brightness, 400.0), 200.0);
        assert_eq!(filters.set(FilterParam::Contrast, 10.0), 50.0);
        assert_eq!(filters.set(FilterParam::Hue, -720.0), -180.0);
        assert_eq!(filters.set(FilterParam::Sepia, f32::NAN), 0.0);
        assert_eq!(filters.brightness, 200.0);
    }

    #[test]
    fn test_brightness_scales_channels() {
        let filters = FilterState {
            brightness: 150.0,
            ..FilterState::IDENTITY
        };
        let out = apply_filters(single([0.4, 0.8, 0.0, 1.0]), &filters);
        let px = out.pixels[0];
        assert!((px[0] - 0.6).abs() < 1e-6);
        assert!((px[1] - 1.0).abs() < 1e-6);
        assert_eq!(px[2], 0.0);
        assert_eq!(px[3], 1.0);
    }

    #[test]
    fn test_contrast_pivots_on_mid_gray() {
        let filters = FilterState {
            contrast: 200.0,
            ..FilterState::IDENTITY
        };
        let out = apply_filters(single([0.5, 0.25, 0.75, 1.0]), &filters);
        let px = out.pixels[0];
        assert!((px[0] - 0.5).abs() < 1e-6);
        assert!(px[1].abs() < 1e-6);
        assert!((px[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_full_grayscale_equalizes_channels() {
        let filters = FilterState {
            grayscale: 100.0,
            ..FilterState::IDENTITY
        };
        let out = apply_filters(single([1.0, 0.0, 0.0, 0.5]), &filters);
        let px = out.pixels[0];
        assert!((px[0] - 0.2126).abs() < 1e-5);
        assert!((px[0] - px[1]).abs() < 1e-5);
        assert!((px[1] - px[2]).abs() < 1e-5);
        assert_eq!(px[3], 0.5);
    }

    #[test]
    fn test_zero_saturation_matches_luminance() {
        let filters = FilterState {
            saturation: 0.0,
            ..FilterState::IDENTITY
        };
        let out = apply_filters(single([0.0, 1.0, 0.0, 1.0]), &filters);
        let px = out.pixels[0];
        assert!((px[0] - 0.715).abs() < 1e-5);
        assert!((px[2] - 0.715).abs() < 1e-5);
    }

    #[test]
    fn test_hue_rotation_by_zero_is_identity_matrix() {
        let m = ColorMatrix::hue_rotate(0.0);
        let out = m.apply([0.2, 0.4, 0.6]);
        for (a, b) in out.iter().zip([0.2, 0.4, 0.6]) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_preset_lookup() {
        assert_eq!(FilterState::preset("original"), Some(FilterState::IDENTITY));
        assert_eq!(
            FilterState::preset("black-white").map(|f| f.grayscale),
            Some(100.0)
        );
        assert_eq!(FilterState::preset("Black & White").map(|f| f.grayscale), Some(100.0));
        assert!(FilterState::preset("nonexistent").is_none());
    }

    #[test]
    fn test_presets_are_within_range() {
        for preset in PRESETS {
            assert_eq!(preset.filters.clamped(), preset.filters, "{}", preset.name);
        }
    }

    #[test]
    fn test_param_parsing() {
        assert_eq!("hue-rotate".parse::<FilterParam>().unwrap(), FilterParam::Hue);
        assert_eq!("Saturate".parse::<FilterParam>().unwrap(), FilterParam::Saturation);
        assert!("exposure".parse::<FilterParam>().is_err());
    }
}
