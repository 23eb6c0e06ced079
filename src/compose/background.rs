//! Backgrounds painted beneath the filtered source

use crate::error::{Result, StudioError};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Opaque sRGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);
    pub const BLACK: Rgb = Rgb(0, 0, 0);

    /// Opaque RGBA pixel for this colour
    #[must_use]
    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.0, self.1, self.2, 255])
    }

    fn channels(self) -> [f32; 3] {
        [f32::from(self.0), f32::from(self.1), f32::from(self.2)]
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl std::str::FromStr for Rgb {
    type Err = StudioError;

    /// Parse `#rrggbb`, `rrggbb`, `#rgb` or `rgb`
    fn from_str(s: &str) -> Result<Self> {
        let hex = s.trim().trim_start_matches('#');
        let invalid = || StudioError::invalid_config(format!("Invalid colour '{}'", s));

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let expanded = match hex.len() {
            6 => hex.to_string(),
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            _ => return Err(invalid()),
        };

        let channel = |range: std::ops::Range<usize>| {
            expanded
                .get(range)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(invalid)
        };
        Ok(Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl TryFrom<String> for Rgb {
    type Error = StudioError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

/// What fills the surface before the source is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackgroundSpec {
    /// Surface left at zero alpha
    #[default]
    Transparent,
    /// Flat colour picked from the swatch palette
    Solid { color: Rgb },
    /// Two-stop linear gradient from the top-left to the bottom-right corner
    Gradient { from: Rgb, to: Rgb },
    /// Flat colour picked with the free colour chooser
    Custom { color: Rgb },
}

impl BackgroundSpec {
    /// Fill the whole surface with this background
    pub fn paint(&self, surface: &mut RgbaImage) {
        match *self {
            Self::Transparent => {
                for px in surface.pixels_mut() {
                    *px = Rgba([0, 0, 0, 0]);
                }
            },
            Self::Solid { color } | Self::Custom { color } => {
                let fill = color.to_rgba();
                for px in surface.pixels_mut() {
                    *px = fill;
                }
            },
            Self::Gradient { from, to } => paint_diagonal_gradient(surface, from, to),
        }
    }

    /// Whether the painted surface is fully opaque
    #[must_use]
    pub fn is_opaque(&self) -> bool {
        !matches!(self, Self::Transparent)
    }
}

/// Gradient line runs from (0, 0) to (w, h); each pixel is evaluated at its centre
fn paint_diagonal_gradient(surface: &mut RgbaImage, from: Rgb, to: Rgb) {
    let (w, h) = (surface.width() as f32, surface.height() as f32);
    let length_sq = w * w + h * h;
    let start = from.channels();
    let end = to.channels();

    for (x, y, px) in surface.enumerate_pixels_mut() {
        let t = if length_sq > 0.0 {
            (((x as f32 + 0.5) * w + (y as f32 + 0.5) * h) / length_sq).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let mix = |i: usize| {
            let (a, b) = (start.get(i).copied().unwrap_or(0.0), end.get(i).copied().unwrap_or(0.0));
            (a + (b - a) * t).round().clamp(0.0, 255.0) as u8
        };
        *px = Rgba([mix(0), mix(1), mix(2), 255]);
    }
}

impl std::fmt::Display for BackgroundSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transparent => write!(f, "transparent"),
            Self::Solid { color } => write!(f, "solid:{}", color),
            Self::Gradient { from, to } => write!(f, "gradient:{}:{}", from, to),
            Self::Custom { color } => write!(f, "custom:{}", color),
        }
    }
}

impl std::str::FromStr for BackgroundSpec {
    type Err = StudioError;

    /// Parse `transparent`, `solid:#rrggbb`, `gradient:#rrggbb:#rrggbb` or `custom:#rrggbb`
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().split(':');
        let kind = parts.next().unwrap_or_default().to_ascii_lowercase();
        let args: Vec<&str> = parts.collect();

        match (kind.as_str(), args.as_slice()) {
            ("transparent" | "none", []) => Ok(Self::Transparent),
            ("solid", [color]) => Ok(Self::Solid {
                color: color.parse()?,
            }),
            ("custom", [color]) => Ok(Self::Custom {
                color: color.parse()?,
            }),
            ("gradient", [from, to]) => Ok(Self::Gradient {
                from: from.parse()?,
                to: to.parse()?,
            }),
            _ => Err(StudioError::invalid_config(format!(
                "Invalid background '{}'. Expected transparent, solid:<color>, custom:<color> or gradient:<color>:<color>",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_parsing() {
        assert_eq!("#ffffff".parse::<Rgb>().unwrap(), Rgb::WHITE);
        assert_eq!("667EEA".parse::<Rgb>().unwrap(), Rgb(0x66, 0x7e, 0xea));
        assert_eq!("#f00".parse::<Rgb>().unwrap(), Rgb(255, 0, 0));
        assert!("#ff".parse::<Rgb>().is_err());
        assert!("#gggggg".parse::<Rgb>().is_err());
        assert_eq!(Rgb(1, 2, 255).to_string(), "#0102ff");
    }

    #[test]
    fn test_background_round_trips_through_text() {
        for text in [
            "transparent",
            "solid:#ffffff",
            "custom:#123456",
            "gradient:#667eea:#764ba2",
        ] {
            let spec: BackgroundSpec = text.parse().unwrap();
            assert_eq!(spec.to_string(), text);
        }
        assert!("gradient:#fff".parse::<BackgroundSpec>().is_err());
        assert!("plaid:#fff".parse::<BackgroundSpec>().is_err());
    }

    #[test]
    fn test_background_serde_is_tagged() {
        let spec = BackgroundSpec::Gradient {
            from: Rgb::BLACK,
            to: Rgb::WHITE,
        };
        let json = serde_json::to_value(spec).unwrap();
        assert_eq!(json["type"], "gradient");
        assert_eq!(json["from"], "#000000");
        let back: BackgroundSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn test_transparent_clears_surface() {
        let mut surface = RgbaImage::from_pixel(3, 3, Rgba([9, 9, 9, 9]));
        BackgroundSpec::Transparent.paint(&mut surface);
        assert!(surface.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn test_solid_fills_every_pixel() {
        let mut surface = RgbaImage::new(4, 2);
        BackgroundSpec::Solid { color: Rgb(10, 20, 30) }.paint(&mut surface);
        assert!(surface.pixels().all(|p| p.0 == [10, 20, 30, 255]));
    }

    #[test]
    fn test_gradient_runs_corner_to_corner() {
        let mut surface = RgbaImage::new(100, 100);
        BackgroundSpec::Gradient {
            from: Rgb::BLACK,
            to: Rgb::WHITE,
        }
        .paint(&mut surface);

        let top_left = surface.get_pixel(0, 0).0;
        let bottom_right = surface.get_pixel(99, 99).0;
        let centre = surface.get_pixel(50, 49).0;
        assert!(top_left[0] <= 2);
        assert!(bottom_right[0] >= 253);
        assert!((i32::from(centre[0]) - 128).abs() <= 2);
        // Pixels on the same anti-diagonal share the same colour
        assert_eq!(surface.get_pixel(10, 30), surface.get_pixel(30, 10));
        assert!(surface.pixels().all(|p| p.0[3] == 255));
    }
}
