//! Compositing and filter pipeline
//!
//! Turns a decoded cut-out plus a [`FilterState`] and [`BackgroundSpec`] into one
//! flattened raster. All work here is synchronous CPU work.

mod background;
mod blur;
mod editor;
mod filters;
mod pipeline;

pub use background::{BackgroundSpec, Rgb};
pub use blur::gaussian_blur_premultiplied;
pub use editor::EditorSession;
pub use filters::{
    apply_filters, find_preset, ColorMatrix, FilterParam, FilterStage, FilterState, FloatRaster,
    Preset, PRESETS,
};
pub use pipeline::{compose, render, CompositedOutput, SourceImage};
