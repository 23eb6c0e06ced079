//! Editing session over one processed image

use super::background::BackgroundSpec;
use super::filters::{find_preset, FilterParam, FilterState, PRESETS};
use super::pipeline::{compose, render, CompositedOutput, SourceImage};
use crate::config::ExportOptions;
use crate::error::{Result, StudioError};
use image::RgbaImage;
use serde_json::json;

/// Owner of the pristine source plus the current edit parameters
///
/// Every preview and export recomposes from the original raster, so edits never
/// accumulate on top of a previous output.
#[derive(Debug, Clone)]
pub struct EditorSession {
    source: SourceImage,
    filters: FilterState,
    background: BackgroundSpec,
    export: ExportOptions,
    preset: Option<&'static str>,
}

impl EditorSession {
    /// Start editing `source` with identity filters and a transparent background
    #[must_use]
    pub fn new(source: SourceImage) -> Self {
        Self {
            source,
            filters: FilterState::IDENTITY,
            background: BackgroundSpec::default(),
            export: ExportOptions::default(),
            preset: None,
        }
    }

    #[must_use]
    pub fn source(&self) -> &SourceImage {
        &self.source
    }

    #[must_use]
    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    #[must_use]
    pub fn background(&self) -> &BackgroundSpec {
        &self.background
    }

    #[must_use]
    pub fn export_options(&self) -> &ExportOptions {
        &self.export
    }

    /// Name of the last applied preset, cleared by any manual adjustment
    #[must_use]
    pub fn active_preset(&self) -> Option<&'static str> {
        self.preset
    }

    /// Set one parameter, clamped to its range; returns the stored value
    pub fn set_filter(&mut self, param: FilterParam, value: f32) -> f32 {
        self.preset = None;
        self.filters.set(param, value)
    }

    /// Replace all parameters at once (each clamped)
    pub fn set_filters(&mut self, filters: FilterState) {
        self.preset = None;
        self.filters = filters.clamped();
    }

    /// Atomically replace the filter state with a named preset
    ///
    /// # Errors
    /// - No preset matches `name`
    pub fn apply_preset(&mut self, name: &str) -> Result<()> {
        let preset = find_preset(name).ok_or_else(|| {
            let known: Vec<&str> = PRESETS.iter().map(|p| p.name).collect();
            StudioError::invalid_config(format!(
                "Unknown preset '{}'. Available: {}",
                name,
                known.join(", ")
            ))
        })?;

        self.filters = preset.filters;
        self.preset = Some(preset.name);
        log::debug!("Applied preset {}", preset.name);
        Ok(())
    }

    pub fn set_background(&mut self, background: BackgroundSpec) {
        self.background = background;
    }

    pub fn set_export_options(&mut self, export: ExportOptions) {
        self.export = export;
    }

    /// Back to identity filters and a transparent background
    pub fn reset(&mut self) {
        self.filters = FilterState::IDENTITY;
        self.background = BackgroundSpec::default();
        self.preset = None;
    }

    /// Composite the current state without encoding
    #[must_use]
    pub fn preview(&self) -> RgbaImage {
        compose(&self.source, &self.filters, &self.background)
    }

    /// Composite and encode the current state with the session's export options
    ///
    /// # Errors
    /// - Encoding failure
    pub fn render(&self) -> Result<CompositedOutput> {
        render(&self.source, &self.filters, &self.background, &self.export)
    }

    /// Metadata describing this edit, attached when saving to the gallery
    #[must_use]
    pub fn edit_metadata(&self) -> serde_json::Value {
        json!({
            "filters": self.filters,
            "background": self.background,
            "preset": self.preset,
            "format": self.export.format,
            "width": self.source.width(),
            "height": self.source.height(),
        })
    }
}
