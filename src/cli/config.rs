//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::{Cli, CliOutputFormat, ComposeArgs};
use crate::{
    compose::{BackgroundSpec, FilterParam, FilterState},
    config::{ClientConfig, ExportOptions, OutputFormat, StoreConfig},
    RemovalModel,
};
use anyhow::{Context, Result};
use std::time::Duration;

/// Edit settings collected from the compose flags
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ComposeSettings {
    pub(crate) preset: Option<String>,
    /// Individual overrides applied after the preset
    pub(crate) overrides: Vec<(FilterParam, f32)>,
    pub(crate) background: BackgroundSpec,
    /// Explicit format; `None` picks one from the image
    pub(crate) format: Option<OutputFormat>,
    pub(crate) jpeg_quality: u8,
}

impl ComposeSettings {
    /// Filter state described by the preset and overrides
    pub(crate) fn filters(&self) -> Result<FilterState> {
        let mut filters = match &self.preset {
            Some(name) => FilterState::preset(name)
                .with_context(|| format!("Unknown preset '{}' (see `presets`)", name))?,
            None => FilterState::IDENTITY,
        };
        for (param, value) in &self.overrides {
            filters.set(*param, *value);
        }
        Ok(filters)
    }

    /// Export options for a resolved format
    pub(crate) fn export_options(&self, format: OutputFormat) -> ExportOptions {
        ExportOptions::new(format).with_jpeg_quality(self.jpeg_quality)
    }
}

/// Convert CLI arguments to library configuration
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the client configuration from global flags and the environment
    pub(crate) fn client_config(cli: &Cli, model: Option<RemovalModel>) -> Result<ClientConfig> {
        let mut builder = ClientConfig::builder();
        if let Some(url) = &cli.api_url {
            builder = builder.base_url(url.trim_end_matches('/'));
        } else {
            builder = builder.base_url(ClientConfig::from_env().base_url);
        }
        if let Some(model) = model {
            builder = builder.default_model(model);
        }
        if let Some(secs) = cli.timeout {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        builder.build().context("Invalid client configuration")
    }

    /// Resolve the reference store location
    pub(crate) fn store_config(cli: &Cli) -> Result<StoreConfig> {
        match &cli.data_dir {
            Some(dir) => Ok(StoreConfig::in_dir(dir)),
            None => StoreConfig::from_env().context("Failed to resolve the data directory"),
        }
    }

    /// Collect compose flags into edit settings
    pub(crate) fn compose_settings(args: &ComposeArgs) -> Result<ComposeSettings> {
        let background = match &args.background {
            Some(spec) => spec
                .parse::<BackgroundSpec>()
                .with_context(|| format!("Invalid background '{}'", spec))?,
            None => BackgroundSpec::Transparent,
        };

        let overrides = [
            (FilterParam::Brightness, args.brightness),
            (FilterParam::Contrast, args.contrast),
            (FilterParam::Saturation, args.saturation),
            (FilterParam::Hue, args.hue),
            (FilterParam::Blur, args.blur),
            (FilterParam::Sepia, args.sepia),
            (FilterParam::Grayscale, args.grayscale),
        ]
        .into_iter()
        .filter_map(|(param, value)| value.map(|v| (param, v)))
        .collect();

        let settings = ComposeSettings {
            preset: args.preset.clone(),
            overrides,
            background,
            format: args.format.map(OutputFormat::from),
            jpeg_quality: args.jpeg_quality,
        };

        settings.filters()?;
        Self::validate_compose(&settings)?;
        Ok(settings)
    }

    fn validate_compose(settings: &ComposeSettings) -> Result<()> {
        settings
            .export_options(settings.format.unwrap_or_default())
            .validate()
            .context("Invalid export options")?;

        if settings.format == Some(OutputFormat::Jpeg) && !settings.background.is_opaque() {
            log::warn!("JPEG has no transparency; transparent areas will be flattened onto white");
        }
        Ok(())
    }
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => OutputFormat::Png,
            CliOutputFormat::Jpeg => OutputFormat::Jpeg,
            CliOutputFormat::Webp => OutputFormat::WebP,
        }
    }
}
