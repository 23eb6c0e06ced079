//! Configuration types for the processing client, export and session store

use crate::client::RemovalModel;
use crate::error::{Result, StudioError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the collaborator base URL
pub const API_URL_ENV: &str = "IMGLY_BGSTUDIO_API_URL";

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "IMGLY_BGSTUDIO_DATA_DIR";

/// Default base URL of the background removal service
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Maximum accepted upload size (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Number of records the session store keeps
pub const DEFAULT_STORE_CAPACITY: usize = 100;

/// Default age horizon for session store cleanup (one week)
pub const DEFAULT_CLEANUP_HORIZON: Duration = Duration::from_secs(168 * 60 * 60);

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    #[default]
    Png,
    /// JPEG (no transparency, flattened onto white)
    Jpeg,
    /// Lossless WebP with alpha channel transparency
    WebP,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::Jpeg => write!(f, "jpeg"),
            Self::WebP => write!(f, "webp"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::WebP),
            other => Err(StudioError::invalid_config(format!(
                "Unsupported output format '{}'. Expected png, jpeg or webp",
                other
            ))),
        }
    }
}

/// Options controlling how a composite is encoded for download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Target raster format
    pub format: OutputFormat,
    /// JPEG quality (0-100, only used for JPEG output)
    pub jpeg_quality: u8,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Png,
            jpeg_quality: 95,
        }
    }
}

impl ExportOptions {
    /// Export options for `format` with default quality
    #[must_use]
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    /// Set JPEG quality, clamped to 100
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.min(100);
        self
    }

    /// Validate quality settings
    ///
    /// # Errors
    /// - JPEG quality above 100
    pub fn validate(&self) -> Result<()> {
        if self.jpeg_quality > 100 {
            return Err(StudioError::config_value_error(
                "JPEG quality",
                self.jpeg_quality,
                "0-100",
                Some(95),
            ));
        }
        Ok(())
    }
}

/// Configuration for the remote processing client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the background removal service
    pub base_url: String,

    /// Model used when the caller does not pick one
    pub default_model: RemovalModel,

    /// Largest file accepted for upload, in bytes
    pub max_upload_bytes: u64,

    /// Request timeout (None = transport defaults)
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            default_model: RemovalModel::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            timeout: None,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder for fluent API construction
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imgly_bgstudio::{ClientConfig, RemovalModel};
    ///
    /// let config = ClientConfig::builder()
    ///     .base_url("http://127.0.0.1:9000")
    ///     .default_model(RemovalModel::Silueta)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.base_url, "http://127.0.0.1:9000");
    /// ```
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Default configuration with environment overrides applied
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                config.base_url = url;
            }
        }
        config
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Base URL is not an http(s) URL
    /// - Upload limit is zero
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(StudioError::invalid_config(format!(
                "Base URL must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }

        if self.max_upload_bytes == 0 {
            return Err(StudioError::config_value_error(
                "upload limit",
                self.max_upload_bytes,
                "1 or more bytes",
                Some(DEFAULT_MAX_UPLOAD_BYTES),
            ));
        }

        Ok(())
    }

    /// Join an endpoint path onto the base URL
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Builder for `ClientConfig`
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the service base URL
    #[must_use]
    pub fn base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the default removal model
    #[must_use]
    pub fn default_model(mut self, model: RemovalModel) -> Self {
        self.config.default_model = model;
        self
    }

    /// Set the maximum upload size in bytes
    #[must_use]
    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    /// Set an explicit request timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Any rule checked by [`ClientConfig::validate`]
    pub fn build(self) -> Result<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration for the session reference store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON file holding the session records
    pub path: PathBuf,
    /// Maximum number of retained records
    pub capacity: usize,
    /// Age after which `cleanup` drops records
    pub cleanup_horizon: Duration,
}

impl StoreConfig {
    /// Store configuration rooted in the resolved data directory
    ///
    /// # Errors
    /// - No data directory could be determined
    pub fn from_env() -> Result<Self> {
        Ok(Self::in_dir(data_dir()?))
    }

    /// Store configuration rooted in `dir`
    #[must_use]
    pub fn in_dir<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            path: dir.into().join("session.json"),
            capacity: DEFAULT_STORE_CAPACITY,
            cleanup_horizon: DEFAULT_CLEANUP_HORIZON,
        }
    }
}

/// Resolve the data directory
///
/// Uses `IMGLY_BGSTUDIO_DATA_DIR` when set, otherwise the platform data directory:
/// - Linux: `~/.local/share/imgly-bgstudio/`
/// - macOS: `~/Library/Application Support/imgly-bgstudio/`
/// - Windows: `%APPDATA%/imgly-bgstudio/`
///
/// # Errors
/// - Failed to determine user data directory
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(dir_override) = std::env::var(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir_override));
    }

    Ok(dirs::data_dir()
        .ok_or_else(|| {
            StudioError::invalid_config(format!(
                "Failed to determine data directory. Set {} environment variable.",
                DATA_DIR_ENV
            ))
        })?
        .join("imgly-bgstudio"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_API_URL);
        assert_eq!(config.default_model, RemovalModel::Auto);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert!(config.timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::builder()
            .base_url("https://bg.example.com/")
            .default_model(RemovalModel::U2NetHumanSeg)
            .max_upload_bytes(1024)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap();

        assert_eq!(config.default_model, RemovalModel::U2NetHumanSeg);
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(
            config.endpoint("/remove-background"),
            "https://bg.example.com/remove-background"
        );
    }

    #[test]
    fn test_config_validation() {
        let result = ClientConfig::builder().base_url("ftp://nope").build();
        assert!(result.is_err());

        let result = ClientConfig::builder().max_upload_bytes(0).build();
        let error = result.unwrap_err();
        assert!(error.to_string().contains("upload limit"));
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("PNG".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert_eq!("jpg".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!("webp".parse::<OutputFormat>().unwrap(), OutputFormat::WebP);
        assert!("gif".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::default(), OutputFormat::Png);
        assert_eq!(OutputFormat::Jpeg.to_string(), "jpeg");
    }

    #[test]
    fn test_export_options() {
        let options = ExportOptions::new(OutputFormat::Jpeg).with_jpeg_quality(150);
        assert_eq!(options.jpeg_quality, 100);
        assert!(options.validate().is_ok());

        let invalid = ExportOptions {
            jpeg_quality: 101,
            ..ExportOptions::default()
        };
        assert!(invalid.validate().unwrap_err().to_string().contains("0-100"));
    }

    #[test]
    fn test_store_config_in_dir() {
        let config = StoreConfig::in_dir("/tmp/studio");
        assert_eq!(config.path, PathBuf::from("/tmp/studio/session.json"));
        assert_eq!(config.capacity, 100);
        assert_eq!(config.cleanup_horizon, Duration::from_secs(604_800));
    }
}
