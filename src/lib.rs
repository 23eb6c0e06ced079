#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # IMG.LY Background Studio
//!
//! Client-side background removal studio: images are cut out by a remote
//! removal service, then composited over a chosen background, filtered and
//! exported locally.
//!
//! ## Features
//!
//! - **Remote Removal**: Multipart upload with byte-accurate progress, cancellation and
//!   typed errors for every failure class of the service
//! - **Compositing**: Deterministic source-over rendering onto transparent, solid or
//!   gradient backgrounds
//! - **Filters**: Brightness, contrast, saturation, hue, blur, sepia and grayscale with
//!   built-in presets
//! - **Batch Processing**: Sequential queue with per-item status, pacing and pause/resume
//! - **Session Store**: Persistent, capacity-bounded record of recent originals, cut-outs
//!   and edits
//! - **CLI Integration**: Optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imgly_bgstudio::{
//!     BackgroundSpec, ClientConfig, EditorSession, ImageUpload, ProcessingClient, RemovalModel,
//!     Rgb, SourceImage,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = ProcessingClient::new(ClientConfig::from_env())?;
//! let upload = ImageUpload::from_path("portrait.jpg")?;
//! let processed = client.submit(upload, RemovalModel::Auto).await?;
//!
//! let mut session = EditorSession::new(SourceImage::decode(&processed.bytes)?);
//! session.set_background(BackgroundSpec::Solid { color: Rgb::WHITE });
//! session.apply_preset("vivid")?;
//! session.render()?.save("portrait_no_bg.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): Command-line interface and tracing subscriber setup
//! - `webp-support` (default): WebP export
//! - `tracing-json`: JSON log output for the CLI
//! - `tracing-files`: File log output for the CLI
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! imgly-bgstudio = { version = "0.1", default-features = false, features = ["webp-support"] }
//! ```

pub mod batch;
#[cfg(feature = "cli")]
pub mod cli;
pub mod client;
pub mod compose;
pub mod config;
pub mod error;
pub mod services;
pub mod store;
#[cfg(feature = "cli")]
pub mod tracing_config;

use tokio::io::AsyncRead;

// Public API exports
pub use batch::{
    BatchConfig, BatchItem, BatchQueue, BatchReporter, BatchSummary, ConsoleBatchReporter,
    ItemStatus, NoOpBatchReporter, PauseHandle,
};
pub use client::{
    classify_status, ImageAnalysis, ImageKind, ImageMetadata, ImageUpload, ModelInfo,
    ProcessedImage, ProcessingClient, QualityLevel, RemovalModel, RemovalOptions, RemovalService,
    ServerOutputFormat, StorageStats, Submission, TransferProgress, UploadValidator,
};
pub use compose::{
    compose, render, BackgroundSpec, CompositedOutput, EditorSession, FilterParam, FilterState,
    Preset, Rgb, SourceImage, PRESETS,
};
pub use config::{ClientConfig, ExportOptions, OutputFormat, StoreConfig};
pub use error::{Result, StudioError};
pub use services::{
    ConsoleProgressReporter, ImageIOService, NoOpProgressReporter, OutputFormatHandler,
    ProcessingStage, ProgressReporter, ProgressTracker, ProgressUpdate, RunTimings,
};
pub use store::{format_size, ImageRecord, SessionStore, SessionStoreStats};

#[cfg(feature = "cli")]
pub use tracing_config::{
    events, init_cli_tracing, spans, TracingConfig, TracingFormat, TracingOutput,
};

/// Remove the background of an image held in memory
///
/// Validation runs before any network use, so unsupported or oversized
/// images fail without contacting the service.
///
/// # Examples
///
/// ```rust,no_run
/// use imgly_bgstudio::{remove_background_from_bytes, ClientConfig};
///
/// # async fn example(upload_bytes: Vec<u8>) -> anyhow::Result<()> {
/// let config = ClientConfig::from_env();
/// let processed = remove_background_from_bytes(upload_bytes, "upload.png", &config).await?;
/// std::fs::write("upload_no_bg.png", &processed.bytes)?;
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_bytes(
    image_bytes: Vec<u8>,
    filename: &str,
    config: &ClientConfig,
) -> Result<ProcessedImage> {
    let client = ProcessingClient::new(config.clone())?;
    let upload = ImageUpload::from_bytes(image_bytes, filename, None);
    client.submit(upload, config.default_model).await
}

/// Remove the background of an image read from an async stream
///
/// ```rust,no_run
/// use imgly_bgstudio::{remove_background_from_reader, ClientConfig};
/// use tokio::fs::File;
///
/// # async fn example() -> anyhow::Result<()> {
/// let file = File::open("large_image.jpg").await?;
/// let processed =
///     remove_background_from_reader(file, "large_image.jpg", &ClientConfig::default()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
    filename: &str,
    config: &ClientConfig,
) -> Result<ProcessedImage> {
    let mut buffer = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer)
        .await
        .map_err(|e| StudioError::file_io_error("read image stream", filename, &e))?;

    remove_background_from_bytes(buffer, filename, config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_bytes_fail_before_network() {
        let config = ClientConfig::builder()
            .base_url("http://127.0.0.1:1")
            .build()
            .unwrap();
        let err = remove_background_from_bytes(b"plain text".to_vec(), "notes.txt", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reader_reports_oversized_input() {
        let config = ClientConfig::builder()
            .base_url("http://127.0.0.1:1")
            .max_upload_bytes(8)
            .build()
            .unwrap();
        let reader = std::io::Cursor::new(vec![0u8; 16]);
        let err = remove_background_from_reader(reader, "big.png", &config)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }
}
