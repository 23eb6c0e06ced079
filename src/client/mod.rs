//! HTTP client for the remote background removal service
//!
//! Uploads are validated locally first; nothing touches the network for a file
//! that would be rejected on type or size. Failures are classified into
//! [`StudioError::NetworkUnavailable`], [`StudioError::InvalidInput`],
//! [`StudioError::UnprocessableImage`] and [`StudioError::ServerError`].
//! There are no automatic retries.

mod models;
mod progress;
mod validation;

pub use models::{
    ImageAnalysis, ImageKind, ImageMetadata, ModelInfo, ProcessedImage, QualityLevel,
    RemovalModel, ServerOutputFormat, StorageStats,
};
pub use progress::TransferProgress;
pub use validation::{ImageUpload, UploadValidator, ACCEPTED_MIME_TYPES};

use crate::compose::SourceImage;
use crate::config::ClientConfig;
use crate::error::{Result, StudioError};
use async_trait::async_trait;
use futures::Stream;
use futures_util::StreamExt;
use models::{ImageList, ModelList, StorageStatsResponse};
use reqwest::{multipart, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::Instrument;

/// Upload body chunk size; each chunk pulled by the transport advances progress
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Form fields sent with a removal request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalOptions {
    pub model: RemovalModel,
    pub output_format: ServerOutputFormat,
    pub quality: QualityLevel,
}

impl RemovalOptions {
    #[must_use]
    pub fn new(model: RemovalModel) -> Self {
        Self {
            model,
            ..Self::default()
        }
    }
}

/// Anything that can turn an upload into a cut-out
///
/// Implemented by [`ProcessingClient`]; the batch queue is generic over it.
#[async_trait]
pub trait RemovalService: Send + Sync {
    /// Remove the background of one image
    async fn remove_background(
        &self,
        upload: ImageUpload,
        model: RemovalModel,
    ) -> Result<ProcessedImage>;
}

/// Client for the background removal service and its gallery endpoints
#[derive(Debug, Clone)]
pub struct ProcessingClient {
    http: Client,
    config: ClientConfig,
    validator: UploadValidator,
}

impl ProcessingClient {
    /// Create a client for the configured service
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Failed to create HTTP client
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| StudioError::network_error("Failed to create HTTP client", e))?;

        Ok(Self {
            http,
            validator: UploadValidator::new(config.max_upload_bytes),
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run the local type and size checks, returning the resolved MIME type
    ///
    /// # Errors
    /// - Upload rejected
    pub fn validate(&self, upload: &ImageUpload) -> Result<String> {
        self.validator.validate(upload)
    }

    /// Remove the background of `upload` with `model`
    ///
    /// # Errors
    /// - `Validation` before any network use
    /// - `NetworkUnavailable`, `InvalidInput`, `UnprocessableImage`, `ServerError`
    pub async fn submit(&self, upload: ImageUpload, model: RemovalModel) -> Result<ProcessedImage> {
        self.submit_with_options(upload, RemovalOptions::new(model)).await
    }

    /// Like [`submit`](Self::submit) with explicit output format and quality fields
    pub async fn submit_with_options(
        &self,
        upload: ImageUpload,
        options: RemovalOptions,
    ) -> Result<ProcessedImage> {
        let span = tracing::info_span!(
            "remove_background",
            file = %upload.filename(),
            model = %options.model,
            bytes = upload.len()
        );
        self.send_removal(upload, options, Arc::new(TransferProgress::detached()))
            .instrument(span)
            .await
    }

    /// Start a cancellable submission that reports progress
    ///
    /// The returned [`Submission`] is a stream of percentages followed by a result
    /// obtained with [`Submission::result`]. Dropping it aborts the transfer.
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn submit_with_progress(&self, upload: ImageUpload, options: RemovalOptions) -> Submission {
        let (sender, receiver) = mpsc::unbounded_channel();
        let progress = Arc::new(TransferProgress::new(sender));
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let client = self.clone();

        let span = tracing::info_span!(
            "remove_background",
            file = %upload.filename(),
            model = %options.model,
            bytes = upload.len()
        );

        let handle = tokio::spawn(
            async move {
                tokio::select! {
                    biased;
                    () = cancelled.cancelled() => {
                        log::info!("Submission cancelled");
                        Err(StudioError::Cancelled)
                    },
                    result = client.send_removal(upload, options, progress) => result,
                }
            }
            .instrument(span),
        );

        Submission {
            progress: UnboundedReceiverStream::new(receiver),
            handle,
            token: token.clone(),
            _guard: token.drop_guard(),
        }
    }

    async fn send_removal(
        &self,
        upload: ImageUpload,
        options: RemovalOptions,
        progress: Arc<TransferProgress>,
    ) -> Result<ProcessedImage> {
        let mime = self.validator.validate(&upload)?;
        let total = upload.len();
        let filename = upload.filename().to_string();

        let part = multipart::Part::stream_with_length(
            upload_body(upload.into_bytes(), Arc::clone(&progress)),
            total,
        )
        .file_name(filename)
        .mime_str(&mime)
        .map_err(|e| StudioError::invalid_input(format!("Invalid MIME type '{}': {}", mime, e)))?;

        let form = multipart::Form::new()
            .part("image", part)
            .text("model", options.model.as_str())
            .text("output_format", options.output_format.as_str())
            .text("quality", options.quality.as_str());

        tracing::debug!("Uploading {} bytes", total);
        let response = self
            .http
            .post(self.config.endpoint("/remove-background"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| StudioError::network_error("Failed to reach the removal service", e))?;
        let response = check_status(response).await?;
        progress.upload(total, total);

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header("content-type").unwrap_or_else(|| "image/png".to_string());
        let original_id = header("x-original-id");
        let processed_id = header("x-processed-id");

        let bytes = read_body(response, &progress).await?;
        progress.finish();
        tracing::info!(received = bytes.len(), "Background removed");

        Ok(ProcessedImage {
            bytes,
            content_type,
            original_id,
            processed_id,
            received_at: chrono::Utc::now(),
        })
    }

    /// `GET /models`
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let list: ModelList = self
            .fetch_json(self.http.get(self.config.endpoint("/models")), "list models")
            .await?;
        Ok(list.models)
    }

    /// `POST /analyze-image`: the service's model recommendation for an image
    pub async fn analyze_image(&self, upload: ImageUpload) -> Result<ImageAnalysis> {
        let mime = self.validator.validate(&upload)?;
        let filename = upload.filename().to_string();
        let part = multipart::Part::bytes(upload.into_bytes())
            .file_name(filename)
            .mime_str(&mime)
            .map_err(|e| StudioError::invalid_input(format!("Invalid MIME type '{}': {}", mime, e)))?;
        let request = self
            .http
            .post(self.config.endpoint("/analyze-image"))
            .multipart(multipart::Form::new().part("image", part));
        self.fetch_json(request, "analyze image").await
    }

    /// `GET /images`, optionally filtered by kind and parent
    pub async fn list_images(
        &self,
        kind: Option<ImageKind>,
        parent_id: Option<&str>,
    ) -> Result<Vec<ImageMetadata>> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(kind) = kind {
            query.push(("image_type", kind.as_str()));
        }
        if let Some(parent) = parent_id {
            query.push(("parent_id", parent));
        }
        let request = self.http.get(self.config.endpoint("/images")).query(&query);
        let list: ImageList = self.fetch_json(request, "list images").await?;
        Ok(list.images)
    }

    /// `GET /images/{id}`: raw image bytes
    pub async fn get_image(&self, id: &str) -> Result<Vec<u8>> {
        let request = self.http.get(self.config.endpoint(&format!("/images/{}", id)));
        self.fetch_bytes(request, "fetch image").await
    }

    /// `GET /images/{id}/thumbnail`
    pub async fn thumbnail(&self, id: &str) -> Result<Vec<u8>> {
        let request = self
            .http
            .get(self.config.endpoint(&format!("/images/{}/thumbnail", id)));
        self.fetch_bytes(request, "fetch thumbnail").await
    }

    /// `DELETE /images/{id}`
    pub async fn delete_image(&self, id: &str, delete_children: bool) -> Result<()> {
        let request = self
            .http
            .delete(self.config.endpoint(&format!("/images/{}", id)))
            .query(&[("delete_children", delete_children)]);
        let response = request
            .send()
            .await
            .map_err(|e| StudioError::network_error("Failed to delete image", e))?;
        check_status(response).await?;
        log::info!("Deleted image {} (children: {})", id, delete_children);
        Ok(())
    }

    /// `POST /images/{id}/save-edited`: store an edited rendition of `id`
    ///
    /// Returns the id the service assigned to the edited image, when it reports one.
    pub async fn save_edited(
        &self,
        id: &str,
        bytes: Vec<u8>,
        filename: &str,
        metadata: &serde_json::Value,
    ) -> Result<Option<String>> {
        let mime = mime_for_name(filename);
        let part = multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime)
            .map_err(|e| StudioError::invalid_input(format!("Invalid MIME type '{}': {}", mime, e)))?;
        let form = multipart::Form::new()
            .part("edited_image", part)
            .text("metadata", serde_json::to_string(metadata)?);
        let request = self
            .http
            .post(self.config.endpoint(&format!("/images/{}/save-edited", id)))
            .multipart(form);

        let body: serde_json::Value = self.fetch_json(request, "save edited image").await?;
        Ok(["image_id", "edited_id", "id"]
            .iter()
            .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
            .map(str::to_string))
    }

    /// `GET /storage/stats`
    pub async fn storage_stats(&self) -> Result<StorageStats> {
        let response: StorageStatsResponse = self
            .fetch_json(self.http.get(self.config.endpoint("/storage/stats")), "fetch storage stats")
            .await?;
        Ok(response.stats)
    }

    /// Fetch and decode an image from an arbitrary URL
    ///
    /// # Errors
    /// - `Decode` when the image cannot be obtained or decoded
    pub async fn fetch_source(&self, url: &str) -> Result<SourceImage> {
        let bytes = self
            .fetch_bytes(self.http.get(url), "fetch source image")
            .await
            .map_err(|e| StudioError::decode_error_with_source(url, &e.to_string()))?;
        SourceImage::decode(&bytes)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let bytes = self.fetch_bytes(request, what).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn fetch_bytes(&self, request: RequestBuilder, what: &str) -> Result<Vec<u8>> {
        let response = request
            .send()
            .await
            .map_err(|e| StudioError::network_error(format!("Failed to {}", what), e))?;
        let response = check_status(response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StudioError::network_error(format!("Failed to {}", what), e))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl RemovalService for ProcessingClient {
    async fn remove_background(
        &self,
        upload: ImageUpload,
        model: RemovalModel,
    ) -> Result<ProcessedImage> {
        self.submit(upload, model).await
    }
}

/// In-flight removal started by [`ProcessingClient::submit_with_progress`]
///
/// Yields monotonically non-decreasing percentages in `0..=100`; the stream
/// ends when the transfer finishes or fails.
pub struct Submission {
    progress: UnboundedReceiverStream<u8>,
    handle: JoinHandle<Result<ProcessedImage>>,
    token: CancellationToken,
    _guard: DropGuard,
}

impl Submission {
    /// Abort the transfer; [`result`](Self::result) then yields `Cancelled`
    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for the outcome
    pub async fn result(self) -> Result<ProcessedImage> {
        let Self { handle, _guard, .. } = self;
        match handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(StudioError::Cancelled),
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }
}

impl Stream for Submission {
    type Item = u8;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<u8>> {
        Pin::new(&mut self.get_mut().progress).poll_next(cx)
    }
}

impl std::fmt::Debug for Submission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Submission")
            .field("cancelled", &self.token.is_cancelled())
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

/// Map a non-success HTTP status and its body onto an error kind
///
/// The FastAPI `detail` field is surfaced as the message when present.
///
/// # Examples
/// ```rust
/// use imgly_bgstudio::{client::classify_status, StudioError};
///
/// let err = classify_status(415, r#"{"detail": "File must be an image"}"#);
/// assert!(matches!(err, StudioError::InvalidInput(ref m) if m == "File must be an image"));
/// ```
#[must_use]
pub fn classify_status(status: u16, body: &str) -> StudioError {
    let message = error_detail(body).unwrap_or_else(|| {
        reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Request failed")
            .to_string()
    });

    match status {
        400 | 413 | 415 => StudioError::invalid_input(message),
        422 => StudioError::unprocessable(message),
        // The service reports undecodable uploads as internal errors
        500..=599 if message.contains("cannot identify image") => StudioError::unprocessable(message),
        _ => StudioError::server(status, message),
    }
}

fn error_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        return Some(trimmed.to_string());
    };

    match value.get("detail")? {
        serde_json::Value::String(detail) => Some(detail.clone()),
        serde_json::Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect::<Vec<_>>()
                .join("; "),
        ),
        other => Some(other.to_string()),
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let error = classify_status(status.as_u16(), &body);
    tracing::warn!(status = status.as_u16(), "Request failed: {}", error);
    Err(error)
}

fn upload_body(bytes: Vec<u8>, progress: Arc<TransferProgress>) -> reqwest::Body {
    let total = bytes.len() as u64;
    let chunks: Vec<Vec<u8>> = bytes.chunks(UPLOAD_CHUNK_SIZE).map(<[u8]>::to_vec).collect();
    let mut sent = 0u64;

    let stream = futures::stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        progress.upload(sent, total);
        Ok::<_, std::io::Error>(chunk)
    });
    reqwest::Body::wrap_stream(stream)
}

async fn read_body(response: Response, progress: &TransferProgress) -> Result<Vec<u8>> {
    let total = response.content_length();
    let mut buffer = Vec::with_capacity(total.unwrap_or(0).min(64 * 1024 * 1024) as usize);
    let mut received = 0u64;
    let mut stream = response.bytes_stream();

    progress.download(0, total);
    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|e| StudioError::network_error("Failed to read processed image", e))?;
        received += chunk.len() as u64;
        buffer.extend_from_slice(&chunk);
        progress.download(received, total);
    }

    Ok(buffer)
}

fn mime_for_name(filename: &str) -> &'static str {
    match std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}
