//! Sequential batch submission
//!
//! Items go to the removal service one at a time with a fixed delay between
//! them. Pausing is cooperative: the flag is checked before each item starts and
//! never interrupts a request already in flight. A failed item never stops the
//! queue.

use crate::client::{ImageKind, ImageUpload, ProcessedImage, RemovalModel, RemovalService};
use crate::error::StudioError;
use crate::services::OutputFormatHandler;
use crate::store::{ImageRecord, SessionStore};
use instant::Instant;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Delay between consecutive submissions
pub const DEFAULT_ITEM_DELAY: Duration = Duration::from_millis(500);

/// Batch processing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Model requested for every item
    pub model: RemovalModel,
    /// Wait between the end of one item and the start of the next
    pub delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            model: RemovalModel::default(),
            delay: DEFAULT_ITEM_DELAY,
        }
    }
}

/// Lifecycle of one queue item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Pending,
    Processing,
    Completed,
    Failed(String),
}

impl ItemStatus {
    /// Whether the item has reached a final state
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed(message) => write!(f, "failed: {}", message),
        }
    }
}

#[derive(Debug)]
enum ItemSource {
    Path(PathBuf),
    Upload(ImageUpload),
}

/// One image in the queue with its outcome
#[derive(Debug)]
pub struct BatchItem {
    name: String,
    source: Option<ItemSource>,
    status: ItemStatus,
    result: Option<ProcessedImage>,
    error: Option<StudioError>,
    elapsed: Option<Duration>,
    input_size: Option<u64>,
}

impl BatchItem {
    /// Item read from disk when its turn comes
    #[must_use]
    pub fn from_path<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        Self::new(path.display().to_string(), ItemSource::Path(path))
    }

    /// Item with the bytes already in memory
    #[must_use]
    pub fn from_upload(upload: ImageUpload) -> Self {
        Self::new(upload.filename().to_string(), ItemSource::Upload(upload))
    }

    fn new(name: String, source: ItemSource) -> Self {
        Self {
            name,
            source: Some(source),
            status: ItemStatus::Pending,
            result: None,
            error: None,
            elapsed: None,
            input_size: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn status(&self) -> &ItemStatus {
        &self.status
    }

    /// Cut-out returned for a completed item
    #[must_use]
    pub fn result(&self) -> Option<&ProcessedImage> {
        self.result.as_ref()
    }

    /// Take the cut-out out of a completed item
    pub fn take_result(&mut self) -> Option<ProcessedImage> {
        self.result.take()
    }

    /// Error stored against a failed item
    #[must_use]
    pub fn error(&self) -> Option<&StudioError> {
        self.error.as_ref()
    }

    /// Wall time spent on the request
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    /// Size of the uploaded source in bytes, once it has been read
    #[must_use]
    pub fn input_size(&self) -> Option<u64> {
        self.input_size
    }

    fn upload(&mut self) -> Result<ImageUpload, StudioError> {
        match self.source.take() {
            Some(ItemSource::Upload(upload)) => Ok(upload),
            Some(ItemSource::Path(path)) => ImageUpload::from_path(path),
            None => Err(StudioError::validation(format!(
                "'{}' has no image data",
                self.name
            ))),
        }
    }
}

/// Shared pause flag for a running queue
#[derive(Debug, Clone, Default)]
pub struct PauseHandle {
    paused: Arc<AtomicBool>,
}

impl PauseHandle {
    /// Stop before the next item starts
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

/// Totals for one run of the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Items not yet started (non-zero only when paused)
    pub pending: usize,
    pub elapsed: Duration,
    /// Whether the run stopped because of a pause request
    pub paused: bool,
}

/// Progress reporting trait for batch operations
pub trait BatchReporter: Send + Sync {
    /// Called when a run starts with the number of items still to process
    fn on_start(&self, total: usize);

    /// Called when processing of an item starts
    fn on_item_start(&self, name: &str, index: usize);

    /// Called when an item completes successfully
    fn on_item_complete(&self, name: &str, elapsed: Duration);

    /// Called when an item fails
    fn on_item_error(&self, name: &str, error: &StudioError);

    /// Called when the run stops on a pause request
    fn on_paused(&self, remaining: usize) {
        let _ = remaining;
    }

    /// Called when the run ends
    fn on_batch_complete(&self, summary: &BatchSummary);
}

/// Reporter that discards all events
pub struct NoOpBatchReporter;

impl BatchReporter for NoOpBatchReporter {
    fn on_start(&self, _total: usize) {}

    fn on_item_start(&self, _name: &str, _index: usize) {}

    fn on_item_complete(&self, _name: &str, _elapsed: Duration) {}

    fn on_item_error(&self, _name: &str, _error: &StudioError) {}

    fn on_batch_complete(&self, _summary: &BatchSummary) {}
}

/// Reporter that logs every event
pub struct ConsoleBatchReporter {
    verbose: bool,
}

impl ConsoleBatchReporter {
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl BatchReporter for ConsoleBatchReporter {
    fn on_start(&self, total: usize) {
        log::info!("Starting batch of {} image(s)", total);
    }

    fn on_item_start(&self, name: &str, index: usize) {
        if self.verbose {
            log::info!("[{}] Processing: {}", index + 1, name);
        }
    }

    fn on_item_complete(&self, name: &str, elapsed: Duration) {
        log::info!("✅ Completed: {} ({}ms)", name, elapsed.as_millis());
    }

    fn on_item_error(&self, name: &str, error: &StudioError) {
        log::error!("❌ Failed: {} - {}", name, error.user_message());
    }

    fn on_paused(&self, remaining: usize) {
        log::info!("⏸️  Paused with {} image(s) remaining", remaining);
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        log::info!(
            "Batch complete: {}/{} successful in {:.2}s",
            summary.completed,
            summary.total,
            summary.elapsed.as_secs_f64()
        );
        if summary.failed > 0 {
            log::warn!("  {} image(s) failed", summary.failed);
        }
    }
}

/// Queue of images processed sequentially against a [`RemovalService`]
pub struct BatchQueue<S: RemovalService> {
    service: S,
    config: BatchConfig,
    items: Vec<BatchItem>,
    pause: PauseHandle,
}

impl<S: RemovalService> BatchQueue<S> {
    #[must_use]
    pub fn new(service: S, config: BatchConfig) -> Self {
        Self {
            service,
            config,
            items: Vec::new(),
            pause: PauseHandle::default(),
        }
    }

    /// Append an item in `Pending` state
    pub fn push(&mut self, item: BatchItem) {
        self.items.push(item);
    }

    /// Handle that can pause this queue from another task
    #[must_use]
    pub fn pause_handle(&self) -> PauseHandle {
        self.pause.clone()
    }

    #[must_use]
    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [BatchItem] {
        &mut self.items
    }

    /// Process every pending item in order
    ///
    /// Stops early, leaving later items `Pending`, when the pause flag is set
    /// before an item starts. Calling `run` again after resuming continues with
    /// the remaining items. Completed items are recorded in `store` when given.
    pub async fn run(
        &mut self,
        reporter: &dyn BatchReporter,
        mut store: Option<&mut SessionStore>,
    ) -> BatchSummary {
        let start = Instant::now();
        let pending: Vec<usize> = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.status == ItemStatus::Pending)
            .map(|(index, _)| index)
            .collect();

        reporter.on_start(pending.len());
        let mut paused = false;

        for (position, &index) in pending.iter().enumerate() {
            if position > 0 && !self.config.delay.is_zero() {
                tokio::time::sleep(self.config.delay).await;
            }
            if self.pause.is_paused() {
                paused = true;
                reporter.on_paused(pending.len() - position);
                break;
            }

            let Some(item) = self.items.get_mut(index) else {
                continue;
            };
            process_item(&self.service, self.config.model, item, index, reporter).await;

            if let (Some(store), Some(item)) = (store.as_deref_mut(), self.items.get(index)) {
                record_item(store, item, self.config.model);
            }
        }

        let summary = self.summary(start.elapsed(), paused);
        reporter.on_batch_complete(&summary);
        summary
    }

    fn summary(&self, elapsed: Duration, paused: bool) -> BatchSummary {
        let count = |wanted: fn(&ItemStatus) -> bool| {
            self.items.iter().filter(|item| wanted(&item.status)).count()
        };
        BatchSummary {
            total: self.items.len(),
            completed: count(|s| *s == ItemStatus::Completed),
            failed: count(|s| matches!(s, ItemStatus::Failed(_))),
            pending: count(|s| *s == ItemStatus::Pending),
            elapsed,
            paused,
        }
    }
}

async fn process_item<S: RemovalService>(
    service: &S,
    model: RemovalModel,
    item: &mut BatchItem,
    index: usize,
    reporter: &dyn BatchReporter,
) {
    item.status = ItemStatus::Processing;
    reporter.on_item_start(&item.name, index);
    let started = Instant::now();

    let outcome = match item.upload() {
        Ok(upload) => {
            item.input_size = Some(upload.len());
            service.remove_background(upload, model).await
        },
        Err(e) => Err(e),
    };
    let elapsed = started.elapsed();
    item.elapsed = Some(elapsed);

    match outcome {
        Ok(processed) => {
            item.status = ItemStatus::Completed;
            item.result = Some(processed);
            reporter.on_item_complete(&item.name, elapsed);
        },
        Err(error) => {
            item.status = ItemStatus::Failed(error.user_message());
            reporter.on_item_error(&item.name, &error);
            item.error = Some(error);
        },
    }
}

/// Add original + processed records for a completed item
fn record_item(store: &mut SessionStore, item: &BatchItem, model: RemovalModel) {
    if let Some(processed) = item.result() {
        let original_size = item.input_size().unwrap_or_default();
        record_removal(store, item.name(), original_size, processed, model);
    }
}

/// Record an original and its cut-out
///
/// Service-assigned ids are used when the response carried them.
pub(crate) fn record_removal(
    store: &mut SessionStore,
    name: &str,
    original_size: u64,
    processed: &ProcessedImage,
    model: RemovalModel,
) {
    let filename = std::path::Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name)
        .to_string();
    let original_id = processed
        .original_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let original = ImageRecord::new(
        original_id.clone(),
        filename.clone(),
        ImageKind::Original,
        original_size,
    );
    let extension = match processed.content_type.as_str() {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    };
    let processed_name = format!(
        "{}.{}",
        OutputFormatHandler::default_output_name(&filename),
        extension
    );
    let cutout = match &processed.processed_id {
        Some(id) => ImageRecord::new(id.clone(), processed_name, ImageKind::Processed, 0),
        None => ImageRecord::with_generated_id(processed_name, ImageKind::Processed, 0),
    };
    let cutout = ImageRecord {
        size: processed.bytes.len() as u64,
        ..cutout
    }
    .with_parent(original_id)
    .with_metadata(serde_json::json!({ "model": model.as_str() }));

    for record in [original, cutout] {
        if let Err(e) = store.add(record) {
            log::warn!("Failed to record {} in session store: {}", name, e);
        }
    }
}
