//! Progress reporting service
//!
//! This module separates progress reporting concerns from business logic,
//! allowing different frontends to implement their own progress handling.

use instant::Instant;

/// Stages of a remove-and-compose run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Checking type and size of the input locally
    Validation,
    /// Sending the image to the removal service
    Uploading,
    /// Receiving the processed cut-out
    Downloading,
    /// Decoding the cut-out into a raster
    Decoding,
    /// Painting the background and drawing the filtered source
    Compositing,
    /// Encoding the composite to the export format
    Encoding,
    /// Writing the result to disk
    FileSaving,
    /// Run finished
    Completed,
}

impl ProcessingStage {
    /// Get a human-readable description of the processing stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ProcessingStage::Validation => "Validating input image",
            ProcessingStage::Uploading => "Uploading to removal service",
            ProcessingStage::Downloading => "Downloading processed image",
            ProcessingStage::Decoding => "Decoding processed image",
            ProcessingStage::Compositing => "Compositing background and filters",
            ProcessingStage::Encoding => "Encoding output",
            ProcessingStage::FileSaving => "Saving result",
            ProcessingStage::Completed => "Processing completed",
        }
    }

    /// Get the typical progress percentage for this stage
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            ProcessingStage::Validation => 0,
            ProcessingStage::Uploading => 5,
            ProcessingStage::Downloading => 50,
            ProcessingStage::Decoding => 80,
            ProcessingStage::Compositing => 85,
            ProcessingStage::Encoding => 95,
            ProcessingStage::FileSaving => 98,
            ProcessingStage::Completed => 100,
        }
    }
}

/// Wall-clock breakdown of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTimings {
    /// Upload plus remote processing plus download
    pub transfer_ms: u64,
    /// Background fill, filters and source-over
    pub compose_ms: u64,
    /// Encoding and writing the output
    pub save_ms: u64,
    /// End to end
    pub total_ms: u64,
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Current processing stage
    pub stage: ProcessingStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable stage description
    pub description: String,
    /// Elapsed time since processing started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    /// Create a new progress update
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self {
            progress: stage.progress_percentage(),
            description: stage.description().to_string(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
        }
    }

    /// Create a progress update with an explicit percentage (transfer byte counters)
    #[must_use]
    pub fn with_progress(stage: ProcessingStage, progress: u8, start_time: Instant) -> Self {
        Self {
            progress: progress.min(100),
            ..Self::new(stage, start_time)
        }
    }
}

/// Trait for reporting progress during a run
pub trait ProgressReporter: Send + Sync {
    /// Report a progress update
    fn report_progress(&self, update: ProgressUpdate);

    /// Report completion with final timings
    fn report_completion(&self, timings: RunTimings);

    /// Report an error during processing
    fn report_error(&self, stage: ProcessingStage, error: &str);
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: RunTimings) {}

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
}

/// Console progress reporter that logs progress through `log`
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    /// Create a new console progress reporter
    ///
    /// # Arguments
    /// * `verbose` - Whether to show detailed progress information
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            log::info!(
                "[{}%] {} ({}ms elapsed)",
                update.progress,
                update.description,
                update.elapsed_ms
            );
        } else {
            log::info!("[{}%] {}", update.progress, update.description);
        }
    }

    fn report_completion(&self, timings: RunTimings) {
        log::info!("✅ Completed in {}ms", timings.total_ms);

        if self.verbose {
            log::info!("  📊 Detailed timings:");
            log::info!("    • Transfer: {}ms", timings.transfer_ms);
            log::info!("    • Compositing: {}ms", timings.compose_ms);
            log::info!("    • Encode and save: {}ms", timings.save_ms);
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        log::error!("❌ Error during {}: {}", stage.description(), error);
    }
}

/// Progress tracker that manages timing and progress reporting
pub struct ProgressTracker {
    reporter: Box<dyn ProgressReporter>,
    start_time: Instant,
    current_stage: Option<ProcessingStage>,
    last_progress: u8,
}

impl ProgressTracker {
    /// Create a new progress tracker with the specified reporter
    #[must_use]
    pub fn new(reporter: Box<dyn ProgressReporter>) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            current_stage: None,
            last_progress: 0,
        }
    }

    /// Create a progress tracker with no-op reporter (for testing/disabled progress)
    #[must_use]
    pub fn no_op() -> Self {
        Self::new(Box::new(NoOpProgressReporter))
    }

    /// Create a progress tracker with console reporter
    #[must_use]
    pub fn console(verbose: bool) -> Self {
        Self::new(Box::new(ConsoleProgressReporter::new(verbose)))
    }

    /// Report progress for a specific stage
    pub fn report_stage(&mut self, stage: ProcessingStage) {
        self.emit(ProgressUpdate::new(stage, self.start_time));
    }

    /// Report a byte-counter driven percentage within a transfer stage
    ///
    /// Percentages never move backwards; a lower value is reported as the last one.
    pub fn report_transfer(&mut self, stage: ProcessingStage, progress: u8) {
        self.emit(ProgressUpdate::with_progress(stage, progress, self.start_time));
    }

    fn emit(&mut self, mut update: ProgressUpdate) {
        update.progress = update.progress.max(self.last_progress);
        self.last_progress = update.progress;
        self.current_stage = Some(update.stage);
        self.reporter.report_progress(update);
    }

    /// Report completion with final timings
    pub fn report_completion(&self, timings: RunTimings) {
        self.reporter.report_completion(timings);
    }

    /// Report an error during processing
    pub fn report_error(&self, error: &str) {
        let stage = self.current_stage.unwrap_or(ProcessingStage::Validation);
        self.reporter.report_error(stage, error);
    }

    /// Get the elapsed time since tracking started
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Get the current processing stage
    #[must_use]
    pub fn current_stage(&self) -> Option<ProcessingStage> {
        self.current_stage
    }
}
