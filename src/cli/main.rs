//! Background studio CLI tool
//!
//! Command-line front end for the remote removal service, the local
//! compositor and the session reference store.

use super::config::{CliConfigBuilder, ComposeSettings};
use crate::{
    batch::{record_removal, BatchConfig, BatchItem, BatchQueue, BatchReporter, BatchSummary},
    client::{
        ImageKind, ImageUpload, ProcessedImage, ProcessingClient, QualityLevel, RemovalModel,
        RemovalOptions, ServerOutputFormat,
    },
    compose::{CompositedOutput, EditorSession, FilterParam, SourceImage, PRESETS},
    config::StoreConfig,
    services::{ImageIOService, OutputFormatHandler, ProcessingStage, ProgressTracker, RunTimings},
    store::{format_size, ImageRecord, SessionStore},
    tracing_config::{events, init_cli_tracing, spans, TracingGuard},
    StudioError,
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Background removal studio
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "imgly-bgstudio")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Base URL of the removal service [env: IMGLY_BGSTUDIO_API_URL, default: http://localhost:8000]
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Directory holding the session store [env: IMGLY_BGSTUDIO_DATA_DIR]
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Remove the background of one image and save the composite
    Remove(RemoveArgs),
    /// Apply filters and a background to a local or remote image
    Edit(EditArgs),
    /// Remove backgrounds from many images, one after another
    Batch(BatchArgs),
    /// List the models offered by the service
    Models {
        /// Ask the service which model suits this image
        #[arg(long, value_name = "FILE")]
        analyze: Option<PathBuf>,
    },
    /// List the built-in filter presets
    Presets,
    /// Browse images stored by the service
    #[command(subcommand)]
    Gallery(GalleryCommand),
    /// Inspect and maintain the local session store
    #[command(subcommand)]
    History(HistoryCommand),
}

/// Filter, background and export flags shared by remove, edit and batch
#[derive(Args, Debug, Clone)]
pub struct ComposeArgs {
    /// Background: transparent, solid:<color>, custom:<color> or gradient:<color>:<color>
    #[arg(short, long)]
    pub background: Option<String>,

    /// Filter preset applied before individual filter flags (see `presets`)
    #[arg(long)]
    pub preset: Option<String>,

    /// Brightness in percent (50-200)
    #[arg(long, allow_negative_numbers = true)]
    pub brightness: Option<f32>,

    /// Contrast in percent (50-200)
    #[arg(long, allow_negative_numbers = true)]
    pub contrast: Option<f32>,

    /// Saturation in percent (0-200)
    #[arg(long, allow_negative_numbers = true)]
    pub saturation: Option<f32>,

    /// Hue rotation in degrees (-180 to 180)
    #[arg(long, allow_negative_numbers = true)]
    pub hue: Option<f32>,

    /// Blur radius in pixels (0-10)
    #[arg(long, allow_negative_numbers = true)]
    pub blur: Option<f32>,

    /// Sepia amount in percent (0-100)
    #[arg(long, allow_negative_numbers = true)]
    pub sepia: Option<f32>,

    /// Grayscale amount in percent (0-100)
    #[arg(long, allow_negative_numbers = true)]
    pub grayscale: Option<f32>,

    /// Output format [default: PNG when transparent, JPEG for opaque JPEG sources]
    #[arg(short, long, value_enum)]
    pub format: Option<CliOutputFormat>,

    /// JPEG quality (0-100)
    #[arg(long, default_value_t = 95)]
    pub jpeg_quality: u8,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Input image (PNG, JPEG or WebP)
    pub input: PathBuf,

    /// Output file or directory. Use "-" for stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Removal model
    #[arg(short, long, default_value = "auto")]
    pub model: RemovalModel,

    /// Format the service should return
    #[arg(long, value_enum, default_value_t = CliServerFormat::Auto)]
    pub server_format: CliServerFormat,

    /// Quality level requested from the service
    #[arg(long, value_enum, default_value_t = CliQuality::High)]
    pub quality: CliQuality,

    /// Upload the edited composite back to the service
    #[arg(long)]
    pub save_edited: bool,

    /// Do not record the result in the session store
    #[arg(long)]
    pub no_history: bool,

    #[command(flatten)]
    pub compose: ComposeArgs,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Local file or http(s) URL of the image to edit
    pub input: String,

    /// Output file or directory. Use "-" for stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Upload the result as an edited version of this service image id
    #[arg(long, value_name = "ID")]
    pub parent: Option<String>,

    #[command(flatten)]
    pub compose: ComposeArgs,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Input image files or directories
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory [default: next to each input]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Removal model
    #[arg(short, long, default_value = "auto")]
    pub model: RemovalModel,

    /// Pause between items in milliseconds
    #[arg(long, default_value_t = 500)]
    pub delay_ms: u64,

    /// Process directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// File name pattern for directories (e.g., "*.jpg")
    #[arg(long)]
    pub pattern: Option<String>,

    /// Do not record results in the session store
    #[arg(long)]
    pub no_history: bool,

    #[command(flatten)]
    pub compose: ComposeArgs,
}

#[derive(Subcommand, Debug)]
pub enum GalleryCommand {
    /// List stored images
    List {
        /// Only images of this kind (original, processed, edited)
        #[arg(long)]
        kind: Option<ImageKind>,
        /// Only children of this image id
        #[arg(long)]
        parent: Option<String>,
    },
    /// Download a stored image
    Get {
        id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Download the thumbnail of a stored image
    Thumbnail {
        id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete a stored image
    Delete {
        id: String,
        /// Also delete processed and edited images derived from it
        #[arg(long)]
        children: bool,
    },
    /// Show storage statistics of the service
    Stats,
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    /// Show the most recent records
    Recent {
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Drop records older than the given age
    Cleanup {
        /// Age in hours [default: 168]
        #[arg(long)]
        hours: Option<u64>,
    },
    /// Remove one record
    Remove { id: String },
    /// Remove all records
    Clear,
    /// Show store statistics
    Stats,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CliOutputFormat {
    Png,
    Jpeg,
    Webp,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CliServerFormat {
    Auto,
    Png,
    Jpeg,
    Webp,
}

impl From<CliServerFormat> for ServerOutputFormat {
    fn from(format: CliServerFormat) -> Self {
        match format {
            CliServerFormat::Auto => ServerOutputFormat::Auto,
            CliServerFormat::Png => ServerOutputFormat::Png,
            CliServerFormat::Jpeg => ServerOutputFormat::Jpeg,
            CliServerFormat::Webp => ServerOutputFormat::WebP,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CliQuality {
    High,
    Medium,
    Low,
}

impl From<CliQuality> for QualityLevel {
    fn from(quality: CliQuality) -> Self {
        match quality {
            CliQuality::High => QualityLevel::High,
            CliQuality::Medium => QualityLevel::Medium,
            CliQuality::Low => QualityLevel::Low,
        }
    }
}

/// Main entry point for CLI
pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _tracing_guard = init_tracing(cli.verbose).context("Failed to initialize tracing")?;

    let command_name = command_name(&cli.command);
    let api_url = cli
        .api_url
        .clone()
        .unwrap_or_else(|| crate::ClientConfig::from_env().base_url);
    let span = spans::session(command_name, &api_url);

    let result = run_command(&cli).instrument(span).await;
    if let Err(e) = &result {
        if let Some(studio) = e.downcast_ref::<StudioError>() {
            events::error_with_context(studio, command_name);
        }
    }
    result
}

async fn run_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Remove(args) => run_remove(cli, args).await,
        Command::Edit(args) => run_edit(cli, args).await,
        Command::Batch(args) => run_batch(cli, args).await,
        Command::Models { analyze } => run_models(cli, analyze.as_deref()).await,
        Command::Presets => {
            show_presets();
            Ok(())
        },
        Command::Gallery(command) => run_gallery(cli, command).await,
        Command::History(command) => run_history(cli, command),
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Remove(_) => "remove",
        Command::Edit(_) => "edit",
        Command::Batch(_) => "batch",
        Command::Models { .. } => "models",
        Command::Presets => "presets",
        Command::Gallery(_) => "gallery",
        Command::History(_) => "history",
    }
}

/// Initialize tracing subscriber with CLI-friendly configuration
fn init_tracing(verbose_count: u8) -> Result<TracingGuard> {
    let guard = init_cli_tracing(verbose_count).context("Failed to initialize tracing subscriber")?;
    if verbose_count > 0 {
        tracing::debug!(verbosity = verbose_count, "Tracing initialized");
    }
    Ok(guard)
}

fn client(cli: &Cli, model: Option<RemovalModel>) -> Result<ProcessingClient> {
    let config = CliConfigBuilder::client_config(cli, model)?;
    ProcessingClient::new(config).context("Failed to create processing client")
}

/// Open the session store; history is best effort for processing commands
fn open_store(cli: &Cli) -> Option<SessionStore> {
    let opened = CliConfigBuilder::store_config(cli)
        .and_then(|config| SessionStore::from_config(&config).map_err(anyhow::Error::from));
    match opened {
        Ok(store) => Some(store),
        Err(e) => {
            events::warning_with_recommendation(
                &format!("Session history unavailable: {:#}", e),
                "Pass --data-dir to choose a writable location",
            );
            None
        },
    }
}

async fn run_remove(cli: &Cli, args: &RemoveArgs) -> Result<()> {
    let settings = CliConfigBuilder::compose_settings(&args.compose)?;
    let client = client(cli, Some(args.model))?;
    let mut tracker = if cli.verbose > 0 {
        ProgressTracker::console(cli.verbose > 1)
    } else {
        ProgressTracker::no_op()
    };

    tracker.report_stage(ProcessingStage::Validation);
    let upload = ImageUpload::from_path(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let mime = client.validate(&upload).context("Input rejected")?;
    tracing::debug!(mime = %mime, size = upload.len(), "Input accepted");
    let original_name = upload.filename().to_string();
    let original_size = upload.len();

    let options = RemovalOptions {
        model: args.model,
        output_format: args.server_format.into(),
        quality: args.quality.into(),
    };

    let transfer_start = Instant::now();
    let pb = transfer_progress_bar(&original_name);
    let mut submission = client.submit_with_progress(upload, options);
    let transfer = async {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                update = submission.next() => match update {
                    Some(percent) => {
                        pb.set_position(u64::from(percent));
                        let stage = if percent < 50 {
                            ProcessingStage::Uploading
                        } else {
                            ProcessingStage::Downloading
                        };
                        tracker.report_transfer(stage, percent);
                    },
                    None => break,
                },
                _ = &mut ctrl_c, if !submission.is_cancelled() => {
                    warn!("Cancelling request...");
                    submission.cancel();
                },
            }
        }
        submission.result().await
    };
    let outcome = transfer
        .instrument(spans::removal(&original_name, args.model.as_str()))
        .await;
    pb.finish_and_clear();
    if let Err(e) = &outcome {
        tracker.report_error(&e.user_message());
    }
    let processed = outcome.context("Background removal failed")?;
    let transfer_ms = transfer_start.elapsed().as_millis() as u64;
    info!(
        "Received {} ({}) from the service",
        format_size(processed.bytes.len() as u64),
        processed.content_type
    );

    let mut store = if args.no_history { None } else { open_store(cli) };
    if let Some(store) = store.as_mut() {
        record_removal(store, &original_name, original_size, &processed, args.model);
    }

    tracker.report_stage(ProcessingStage::Decoding);
    let source = SourceImage::decode(&processed.bytes).context("Failed to decode the cut-out")?;
    let mut session = EditorSession::new(source);

    let compose_start = Instant::now();
    tracker.report_stage(ProcessingStage::Compositing);
    let output = render_with_settings(&mut session, &settings, &original_name)?;
    let compose_ms = compose_start.elapsed().as_millis() as u64;

    let save_start = Instant::now();
    tracker.report_stage(ProcessingStage::FileSaving);
    let destination = write_output(&output, &original_name, args.output.as_deref())?;
    let save_ms = save_start.elapsed().as_millis() as u64;

    if args.save_edited {
        match edit_parent_id(&processed) {
            Some(parent) => {
                upload_edit(&client, store.as_mut(), parent, &session, &output, &original_name)
                    .await?;
            },
            None => warn!("The service did not report an image id; skipping --save-edited"),
        }
    }

    tracker.report_stage(ProcessingStage::Completed);
    let timings = RunTimings {
        transfer_ms,
        compose_ms,
        save_ms,
        total_ms: tracker.elapsed_ms(),
    };
    tracker.report_completion(timings);
    events::performance_metric("remove", timings.total_ms);

    if let Some(path) = destination {
        println!("✅ Saved {}", path.display());
    }
    Ok(())
}

async fn run_edit(cli: &Cli, args: &EditArgs) -> Result<()> {
    let settings = CliConfigBuilder::compose_settings(&args.compose)?;
    let is_remote = args.input.starts_with("http://") || args.input.starts_with("https://");

    let client = if is_remote || args.parent.is_some() {
        Some(client(cli, None)?)
    } else {
        None
    };

    let source = match (&client, is_remote) {
        (Some(client), true) => client
            .fetch_source(&args.input)
            .await
            .with_context(|| format!("Failed to load {}", args.input))?,
        _ => SourceImage::open(&args.input)
            .with_context(|| format!("Failed to open {}", args.input))?,
    };
    let original_name = args
        .input
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("image")
        .to_string();

    let mut session = EditorSession::new(source);
    let output = render_with_settings(&mut session, &settings, &original_name)?;
    let destination = write_output(&output, &original_name, args.output.as_deref())?;

    if let (Some(client), Some(parent)) = (&client, &args.parent) {
        let mut store = open_store(cli);
        upload_edit(client, store.as_mut(), parent, &session, &output, &original_name).await?;
    }

    if let Some(path) = destination {
        println!("✅ Saved {}", path.display());
    }
    Ok(())
}

/// Apply the compose settings to a session and encode the result
fn render_with_settings(
    session: &mut EditorSession,
    settings: &ComposeSettings,
    original_name: &str,
) -> Result<CompositedOutput> {
    if let Some(preset) = &settings.preset {
        session.apply_preset(preset)?;
    }
    for (param, value) in &settings.overrides {
        let applied = session.set_filter(*param, *value);
        if (applied - value).abs() > f32::EPSILON {
            warn!("{} clamped to {}{}", param, applied, param.unit());
        }
    }
    session.set_background(settings.background);

    let preview = session.preview();
    let format = settings
        .format
        .unwrap_or_else(|| OutputFormatHandler::optimal_for(&preview, Some(original_name)));
    let has_transparency = preview.pixels().any(|p| p.0[3] < 255);
    OutputFormatHandler::validate_for_composite(format, has_transparency);
    session.set_export_options(settings.export_options(format));

    let _span = spans::compose(session.source().dimensions(), &format.to_string()).entered();
    session.render().context("Failed to render the composite")
}

/// Write a composite to stdout, a file or a directory; returns the path written
fn write_output(
    output: &CompositedOutput,
    original_name: &str,
    target: Option<&Path>,
) -> Result<Option<PathBuf>> {
    if target.is_some_and(|t| t == Path::new("-")) {
        write_stdout(output.bytes())?;
        return Ok(None);
    }

    let file_name = OutputFormatHandler::output_file_name(original_name, None, output.format());
    let path = ImageIOService::resolve_output_path(target, &file_name);
    output
        .save(&path)
        .with_context(|| format!("Failed to save {}", path.display()))?;
    Ok(Some(path))
}

/// Write binary data to stdout
fn write_stdout(data: &[u8]) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(data).context("Failed to write to stdout")?;
    stdout.flush().context("Failed to flush stdout")?;
    Ok(())
}

/// Service id an edit of this cut-out is saved under
///
/// Locally generated store ids are unknown to the service.
fn edit_parent_id(processed: &ProcessedImage) -> Option<&str> {
    processed.processed_id.as_deref()
}

async fn upload_edit(
    client: &ProcessingClient,
    store: Option<&mut SessionStore>,
    parent: &str,
    session: &EditorSession,
    output: &CompositedOutput,
    original_name: &str,
) -> Result<()> {
    let file_name = OutputFormatHandler::output_file_name(
        original_name,
        Some(&format!("{}_edited", OutputFormatHandler::default_output_name(original_name))),
        output.format(),
    );
    let metadata = session.edit_metadata();
    let edited_id = client
        .save_edited(parent, output.bytes().to_vec(), &file_name, &metadata)
        .await
        .context("Failed to upload the edited image")?;

    if let Some(store) = store {
        let record = match &edited_id {
            Some(id) => ImageRecord::new(id.clone(), file_name, ImageKind::Edited, output.len() as u64),
            None => ImageRecord::with_generated_id(file_name, ImageKind::Edited, output.len() as u64),
        }
        .with_parent(parent)
        .with_metadata(metadata);
        store.add(record).context("Failed to record the edited image")?;
    }

    match edited_id {
        Some(id) => println!("☁️  Uploaded edited image {}", id),
        None => println!("☁️  Uploaded edited image"),
    }
    Ok(())
}

fn transfer_progress_bar(name: &str) -> ProgressBar {
    let pb = ProgressBar::new(100);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(name.to_string());
    pb
}

/// Batch reporter that drives an indicatif progress bar
struct CliBatchReporter {
    bar: ProgressBar,
}

impl CliBatchReporter {
    fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar }
    }
}

impl BatchReporter for CliBatchReporter {
    fn on_start(&self, total: usize) {
        self.bar.set_message(format!("{} queued", total));
    }

    fn on_item_start(&self, name: &str, _index: usize) {
        self.bar.set_message(name.to_string());
    }

    fn on_item_complete(&self, name: &str, elapsed: Duration) {
        self.bar.inc(1);
        tracing::debug!(file = %name, elapsed_ms = elapsed.as_millis() as u64, "Item completed");
    }

    fn on_item_error(&self, name: &str, error: &StudioError) {
        self.bar.inc(1);
        self.bar.println(format!("❌ {}: {}", name, error.user_message()));
    }

    fn on_paused(&self, remaining: usize) {
        self.bar.println(format!("⏸️  Paused with {} item(s) remaining", remaining));
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        self.bar.finish_and_clear();
        info!(
            "Batch finished: {} completed, {} failed, {} pending in {:.2}s",
            summary.completed,
            summary.failed,
            summary.pending,
            summary.elapsed.as_secs_f64()
        );
    }
}

async fn run_batch(cli: &Cli, args: &BatchArgs) -> Result<()> {
    let settings = CliConfigBuilder::compose_settings(&args.compose)?;
    let files = collect_inputs(&args.inputs, args.recursive, args.pattern.as_deref())?;
    if files.is_empty() {
        warn!("No supported image files found in the provided inputs");
        return Ok(());
    }
    events::progress(&format!("Found {} image file(s) to process", files.len()), "📁");

    if let Some(dir) = &args.output {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    let config = BatchConfig {
        model: args.model,
        delay: Duration::from_millis(args.delay_ms),
    };
    let mut queue = BatchQueue::new(client(cli, Some(args.model))?, config);
    for file in &files {
        queue.push(BatchItem::from_path(file));
    }

    let pause = queue.pause_handle();
    let ctrl_c_watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Pausing after the current item...");
            pause.pause();
        }
    });

    let mut store = if args.no_history { None } else { open_store(cli) };
    let reporter = CliBatchReporter::new(files.len());
    let summary = queue
        .run(&reporter, store.as_mut())
        .instrument(spans::batch_processing(files.len()))
        .await;
    ctrl_c_watcher.abort();

    let mut saved = 0usize;
    for (file, item) in files.iter().zip(queue.items_mut()) {
        let Some(processed) = item.take_result() else {
            continue;
        };
        let original_name = ImageIOService::file_name(file);
        let target = args
            .output
            .clone()
            .or_else(|| file.parent().map(Path::to_path_buf));

        let written = SourceImage::decode(&processed.bytes)
            .map_err(anyhow::Error::from)
            .and_then(|source| {
                let mut session = EditorSession::new(source);
                render_with_settings(&mut session, &settings, &original_name)
            })
            .and_then(|output| write_output(&output, &original_name, target.as_deref()));

        match written {
            Ok(_) => saved += 1,
            Err(e) => warn!("Failed to save result for {}: {:#}", file.display(), e),
        }
    }

    println!(
        "✅ {} of {} image(s) processed, {} saved, {} failed{}",
        summary.completed,
        summary.total,
        saved,
        summary.failed,
        if summary.paused {
            format!(", {} left pending", summary.pending)
        } else {
            String::new()
        }
    );

    if summary.completed == 0 && summary.failed > 0 {
        anyhow::bail!("All {} image(s) failed", summary.failed);
    }
    Ok(())
}

/// Expand files and directories into a sorted list of image files
fn collect_inputs(inputs: &[PathBuf], recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in inputs {
        if path.is_file() {
            if is_image_file(path) {
                files.push(path.clone());
            } else {
                warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            files.extend(find_image_files(path, recursive, pattern)?);
        } else {
            anyhow::bail!(
                "Input path does not exist or is not accessible: {}",
                path.display()
            );
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

/// Find all image files in a directory
fn find_image_files(dir: &Path, recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();

    for entry in walkdir::WalkDir::new(dir).max_depth(max_depth) {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_file() && is_image_file(path) && matches_pattern(path, pattern) {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

/// Check if file has an extension the service accepts
fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png" | "webp")
        })
}

/// Check if file matches the given pattern
fn matches_pattern(path: &Path, pattern: Option<&str>) -> bool {
    match pattern {
        Some(pat) => path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| glob::Pattern::new(pat).is_ok_and(|p| p.matches(name))),
        None => true,
    }
}

async fn run_models(cli: &Cli, analyze: Option<&Path>) -> Result<()> {
    let client = client(cli, None)?;

    if let Some(path) = analyze {
        let upload = ImageUpload::from_path(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let analysis = client
            .analyze_image(upload)
            .await
            .context("Image analysis failed")?;
        println!("🔍 {}", path.display());
        println!("  Image type:        {}", analysis.image_type);
        println!("  Recommended model: {}", analysis.recommended_model);
        println!("  Confidence:        {:.0}%", analysis.confidence * 100.0);
        if analysis.model().is_none() {
            warn!("The service recommended an unknown model; use --model auto");
        }
        return Ok(());
    }

    let models = client.list_models().await.context("Failed to list models")?;
    println!("📦 Available models:");
    for model in &models {
        let marker = if model.recommended { " (recommended)" } else { "" };
        println!("  • {}{} - {}", model.id, marker, model.name);
        if !model.description.is_empty() {
            println!("      {}", model.description);
        }
    }
    Ok(())
}

fn show_presets() {
    println!("🎨 Filter presets:");
    for preset in PRESETS {
        let changed: Vec<String> = FilterParam::ALL
            .iter()
            .filter(|param| {
                (preset.filters.get(**param) - param.identity()).abs() > f32::EPSILON
            })
            .map(|param| format!("{} {}{}", param, preset.filters.get(*param), param.unit()))
            .collect();
        let summary = if changed.is_empty() {
            "no adjustments".to_string()
        } else {
            changed.join(", ")
        };
        println!("  • {:<14} {:<14} {}", preset.name, preset.slug(), summary);
    }
}

async fn run_gallery(cli: &Cli, command: &GalleryCommand) -> Result<()> {
    let client = client(cli, None)?;
    match command {
        GalleryCommand::List { kind, parent } => {
            let images = client
                .list_images(*kind, parent.as_deref())
                .await
                .context("Failed to list images")?;
            if images.is_empty() {
                println!("No images stored");
            }
            for image in &images {
                println!(
                    "{}  {:<9} {:>10}  {}  {}",
                    image.id,
                    image.kind,
                    format_size(image.file_size),
                    image.created_at,
                    image.filename
                );
            }
        },
        GalleryCommand::Get { id, output } => {
            let bytes = client.get_image(id).await.context("Failed to download image")?;
            let path = ImageIOService::resolve_output_path(output.as_deref(), &format!("{}.png", id));
            ImageIOService::write_file(&bytes, &path)?;
            println!("✅ Saved {}", path.display());
        },
        GalleryCommand::Thumbnail { id, output } => {
            let bytes = client.thumbnail(id).await.context("Failed to download thumbnail")?;
            let path = ImageIOService::resolve_output_path(
                output.as_deref(),
                &format!("{}_thumb.jpg", id),
            );
            ImageIOService::write_file(&bytes, &path)?;
            println!("✅ Saved {}", path.display());
        },
        GalleryCommand::Delete { id, children } => {
            client
                .delete_image(id, *children)
                .await
                .with_context(|| format!("Failed to delete image {}", id))?;
            if let Some(mut store) = open_store(cli) {
                store.remove(id)?;
            }
            println!("🗑️  Deleted {}", id);
        },
        GalleryCommand::Stats => {
            let stats = client.storage_stats().await.context("Failed to fetch storage stats")?;
            println!("📊 Service storage");
            println!("  Images: {}", stats.total_images);
            println!("  Size:   {}", format_size(stats.total_size_bytes));
            let mut kinds: Vec<_> = stats.type_counts.iter().collect();
            kinds.sort();
            for (kind, count) in kinds {
                println!("    {:<9} {}", kind, count);
            }
            if let Some(path) = &stats.storage_path {
                println!("  Path:   {}", path);
            }
        },
    }
    Ok(())
}

fn run_history(cli: &Cli, command: &HistoryCommand) -> Result<()> {
    let config: StoreConfig = CliConfigBuilder::store_config(cli)?;
    let _span = spans::store_operation(history_operation(command), &config.path).entered();
    let mut store = SessionStore::from_config(&config)
        .with_context(|| format!("Failed to open session store at {}", config.path.display()))?;

    match command {
        HistoryCommand::Recent { count } => {
            let records = store.list_recent(*count);
            if records.is_empty() {
                println!("No records in {}", store.path().display());
            }
            for record in records {
                println!(
                    "{}  {:<9} {:>10}  {}  {}",
                    record.id,
                    record.kind,
                    format_size(record.size),
                    record.updated_at.format("%Y-%m-%d %H:%M:%S"),
                    record.filename
                );
            }
        },
        HistoryCommand::Cleanup { hours } => {
            let horizon = hours.map_or(config.cleanup_horizon, |h| Duration::from_secs(h * 3600));
            let removed = store.cleanup_older_than(horizon)?;
            println!("🧹 Removed {} record(s)", removed);
        },
        HistoryCommand::Remove { id } => match store.remove(id)? {
            Some(record) => println!("🗑️  Removed {} ({})", record.id, record.filename),
            None => anyhow::bail!("No record with id {}", id),
        },
        HistoryCommand::Clear => {
            let removed = store.clear()?;
            println!("🧹 Cleared {} record(s)", removed);
        },
        HistoryCommand::Stats => {
            let stats = store.stats();
            println!("📊 Session store: {}", store.path().display());
            println!("  Records: {} of {}", stats.total_records, store.capacity());
            println!("  Size:    {}", format_size(stats.total_size_bytes));
            for kind in [ImageKind::Original, ImageKind::Processed, ImageKind::Edited] {
                let count = stats.records_by_kind.get(&kind).copied().unwrap_or(0);
                println!("    {:<9} {}", kind, count);
            }
            if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
                println!("  Oldest:  {}", oldest.format("%Y-%m-%d %H:%M:%S"));
                println!("  Newest:  {}", newest.format("%Y-%m-%d %H:%M:%S"));
            }
        },
    }
    Ok(())
}

fn history_operation(command: &HistoryCommand) -> &'static str {
    match command {
        HistoryCommand::Recent { .. } => "recent",
        HistoryCommand::Cleanup { .. } => "cleanup",
        HistoryCommand::Remove { .. } => "remove",
        HistoryCommand::Clear => "clear",
        HistoryCommand::Stats => "stats",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_edit_parent_requires_service_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::load_or_create(dir.path().join("session.json"), 10).unwrap();
        let mut processed = ProcessedImage {
            bytes: vec![1, 2, 3],
            content_type: "image/png".to_string(),
            original_id: None,
            processed_id: None,
            received_at: chrono::Utc::now(),
        };

        // The store still records the cut-out under a generated id
        record_removal(&mut store, "cat.png", 3, &processed, RemovalModel::Auto);
        assert_eq!(store.list_by_kind(ImageKind::Processed).count(), 1);
        assert_eq!(edit_parent_id(&processed), None);

        processed.processed_id = Some("srv-42".to_string());
        assert_eq!(edit_parent_id(&processed), Some("srv-42"));
    }

    #[test]
    fn test_remove_defaults() {
        let cli = Cli::parse_from(["imgly-bgstudio", "remove", "cat.jpg"]);
        let Command::Remove(args) = cli.command else {
            panic!("remove expected");
        };
        assert_eq!(args.model, RemovalModel::Auto);
        assert_eq!(args.server_format, CliServerFormat::Auto);
        assert_eq!(args.quality, CliQuality::High);
        assert_eq!(args.compose.jpeg_quality, 95);
        assert!(!args.save_edited);
    }

    #[test]
    fn test_negative_hue_and_global_flags() {
        let cli = Cli::parse_from([
            "imgly-bgstudio",
            "edit",
            "cat.png",
            "--hue",
            "-45",
            "-vv",
            "--data-dir",
            "/tmp/x",
        ]);
        assert_eq!(cli.verbose, 2);
        let Command::Edit(args) = cli.command else {
            panic!("edit expected");
        };
        assert_eq!(args.compose.hue, Some(-45.0));
    }

    #[test]
    fn test_gallery_kind_parses() {
        let cli = Cli::parse_from(["imgly-bgstudio", "gallery", "list", "--kind", "processed"]);
        let Command::Gallery(GalleryCommand::List { kind, parent }) = cli.command else {
            panic!("gallery list expected");
        };
        assert_eq!(kind, Some(ImageKind::Processed));
        assert!(parent.is_none());
    }

    #[test]
    fn test_find_image_files_respects_pattern_and_depth() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        for name in ["a.jpg", "b.png", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::write(nested.join("c.jpg"), b"x").unwrap();

        let flat = find_image_files(dir.path(), false, None).unwrap();
        assert_eq!(flat.len(), 2);

        let recursive_jpgs = find_image_files(dir.path(), true, Some("*.jpg")).unwrap();
        assert_eq!(recursive_jpgs.len(), 2);
        assert!(recursive_jpgs.iter().all(|p| p.extension().unwrap() == "jpg"));
    }

    #[test]
    fn test_collect_inputs_sorted_alphanumerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["z_last.jpg", "a_first.png", "m_middle.webp", "img2.jpg", "img10.jpg"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let explicit = dir.path().join("a_first.png");

        let files = collect_inputs(&[dir.path().to_path_buf(), explicit], false, None).unwrap();
        let names: Vec<String> = files.iter().map(|p| ImageIOService::file_name(p)).collect();
        assert_eq!(
            names,
            ["a_first.png", "img10.jpg", "img2.jpg", "m_middle.webp", "z_last.jpg"]
        );
    }

    #[test]
    fn test_collect_inputs_rejects_missing_path() {
        let result = collect_inputs(&[PathBuf::from("/definitely/not/here")], false, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_write_output_uses_default_name() {
        let dir = tempfile::tempdir().unwrap();
        let source = SourceImage::from_rgba(image::RgbaImage::new(2, 2)).unwrap();
        let session = EditorSession::new(source);
        let output = session.render().unwrap();

        let path = write_output(&output, "portrait.jpeg", Some(dir.path()))
            .unwrap()
            .unwrap();
        assert_eq!(path, dir.path().join("portrait_no_bg.png"));
        assert!(path.exists());
    }
}
