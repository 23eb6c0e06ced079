//! Frontend-agnostic services: file I/O, output encoding, progress reporting

pub mod format;
pub mod io;
pub mod progress;

pub use format::{OutputFormatHandler, DEFAULT_NAME_SUFFIX};
pub use io::ImageIOService;
pub use progress::{
    ConsoleProgressReporter, NoOpProgressReporter, ProcessingStage, ProgressReporter,
    ProgressTracker, ProgressUpdate, RunTimings,
};
