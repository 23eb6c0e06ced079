//! Error types for background removal, compositing and session operations

use thiserror::Error;

/// Result type alias for studio operations
pub type Result<T> = std::result::Result<T, StudioError>;

/// Comprehensive error types for studio operations
#[derive(Error, Debug)]
pub enum StudioError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Input file rejected locally before any network use
    #[error("Validation error: {0}")]
    Validation(String),

    /// Remote service could not be reached
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// Remote service rejected the request as malformed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Remote service reported an internal failure
    #[error("Server error ({status}): {message}")]
    ServerError {
        /// HTTP status code reported by the service
        status: u16,
        /// Detail message from the response body
        message: String,
    },

    /// Remote service could not process the image (corrupt or unsupported)
    #[error("Unprocessable image: {0}")]
    UnprocessableImage(String),

    /// Source raster could not be obtained or decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON (de)serialization failures
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Session store failures
    #[error("Session store error: {0}")]
    Store(String),

    /// Operation cancelled by its owner
    #[error("Operation cancelled")]
    Cancelled,
}

impl StudioError {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new network-unavailable error
    pub fn network_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::NetworkUnavailable(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new server error
    pub fn server<S: Into<String>>(status: u16, msg: S) -> Self {
        Self::ServerError {
            status,
            message: msg.into(),
        }
    }

    /// Create a new unprocessable image error
    pub fn unprocessable<S: Into<String>>(msg: S) -> Self {
        Self::UnprocessableImage(msg.into())
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new session store error
    pub fn store<S: Into<String>>(msg: S) -> Self {
        Self::Store(msg.into())
    }

    // Enhanced contextual error creators

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create a network-unavailable error from a transport failure
    pub fn network_error<S: Into<String>, E: std::fmt::Display>(context: S, error: E) -> Self {
        Self::NetworkUnavailable(format!("{}: {}", context.into(), error))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create decode error with source context
    pub fn decode_error_with_source(source: &str, details: &str) -> Self {
        Self::Decode(format!("Failed to decode image from {}: {}", source, details))
    }

    /// Whether this failure originated at the remote service or the transport
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::NetworkUnavailable(_)
                | Self::InvalidInput(_)
                | Self::ServerError { .. }
                | Self::UnprocessableImage(_)
        )
    }

    /// Message suitable for showing to an end user
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::NetworkUnavailable(_) => {
                "Cannot reach the background removal service. Check that it is running and try again."
                    .to_string()
            },
            Self::InvalidInput(msg) => format!("The service rejected the file: {}", msg),
            Self::ServerError { message, .. } => {
                format!("The service failed to process the image: {}", message)
            },
            Self::UnprocessableImage(_) => {
                "The image is corrupt or in an unsupported format.".to_string()
            },
            Self::Decode(msg) => format!("Could not load the image: {}", msg),
            Self::Cancelled => "The operation was cancelled.".to_string(),
            other => other.to_string(),
        }
    }
}
