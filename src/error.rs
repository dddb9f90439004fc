//! # Studio Error Handling
//!
//! Error taxonomy for the try-on studio core: remote generation failures,
//! malformed service responses, long-running video operations, camera
//! acquisition and configuration problems.
//!
//! ## Error Classification
//!
//! Errors are classified using traits:
//!
//! - `Retryable`: rate-limit failures that the retrying invoker may re-attempt
//! - `HasSeverity`: severity level carried in the error context
//! - `HasRecoverySuggestion`: a short hint for the operator
//!
//! The rate-limit check deliberately looks at both the structured status
//! (HTTP 429, `RESOURCE_EXHAUSTED`) and the message text, because the remote
//! service does not report throttling in one consistent shape.
//!
//! ## Usage
//!
//! ```rust
//! use tryon_studio::error::{Retryable, StudioError};
//!
//! let error = StudioError::api(Some(429), None, "Quota exceeded")
//!     .with_operation("generate_content");
//!
//! assert!(error.is_retryable());
//! ```

use std::{collections::HashMap, error::Error as StdError, fmt, time::SystemTime};

/// Message marker the service embeds in throttling errors.
pub const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

/// Message the video service returns when the selected credentials no
/// longer resolve to a project.
pub const ENTITY_NOT_FOUND_MESSAGE: &str = "Requested entity was not found.";

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational errors
    Info,
    /// Warnings that may indicate potential issues
    Warning,
    /// Errors that affect operation but can be recovered from
    Error,
    /// Critical errors that require user intervention
    Critical,
    /// Fatal errors that cannot be recovered from
    Fatal,
}

/// Metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// The operation being performed when the error occurred
    pub operation: Option<String>,
    /// Additional context about the error
    pub context: Option<String>,
    /// Suggested recovery action
    pub recovery_suggestion: Option<String>,
    /// Error severity level
    pub severity: ErrorSeverity,
    /// Additional metadata as key-value pairs
    pub metadata: HashMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: None,
            context: None,
            recovery_suggestion: None,
            severity: ErrorSeverity::Error,
            metadata: HashMap::new(),
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the operation that was being performed
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Set severity level
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }
}

/// Base error type for the studio core
#[derive(Debug)]
pub enum StudioError {
    /// Configuration validation errors
    Config {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// The remote service answered with an error status
    Api {
        /// HTTP status code, when the failure came from an HTTP response
        status: Option<u16>,
        /// Structured status string from the error envelope, e.g. `RESOURCE_EXHAUSTED`
        api_status: Option<String>,
        message: String,
        context: ErrorContext,
    },
    /// Transport-level failures talking to the remote service
    Network {
        operation: String,
        source: Option<Box<dyn StdError + Send + Sync>>,
        context: ErrorContext,
    },
    /// The generation response carried no content parts at all
    NoResponse { context: ErrorContext },
    /// The generation response had parts but none carried an image
    NoImage {
        /// Advice text that came back without an image, if any
        advice: Option<String>,
        context: ErrorContext,
    },
    /// A long-running video operation finished unsuccessfully
    VideoOperation {
        operation_name: Option<String>,
        reason: String,
        context: ErrorContext,
    },
    /// Credentials must be re-selected before another attempt
    EntityNotFound {
        message: String,
        context: ErrorContext,
    },
    /// Camera could not be acquired
    Camera {
        reason: String,
        context: ErrorContext,
    },
    /// Image payload could not be decoded or encoded
    Image {
        reason: String,
        context: ErrorContext,
    },
    /// I/O errors
    Io {
        operation: String,
        path: Option<String>,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// External library errors
    External {
        library: String,
        source: Box<dyn StdError + Send + Sync>,
        context: ErrorContext,
    },
    /// Timeout errors
    Timeout {
        operation: String,
        duration_ms: u64,
        context: ErrorContext,
    },
    /// Validation errors
    Validation {
        field: String,
        constraint: String,
        value: String,
        context: ErrorContext,
    },
}

impl StudioError {
    /// Create a configuration error
    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create a remote API error
    pub fn api(status: Option<u16>, api_status: Option<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            api_status,
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a network error
    pub fn network(operation: impl Into<String>) -> Self {
        Self::Network {
            operation: operation.into(),
            source: None,
            context: ErrorContext::new(),
        }
    }

    /// Create a network error wrapping a transport failure
    pub fn network_from(
        operation: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Network {
            operation: operation.into(),
            source: Some(Box::new(source)),
            context: ErrorContext::new(),
        }
    }

    /// The response carried no content parts
    pub fn no_response() -> Self {
        Self::NoResponse {
            context: ErrorContext::new(),
        }
    }

    /// The response carried parts but no inline image
    pub fn no_image(advice: Option<String>) -> Self {
        Self::NoImage {
            advice,
            context: ErrorContext::new(),
        }
    }

    /// Create a video operation error
    pub fn video_operation(operation_name: Option<String>, reason: impl Into<String>) -> Self {
        Self::VideoOperation {
            operation_name,
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an entity-not-found error
    pub fn entity_not_found(message: impl Into<String>) -> Self {
        Self::EntityNotFound {
            message: message.into(),
            context: ErrorContext::new()
                .with_severity(ErrorSeverity::Critical),
        }
        .with_recovery_suggestion("Re-select the API key, then start a new attempt")
    }

    /// Create a camera acquisition error
    pub fn camera(reason: impl Into<String>) -> Self {
        Self::Camera {
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an image payload error
    pub fn image(reason: impl Into<String>) -> Self {
        Self::Image {
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: None,
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create an I/O error for a specific path
    pub fn io_at(
        operation: impl Into<String>,
        path: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            operation: operation.into(),
            path: Some(path.into()),
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create an external library error
    pub fn external(
        library: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            library: library.into(),
            source: Box::new(source),
            context: ErrorContext::new(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms,
            context: ErrorContext::new(),
        }
    }

    /// Create a validation error
    pub fn validation(
        field: impl Into<String>,
        constraint: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field: field.into(),
            constraint: constraint.into(),
            value: value.into(),
            context: ErrorContext::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Add operation context
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    /// Add recovery suggestion
    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().recovery_suggestion = Some(suggestion.into());
        self
    }

    /// Set severity
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.context_mut().severity = severity;
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context_mut().metadata.insert(key.into(), value.into());
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Config { context, .. }
            | Self::Api { context, .. }
            | Self::Network { context, .. }
            | Self::NoResponse { context }
            | Self::NoImage { context, .. }
            | Self::VideoOperation { context, .. }
            | Self::EntityNotFound { context, .. }
            | Self::Camera { context, .. }
            | Self::Image { context, .. }
            | Self::Io { context, .. }
            | Self::External { context, .. }
            | Self::Timeout { context, .. }
            | Self::Validation { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::Config { context, .. }
            | Self::Api { context, .. }
            | Self::Network { context, .. }
            | Self::NoResponse { context }
            | Self::NoImage { context, .. }
            | Self::VideoOperation { context, .. }
            | Self::EntityNotFound { context, .. }
            | Self::Camera { context, .. }
            | Self::Image { context, .. }
            | Self::Io { context, .. }
            | Self::External { context, .. }
            | Self::Timeout { context, .. }
            | Self::Validation { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Api { .. } => "api",
            Self::Network { .. } => "network",
            Self::NoResponse { .. } => "no_response",
            Self::NoImage { .. } => "no_image",
            Self::VideoOperation { .. } => "video_operation",
            Self::EntityNotFound { .. } => "entity_not_found",
            Self::Camera { .. } => "camera",
            Self::Image { .. } => "image",
            Self::Io { .. } => "io",
            Self::External { .. } => "external",
            Self::Timeout { .. } => "timeout",
            Self::Validation { .. } => "validation",
        }
    }

    /// True when the failure signals a request quota was exceeded.
    ///
    /// Either signal is accepted: a structured status (HTTP 429 or a
    /// `RESOURCE_EXHAUSTED` status string) or the same markers inside the
    /// message text.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::Api {
                status,
                api_status,
                message,
                ..
            } => {
                *status == Some(429)
                    || api_status.as_deref() == Some(RESOURCE_EXHAUSTED)
                    || message_signals_rate_limit(message)
            }
            Self::Network {
                source: Some(source),
                ..
            } => message_signals_rate_limit(&source.to_string()),
            _ => false,
        }
    }
}

/// Substring check shared by every error shape that only exposes text.
pub fn message_signals_rate_limit(message: &str) -> bool {
    message.contains("429") || message.contains(RESOURCE_EXHAUSTED)
}

impl fmt::Display for StudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StudioError::Config {
                field,
                value,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Configuration error in '{}': {} (value: {})",
                    field, reason, value
                )
            }
            StudioError::Api {
                status,
                api_status,
                message,
                ..
            } => match (status, api_status) {
                (Some(status), Some(api_status)) => {
                    write!(f, "Service error {} {}: {}", status, api_status, message)
                }
                (Some(status), None) => write!(f, "Service error {}: {}", status, message),
                (None, Some(api_status)) => write!(f, "Service error {}: {}", api_status, message),
                (None, None) => write!(f, "Service error: {}", message),
            },
            StudioError::Network {
                operation, source, ..
            } => {
                if let Some(source) = source {
                    write!(f, "Network error during {}: {}", operation, source)
                } else {
                    write!(f, "Network error during {}", operation)
                }
            }
            StudioError::NoResponse { .. } => write!(f, "No response from AI."),
            StudioError::NoImage { .. } => write!(f, "Failed to generate image."),
            StudioError::VideoOperation {
                operation_name,
                reason,
                ..
            } => {
                if let Some(name) = operation_name {
                    write!(f, "Video operation '{}' failed: {}", name, reason)
                } else {
                    write!(f, "Video operation failed: {}", reason)
                }
            }
            StudioError::EntityNotFound { message, .. } => write!(f, "{}", message),
            StudioError::Camera { reason, .. } => write!(f, "Camera error: {}", reason),
            StudioError::Image { reason, .. } => write!(f, "Image error: {}", reason),
            StudioError::Io {
                operation,
                path,
                source,
                ..
            } => {
                if let Some(path) = path {
                    write!(
                        f,
                        "I/O error during {} on '{}': {}",
                        operation, path, source
                    )
                } else {
                    write!(f, "I/O error during {}: {}", operation, source)
                }
            }
            StudioError::External {
                library, source, ..
            } => {
                write!(f, "External library error in {}: {}", library, source)
            }
            StudioError::Timeout {
                operation,
                duration_ms,
                ..
            } => {
                write!(f, "Timeout during {} after {}ms", operation, duration_ms)
            }
            StudioError::Validation {
                field,
                constraint,
                value,
                ..
            } => {
                write!(
                    f,
                    "Validation failed for '{}': {} (value: {})",
                    field, constraint, value
                )
            }
        }
    }
}

impl StdError for StudioError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::External { source, .. } => Some(source.as_ref()),
            Self::Network {
                source: Some(source),
                ..
            } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result type alias using our custom error type
pub type StudioResult<T> = Result<T, StudioError>;

/// Trait for errors that can be retried
pub trait Retryable {
    /// Check if this error can be retried
    fn is_retryable(&self) -> bool;
}

impl Retryable for StudioError {
    fn is_retryable(&self) -> bool {
        self.is_rate_limited()
    }
}

/// Trait for errors with severity levels
pub trait HasSeverity {
    /// Get the severity level of this error
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for StudioError {
    fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}

/// Trait for errors that provide recovery suggestions
pub trait HasRecoverySuggestion {
    /// Get recovery suggestion for this error
    fn recovery_suggestion(&self) -> Option<&str>;
}

impl HasRecoverySuggestion for StudioError {
    fn recovery_suggestion(&self) -> Option<&str> {
        self.context().recovery_suggestion.as_deref()
    }
}

/// Error classification utilities
pub mod classify {
    use super::*;

    /// The credential was rejected and must be chosen again before the next
    /// attempt.
    pub fn requires_key_reselection(error: &StudioError) -> bool {
        matches!(error, StudioError::EntityNotFound { .. })
    }
}

impl From<std::io::Error> for StudioError {
    fn from(error: std::io::Error) -> Self {
        Self::io("unknown", error)
    }
}

impl From<serde_json::Error> for StudioError {
    fn from(error: serde_json::Error) -> Self {
        Self::external("serde_json", error)
    }
}

impl From<toml::de::Error> for StudioError {
    fn from(error: toml::de::Error) -> Self {
        Self::external("toml", error)
    }
}

impl From<base64::DecodeError> for StudioError {
    fn from(error: base64::DecodeError) -> Self {
        Self::image(format!("invalid base64 payload: {}", error))
    }
}

impl From<image::ImageError> for StudioError {
    fn from(error: image::ImageError) -> Self {
        Self::external("image", error)
    }
}

impl From<reqwest::Error> for StudioError {
    fn from(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            return Self::api(Some(status.as_u16()), None, error.to_string());
        }
        let operation = if error.is_timeout() {
            "request (timed out)"
        } else if error.is_connect() {
            "connect"
        } else if error.is_decode() {
            "decode response"
        } else {
            "request"
        };
        Self::network_from(operation, error)
    }
}
