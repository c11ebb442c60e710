//! Error types for the testgap-rs library.
//!
//! Collaborator failures (model service, test runner) are usually caught at the
//! call site and turned into recorded data; the variants here cover everything
//! that still needs to travel through `?`.

use std::io;
use std::str::Utf8Error;

use thiserror::Error;

/// Main result type for testgap operations.
pub type Result<T> = std::result::Result<T, TestgapError>;

/// Error type for all testgap operations.
#[derive(Error, Debug)]
pub enum TestgapError {
    /// I/O related errors (file operations, process spawning)
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// Source parsing errors
    #[error("Parse error in {language}: {message}")]
    Parse {
        /// Language being parsed
        language: String,
        /// Error description
        message: String,
        /// File path where error occurred
        file_path: Option<String>,
    },

    /// Language model transport or protocol errors
    #[error("Model error: {message}")]
    Model {
        /// Error description
        message: String,
        /// Model identifier the request was addressed to
        model: Option<String>,
    },

    /// Test runner invocation errors
    #[error("Test runner error: {message}")]
    Runner {
        /// Error description
        message: String,
        /// Command line that was being executed
        command: Option<String>,
    },

    /// Report rendering or writing errors
    #[error("Report error: {message}")]
    Report {
        /// Error description
        message: String,
        /// Output path, when known
        path: Option<String>,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error description
        message: String,
        /// Data type being serialized
        data_type: Option<String>,
        /// Underlying serialization error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Validation errors for input data
    #[error("Validation error: {message}")]
    Validation {
        /// Error description
        message: String,
        /// Field or input that failed validation
        field: Option<String>,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        /// Error description
        message: String,
        /// Additional context
        context: Option<String>,
    },
}

impl TestgapError {
    /// Create a new I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new configuration error with field context
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new parse error
    pub fn parse(language: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            language: language.into(),
            message: message.into(),
            file_path: None,
        }
    }

    /// Create a new model error
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model {
            message: message.into(),
            model: None,
        }
    }

    /// Create a new model error tagged with the model identifier
    pub fn model_named(message: impl Into<String>, model: impl Into<String>) -> Self {
        Self::Model {
            message: message.into(),
            model: Some(model.into()),
        }
    }

    /// Create a new test runner error
    pub fn runner(message: impl Into<String>, command: impl Into<String>) -> Self {
        Self::Runner {
            message: message.into(),
            command: Some(command.into()),
        }
    }

    /// Create a new report error
    pub fn report(message: impl Into<String>, path: Option<String>) -> Self {
        Self::Report {
            message: message.into(),
            path,
        }
    }

    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }

    /// Add context to an existing error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        match &mut self {
            Self::Internal { context: ctx, .. } => {
                *ctx = Some(context.into());
            }
            Self::Runner { command: ctx, .. } if ctx.is_none() => {
                *ctx = Some(context.into());
            }
            _ => {}
        }
        self
    }
}

impl From<io::Error> for TestgapError {
    fn from(err: io::Error) -> Self {
        Self::io("I/O operation failed", err)
    }
}

impl From<serde_json::Error> for TestgapError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: format!("JSON serialization failed: {err}"),
            data_type: Some("JSON".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_yaml::Error> for TestgapError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: format!("YAML serialization failed: {err}"),
            data_type: Some("YAML".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<reqwest::Error> for TestgapError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {err}")
        } else {
            format!("request failed: {err}")
        };
        Self::model(message)
    }
}

impl From<walkdir::Error> for TestgapError {
    fn from(err: walkdir::Error) -> Self {
        let message = format!("directory walk failed: {err}");
        match err.into_io_error() {
            Some(source) => Self::io(message, source),
            None => Self::internal(message),
        }
    }
}

impl From<Utf8Error> for TestgapError {
    fn from(err: Utf8Error) -> Self {
        Self::parse("python", format!("UTF-8 encoding error: {err}"))
    }
}

/// Result extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add static context to an error result
    fn context(self, msg: &'static str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<TestgapError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }

    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| e.into().with_context(msg))
    }
}
