//! Error types for snapgate.
//!
//! Configuration problems abort startup. Publish problems only ever cost the
//! current event: the gate logs them and moves on, so none of these types
//! reaches the event source.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::diag::bounded_line;

/// Errors raised while turning module arguments into a [`crate::GatewayConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to expand arguments: {message}")]
    Expansion {
        message: String,
    },

    #[error("Unknown option #{position} '{option}'")]
    UnknownOption {
        /// 1-based position of the offending word.
        position: usize,
        option: String,
    },

    #[error("Option '{option}' requires a value")]
    MissingValue {
        option: String,
    },

    #[error("Invalid value '{value}' for option '{option}': {reason}")]
    InvalidValue {
        option: String,
        value: String,
        reason: String,
    },

    #[error("Base directory cannot be empty")]
    EmptyBasedir,
}

impl ConfigError {
    /// The message as one log line of bounded size.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        bounded_line(&self.to_string()).into_owned()
    }
}

/// Errors raised while committing a snapshot file.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Staging file {} already exists", .path.display())]
    StagingExists {
        path: PathBuf,
    },

    #[error("Failed to open {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to rename {} to {}: {source}", .from.display(), .to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PublishError {
    /// Returns true when an unconsumed staging file blocked the publish.
    #[must_use]
    pub const fn is_staging_collision(&self) -> bool {
        matches!(self, Self::StagingExists { .. })
    }

    /// The OS error number behind this failure, if any.
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Create { source, .. }
            | Self::Write { source, .. }
            | Self::Rename { source, .. } => source.raw_os_error(),
            Self::StagingExists { .. } | Self::Serialize(_) => None,
        }
    }
}

/// Top-level error type for snapgate.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl GatewayError {
    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is a publish error.
    #[must_use]
    pub const fn is_publish(&self) -> bool {
        matches!(self, Self::Publish(_))
    }

    /// The message as one log line of bounded size.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        bounded_line(&self.to_string()).into_owned()
    }
}

/// Result type alias for snapgate operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
