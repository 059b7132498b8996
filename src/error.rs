//! Error types for background removal operations

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, RemovalError>;

/// Errors surfaced by the background removal pipeline
///
/// Every failure aborts the current request; no partial results are
/// produced. A per-call [`RemovalError::Inference`] leaves the cached
/// session valid for subsequent requests.
#[derive(Debug, Error)]
pub enum RemovalError {
    /// The network weights file is absent at the resolved path
    ///
    /// Provisioning the model is a separate, explicitly invoked step; the
    /// inference path only verifies presence and reports this error.
    #[error("model weights not found at {}: provision the u2net model or set U2NET_HOME", .path.display())]
    ModelNotFound {
        /// Expected location of the weights file
        path: PathBuf,
    },

    /// Backend-level failure while opening the model or executing the network
    #[error("inference failed: {message}")]
    Inference {
        /// Human-readable description of the backend fault
        message: String,
    },

    /// The source image could not be decoded
    #[error("failed to decode image: {source}")]
    Decode {
        /// Underlying decoder error
        #[from]
        source: image::ImageError,
    },

    /// A filesystem operation failed
    #[error("I/O error while {context}: {source}")]
    Io {
        /// What the pipeline was doing when the operation failed
        context: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration parameters failed validation
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Which parameter is invalid and why
        message: String,
    },

    /// The managed-runtime bridge failed outside of a single inference call
    ///
    /// Import or interpreter faults are reported here; per-call execution
    /// faults use [`RemovalError::Inference`].
    #[cfg(feature = "bridged")]
    #[error("bridged runtime error: {message}")]
    Bridge {
        /// Human-readable description of the bridge fault
        message: String,
    },

    /// An internal invariant was violated
    #[error("internal error: {message}")]
    Internal {
        /// Description of the violated invariant
        message: String,
    },
}

impl RemovalError {
    /// Missing weights file at the expected location
    pub fn model_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ModelNotFound { path: path.into() }
    }

    /// Backend fault while opening the model or running inference
    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference {
            message: message.into(),
        }
    }

    /// Filesystem fault with the operation that triggered it
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Invalid configuration parameter
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Managed-runtime bridge fault
    #[cfg(feature = "bridged")]
    pub fn bridge(message: impl Into<String>) -> Self {
        Self::Bridge {
            message: message.into(),
        }
    }

    /// Violated internal invariant
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True when this is the missing-weights condition
    #[must_use]
    pub fn is_model_not_found(&self) -> bool {
        matches!(self, Self::ModelNotFound { .. })
    }

    /// The path the weights were expected at, when that is what failed
    #[must_use]
    pub fn expected_model_path(&self) -> Option<&Path> {
        match self {
            Self::ModelNotFound { path } => Some(path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_not_found_message_names_the_path() {
        let err = RemovalError::model_not_found("/data/models/u2net.onnx");
        let message = err.to_string();
        assert!(message.contains("/data/models/u2net.onnx"));
        assert!(err.is_model_not_found());
        assert_eq!(
            err.expected_model_path(),
            Some(Path::new("/data/models/u2net.onnx"))
        );
    }

    #[test]
    fn helper_constructors_produce_matching_variants() {
        assert!(matches!(
            RemovalError::inference("shape mismatch"),
            RemovalError::Inference { .. }
        ));
        assert!(matches!(
            RemovalError::invalid_config("bad thread count"),
            RemovalError::InvalidConfig { .. }
        ));
        assert!(matches!(
            RemovalError::internal("lock poisoned"),
            RemovalError::Internal { .. }
        ));

        let io = RemovalError::io(
            "reading input image",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(io.to_string().contains("reading input image"));
        assert!(io.expected_model_path().is_none());
    }

    #[test]
    fn image_errors_convert_into_decode() {
        let source = image::ImageError::IoError(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "truncated",
        ));
        let err: RemovalError = source.into();
        assert!(matches!(err, RemovalError::Decode { .. }));
        assert!(err.to_string().contains("failed to decode image"));
    }

    #[cfg(feature = "bridged")]
    #[test]
    fn bridge_errors_are_distinct_from_inference() {
        let err = RemovalError::bridge("onnxruntime import failed");
        assert!(matches!(err, RemovalError::Bridge { .. }));
        assert!(err.to_string().contains("bridged runtime"));
    }
}
