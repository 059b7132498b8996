//! Configuration types for background removal operations

use crate::error::RemovalError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Inference backend variants
///
/// Exactly two concrete backends exist: the native in-process ONNX runtime
/// and the bridged managed-runtime path. `Auto` defers the choice to the
/// platform default, decided once before the first session is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// Platform default (bridged on Android, native elsewhere)
    Auto,
    /// Native in-process ONNX Runtime
    Native,
    /// Execution delegated across the managed-runtime bridge
    Bridged,
}

impl Default for BackendKind {
    fn default() -> Self {
        Self::Auto
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Native => write!(f, "native"),
            Self::Bridged => write!(f, "bridged"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = RemovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "native" => Ok(Self::Native),
            "bridged" => Ok(Self::Bridged),
            other => Err(RemovalError::invalid_config(format!(
                "unknown backend '{other}' (expected auto, native or bridged)"
            ))),
        }
    }
}

/// Execution provider options for the native ONNX Runtime backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl Default for ExecutionProvider {
    fn default() -> Self {
        Self::Auto
    }
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

impl FromStr for ExecutionProvider {
    type Err = RemovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "coreml" => Ok(Self::CoreMl),
            other => Err(RemovalError::invalid_config(format!(
                "unknown execution provider '{other}' (expected auto, cpu, cuda or coreml)"
            ))),
        }
    }
}

/// Configuration for background removal operations
///
/// Session-affecting fields (`backend`, `execution_provider`, `model_path`,
/// thread counts) are read when the process-wide session is first opened;
/// the top-level convenience functions latch the first caller's values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovalConfig {
    /// Which backend executes the network
    pub backend: BackendKind,

    /// Execution provider for the native backend
    pub execution_provider: ExecutionProvider,

    /// Explicit path to the weights file, overriding `U2NET_HOME` and the
    /// platform cache directory
    pub model_path: Option<PathBuf>,

    /// Solid background color to flatten the cut-out onto (RGB); `None`
    /// keeps the background transparent
    pub background: Option<[u8; 3]>,

    /// Enable additional logging and validation
    pub debug: bool,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            execution_provider: ExecutionProvider::default(),
            model_path: None,    // Resolve via U2NET_HOME / platform cache
            background: None,    // Transparent output
            debug: false,
            intra_threads: 0,    // Auto-detect
            inter_threads: 0,    // Auto-detect
        }
    }
}

impl RemovalConfig {
    /// Create a configuration builder for fluent construction
    ///
    /// # Examples
    ///
    /// ```rust
    /// use u2net_bgremove::{BackendKind, ExecutionProvider, RemovalConfig};
    ///
    /// let config = RemovalConfig::builder()
    ///     .backend(BackendKind::Native)
    ///     .execution_provider(ExecutionProvider::Cpu)
    ///     .num_threads(4)
    ///     .build()
    ///     .unwrap();
    /// ```
    #[must_use]
    pub fn builder() -> RemovalConfigBuilder {
        RemovalConfigBuilder::default()
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    /// - `model_path` set to a path with no file component (for example `/`)
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(path) = &self.model_path {
            if path.file_name().is_none() {
                return Err(RemovalError::invalid_config(format!(
                    "model_path must name a weights file, got '{}'",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Builder for [`RemovalConfig`]
#[derive(Debug, Default)]
pub struct RemovalConfigBuilder {
    config: RemovalConfig,
}

impl RemovalConfigBuilder {
    /// Set the inference backend
    #[must_use]
    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.config.backend = backend;
        self
    }

    /// Set the execution provider for the native backend
    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    /// Set an explicit path to the weights file
    #[must_use]
    pub fn model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.model_path = Some(path.into());
        self
    }

    /// Flatten the cut-out onto a solid RGB background color
    #[must_use]
    pub fn background(mut self, color: [u8; 3]) -> Self {
        self.config.background = Some(color);
        self
    }

    /// Enable debug mode
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Set the number of intra-op threads
    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    /// Set the number of inter-op threads
    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.inter_threads = threads;
        self
    }

    /// Set both thread counts from one total
    ///
    /// Intra-op gets the full count, inter-op half of it (minimum 1); zero
    /// leaves both on auto-detection.
    #[must_use]
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self.config.inter_threads = if threads > 0 { (threads / 2).max(1) } else { 0 };
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// Returns [`RemovalError::InvalidConfig`] when validation fails.
    pub fn build(self) -> crate::Result<RemovalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
