#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # u2net-bgremove
//!
//! Background removal built on the u2net salient-object-segmentation
//! network: load the pretrained ONNX model once, encode an image into the
//! network's normalized tensor format, execute, and decode the saliency
//! output into a transparency mask composited over the original image.
//!
//! The pipeline is synchronous and blocking, sized for one request at a
//! time through one cached session; run it from a dedicated worker thread
//! when an interactive surface must stay responsive.
//!
//! ## Features
//!
//! - **Two Backends**: native in-process ONNX Runtime, and a bridged
//!   backend that delegates execution to a Python-hosted `onnxruntime` for
//!   platforms without a native runtime build (notably Android)
//! - **Hardware Acceleration**: CUDA, `CoreML`, and CPU execution providers
//!   on the native backend, auto-detected
//! - **One Session Per Process**: lazy first-use creation, cached for the
//!   process lifetime, safe under concurrent first callers
//! - **Alpha-Preserving Output**: always RGBA internally, always PNG when
//!   bytes are produced
//! - **CLI Integration**: optional command-line interface (enable with the
//!   `cli` feature)
//!
//! The model file itself is provisioned out of band: the crate resolves
//! where the weights are expected to live (explicit path, `U2NET_HOME`, or
//! the platform cache directory) and fails with
//! [`RemovalError::ModelNotFound`] when they are absent; it never downloads.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use u2net_bgremove::{remove_background_from_file, RemovalConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = RemovalConfig::default();
//!
//! // Writes photo_nobg.png next to the input
//! let output = remove_background_from_file("photo.jpg", None, &config).await?;
//! println!("saved {}", output.display());
//! # Ok(())
//! # }
//! ```
//!
//! In-memory processing with a configured provider:
//!
//! ```rust,no_run
//! use u2net_bgremove::{remove_background_from_bytes, ExecutionProvider, RemovalConfig};
//!
//! # async fn example(upload: Vec<u8>) -> anyhow::Result<()> {
//! let config = RemovalConfig::builder()
//!     .execution_provider(ExecutionProvider::Cpu)
//!     .build()?;
//! let png_bytes = remove_background_from_bytes(&upload, &config).await?;
//! # Ok(())
//! # }
//! ```
//!
//! The crate-level functions share one process-wide session; construct a
//! [`BackgroundRemover`] directly for per-instance configuration:
//!
//! ```rust,no_run
//! use u2net_bgremove::{BackgroundRemover, BackendKind, RemovalConfig};
//!
//! # fn example(image: image::DynamicImage) -> u2net_bgremove::Result<()> {
//! let config = RemovalConfig::builder()
//!     .backend(BackendKind::Native)
//!     .model_path("/opt/models/u2net.onnx")
//!     .build()?;
//! let remover = BackgroundRemover::new(config)?;
//! let result = remover.process_image(&image)?;
//! result.write_png("cutout.png".as_ref())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `onnx` (default): native in-process ONNX Runtime backend
//! - `bridged`: Python-bridged backend via an embedded interpreter
//! - `cli` (default): command-line interface and tracing subscriber setup
//! - `tracing-json`: JSON output format for the tracing subscriber
//!
//! ### Library-Only Usage
//!
//! To use only as a library without CLI dependencies:
//!
//! ```toml
//! [dependencies]
//! u2net-bgremove = { version = "0.1", default-features = false, features = ["onnx"] }
//! ```

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod processor;
pub mod session;
pub mod tensor;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

use std::path::{Path, PathBuf};

// Public API exports
pub use backends::*;
pub use config::{BackendKind, ExecutionProvider, RemovalConfig, RemovalConfigBuilder};
pub use error::{RemovalError, Result};
pub use inference::InferenceSession;
pub use models::{
    model_is_provisioned, resolve_model_path, MODEL_DIR_ENV, MODEL_FILE_NAME, MODEL_INPUT_SIZE,
    MODEL_NAME,
};
pub use processor::{default_output_path, BackgroundRemover};
pub use session::{resolve_backend, BackendFactory, DefaultBackendFactory, SessionProvider};
pub use tensor::{decode_output, encode_image, flatten_over};
pub use types::{AlphaMask, ProcessingTimings, RemovalResult};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Remove the background from an image file and write the result as PNG
///
/// When `output_path` is `None` the result is written to
/// `{stem}_nobg.png` next to the input. The written encoding is always
/// PNG regardless of the output path's extension, so the alpha channel
/// survives.
///
/// Uses the process-wide session: the first caller's configuration is
/// latched for the life of the process (see [`BackgroundRemover`] for
/// per-instance configuration).
///
/// # Arguments
///
/// * `input_path` - Image file to process (JPEG, PNG)
/// * `output_path` - Destination file, or `None` for the default naming
/// * `config` - Configuration for the removal operation
///
/// # Returns
///
/// The path the composite was written to.
///
/// # Examples
///
/// ```rust,no_run
/// use u2net_bgremove::{remove_background_from_file, RemovalConfig};
/// use std::path::Path;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = RemovalConfig::default();
/// let saved = remove_background_from_file(
///     "photo.jpg",
///     Some(Path::new("cutout.png")),
///     &config,
/// )
/// .await?;
/// assert_eq!(saved, Path::new("cutout.png"));
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_file(
    input_path: impl AsRef<Path>,
    output_path: Option<&Path>,
    config: &RemovalConfig,
) -> Result<PathBuf> {
    let input_path = input_path.as_ref();
    let result = processor::global_remover(config)?.process_file(input_path)?;

    let output_path =
        output_path.map_or_else(|| default_output_path(input_path), Path::to_path_buf);
    result.write_png(&output_path)?;
    Ok(output_path)
}

/// Remove the background from encoded image bytes, returning PNG bytes
///
/// The bytes are decoded first, so a malformed input fails with
/// [`RemovalError::Decode`] before any inference work begins. The returned
/// buffer is always PNG-encoded RGBA.
///
/// # Arguments
///
/// * `image_bytes` - Raw encoded image data (JPEG, PNG)
/// * `config` - Configuration for the removal operation
///
/// # Examples
///
/// ```rust,no_run
/// use u2net_bgremove::{remove_background_from_bytes, RemovalConfig};
///
/// # async fn example(upload: Vec<u8>) -> anyhow::Result<()> {
/// let config = RemovalConfig::default();
/// let png = remove_background_from_bytes(&upload, &config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_bytes(
    image_bytes: &[u8],
    config: &RemovalConfig,
) -> Result<Vec<u8>> {
    let result = processor::global_remover(config)?.process_bytes(image_bytes)?;
    result.to_png_bytes()
}

/// Remove the background from a decoded image, returning the RGBA composite
///
/// The most direct entry point: no encoding or file I/O on either side.
/// The returned image keeps the input's dimensions and RGB values with the
/// predicted mask as its alpha channel (or is flattened onto
/// `config.background` when one is set).
///
/// # Arguments
///
/// * `image` - A decoded image (from the `image` crate)
/// * `config` - Configuration for the removal operation
///
/// # Examples
///
/// ```rust,no_run
/// use u2net_bgremove::{remove_background_from_image, RemovalConfig};
/// use image::DynamicImage;
///
/// # async fn example(img: DynamicImage) -> anyhow::Result<()> {
/// let config = RemovalConfig::default();
/// let rgba = remove_background_from_image(&img, &config).await?;
/// assert_eq!(rgba.dimensions(), (img.width(), img.height()));
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_image(
    image: &image::DynamicImage,
    config: &RemovalConfig,
) -> Result<image::RgbaImage> {
    let result = processor::global_remover(config)?.process_image(image)?;
    Ok(result.image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_api_compiles() {
        // Basic compilation test to ensure API is well-formed
        let _config = RemovalConfig::default();
    }

    #[tokio::test]
    async fn corrupt_bytes_fail_at_the_decode_stage() {
        // Decoding runs before any session work, so this needs no model
        let config = RemovalConfig::default();
        let err = remove_background_from_bytes(b"not an image", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, RemovalError::Decode { .. }));
    }
}
