//! Unified background removal pipeline
//!
//! This module provides the main [`BackgroundRemover`] that ties the pieces
//! together: it encodes an image into the network input tensor, runs the
//! provider's cached session, decodes the saliency output into a
//! transparency mask at the original resolution, and composites the mask
//! onto the original image. The same pipeline backs all public entry
//! points, whether they start from a file path, raw encoded bytes, or a
//! decoded image.

use crate::{
    config::RemovalConfig,
    error::{RemovalError, Result},
    session::{BackendFactory, SessionProvider},
    tensor,
    types::{ProcessingTimings, RemovalResult},
};
use image::DynamicImage;
use instant::Instant;
use log::debug;
use ndarray::{Array4, ArrayD};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use tracing::{info as trace_info, instrument, span, Level};

/// Process-wide remover backing the crate-level convenience functions
static GLOBAL_REMOVER: OnceCell<BackgroundRemover> = OnceCell::new();

/// Background removal pipeline over a lazily-created session
pub struct BackgroundRemover {
    config: RemovalConfig,
    provider: SessionProvider,
}

impl BackgroundRemover {
    /// Create a remover with the default backend factory
    ///
    /// Cheap: the inference session is created on the first processing
    /// call, not here.
    ///
    /// # Errors
    /// Returns [`RemovalError::InvalidConfig`] when the configuration does
    /// not validate.
    pub fn new(config: RemovalConfig) -> Result<Self> {
        Self::with_factory(config, Box::new(crate::session::DefaultBackendFactory))
    }

    /// Create a remover with an injected session factory, for testing
    ///
    /// # Errors
    /// Returns [`RemovalError::InvalidConfig`] when the configuration does
    /// not validate.
    pub fn with_factory(
        config: RemovalConfig,
        factory: Box<dyn BackendFactory>,
    ) -> Result<Self> {
        config.validate()?;
        let provider = SessionProvider::with_factory(config.clone(), factory);
        Ok(Self { config, provider })
    }

    /// The configuration this remover was built with
    #[must_use]
    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    /// Whether the inference session has been created yet
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.provider.is_initialized()
    }

    /// Remove the background from a decoded image
    ///
    /// The result's image keeps the input's dimensions and RGB values;
    /// only the alpha channel is replaced by the predicted mask. When the
    /// configuration sets a background color the cut-out is flattened onto
    /// it and the result is fully opaque.
    ///
    /// # Errors
    /// Returns [`RemovalError::ModelNotFound`] when the weights are not
    /// provisioned and [`RemovalError::Inference`] when the backend call
    /// fails; an inference failure leaves the session valid for the next
    /// call.
    #[instrument(
        skip(self, image),
        fields(
            backend = %self.provider.backend(),
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    pub fn process_image(&self, image: &DynamicImage) -> Result<RemovalResult> {
        let mut timings = ProcessingTimings::default();
        let total_start = Instant::now();
        let original_dimensions = (image.width(), image.height());

        trace_info!(backend = %self.provider.backend(), "🎯 Starting image processing");

        let input_tensor = {
            let _span = span!(
                Level::DEBUG,
                "encode",
                width = %original_dimensions.0,
                height = %original_dimensions.1
            )
            .entered();
            let encode_start = Instant::now();
            let tensor = tensor::encode_image(image);
            timings.encode_ms = encode_start.elapsed().as_millis() as u64;
            tensor
        };

        let raw_output = {
            let _span =
                span!(Level::INFO, "inference", backend = %self.provider.backend()).entered();
            let inference_start = Instant::now();
            let output = self.run_network(input_tensor)?;
            timings.inference_ms = inference_start.elapsed().as_millis() as u64;
            output
        };

        let mask = {
            let _span = span!(
                Level::DEBUG,
                "decode_mask",
                width = %original_dimensions.0,
                height = %original_dimensions.1
            )
            .entered();
            let mask_start = Instant::now();
            let mask = tensor::decode_output(&raw_output, original_dimensions)?;
            timings.mask_ms = mask_start.elapsed().as_millis() as u64;
            mask
        };

        let composite_start = Instant::now();
        let mut output_image = mask.apply_to(image)?;
        if let Some(color) = self.config.background {
            output_image = tensor::flatten_over(&output_image, color);
        }
        timings.composite_ms = composite_start.elapsed().as_millis() as u64;
        timings.total_ms = total_start.elapsed().as_millis() as u64;

        debug!(
            "processing complete in {total}ms (encode {encode}ms, inference {inference}ms, mask {mask}ms, composite {composite}ms)",
            total = timings.total_ms,
            encode = timings.encode_ms,
            inference = timings.inference_ms,
            mask = timings.mask_ms,
            composite = timings.composite_ms
        );

        Ok(RemovalResult {
            image: output_image,
            mask,
            timings,
        })
    }

    /// Remove the background from encoded image bytes
    ///
    /// # Errors
    /// Returns [`RemovalError::Decode`] when the bytes are not a readable
    /// image; decoding happens before any session work, so a corrupt input
    /// never touches the backend.
    pub fn process_bytes(&self, image_bytes: &[u8]) -> Result<RemovalResult> {
        let image = image::load_from_memory(image_bytes)?;
        self.process_image(&image)
    }

    /// Remove the background from an image file
    ///
    /// # Errors
    /// Returns [`RemovalError::Decode`] when the file cannot be read or
    /// decoded; processing errors as in [`Self::process_image`].
    pub fn process_file(&self, input_path: impl AsRef<Path>) -> Result<RemovalResult> {
        let input_path = input_path.as_ref();
        debug!("loading {path}", path = input_path.display());
        let image = image::open(input_path)?;
        self.process_image(&image)
    }

    /// Run the session on one encoded input, selecting the first declared
    /// output (the network's finest saliency map)
    fn run_network(&self, input: Array4<f32>) -> Result<ArrayD<f32>> {
        let session = self.provider.session()?;
        // The lock serializes inference: one request in flight per session
        let mut session = session
            .lock()
            .map_err(|_| RemovalError::internal("inference session lock poisoned"))?;

        let input_name = session
            .input_names()
            .first()
            .ok_or_else(|| RemovalError::inference("model declares no inputs"))?
            .clone();
        let output_name = session
            .output_names()
            .first()
            .ok_or_else(|| RemovalError::inference("model declares no outputs"))?
            .clone();

        let selector = vec![output_name];
        let mut outputs = session.run(Some(&selector), vec![(input_name, input.into_dyn())])?;
        if outputs.is_empty() {
            return Err(RemovalError::inference("inference returned no outputs"));
        }
        Ok(outputs.remove(0))
    }
}

/// Default output path for a processed input file: `{stem}_nobg.png`
#[must_use]
pub fn default_output_path(input_path: &Path) -> PathBuf {
    let stem = input_path
        .file_stem()
        .map_or_else(|| "output".to_string(), |s| s.to_string_lossy().into_owned());
    input_path.with_file_name(format!("{stem}_nobg.png"))
}

/// Process-wide remover, created on first use
///
/// The first caller's configuration is latched for the life of the
/// process; later callers share the same remover and session. A creation
/// failure is not cached, so a later call can succeed once the cause is
/// fixed. Construct a [`BackgroundRemover`] directly for per-instance
/// configuration.
pub(crate) fn global_remover(config: &RemovalConfig) -> Result<&'static BackgroundRemover> {
    GLOBAL_REMOVER.get_or_try_init(|| BackgroundRemover::new(config.clone()))
}
