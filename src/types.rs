//! Result types produced by the removal pipeline

use crate::error::{RemovalError, Result};
use image::{DynamicImage, GrayImage, ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Single-channel 8-bit transparency mask
///
/// Produced by decoding the network output; its dimensions always equal the
/// original input image, not the network's fixed resolution.
#[derive(Debug, Clone)]
pub struct AlphaMask {
    mask: GrayImage,
}

impl AlphaMask {
    /// Wrap an 8-bit single-channel image as a mask
    #[must_use]
    pub fn new(mask: GrayImage) -> Self {
        Self { mask }
    }

    /// Mask dimensions as (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.mask.dimensions()
    }

    /// Borrow the underlying grayscale image
    #[must_use]
    pub fn as_image(&self) -> &GrayImage {
        &self.mask
    }

    /// Consume the mask, returning the underlying grayscale image
    #[must_use]
    pub fn into_image(self) -> GrayImage {
        self.mask
    }

    /// Merge the mask into the image as its alpha channel
    ///
    /// The original color channels are preserved unchanged; only alpha is
    /// replaced. Applying the same mask to the same image twice yields
    /// byte-identical output.
    ///
    /// # Errors
    /// Returns [`RemovalError::Internal`] when mask and image dimensions
    /// differ.
    pub fn apply_to(&self, image: &DynamicImage) -> Result<RgbaImage> {
        let (width, height) = self.mask.dimensions();
        if (width, height) != (image.width(), image.height()) {
            return Err(RemovalError::internal(format!(
                "mask dimensions {}x{} do not match image dimensions {}x{}",
                width,
                height,
                image.width(),
                image.height()
            )));
        }

        let rgb = image.to_rgb8();
        let mut output = RgbaImage::new(width, height);
        for (x, y, pixel) in output.enumerate_pixels_mut() {
            let color = rgb.get_pixel(x, y);
            let alpha = self.mask.get_pixel(x, y)[0];
            *pixel = Rgba([color[0], color[1], color[2], alpha]);
        }
        Ok(output)
    }
}

/// Wall-clock duration of each pipeline stage, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Image to input tensor
    pub encode_ms: u64,
    /// Backend execution
    pub inference_ms: u64,
    /// Raw output tensor to alpha mask
    pub mask_ms: u64,
    /// Mask compositing onto the original image
    pub composite_ms: u64,
    /// Whole pipeline, including stages too short to register above
    pub total_ms: u64,
}

/// Output of one background removal request
#[derive(Debug, Clone)]
pub struct RemovalResult {
    /// RGBA composite: original colors with the mask as alpha, optionally
    /// flattened onto a solid background color
    pub image: RgbaImage,
    /// The decoded transparency mask, at the original image resolution
    pub mask: AlphaMask,
    /// Per-stage timings for this request
    pub timings: ProcessingTimings,
}

impl RemovalResult {
    /// Result dimensions as (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Encode the composite as PNG bytes
    ///
    /// PNG is the only byte encoding produced, so the alpha channel always
    /// survives.
    ///
    /// # Errors
    /// Returns [`RemovalError::Internal`] when PNG encoding fails.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| RemovalError::internal(format!("failed to encode PNG: {e}")))?;
        Ok(bytes)
    }

    /// Write the composite to disk as PNG, creating parent directories
    ///
    /// The PNG format is used regardless of the path's extension so the
    /// alpha channel is never silently dropped.
    ///
    /// # Errors
    /// Returns [`RemovalError::Io`] when the directory cannot be created and
    /// [`RemovalError::Internal`] when encoding fails.
    pub fn write_png(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    RemovalError::io(
                        format!("creating output directory {}", parent.display()),
                        e,
                    )
                })?;
            }
        }
        self.image
            .save_with_format(path, ImageFormat::Png)
            .map_err(|e| {
                RemovalError::internal(format!(
                    "failed to write PNG to {}: {e}",
                    path.display()
                ))
            })?;
        Ok(())
    }
}
