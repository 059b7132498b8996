//! Image to tensor conversion for the segmentation network
//!
//! `encode_image` turns an arbitrary image into the fixed-shape normalized
//! channel-first tensor the network expects; `decode_output` turns the raw
//! saliency output back into a transparency mask at the original image's
//! resolution. Both directions resample with a Lanczos filter so mask edges
//! stay visually smooth.

use crate::error::{RemovalError, Result};
use crate::models::{MODEL_INPUT_SIZE, NORM_MEAN, NORM_STD};
use crate::types::AlphaMask;
use image::{imageops::FilterType, DynamicImage, GrayImage, Rgba, RgbaImage};
use ndarray::{Array4, ArrayD, Axis};

/// Range at or below which a raw network output is treated as constant
const DEGENERATE_RANGE: f32 = 1e-6;

/// Encode an image into the network input tensor
///
/// The result always has shape (1, 3, 320, 320) and dtype f32, regardless
/// of the input resolution: alpha is dropped, the image is resized to the
/// fixed network resolution, channel values are scaled to [0,1] and
/// normalized with the per-channel mean and standard deviation the network
/// was trained with, and the layout is channel-first with a unit batch axis.
#[must_use]
pub fn encode_image(image: &DynamicImage) -> Array4<f32> {
    let size = MODEL_INPUT_SIZE;
    let rgb = image.to_rgb8();
    let resized = image::imageops::resize(&rgb, size, size, FilterType::Lanczos3);

    let dim = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, dim, dim));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for channel in 0..3 {
            let value = f32::from(pixel[channel]) / 255.0;
            tensor[[0, channel, y as usize, x as usize]] =
                (value - NORM_MEAN[channel]) / NORM_STD[channel];
        }
    }
    tensor
}

/// Decode a raw network output into an alpha mask at the original resolution
///
/// Singleton axes are dropped until a 2-D saliency map remains. The map is
/// min-max normalized into [0,255]; a map whose value range does not exceed
/// a small epsilon is degenerate (for example a uniformly black output) and
/// decodes to a fully transparent mask rather than dividing by zero.
/// Finally the mask is resampled to `original_size`, so its dimensions
/// always match the original image.
///
/// # Errors
/// Returns [`RemovalError::Inference`] when the output cannot be squeezed
/// to 2-D or is empty.
pub fn decode_output(raw: &ArrayD<f32>, original_size: (u32, u32)) -> Result<AlphaMask> {
    let mut view = raw.view();
    while view.ndim() > 2 {
        let axis = view.shape().iter().position(|&dim| dim == 1).ok_or_else(|| {
            RemovalError::inference(format!(
                "expected a 2-D saliency map after squeezing singleton axes, got shape {:?}",
                raw.shape()
            ))
        })?;
        view = view.index_axis_move(Axis(axis), 0);
    }
    if view.ndim() != 2 {
        return Err(RemovalError::inference(format!(
            "expected a 2-D saliency map, got shape {:?}",
            raw.shape()
        )));
    }

    let height = view.shape()[0];
    let width = view.shape()[1];
    if height == 0 || width == 0 {
        return Err(RemovalError::inference(format!(
            "saliency map is empty, got shape {:?}",
            raw.shape()
        )));
    }

    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &value in view.iter() {
        min = min.min(value);
        max = max.max(value);
    }

    let range = max - min;
    let mut data = Vec::with_capacity(height * width);
    if range > DEGENERATE_RANGE {
        for &value in view.iter() {
            data.push((((value - min) / range) * 255.0) as u8);
        }
    } else {
        // Uniform output carries no foreground signal; everything transparent
        data.resize(height * width, 0);
    }

    let map = GrayImage::from_raw(width as u32, height as u32, data).ok_or_else(|| {
        RemovalError::inference("saliency map buffer does not match its shape")
    })?;
    let resized =
        image::imageops::resize(&map, original_size.0, original_size.1, FilterType::Lanczos3);
    Ok(AlphaMask::new(resized))
}

/// Flatten a transparent cut-out onto a solid background color
///
/// Standard alpha blending; the result is fully opaque.
#[must_use]
pub fn flatten_over(cutout: &RgbaImage, color: [u8; 3]) -> RgbaImage {
    let mut output = RgbaImage::new(cutout.width(), cutout.height());
    for (x, y, pixel) in output.enumerate_pixels_mut() {
        let fg = cutout.get_pixel(x, y);
        let alpha = f32::from(fg[3]) / 255.0;
        let blend = |f: u8, b: u8| -> u8 {
            (f32::from(f) * alpha + f32::from(b) * (1.0 - alpha)).round() as u8
        };
        *pixel = Rgba([
            blend(fg[0], color[0]),
            blend(fg[1], color[1]),
            blend(fg[2], color[2]),
            255,
        ]);
    }
    output
}
