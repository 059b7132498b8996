//! Model identity and weights location for the u2net segmentation network
//!
//! Exactly one network is supported: a u2net-class salient-object
//! segmentation model with a fixed 320x320 input and a single authoritative
//! output. The weights artifact is provisioned out of band; this module only
//! resolves where it is expected to live and whether it is present.

use crate::config::RemovalConfig;
use crate::error::{RemovalError, Result};
use std::path::PathBuf;

/// Canonical model name
pub const MODEL_NAME: &str = "u2net";

/// File name of the ONNX weights artifact
pub const MODEL_FILE_NAME: &str = "u2net.onnx";

/// Environment variable naming the directory that holds the weights file
///
/// On Android the host application is expected to point this at its own
/// storage (`<app storage>/models`); on desktop it overrides the cache
/// directory default.
pub const MODEL_DIR_ENV: &str = "U2NET_HOME";

/// Square input resolution the network was exported with
pub const MODEL_INPUT_SIZE: u32 = 320;

/// Per-channel normalization mean (RGB, applied after scaling to [0,1])
pub const NORM_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel normalization standard deviation (RGB)
pub const NORM_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Resolve the expected location of the weights file
///
/// First match wins: the configured `model_path`, then `$U2NET_HOME/u2net.onnx`,
/// then `<platform cache dir>/u2net-bgremove/models/u2net.onnx`. Resolution
/// never touches the filesystem; presence is checked separately.
///
/// # Errors
/// Returns [`RemovalError::InvalidConfig`] when no override is set and the
/// platform reports no cache directory.
pub fn resolve_model_path(config: &RemovalConfig) -> Result<PathBuf> {
    if let Some(path) = &config.model_path {
        return Ok(path.clone());
    }

    if let Ok(dir) = std::env::var(MODEL_DIR_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir).join(MODEL_FILE_NAME));
        }
    }

    let cache = dirs::cache_dir().ok_or_else(|| {
        RemovalError::invalid_config(format!(
            "no cache directory on this platform; set {MODEL_DIR_ENV} or RemovalConfig::model_path"
        ))
    })?;
    Ok(cache
        .join("u2net-bgremove")
        .join("models")
        .join(MODEL_FILE_NAME))
}

/// Whether the weights file is present at its resolved location
///
/// Callers can use this to prompt for the (out-of-scope) provisioning step
/// before invoking inference.
#[must_use]
pub fn model_is_provisioned(config: &RemovalConfig) -> bool {
    resolve_model_path(config)
        .map(|path| path.is_file())
        .unwrap_or(false)
}
