//! Backend implementations for different inference engines
//!
//! This module provides the session backends for the background removal
//! library:
//! - Native backend (in-process ONNX Runtime, GPU acceleration)
//! - Bridged backend (hosted Python interpreter, for platforms without a
//!   native runtime build)

#[cfg(feature = "onnx")]
pub mod native;

#[cfg(feature = "bridged")]
pub mod bridged;

// Test utilities for backend testing
#[cfg(test)]
pub mod test_utils;

// Re-export backends based on enabled features
#[cfg(feature = "onnx")]
pub use self::native::NativeSession;

#[cfg(feature = "bridged")]
pub use self::bridged::BridgedSession;
