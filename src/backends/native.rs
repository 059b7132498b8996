//! Native ONNX Runtime session implementation
//!
//! Runs the segmentation network in process through ONNX Runtime, with
//! support for multiple execution providers (CPU, CUDA, CoreML). The
//! session is built eagerly from the model file, so a constructed value is
//! always ready to answer inference calls.

use crate::config::{ExecutionProvider, RemovalConfig};
use crate::error::Result;
use crate::inference::InferenceSession;
use log;
use ndarray::ArrayD;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::{self, value::Value};
use std::path::Path;

/// In-process ONNX Runtime session for the segmentation network
#[derive(Debug)]
pub struct NativeSession {
    session: Session,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl NativeSession {
    /// Build a ready-to-run session from an ONNX model file
    ///
    /// Execution providers follow `config.execution_provider`; a requested
    /// provider that is not available on this machine falls back to CPU
    /// with a warning rather than failing the load.
    ///
    /// # Errors
    /// Returns [`RemovalError::Inference`](crate::error::RemovalError::Inference)
    /// when the runtime rejects the model file or the session cannot be
    /// configured.
    pub fn from_file(model_path: &Path, config: &RemovalConfig) -> Result<Self> {
        let load_start = std::time::Instant::now();

        let mut session_builder = Session::builder()
            .map_err(|e| {
                crate::error::RemovalError::inference(format!(
                    "Failed to create session builder: {e}"
                ))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                crate::error::RemovalError::inference(format!(
                    "Failed to set optimization level: {e}"
                ))
            })?;

        // Configure execution providers with availability checking
        session_builder = match config.execution_provider {
            ExecutionProvider::Auto => {
                // Auto-detect: try CUDA > CoreML > CPU
                let mut providers = Vec::new();

                let cuda_provider = CUDAExecutionProvider::default();
                if OrtExecutionProvider::is_available(&cuda_provider).unwrap_or(false) {
                    log::info!("🚀 CUDA execution provider is available and will be used");
                    providers.push(cuda_provider.build());
                } else {
                    log::debug!("CUDA execution provider is not available");
                }

                let coreml_available =
                    OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                        .unwrap_or(false);
                if coreml_available {
                    log::info!("🍎 CoreML execution provider is available and will be used");
                    providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
                } else {
                    log::debug!("CoreML execution provider is not available");
                }

                if providers.is_empty() {
                    log::info!("No hardware acceleration available, using CPU");
                    session_builder
                } else {
                    session_builder
                        .with_execution_providers(providers)
                        .map_err(|e| {
                            crate::error::RemovalError::inference(format!(
                                "Failed to set auto execution providers: {e}"
                            ))
                        })?
                }
            },
            ExecutionProvider::Cpu => {
                log::info!("Using CPU execution provider");
                session_builder
            },
            ExecutionProvider::Cuda => {
                let cuda_provider = CUDAExecutionProvider::default();
                if OrtExecutionProvider::is_available(&cuda_provider).unwrap_or(false) {
                    log::info!("Using CUDA execution provider");
                    session_builder
                        .with_execution_providers([cuda_provider.build()])
                        .map_err(|e| {
                            crate::error::RemovalError::inference(format!(
                                "Failed to set CUDA execution provider: {e}"
                            ))
                        })?
                } else {
                    log::warn!(
                        "CUDA execution provider requested but not available, falling back to CPU"
                    );
                    session_builder
                }
            },
            ExecutionProvider::CoreMl => {
                let coreml_provider = CoreMLExecutionProvider::default();
                if OrtExecutionProvider::is_available(&coreml_provider).unwrap_or(false) {
                    log::info!("🍎 Using CoreML execution provider");
                    session_builder
                        .with_execution_providers([CoreMLExecutionProvider::default()
                            .with_subgraphs(true)
                            .build()])
                        .map_err(|e| {
                            crate::error::RemovalError::inference(format!(
                                "Failed to set CoreML execution provider: {e}"
                            ))
                        })?
                } else {
                    log::warn!(
                        "CoreML execution provider requested but not available, falling back to CPU"
                    );
                    session_builder
                }
            },
        };

        // Calculate optimal threading if auto-detect (0)
        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            // All cores for compute-heavy operator kernels
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(8)
        };

        let inter_threads = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            // Fewer threads for cross-operator coordination
            (std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(8)
                / 4)
            .max(1)
        };

        let session = session_builder
            .with_parallel_execution(true)
            .map_err(|e| {
                crate::error::RemovalError::inference(format!(
                    "Failed to enable parallel execution: {e}"
                ))
            })?
            .with_intra_threads(intra_threads)
            .map_err(|e| {
                crate::error::RemovalError::inference(format!("Failed to set intra threads: {e}"))
            })?
            .with_inter_threads(inter_threads)
            .map_err(|e| {
                crate::error::RemovalError::inference(format!("Failed to set inter threads: {e}"))
            })?
            .commit_from_file(model_path)
            .map_err(|e| {
                crate::error::RemovalError::inference(format!(
                    "Failed to load model from {path}: {e}",
                    path = model_path.display()
                ))
            })?;

        let input_names: Vec<String> = session
            .inputs
            .iter()
            .map(|input| input.name.clone())
            .collect();
        let output_names: Vec<String> = session
            .outputs
            .iter()
            .map(|output| output.name.clone())
            .collect();

        if input_names.len() != 1 {
            return Err(crate::error::RemovalError::inference(format!(
                "expected a single-input segmentation network, model declares {count} inputs",
                count = input_names.len()
            )));
        }
        if output_names.is_empty() {
            return Err(crate::error::RemovalError::inference(
                "model declares no outputs",
            ));
        }

        log::debug!("✅ ONNX Runtime session created successfully");
        log::debug!("  - Requested provider: {:?}", config.execution_provider);
        log::debug!(
            "  - Threading: {intra_threads} intra-op threads, {inter_threads} inter-op threads"
        );
        log::debug!("  - Inputs: {input_names:?}, outputs: {output_names:?}");
        log::info!(
            "📊 Model loading complete: {:.0}ms",
            load_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Self {
            session,
            input_names,
            output_names,
        })
    }
}

impl InferenceSession for NativeSession {
    fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }

    fn run(
        &mut self,
        output_selector: Option<&[String]>,
        mut bindings: Vec<(String, ArrayD<f32>)>,
    ) -> Result<Vec<ArrayD<f32>>> {
        use std::time::Instant;

        if bindings.len() != 1 {
            return Err(crate::error::RemovalError::inference(format!(
                "expected exactly one input binding for a single-input network, got {count}",
                count = bindings.len()
            )));
        }
        let (name, tensor) = bindings.remove(0);
        if !self.input_names.contains(&name) {
            return Err(crate::error::RemovalError::inference(format!(
                "unknown input '{name}', model declares {inputs:?}",
                inputs = self.input_names
            )));
        }

        let inference_start = Instant::now();
        log::debug!("🚀 Starting inference with input shape: {:?}", tensor.shape());

        let input_value = Value::from_array(tensor).map_err(|e| {
            crate::error::RemovalError::inference(format!("Failed to convert input tensor: {e}"))
        })?;

        let outputs = self
            .session
            .run(ort::inputs![name.as_str() => input_value])
            .map_err(|e| {
                crate::error::RemovalError::inference(format!("ONNX inference failed: {e}"))
            })?;

        let selected: Vec<String> = match output_selector {
            Some(names) => names.to_vec(),
            None => self.output_names.clone(),
        };

        let mut results = Vec::with_capacity(selected.len());
        for output_name in &selected {
            let value = outputs.get(output_name.as_str()).ok_or_else(|| {
                crate::error::RemovalError::inference(format!(
                    "no output named '{output_name}' in the inference results"
                ))
            })?;
            let array: ArrayD<f32> = value
                .try_extract_array::<f32>()
                .map_err(|e| {
                    crate::error::RemovalError::inference(format!(
                        "Failed to extract output '{output_name}': {e}"
                    ))
                })?
                .to_owned();
            results.push(array);
        }

        log::debug!(
            "⚡ Inference complete: {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_a_missing_model_file_reports_the_path() {
        let config = RemovalConfig::default();
        let err = NativeSession::from_file(Path::new("/nonexistent/u2net.onnx"), &config)
            .unwrap_err();
        assert!(err.to_string().contains("u2net.onnx"));
    }
}
