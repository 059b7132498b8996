//! Bridged session over a hosted Python ONNX runtime
//!
//! On platforms without a native ONNX Runtime build (notably Android),
//! inference crosses into an embedded Python interpreter that hosts the
//! `onnxruntime` package. Tensors are marshaled manually as raw
//! native-endian f32 bytes in both directions. Every Python object created
//! for a call is bound to one GIL scope and released when that scope
//! exits, on success and on error alike; only the interpreter-side session
//! object outlives a call.

use crate::error::{RemovalError, Result};
use crate::inference::InferenceSession;
use log;
use ndarray::{ArrayD, IxDyn};
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyDict, PyList};
use std::path::Path;

/// Session backed by `onnxruntime.InferenceSession` in a hosted interpreter
#[derive(Debug)]
pub struct BridgedSession {
    session: Py<PyAny>,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl BridgedSession {
    /// Whether the hosted interpreter can import `onnxruntime`
    #[must_use]
    pub fn runtime_available() -> bool {
        Python::with_gil(|py| py.import_bound("onnxruntime").is_ok())
    }

    /// Load the network into a hosted-interpreter session
    ///
    /// # Errors
    /// Returns [`RemovalError::Bridge`] when the interpreter cannot import
    /// `onnxruntime` or refuses the model file.
    pub fn from_file(model_path: &Path) -> Result<Self> {
        let path_str = model_path.to_str().ok_or_else(|| {
            RemovalError::bridge(format!(
                "model path {path} is not valid UTF-8",
                path = model_path.display()
            ))
        })?;

        Python::with_gil(|py| -> Result<Self> {
            let runtime = py.import_bound("onnxruntime").map_err(|e| {
                RemovalError::bridge(format!("Failed to import onnxruntime: {e}"))
            })?;

            let kwargs = PyDict::new_bound(py);
            kwargs
                .set_item("providers", PyList::new_bound(py, ["CPUExecutionProvider"]))
                .map_err(|e| RemovalError::bridge(format!("Failed to set providers: {e}")))?;

            let session = runtime
                .call_method("InferenceSession", (path_str,), Some(&kwargs))
                .map_err(|e| {
                    RemovalError::bridge(format!(
                        "Failed to create InferenceSession for {path_str}: {e}"
                    ))
                })?;

            let input_names = node_names(&session, "get_inputs")?;
            let output_names = node_names(&session, "get_outputs")?;
            if output_names.is_empty() {
                return Err(RemovalError::inference("model declares no outputs"));
            }

            log::info!(
                "Bridged session ready: {inputs} input(s), {outputs} output(s)",
                inputs = input_names.len(),
                outputs = output_names.len()
            );

            Ok(Self {
                session: session.unbind(),
                input_names,
                output_names,
            })
        })
    }
}

impl InferenceSession for BridgedSession {
    fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }

    fn run(
        &mut self,
        output_selector: Option<&[String]>,
        bindings: Vec<(String, ArrayD<f32>)>,
    ) -> Result<Vec<ArrayD<f32>>> {
        // One GIL scope for the whole call: the feed dict, input buffers
        // and result arrays are all released when this scope exits
        Python::with_gil(|py| -> Result<Vec<ArrayD<f32>>> {
            let numpy = py
                .import_bound("numpy")
                .map_err(|e| RemovalError::inference(format!("Failed to import numpy: {e}")))?;

            let feed = PyDict::new_bound(py);
            for (name, tensor) in bindings {
                if !self.input_names.contains(&name) {
                    return Err(RemovalError::inference(format!(
                        "unknown input '{name}', model declares {inputs:?}",
                        inputs = self.input_names
                    )));
                }

                let shape = tensor.shape().to_vec();
                let data: Vec<f32> = tensor.iter().copied().collect();
                let raw = floats_to_bytes(&data);

                // numpy's float32 dtype is native-endian, matching to_ne_bytes
                let array = numpy
                    .call_method1("frombuffer", (PyBytes::new_bound(py, &raw), "float32"))
                    .and_then(|flat| flat.call_method1("reshape", (shape,)))
                    .map_err(|e| {
                        RemovalError::inference(format!(
                            "Failed to marshal input '{name}' into the interpreter: {e}"
                        ))
                    })?;
                feed.set_item(name.as_str(), array).map_err(|e| {
                    RemovalError::inference(format!("Failed to bind input '{name}': {e}"))
                })?;
            }

            let selected: Option<Vec<String>> = output_selector.map(<[String]>::to_vec);
            let result = self
                .session
                .bind(py)
                .call_method1("run", (selected, feed))
                .map_err(|e| RemovalError::inference(format!("bridged inference failed: {e}")))?;

            let outputs = result.downcast::<PyList>().map_err(|e| {
                RemovalError::inference(format!("expected a list of output arrays: {e}"))
            })?;

            let mut arrays = Vec::with_capacity(outputs.len());
            for output in outputs.iter() {
                arrays.push(extract_array(&output)?);
            }
            Ok(arrays)
        })
    }
}

/// Read `.name` off every node returned by `get_inputs`/`get_outputs`
fn node_names(session: &Bound<'_, PyAny>, getter: &str) -> Result<Vec<String>> {
    let nodes = session
        .call_method0(getter)
        .map_err(|e| RemovalError::bridge(format!("{getter} failed: {e}")))?;
    let nodes = nodes
        .downcast::<PyList>()
        .map_err(|e| RemovalError::bridge(format!("{getter} did not return a list: {e}")))?;

    let mut names = Vec::with_capacity(nodes.len());
    for node in nodes.iter() {
        let name: String = node
            .getattr("name")
            .and_then(|name| name.extract())
            .map_err(|e| RemovalError::bridge(format!("node has no readable name: {e}")))?;
        names.push(name);
    }
    Ok(names)
}

/// Copy one numpy output array back into an owned tensor
fn extract_array(value: &Bound<'_, PyAny>) -> Result<ArrayD<f32>> {
    let dtype: String = value
        .getattr("dtype")
        .and_then(|dtype| dtype.getattr("name"))
        .and_then(|name| name.extract())
        .map_err(|e| RemovalError::inference(format!("Failed to read output dtype: {e}")))?;
    if dtype != "float32" {
        return Err(RemovalError::inference(format!(
            "expected a float32 output, got {dtype}"
        )));
    }

    let shape: Vec<usize> = value
        .getattr("shape")
        .and_then(|shape| shape.extract())
        .map_err(|e| RemovalError::inference(format!("Failed to read output shape: {e}")))?;
    let raw: Vec<u8> = value
        .call_method0("tobytes")
        .and_then(|bytes| bytes.extract())
        .map_err(|e| RemovalError::inference(format!("Failed to read output bytes: {e}")))?;

    let data = bytes_to_floats(&raw)?;
    ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(|e| {
        RemovalError::inference(format!("output buffer does not match shape {shape:?}: {e}"))
    })
}

fn floats_to_bytes(values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for value in values {
        bytes.extend_from_slice(&value.to_ne_bytes());
    }
    bytes
}

fn bytes_to_floats(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(RemovalError::inference(format!(
            "raw tensor buffer length {len} is not a multiple of 4",
            len = bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
