//! Test utilities and mock sessions for testing inference functionality
//!
//! This module provides a mock implementation of the [`InferenceSession`]
//! trait so the pipeline can be tested without model files or an ONNX
//! runtime, plus a mock session factory for driving the provider through
//! failure and retry scenarios.

use crate::{
    config::{BackendKind, RemovalConfig},
    error::{RemovalError, Result},
    inference::InferenceSession,
    session::BackendFactory,
};
use ndarray::ArrayD;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// What a mock session answers with
#[derive(Debug, Clone, Copy)]
enum MockResponse {
    /// Every output value is this constant
    Constant(f32),
    /// A soft circular mask centered in the map
    CenteredDisc,
    /// Every call fails
    Failing,
}

/// Mock session with u2net-shaped declared inputs and outputs
#[derive(Debug, Clone)]
pub struct MockSession {
    input_names: Vec<String>,
    output_names: Vec<String>,
    response: MockResponse,
    /// Selector history for verification in tests
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockSession {
    fn with_response(response: MockResponse) -> Self {
        Self {
            input_names: vec!["input.1".to_string()],
            output_names: (1959..1966).map(|n| n.to_string()).collect(),
            response,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Session whose outputs are uniformly `value`
    #[must_use]
    pub fn constant(value: f32) -> Self {
        Self::with_response(MockResponse::Constant(value))
    }

    /// Session that answers with a soft circular saliency map
    #[must_use]
    pub fn centered_disc() -> Self {
        Self::with_response(MockResponse::CenteredDisc)
    }

    /// Session whose every call fails
    #[must_use]
    pub fn failing() -> Self {
        Self::with_response(MockResponse::Failing)
    }

    /// The selectors passed to `run`, one entry per call
    pub fn run_log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn generate_output(&self) -> ArrayD<f32> {
        let size = 320_usize;
        let mut output = ArrayD::zeros(ndarray::IxDyn(&[1, 1, size, size]));
        match self.response {
            MockResponse::Constant(value) => output.fill(value),
            MockResponse::CenteredDisc => {
                let center = size as f32 / 2.0;
                let radius = size as f32 / 3.0;
                for y in 0..size {
                    for x in 0..size {
                        let dx = x as f32 - center;
                        let dy = y as f32 - center;
                        let distance = (dx * dx + dy * dy).sqrt();
                        if distance < radius {
                            output[[0, 0, y, x]] = ((radius - distance) / radius).clamp(0.0, 1.0);
                        }
                    }
                }
            },
            MockResponse::Failing => {},
        }
        output
    }
}

impl InferenceSession for MockSession {
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
        let selected: Vec<String> =
            output_selector.map_or_else(|| self.output_names.clone(), <[String]>::to_vec);
        self.calls.lock().unwrap().push(selected.join(","));

        if matches!(self.response, MockResponse::Failing) {
            return Err(RemovalError::inference("mock session inference failed"));
        }

        // Validate the call the way a real runtime would
        for (name, tensor) in &bindings {
            if !self.input_names.contains(name) {
                return Err(RemovalError::inference(format!("unknown input '{name}'")));
            }
            if tensor.ndim() != 4 {
                return Err(RemovalError::inference(
                    "input tensor must be 4-dimensional (NCHW)",
                ));
            }
        }
        for name in &selected {
            if !self.output_names.contains(name) {
                return Err(RemovalError::inference(format!("unknown output '{name}'")));
            }
        }

        Ok(selected.iter().map(|_| self.generate_output()).collect())
    }
}

/// Test factory producing mock sessions
///
/// Clones share their counters, so a cloned handle can observe creations
/// made through a factory that was moved into a provider.
#[derive(Debug, Clone)]
pub struct MockFactory {
    response: MockResponse,
    /// Creations left to refuse before succeeding
    failures_remaining: Arc<Mutex<u32>>,
    created: Arc<Mutex<u32>>,
}

impl MockFactory {
    /// Factory producing disc-mask sessions
    #[must_use]
    pub fn new() -> Self {
        Self {
            response: MockResponse::CenteredDisc,
            failures_remaining: Arc::new(Mutex::new(0)),
            created: Arc::new(Mutex::new(0)),
        }
    }

    /// Factory producing constant-output sessions
    #[must_use]
    pub fn constant(value: f32) -> Self {
        Self {
            response: MockResponse::Constant(value),
            ..Self::new()
        }
    }

    /// Factory producing sessions that fail every inference call
    #[must_use]
    pub fn failing_inference() -> Self {
        Self {
            response: MockResponse::Failing,
            ..Self::new()
        }
    }

    /// Factory that refuses the first `attempts` creations, then succeeds
    #[must_use]
    pub fn failing_creation(attempts: u32) -> Self {
        Self {
            failures_remaining: Arc::new(Mutex::new(attempts)),
            ..Self::new()
        }
    }

    /// How many sessions this factory has successfully created
    pub fn sessions_created(&self) -> u32 {
        *self.created.lock().unwrap()
    }
}

impl Default for MockFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendFactory for MockFactory {
    fn create(
        &self,
        _backend: BackendKind,
        _model_path: &Path,
        _config: &RemovalConfig,
    ) -> Result<Box<dyn InferenceSession>> {
        let mut failures = self.failures_remaining.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(RemovalError::inference(
                "mock factory refused to create a session",
            ));
        }
        drop(failures);

        *self.created.lock().unwrap() += 1;
        Ok(Box::new(MockSession::with_response(self.response)))
    }
}

/// Helper functions for creating test images
pub mod test_helpers {
    use image::{DynamicImage, ImageBuffer, Rgb};

    /// Create a gradient test image with the given dimensions
    pub fn create_test_image(width: u32, height: u32) -> DynamicImage {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            let r = ((x as f32 / width as f32) * 255.0) as u8;
            let g = ((y as f32 / height as f32) * 255.0) as u8;
            Rgb([r, g, 128])
        });
        DynamicImage::ImageRgb8(img)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn input_binding() -> Vec<(String, ArrayD<f32>)> {
        vec![(
            "input.1".to_string(),
            ArrayD::zeros(IxDyn(&[1, 3, 320, 320])),
        )]
    }

    #[test]
    fn mock_session_produces_one_array_per_selected_output() {
        let mut session = MockSession::centered_disc();
        let selector = vec!["1959".to_string()];

        let outputs = session.run(Some(&selector), input_binding()).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].shape(), &[1, 1, 320, 320]);

        // Disc pattern: opaque center, transparent corners
        assert!(outputs[0][[0, 0, 160, 160]] > 0.9);
        assert!(outputs[0][[0, 0, 0, 0]] < 1e-6);
    }

    #[test]
    fn mock_session_rejects_unknown_names() {
        let mut session = MockSession::constant(1.0);

        let bad_input = vec![(
            "not-an-input".to_string(),
            ArrayD::zeros(IxDyn(&[1, 3, 320, 320])),
        )];
        assert!(session.run(None, bad_input).is_err());

        let bad_selector = vec!["not-an-output".to_string()];
        assert!(session.run(Some(&bad_selector), input_binding()).is_err());
    }

    #[test]
    fn failing_session_fails_every_call() {
        let mut session = MockSession::failing();
        assert!(session.run(None, input_binding()).is_err());
        assert!(session.run(None, input_binding()).is_err());
        assert_eq!(session.run_log().len(), 2);
    }

    #[test]
    fn failing_creation_factory_recovers_after_the_configured_attempts() {
        let factory = MockFactory::failing_creation(1);
        let config = RemovalConfig::default();
        let path = Path::new("unused.onnx");

        assert!(factory.create(BackendKind::Native, path, &config).is_err());
        assert_eq!(factory.sessions_created(), 0);

        assert!(factory.create(BackendKind::Native, path, &config).is_ok());
        assert_eq!(factory.sessions_created(), 1);
    }
}
