//! Inference session abstraction

use crate::error::Result;
use ndarray::ArrayD;

/// Trait for loaded network sessions
///
/// A session is constructed with its weights already loaded, so an existing
/// value is always ready to run. Calls borrow the session mutably and the
/// provider serializes access behind a lock. A failed call reports
/// [`RemovalError::Inference`](crate::error::RemovalError::Inference) and
/// leaves the session usable for the next call.
pub trait InferenceSession: Send + std::fmt::Debug {
    /// Names of the network's declared inputs, in declaration order
    fn input_names(&self) -> &[String];

    /// Names of the network's declared outputs, in declaration order
    fn output_names(&self) -> &[String];

    /// Run one inference call
    ///
    /// `bindings` pairs each input name with its tensor. When
    /// `output_selector` is given, only the named outputs are computed and
    /// returned, in selector order; otherwise every declared output is
    /// returned in declaration order.
    ///
    /// # Errors
    /// - Unknown input or output names
    /// - Model inference failures
    /// - Tensor conversion or marshaling errors
    fn run(
        &mut self,
        output_selector: Option<&[String]>,
        bindings: Vec<(String, ArrayD<f32>)>,
    ) -> Result<Vec<ArrayD<f32>>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockSession;
    use ndarray::IxDyn;

    #[test]
    fn sessions_are_usable_as_trait_objects() {
        let mut session: Box<dyn InferenceSession> = Box::new(MockSession::constant(0.5));

        assert_eq!(session.input_names(), ["input.1"]);
        assert_eq!(session.output_names().len(), 7);

        let input = ArrayD::zeros(IxDyn(&[1, 3, 320, 320]));
        let outputs = session
            .run(None, vec![("input.1".to_string(), input)])
            .unwrap();
        assert_eq!(outputs.len(), 7);
    }

    #[test]
    fn selector_restricts_and_orders_the_outputs() {
        let mut session = MockSession::constant(0.5);
        let selector = vec!["1959".to_string(), "1963".to_string()];

        let input = ArrayD::zeros(IxDyn(&[1, 3, 320, 320]));
        let outputs = session
            .run(Some(&selector), vec![("input.1".to_string(), input)])
            .unwrap();

        assert_eq!(outputs.len(), 2);
        assert_eq!(session.run_log(), ["1959,1963"]);
    }
}
