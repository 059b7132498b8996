//! Session provisioning and caching
//!
//! [`SessionProvider`] resolves which backend to use for this platform,
//! checks that the model weights are provisioned, and creates the session
//! lazily on first use. A successful creation is cached for the life of
//! the provider; a failed creation caches nothing, so a later call starts
//! over with a fresh attempt (for example after the weights file appears).

use crate::config::{BackendKind, RemovalConfig};
use crate::error::{RemovalError, Result};
use crate::inference::InferenceSession;
use crate::models;
use log;
use once_cell::sync::OnceCell;
use std::path::Path;
use std::sync::Mutex;

/// Factory trait for creating inference sessions
pub trait BackendFactory: Send + Sync {
    /// Create a ready-to-run session of the given backend kind
    ///
    /// `backend` is already resolved; `Auto` never reaches a factory.
    ///
    /// # Errors
    ///
    /// Returns `RemovalError` for:
    /// - Backends compiled out of this build
    /// - Runtime or interpreter initialization failures
    /// - Model files the runtime rejects
    fn create(
        &self,
        backend: BackendKind,
        model_path: &Path,
        config: &RemovalConfig,
    ) -> Result<Box<dyn InferenceSession>>;
}

/// Default backend factory producing the crate's real backends
#[derive(Debug, Default)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create(
        &self,
        backend: BackendKind,
        model_path: &Path,
        config: &RemovalConfig,
    ) -> Result<Box<dyn InferenceSession>> {
        log::debug!(
            "creating {backend} session (execution provider: {provider})",
            provider = config.execution_provider
        );

        match backend {
            BackendKind::Auto => Err(RemovalError::internal(
                "Auto backend must be resolved before session creation",
            )),
            #[cfg(feature = "onnx")]
            BackendKind::Native => Ok(Box::new(crate::backends::NativeSession::from_file(
                model_path, config,
            )?)),
            #[cfg(not(feature = "onnx"))]
            BackendKind::Native => Err(RemovalError::invalid_config(format!(
                "native backend requested for {path} but the `onnx` feature is disabled",
                path = model_path.display()
            ))),
            #[cfg(feature = "bridged")]
            BackendKind::Bridged => Ok(Box::new(crate::backends::BridgedSession::from_file(
                model_path,
            )?)),
            #[cfg(not(feature = "bridged"))]
            BackendKind::Bridged => Err(RemovalError::invalid_config(format!(
                "bridged backend requested for {path} but the `bridged` feature is disabled",
                path = model_path.display()
            ))),
        }
    }
}

/// Resolve `Auto` to the concrete backend for this platform
///
/// A pure platform mapping: Android gets the bridged interpreter runtime,
/// every other platform the native runtime. Explicit choices pass through
/// untouched.
#[must_use]
pub fn resolve_backend(requested: BackendKind) -> BackendKind {
    match requested {
        BackendKind::Auto => {
            if cfg!(target_os = "android") {
                BackendKind::Bridged
            } else {
                BackendKind::Native
            }
        },
        explicit => explicit,
    }
}

/// Lazily-created, cached inference session
pub struct SessionProvider {
    config: RemovalConfig,
    backend: BackendKind,
    factory: Box<dyn BackendFactory>,
    session: OnceCell<Mutex<Box<dyn InferenceSession>>>,
}

impl SessionProvider {
    /// Provider using the crate's real backends
    #[must_use]
    pub fn new(config: RemovalConfig) -> Self {
        Self::with_factory(config, Box::new(DefaultBackendFactory))
    }

    /// Provider with an injected session factory, for testing
    #[must_use]
    pub fn with_factory(config: RemovalConfig, factory: Box<dyn BackendFactory>) -> Self {
        let backend = resolve_backend(config.backend);
        Self {
            config,
            backend,
            factory,
            session: OnceCell::new(),
        }
    }

    /// The concrete backend this provider resolved for the platform
    #[must_use]
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Whether a session has been created and cached
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.session.get().is_some()
    }

    /// Get the session, creating and caching it on first use
    ///
    /// Creation checks that the weights file is provisioned before handing
    /// it to the backend. Concurrent first calls race safely: exactly one
    /// wins and every caller sees the same session.
    ///
    /// # Errors
    /// Returns [`RemovalError::ModelNotFound`] naming the expected weights
    /// path when the model is not provisioned; backend creation errors
    /// pass through. No error is cached, so the next call retries.
    pub fn session(&self) -> Result<&Mutex<Box<dyn InferenceSession>>> {
        self.session.get_or_try_init(|| {
            let model_path = models::resolve_model_path(&self.config)?;
            if !model_path.is_file() {
                log::warn!(
                    "model weights not provisioned at {path}",
                    path = model_path.display()
                );
                return Err(RemovalError::model_not_found(model_path));
            }

            log::info!(
                "creating {backend} inference session from {path}",
                backend = self.backend,
                path = model_path.display()
            );
            let session = self.factory.create(self.backend, &model_path, &self.config)?;
            Ok(Mutex::new(session))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockFactory;
    use tempfile::TempDir;

    fn provisioned_config(dir: &TempDir) -> RemovalConfig {
        let model_path = dir.path().join("u2net.onnx");
        std::fs::write(&model_path, b"weights").unwrap();
        RemovalConfig::builder().model_path(model_path).build().unwrap()
    }

    #[test]
    fn auto_resolves_to_a_concrete_backend() {
        let resolved = resolve_backend(BackendKind::Auto);
        assert_ne!(resolved, BackendKind::Auto);
        if cfg!(target_os = "android") {
            assert_eq!(resolved, BackendKind::Bridged);
        } else {
            assert_eq!(resolved, BackendKind::Native);
        }
    }

    #[test]
    fn explicit_backend_choices_pass_through() {
        assert_eq!(
            resolve_backend(BackendKind::Native),
            BackendKind::Native
        );
        assert_eq!(
            resolve_backend(BackendKind::Bridged),
            BackendKind::Bridged
        );
    }

    #[test]
    fn a_session_is_created_once_and_cached() {
        let dir = TempDir::new().unwrap();
        let factory = MockFactory::new();
        let handle = factory.clone();

        let provider =
            SessionProvider::with_factory(provisioned_config(&dir), Box::new(factory));
        assert!(!provider.is_initialized());

        let first = provider.session().unwrap();
        assert!(provider.is_initialized());
        let second = provider.session().unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(handle.sessions_created(), 1);
    }

    #[test]
    fn missing_weights_report_the_expected_path() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("u2net.onnx");
        let config = RemovalConfig::builder().model_path(&missing).build().unwrap();

        let provider = SessionProvider::with_factory(config, Box::new(MockFactory::new()));
        let err = provider.session().unwrap_err();

        assert!(err.is_model_not_found());
        assert_eq!(err.expected_model_path(), Some(missing.as_path()));
        assert!(!provider.is_initialized());
    }

    #[test]
    fn a_failed_creation_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let factory = MockFactory::failing_creation(1);
        let provider = SessionProvider::with_factory(provisioned_config(&dir), Box::new(factory));

        assert!(provider.session().is_err());
        assert!(!provider.is_initialized());

        // The same provider recovers on the next call
        assert!(provider.session().is_ok());
        assert!(provider.is_initialized());
    }

    #[test]
    fn weights_appearing_after_a_failure_are_picked_up() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join("u2net.onnx");
        let config = RemovalConfig::builder().model_path(&model_path).build().unwrap();
        let provider = SessionProvider::with_factory(config, Box::new(MockFactory::new()));

        assert!(provider.session().unwrap_err().is_model_not_found());

        std::fs::write(&model_path, b"weights").unwrap();
        assert!(provider.session().is_ok());
    }
}
