//! Shared fixtures for the integration suites.

#![allow(dead_code)] // each test binary uses a subset

use std::sync::Arc;

use async_trait::async_trait;

use palisade::audit::AuditLog;
use palisade::config::PolicyStore;
use palisade::gateway::ScanGateway;
use palisade::generate::{GeneratorError, TextGenerator};

/// Generator double returning one fixed completion.
pub struct FixedGenerator(pub &'static str);

#[async_trait]
impl TextGenerator for FixedGenerator {
    async fn generate(&self, _prompt: &str, _model: &str) -> Result<String, GeneratorError> {
        Ok(self.0.to_owned())
    }
}

/// Generator double that panics if reached.
pub struct UnreachableGenerator;

#[async_trait]
impl TextGenerator for UnreachableGenerator {
    async fn generate(&self, _prompt: &str, _model: &str) -> Result<String, GeneratorError> {
        panic!("generator must not be invoked for this request");
    }
}

/// Generator double that never completes (for cancellation tests).
pub struct PendingGenerator;

#[async_trait]
impl TextGenerator for PendingGenerator {
    async fn generate(&self, _prompt: &str, _model: &str) -> Result<String, GeneratorError> {
        std::future::pending::<()>().await;
        unreachable!()
    }
}

/// Generator double that always fails with the given category.
pub struct FailingGenerator(pub fn() -> GeneratorError);

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str, _model: &str) -> Result<String, GeneratorError> {
        Err((self.0)())
    }
}

/// A gateway over fresh shared state and the given generator.
pub fn gateway_with(generator: Arc<dyn TextGenerator>) -> ScanGateway {
    ScanGateway::builder(generator)
        .policy(Arc::new(PolicyStore::new()))
        .audit(Arc::new(AuditLog::in_memory()))
        .build()
        .expect("gateway should build")
}
