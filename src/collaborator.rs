//! # Collaborator Interfaces
//!
//! Narrow interfaces to the external services the dispatch core calls into:
//! the compiled-model provider, the execution-plan generator, the plan
//! executor / test runner, and the engine server used for service
//! registration. Each is a trait so tests can substitute mocks; the engine
//! server ships with an HTTP implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cancellation::CancellationToken;
use crate::config::{EngineServerConfig, PlatformConfig};
use crate::execution::SingleExecutionSpec;
use crate::model::{CompileResult, CompiledModel, Construct, Section, ServiceDef};

#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("engine server request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("engine server is not configured")]
    EngineServerNotConfigured,
    #[error("plan generation failed: {message}")]
    PlanGeneration { message: String },
    #[error("plan execution failed: {message}")]
    PlanExecution { message: String },
    #[error("test run failed: {message}")]
    TestRun { message: String },
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Target platform for generated execution plans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanPlatform {
    #[default]
    Native,
    Interpreted,
}

/// Executable plan artifact. Opaque to the core: produced by the generator,
/// consumed by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub id: String,
    pub payload: serde_json::Value,
}

/// Engine-level outcome code reported by the test runner for one assertion.
/// `Other` preserves codes this core does not recognize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineOutcome {
    Success,
    Failure,
    Error,
    Other(String),
}

impl std::fmt::Display for EngineOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineOutcome::Success => write!(f, "SUCCESS"),
            EngineOutcome::Failure => write!(f, "FAILURE"),
            EngineOutcome::Error => write!(f, "ERROR"),
            EngineOutcome::Other(code) => write!(f, "{}", code),
        }
    }
}

/// Outcome of one assertion, with the rendered captured exception when the
/// engine reported one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionOutcome {
    pub name: String,
    pub outcome: EngineOutcome,
    pub failure: Option<String>,
}

/// One test run reported by the runner: assertion outcomes in declaration
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRun {
    pub outcomes: Vec<AssertionOutcome>,
}

/// Origin metadata attached to a registration payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationOrigin {
    pub serializer_name: String,
    pub serializer_version: String,
    pub base_version: String,
    pub version: String,
    pub service_path: String,
}

/// Serialized project/model payload posted to the engine server when
/// registering a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationPayload {
    pub origin: RegistrationOrigin,
    pub constructs: Vec<Construct>,
}

/// Provides the parse/compile artifacts for a section. The result encodes
/// compile failure explicitly; the provider itself does not fail.
#[mockall::automock]
pub trait ModelProvider: Send + Sync {
    fn compile(&self, section: &Section) -> Arc<CompileResult>;
}

/// Generates an executable plan from a resolved execution specification.
#[mockall::automock]
pub trait PlanGenerator: Send + Sync {
    fn generate(
        &self,
        spec: &SingleExecutionSpec,
        model: &CompiledModel,
        platform: PlanPlatform,
        extensions: &PlatformConfig,
    ) -> CollaboratorResult<ExecutionPlan>;
}

/// Executes plans and runs declared tests, reporting per-assertion
/// engine-level outcomes and captured exceptions.
#[mockall::automock]
#[async_trait]
pub trait PlanExecutor: Send + Sync {
    async fn execute<'a>(
        &self,
        plan: &ExecutionPlan,
        params: &HashMap<String, serde_json::Value>,
        token: Option<&'a CancellationToken>,
    ) -> CollaboratorResult<serde_json::Value>;

    /// Runs the service's declared (new-style) test suites.
    async fn run_tests(
        &self,
        service: &ServiceDef,
        model: &CompiledModel,
        extensions: &PlatformConfig,
    ) -> CollaboratorResult<Vec<TestRun>>;

    /// Runs the service's embedded legacy test block.
    async fn run_legacy_tests(
        &self,
        service: &ServiceDef,
        model: &CompiledModel,
        extensions: &PlatformConfig,
    ) -> CollaboratorResult<Vec<TestRun>>;
}

/// Accepts a serialized model payload and returns the engine's textual
/// registration response, structured or plain.
#[mockall::automock]
#[async_trait]
pub trait EngineServerClient: Send + Sync {
    async fn register(&self, payload: &RegistrationPayload) -> CollaboratorResult<String>;
}

const REGISTER_ENDPOINT: &str = "/api/service/v1/register";

/// Engine server client backed by reqwest.
pub struct HttpEngineServerClient {
    client: reqwest::Client,
    config: EngineServerConfig,
}

impl HttpEngineServerClient {
    pub fn new(config: EngineServerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl EngineServerClient for HttpEngineServerClient {
    async fn register(&self, payload: &RegistrationPayload) -> CollaboratorResult<String> {
        let url = format!(
            "{}{}",
            self.config.url.trim_end_matches('/'),
            REGISTER_ENDPOINT
        );
        let response = self
            .client
            .post(&url)
            .timeout(self.config.request_timeout)
            .json(payload)
            .send()
            .await?;
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_registration_payload_shape() {
        let payload = RegistrationPayload {
            origin: RegistrationOrigin {
                serializer_name: "mdsl".to_string(),
                serializer_version: "v1".to_string(),
                base_version: "latest".to_string(),
                version: "none".to_string(),
                service_path: "model::MyService".to_string(),
            },
            constructs: vec![],
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["origin"]["service_path"], "model::MyService");
        assert_eq!(json["constructs"], serde_json::json!([]));
    }

    #[test]
    fn test_engine_outcome_preserves_unknown_codes() {
        let outcome: EngineOutcome =
            serde_json::from_value(serde_json::json!({"Other": "SKIPPED"})).unwrap();
        assert_eq!(outcome, EngineOutcome::Other("SKIPPED".to_string()));
    }
}
