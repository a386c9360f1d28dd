//! # Feature Dispatch
//!
//! [`FeatureDispatcher`] is the input boundary of the core: the transport
//! layer hands it sections and intents, and gets back ordered execution
//! results or reference resolvers, never anything else and never a
//! propagated error. It owns the compile cache (one immutable compiled
//! snapshot shared by all concurrent requests against a section), wires the
//! collaborators together, and hosts the dispatch boundary that converts any
//! internal failure into a single ERROR result.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::cancellation::CancellationToken;
use crate::collaborator::{
    CollaboratorError, EngineServerClient, HttpEngineServerClient, ModelProvider, PlanExecutor,
    PlanGenerator, RegistrationOrigin, RegistrationPayload,
};
use crate::command::{
    collect_service_commands, Command, CommandError, EXECUTE_FUNCTION_COMMAND_ID,
    REGISTER_SERVICE_COMMAND_ID, RUN_LEGACY_TESTS_COMMAND_ID,
};
use crate::completion::{self, Completion};
use crate::config::ServerConfig;
use crate::execution::generate_plan;
use crate::model::{CompileResult, ConstructSupport, Section, ServiceDef};
use crate::reference::{service_references, ReferenceStream};
use crate::result::{ExecutionResult, ResultType};
use crate::testing;
use crate::text::TextPosition;
use crate::{Error, InternalResult};

/// Serializer identity attached to registration payloads.
const SERIALIZER_NAME: &str = "mdsl";
const SERIALIZER_VERSION: &str = "v1";

/// A tabular-data query forwarded to the plan executor. Opaque to the core
/// beyond its serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TdsQuery {
    pub columns: Vec<String>,
    pub filters: Vec<TdsFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TdsFilter {
    pub column: String,
    pub operation: String,
    pub value: serde_json::Value,
}

pub struct FeatureDispatcher {
    config: ServerConfig,
    model_provider: Arc<dyn ModelProvider>,
    plan_generator: Arc<dyn PlanGenerator>,
    plan_executor: Arc<dyn PlanExecutor>,
    engine_client: Option<Arc<dyn EngineServerClient>>,
    compile_cache: DashMap<String, Arc<CompileResult>>,
}

impl FeatureDispatcher {
    /// Wires the dispatcher from config and collaborators. The engine client
    /// is created only when the config declares an engine server; its
    /// absence removes the register command from discovery.
    pub fn new(
        config: ServerConfig,
        model_provider: Arc<dyn ModelProvider>,
        plan_generator: Arc<dyn PlanGenerator>,
        plan_executor: Arc<dyn PlanExecutor>,
    ) -> Self {
        let engine_client = config.engine_server.clone().map(|engine_config| {
            Arc::new(HttpEngineServerClient::new(engine_config)) as Arc<dyn EngineServerClient>
        });
        Self {
            config,
            model_provider,
            plan_generator,
            plan_executor,
            engine_client,
            compile_cache: DashMap::new(),
        }
    }

    /// Replaces the engine client, e.g. with a mock. Configuring a client
    /// this way also enables the register command.
    pub fn with_engine_client(mut self, client: Arc<dyn EngineServerClient>) -> Self {
        self.engine_client = Some(client);
        self
    }

    pub fn keywords(&self) -> &'static [&'static str] {
        &completion::KEYWORDS
    }

    /// Compiled form of the section, shared across concurrent requests.
    /// Compilation is collaborator work and may block, so it runs on a
    /// blocking worker rather than the request-acceptance path. Racing
    /// requests may compile the same section twice; the cache insert is
    /// idempotent.
    async fn compile(&self, section: &Section) -> InternalResult<Arc<CompileResult>> {
        if let Some(cached) = self.compile_cache.get(&section.document_id) {
            return Ok(cached.clone());
        }
        let provider = self.model_provider.clone();
        let owned = section.clone();
        let compiled = tokio::task::spawn_blocking(move || provider.compile(&owned))
            .await
            .map_err(|e| Error::internal(format!("compile task failed: {}", e)))?;
        self.compile_cache
            .insert(section.document_id.clone(), compiled.clone());
        Ok(compiled)
    }

    /// Drops the cached compiled form for a document. Called by the
    /// transport layer on document change.
    pub fn invalidate(&self, document_id: &str) {
        self.compile_cache.remove(document_id);
    }

    /// The ordered set of commands currently valid for the section's
    /// constructs.
    #[instrument(skip(self, section), fields(document_id = %section.document_id))]
    pub async fn collect_commands(&self, section: &Section) -> Vec<Command> {
        let compile = match self.compile(section).await {
            Ok(compile) => compile,
            Err(e) => {
                warn!(error = %e, "command discovery aborted");
                return vec![];
            }
        };
        let engine_configured = self.engine_client.is_some();
        let mut commands = Vec::new();
        for construct in compile.parse().constructs() {
            if let Some(service) = construct.as_service() {
                collect_service_commands(service, engine_configured, &mut |command| {
                    commands.push(command)
                });
            }
        }
        commands
    }

    /// Dispatches a client-issued command against a construct. Known ids
    /// route to their handlers; an unknown id falls back to the generic
    /// function-execution path when the construct exposes an invocable
    /// expression, and otherwise to the default handler, which reports the
    /// unknown command. Failures never propagate: the boundary converts them
    /// into a single ERROR result carrying the rendered failure chain.
    #[instrument(skip(self, section, string_args, typed_args), fields(document_id = %section.document_id))]
    pub async fn execute(
        &self,
        section: &Section,
        construct_path: &str,
        command_id: &str,
        string_args: &HashMap<String, String>,
        typed_args: &HashMap<String, serde_json::Value>,
    ) -> Vec<ExecutionResult> {
        let compile = match self.compile(section).await {
            Ok(compile) => compile,
            Err(e) => return self.boundary(construct_path, Err(e)),
        };
        // String-typed arguments (the usual carrier for variant keys) merge
        // into the typed set; typed values win on collision.
        let mut args = typed_args.clone();
        for (key, value) in string_args {
            args.entry(key.clone())
                .or_insert_with(|| serde_json::Value::String(value.clone()));
        }
        let outcome = match command_id {
            RUN_LEGACY_TESTS_COMMAND_ID => {
                return testing::run_legacy_tests(
                    &compile,
                    construct_path,
                    self.plan_executor.as_ref(),
                    &self.config.platform,
                )
                .await;
            }
            REGISTER_SERVICE_COMMAND_ID => self.register_service(&compile, construct_path).await,
            EXECUTE_FUNCTION_COMMAND_ID => {
                self.execute_function(&compile, construct_path, &args).await
            }
            other => {
                let applies = compile
                    .parse()
                    .service(construct_path)
                    .map(|service| service.lambda().is_some())
                    .unwrap_or(false);
                if applies {
                    debug!(command_id = other, "falling back to function execution");
                    self.execute_function(&compile, construct_path, &args).await
                } else {
                    Err(Error::Command(CommandError::UnknownCommand {
                        id: other.to_string(),
                    }))
                }
            }
        };
        self.boundary(construct_path, outcome)
    }

    /// Runs the construct's declared (new-style) test suites.
    #[instrument(skip(self, section), fields(document_id = %section.document_id))]
    pub async fn run_tests(
        &self,
        section: &Section,
        construct_path: &str,
    ) -> Vec<ExecutionResult> {
        let compile = match self.compile(section).await {
            Ok(compile) => compile,
            Err(e) => return self.boundary(construct_path, Err(e)),
        };
        testing::run_suite_tests(
            &compile,
            construct_path,
            self.plan_executor.as_ref(),
            &self.config.platform,
        )
        .await
    }

    /// Lazy sequence of optional reference resolvers for every symbolic
    /// pointer reachable from the construct. Constructs without references
    /// (or without a compiled form for the post-semantic stage) yield what
    /// they can; missing or non-service constructs yield an empty sequence.
    #[instrument(skip(self, section), fields(document_id = %section.document_id))]
    pub async fn find_references(&self, section: &Section, construct_path: &str) -> ReferenceStream {
        let compile = match self.compile(section).await {
            Ok(compile) => compile,
            Err(e) => {
                warn!(error = %e, "reference resolution aborted");
                return Box::new(std::iter::empty());
            }
        };
        let service = match compile.parse().service(construct_path) {
            Ok(service) => service,
            Err(e) => {
                debug!(error = %e, "no references for construct");
                return Box::new(std::iter::empty());
            }
        };
        let compiled = compile
            .model()
            .ok()
            .and_then(|model| model.compiled_service(construct_path))
            .cloned()
            .map(Arc::new);
        service_references(service, compiled)
    }

    /// Completion suggestions for a position, from the static tables.
    pub fn get_completions(&self, section: &Section, position: &TextPosition) -> Vec<Completion> {
        completion::completions(section, position)
    }

    /// Executes a tabular-data query against the construct's execution plan.
    /// The token is polled cooperatively: a cancelled request aborts before
    /// plan execution and reports a single ERROR result.
    #[instrument(skip(self, section, query, typed_args), fields(document_id = %section.document_id, request_id = %token.request_id()))]
    pub async fn execute_tds_request(
        &self,
        section: &Section,
        construct_path: &str,
        query: &TdsQuery,
        typed_args: &HashMap<String, serde_json::Value>,
        token: &CancellationToken,
    ) -> ExecutionResult {
        let outcome = self
            .tds_request(section, construct_path, query, typed_args, token)
            .await;
        match outcome {
            Ok(result) => result,
            Err(e) => ExecutionResult::error_result(&e, None, construct_path, None),
        }
    }

    async fn tds_request(
        &self,
        section: &Section,
        construct_path: &str,
        query: &TdsQuery,
        typed_args: &HashMap<String, serde_json::Value>,
        token: &CancellationToken,
    ) -> InternalResult<ExecutionResult> {
        let compile = self.compile(section).await?;
        let service = compile.parse().service(construct_path)?;
        let model = compile.model()?;
        let plan = generate_plan(
            service,
            typed_args,
            model,
            self.plan_generator.as_ref(),
            &self.config.platform,
        )?;
        if token.is_cancelled() {
            warn!("TDS request cancelled before execution");
            return Ok(cancelled_result(construct_path, token, service));
        }
        let mut params = typed_args.clone();
        params.insert(
            "tdsRequest".to_string(),
            serde_json::to_value(query).map_err(CollaboratorError::from)?,
        );
        let value = self
            .plan_executor
            .execute(&plan, &params, Some(token))
            .await?;
        if token.is_cancelled() {
            warn!("TDS request cancelled during execution");
            return Ok(cancelled_result(construct_path, token, service));
        }
        let message =
            serde_json::to_string_pretty(&value).map_err(CollaboratorError::from)?;
        Ok(ExecutionResult::with_id(
            construct_path,
            ResultType::Success,
            message,
            service.location.clone(),
        ))
    }

    /// Generic function-execution path: resolve the execution variant,
    /// generate a plan, execute it, and report the serialized output.
    async fn execute_function(
        &self,
        compile: &CompileResult,
        construct_path: &str,
        typed_args: &HashMap<String, serde_json::Value>,
    ) -> InternalResult<Vec<ExecutionResult>> {
        let service = compile.parse().service(construct_path)?;
        let model = compile.model()?;
        let plan = generate_plan(
            service,
            typed_args,
            model,
            self.plan_generator.as_ref(),
            &self.config.platform,
        )?;
        let value = self.plan_executor.execute(&plan, typed_args, None).await?;
        let message = serde_json::to_string_pretty(&value).map_err(CollaboratorError::from)?;
        Ok(vec![ExecutionResult::with_id(
            construct_path,
            ResultType::Success,
            message,
            service.location.clone(),
        )])
    }

    /// Posts the serialized model to the engine server. The response is
    /// pretty-printed when it parses as JSON, otherwise returned verbatim,
    /// always at SUCCESS; transport failures surface at the dispatch
    /// boundary.
    async fn register_service(
        &self,
        compile: &CompileResult,
        construct_path: &str,
    ) -> InternalResult<Vec<ExecutionResult>> {
        let client = self
            .engine_client
            .as_ref()
            .ok_or(CollaboratorError::EngineServerNotConfigured)?;
        let service = compile.parse().service(construct_path)?;
        let payload = registration_payload(compile, service);
        let response = client.register(&payload).await?;
        let message = match serde_json::from_str::<serde_json::Value>(&response) {
            Ok(parsed) => {
                serde_json::to_string_pretty(&parsed).unwrap_or_else(|_| response.clone())
            }
            Err(_) => response,
        };
        Ok(vec![ExecutionResult::with_id(
            construct_path,
            ResultType::Success,
            message,
            service.location.clone(),
        )])
    }

    fn boundary(
        &self,
        construct_path: &str,
        outcome: InternalResult<Vec<ExecutionResult>>,
    ) -> Vec<ExecutionResult> {
        match outcome {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "command failed at dispatch boundary");
                vec![ExecutionResult::error_result(&e, None, construct_path, None)]
            }
        }
    }
}

fn registration_payload(compile: &CompileResult, service: &ServiceDef) -> RegistrationPayload {
    RegistrationPayload {
        origin: RegistrationOrigin {
            serializer_name: SERIALIZER_NAME.to_string(),
            serializer_version: SERIALIZER_VERSION.to_string(),
            base_version: "latest".to_string(),
            version: "none".to_string(),
            service_path: service.path.clone(),
        },
        constructs: compile.parse().constructs().cloned().collect(),
    }
}

fn cancelled_result(
    construct_path: &str,
    token: &CancellationToken,
    service: &ServiceDef,
) -> ExecutionResult {
    ExecutionResult::with_id(
        construct_path,
        ResultType::Error,
        format!("TDS request {} cancelled", token.request_id()),
        service.location.clone(),
    )
}
