//! # Sections, Constructs and Compiled Artifacts
//!
//! The dispatch core never parses or compiles source itself; it works against
//! artifacts handed over by the model-provider collaborator. A [`Section`] is
//! a parsed slice of a document; its [`ParseResult`] exposes declared
//! [`Construct`]s by path, and a [`CompileResult`] either carries the
//! project-wide immutable [`CompiledModel`] snapshot or an explicit
//! [`CompileFailure`] marker that short-circuits every feature.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::text::{TextLocation, TextPosition};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("unable to find construct {path}")]
    ConstructNotFound { path: String },
    #[error("unable to find service {path}")]
    ServiceNotFound { path: String },
    #[error("compile failed: {0}")]
    Compile(CompileFailure),
}

pub type ModelResult<T> = Result<T, ModelError>;

/// A parsed, grammar-specific slice of a source document sharing one
/// compiled context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub document_id: String,
    pub text: String,
}

impl Section {
    pub fn new(document_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            text: text.into(),
        }
    }

    /// The text of the line at `position`, truncated at the position's
    /// column. Used by completion triggers.
    pub fn line_up_to(&self, position: &TextPosition) -> &str {
        let line = self
            .text
            .lines()
            .nth(position.line as usize)
            .unwrap_or_default();
        let mut end = (position.column as usize).min(line.len());
        while !line.is_char_boundary(end) {
            end -= 1;
        }
        &line[..end]
    }
}

/// Symbolic pointer to another declared element (a mapping or runtime path),
/// with the span of the pointer itself in source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerRef {
    pub path: String,
    pub location: Option<TextLocation>,
}

impl PointerRef {
    pub fn new(path: impl Into<String>, location: Option<TextLocation>) -> Self {
        Self {
            path: path.into(),
            location,
        }
    }
}

/// Stereotype applied to a construct, pointing at a profile declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StereotypeRef {
    pub profile: String,
    pub value: String,
    pub location: Option<TextLocation>,
}

/// Tagged value attached to a construct, pointing at a tag declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedValueRef {
    pub tag: String,
    pub value: String,
    pub location: Option<TextLocation>,
}

/// The invocable expression a service binds to its execution. Opaque to the
/// core beyond its parameter names; the body is collaborator territory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lambda {
    pub parameters: Vec<String>,
    pub body: String,
}

/// The (mapping, runtime, options) binding of one execution variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionBinding {
    pub mapping: PointerRef,
    pub runtime: PointerRef,
    pub options: Vec<String>,
}

/// One named execution variant within a multi-variant execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyedVariant {
    pub key: String,
    pub binding: ExecutionBinding,
}

/// A service execution: either a single binding, or a set of keyed variants
/// selected at execution time by a runtime argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Execution {
    Single {
        lambda: Lambda,
        binding: ExecutionBinding,
    },
    Multi {
        lambda: Lambda,
        /// Name of the runtime argument that selects a variant.
        key: String,
        variants: Vec<KeyedVariant>,
    },
}

impl Execution {
    pub fn lambda(&self) -> &Lambda {
        match self {
            Execution::Single { lambda, .. } => lambda,
            Execution::Multi { lambda, .. } => lambda,
        }
    }
}

/// Embedded old-style test block of a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyTestDef {
    pub data: String,
    pub location: Option<TextLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDef {
    pub id: String,
    pub assertion_ids: Vec<String>,
}

/// New-style declared test suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSuiteDef {
    pub id: String,
    pub tests: Vec<TestDef>,
}

/// A service-like declaration: an invocable expression bound to one or more
/// execution variants, plus metadata and declared tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDef {
    pub path: String,
    pub location: Option<TextLocation>,
    pub execution: Execution,
    pub stereotypes: Vec<StereotypeRef>,
    pub tagged_values: Vec<TaggedValueRef>,
    pub legacy_test: Option<LegacyTestDef>,
    pub test_suites: Vec<TestSuiteDef>,
}

/// Capability surface each construct kind implements for the dispatch core.
/// Construct-kind specific behavior goes through this trait rather than
/// through runtime type inspection.
pub trait ConstructSupport {
    fn path(&self) -> &str;
    fn location(&self) -> Option<&TextLocation>;
    /// The invocable expression, when the construct exposes one.
    fn lambda(&self) -> Option<&Lambda>;
    fn test_suites(&self) -> &[TestSuiteDef];
    fn legacy_test(&self) -> Option<&LegacyTestDef>;
}

impl ConstructSupport for ServiceDef {
    fn path(&self) -> &str {
        &self.path
    }

    fn location(&self) -> Option<&TextLocation> {
        self.location.as_ref()
    }

    fn lambda(&self) -> Option<&Lambda> {
        Some(self.execution.lambda())
    }

    fn test_suites(&self) -> &[TestSuiteDef] {
        &self.test_suites
    }

    fn legacy_test(&self) -> Option<&LegacyTestDef> {
        self.legacy_test.as_ref()
    }
}

/// A declared unit of source within a section. Service is the richest kind;
/// other kinds only expose their path and location to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Construct {
    Service(ServiceDef),
    Other {
        path: String,
        location: Option<TextLocation>,
    },
}

impl Construct {
    pub fn path(&self) -> &str {
        match self {
            Construct::Service(service) => &service.path,
            Construct::Other { path, .. } => path,
        }
    }

    pub fn location(&self) -> Option<&TextLocation> {
        match self {
            Construct::Service(service) => service.location.as_ref(),
            Construct::Other { location, .. } => location.as_ref(),
        }
    }

    pub fn as_service(&self) -> Option<&ServiceDef> {
        match self {
            Construct::Service(service) => Some(service),
            Construct::Other { .. } => None,
        }
    }
}

/// Constructs declared by a section, in declaration order, addressable by
/// path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseResult {
    constructs: Vec<Construct>,
}

impl ParseResult {
    pub fn new(constructs: Vec<Construct>) -> Self {
        Self { constructs }
    }

    pub fn constructs(&self) -> impl Iterator<Item = &Construct> {
        self.constructs.iter()
    }

    pub fn construct(&self, path: &str) -> Option<&Construct> {
        self.constructs.iter().find(|c| c.path() == path)
    }

    pub fn service(&self, path: &str) -> ModelResult<&ServiceDef> {
        self.construct(path)
            .ok_or_else(|| ModelError::ConstructNotFound {
                path: path.to_string(),
            })?
            .as_service()
            .ok_or_else(|| ModelError::ServiceNotFound {
                path: path.to_string(),
            })
    }
}

/// Explicit marker that a section failed to reach a usable compiled form.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct CompileFailure {
    pub message: String,
    pub location: Option<TextLocation>,
}

impl CompileFailure {
    pub fn new(message: impl Into<String>, location: Option<TextLocation>) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }
}

/// A symbolic reference recovered from the compiled form of an expression:
/// the usage span in source plus the path of the referenced definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolicReference {
    pub target: String,
    pub location: Option<TextLocation>,
}

/// A sub-expression of the fully compiled (post-semantic-analysis) lambda,
/// reduced to the symbolic references it contains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledExpression {
    pub references: Vec<SymbolicReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostValidationAssertion {
    pub id: String,
    pub expression: CompiledExpression,
}

/// Post-construction validation attached to a compiled service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostValidation {
    pub parameters: Vec<CompiledExpression>,
    pub assertions: Vec<PostValidationAssertion>,
}

/// Compiled (post-semantic-analysis) form of a service. Carries only what
/// the core recovers nowhere else: embedded expressions and post validations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledService {
    pub expressions: Vec<CompiledExpression>,
    pub post_validations: Vec<PostValidation>,
}

/// Project-wide compiled snapshot. Externally owned, immutable, shared
/// read-only across concurrent requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledModel {
    /// Definition locations by element path, the resolution table for
    /// go-to-definition.
    definitions: HashMap<String, TextLocation>,
    /// Compiled services by construct path.
    services: HashMap<String, CompiledService>,
}

impl CompiledModel {
    pub fn new(
        definitions: HashMap<String, TextLocation>,
        services: HashMap<String, CompiledService>,
    ) -> Self {
        Self {
            definitions,
            services,
        }
    }

    pub fn resolve_mapping(&self, path: &str) -> Option<TextLocation> {
        self.definitions.get(path).cloned()
    }

    pub fn resolve_runtime(&self, path: &str) -> Option<TextLocation> {
        self.definitions.get(path).cloned()
    }

    pub fn resolve_definition(&self, path: &str) -> Option<TextLocation> {
        self.definitions.get(path).cloned()
    }

    pub fn compiled_service(&self, path: &str) -> Option<&CompiledService> {
        self.services.get(path)
    }
}

/// Outcome of compiling a section: the parse-level constructs plus either the
/// compiled model snapshot or the failure that prevented it.
#[derive(Debug, Clone)]
pub struct CompileResult {
    parse: ParseResult,
    compiled: Result<Arc<CompiledModel>, CompileFailure>,
}

impl CompileResult {
    pub fn succeeded(parse: ParseResult, model: Arc<CompiledModel>) -> Self {
        Self {
            parse,
            compiled: Ok(model),
        }
    }

    pub fn failed(parse: ParseResult, failure: CompileFailure) -> Self {
        Self {
            parse,
            compiled: Err(failure),
        }
    }

    pub fn parse(&self) -> &ParseResult {
        &self.parse
    }

    pub fn failure(&self) -> Option<&CompileFailure> {
        self.compiled.as_ref().err()
    }

    /// The compiled snapshot, or the compile failure as a model error.
    pub fn model(&self) -> ModelResult<&Arc<CompiledModel>> {
        self.compiled
            .as_ref()
            .map_err(|failure| ModelError::Compile(failure.clone()))
    }
}
