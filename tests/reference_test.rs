use std::collections::HashMap;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use michibiki::collaborator::{MockModelProvider, MockPlanExecutor, MockPlanGenerator};
use michibiki::config::ServerConfig;
use michibiki::dispatch::FeatureDispatcher;
use michibiki::model::{
    CompileResult, CompiledExpression, CompiledModel, CompiledService, Construct, Execution,
    ExecutionBinding, Lambda, ParseResult, PointerRef, PostValidation, PostValidationAssertion,
    Section, ServiceDef, StereotypeRef, SymbolicReference,
};
use michibiki::text::TextLocation;

fn span(line: u32) -> Option<TextLocation> {
    Some(TextLocation::span("doc.mdsl", line, 0, line, 20))
}

fn service() -> ServiceDef {
    ServiceDef {
        path: "model::MyService".to_string(),
        location: span(0),
        execution: Execution::Single {
            lambda: Lambda::default(),
            binding: ExecutionBinding {
                // Mapping pointer has no span, so it cannot be anchored.
                mapping: PointerRef::new("model::MyMapping", None),
                runtime: PointerRef::new("model::MyRuntime", span(3)),
                options: vec![],
            },
        },
        stereotypes: vec![StereotypeRef {
            profile: "meta::profiles::Deprecated".to_string(),
            value: "deprecated".to_string(),
            location: span(5),
        }],
        tagged_values: vec![],
        legacy_test: None,
        test_suites: vec![],
    }
}

fn compiled_service() -> CompiledService {
    CompiledService {
        expressions: vec![CompiledExpression {
            references: vec![SymbolicReference {
                target: "model::Person".to_string(),
                location: span(8),
            }],
        }],
        post_validations: vec![PostValidation {
            parameters: vec![CompiledExpression {
                references: vec![SymbolicReference {
                    target: "model::Firm".to_string(),
                    location: span(10),
                }],
            }],
            assertions: vec![PostValidationAssertion {
                id: "rowCountCheck".to_string(),
                expression: CompiledExpression {
                    references: vec![SymbolicReference {
                        target: "model::Person".to_string(),
                        location: span(11),
                    }],
                },
            }],
        }],
    }
}

fn dispatcher() -> FeatureDispatcher {
    let parse = ParseResult::new(vec![Construct::Service(service())]);
    let model = CompiledModel::new(
        HashMap::from([
            (
                "model::MyRuntime".to_string(),
                TextLocation::span("runtimes.mdsl", 0, 0, 4, 1),
            ),
            (
                "model::Person".to_string(),
                TextLocation::span("classes.mdsl", 0, 0, 9, 1),
            ),
            (
                "model::Firm".to_string(),
                TextLocation::span("classes.mdsl", 11, 0, 19, 1),
            ),
        ]),
        HashMap::from([("model::MyService".to_string(), compiled_service())]),
    );
    let compile = Arc::new(CompileResult::succeeded(parse, Arc::new(model)));
    let mut provider = MockModelProvider::new();
    provider.expect_compile().returning(move |_| compile.clone());
    FeatureDispatcher::new(
        ServerConfig::default(),
        Arc::new(provider),
        Arc::new(MockPlanGenerator::new()),
        Arc::new(MockPlanExecutor::new()),
    )
}

#[tokio::test]
async fn test_reference_stream_order_and_fault_tolerance() {
    let dispatcher = dispatcher();
    let section = Section::new("doc.mdsl", "Service model::MyService {}");
    let references: Vec<_> = dispatcher
        .find_references(&section, "model::MyService")
        .await
        .collect();

    // mapping, runtime, stereotype, lambda expression, post-validation
    // parameter, post-validation assertion
    assert_eq!(references.len(), 6);
    assert!(references[0].is_none());
    let present: Vec<u32> = references[1..]
        .iter()
        .map(|r| r.as_ref().unwrap().reference_location().interval.start.line)
        .collect();
    assert_eq!(present, vec![3, 5, 8, 10, 11]);
}

#[tokio::test]
async fn test_resolvers_evaluate_against_the_model() {
    let dispatcher = dispatcher();
    let section = Section::new("doc.mdsl", "Service model::MyService {}");
    let references: Vec<_> = dispatcher
        .find_references(&section, "model::MyService")
        .await
        .collect();

    let model = CompiledModel::new(
        HashMap::from([(
            "model::MyRuntime".to_string(),
            TextLocation::span("runtimes.mdsl", 0, 0, 4, 1),
        )]),
        HashMap::new(),
    );
    let runtime = references[1].as_ref().unwrap();
    assert_eq!(
        runtime.resolve(&model),
        Some(TextLocation::span("runtimes.mdsl", 0, 0, 4, 1))
    );
    // Unknown to this model: resolves to nothing, not an error.
    let stereotype = references[2].as_ref().unwrap();
    assert_eq!(stereotype.resolve(&model), None);
}

#[tokio::test]
async fn test_missing_construct_yields_empty_stream() {
    let dispatcher = dispatcher();
    let section = Section::new("doc.mdsl", "Service model::MyService {}");
    let references: Vec<_> = dispatcher
        .find_references(&section, "model::Nowhere")
        .await
        .collect();
    assert!(references.is_empty());
}
