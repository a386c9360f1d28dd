//! # Reference Resolution Pipeline
//!
//! Enumerates every symbolic pointer reachable from a construct as a lazy
//! sequence of `Option<ReferenceResolver>`: execution targets (mapping and
//! runtime, repeated across keyed variants), stereotypes, tagged values, and
//! whatever is only recoverable from the fully compiled form (embedded
//! expressions and post-validation assertions). Resolution is
//! partial-failure tolerant: a pointer with no usable span yields `None` in
//! the sequence instead of aborting discovery of the rest, and an absent
//! definition simply resolves to nothing. The sequence is meant to be driven
//! to exhaustion exactly once per request.

use std::fmt;
use std::sync::Arc;

use crate::model::{
    CompiledExpression, CompiledModel, CompiledService, Execution, ExecutionBinding, PointerRef,
    ServiceDef, StereotypeRef, TaggedValueRef,
};
use crate::text::TextLocation;

type ResolveFn = Box<dyn Fn(&CompiledModel) -> Option<TextLocation> + Send + Sync>;

/// A deferred lookup from a symbolic pointer's usage span to its resolved
/// definition location. Evaluation happens against the compiled model and
/// may yield nothing when the target cannot be found.
pub struct ReferenceResolver {
    location: TextLocation,
    resolve: ResolveFn,
}

impl ReferenceResolver {
    /// Builds a resolver for the pointer at `location`. Returns `None` when
    /// the span is absent: a reference that cannot be anchored in source is
    /// not navigable and is skipped without failing the pipeline.
    pub fn new<F>(location: Option<TextLocation>, resolve: F) -> Option<Self>
    where
        F: Fn(&CompiledModel) -> Option<TextLocation> + Send + Sync + 'static,
    {
        location.map(|location| Self {
            location,
            resolve: Box::new(resolve),
        })
    }

    /// The span of the reference itself in source.
    pub fn reference_location(&self) -> &TextLocation {
        &self.location
    }

    /// Evaluates the lookup against the compiled model.
    pub fn resolve(&self, model: &CompiledModel) -> Option<TextLocation> {
        (self.resolve)(model)
    }
}

impl fmt::Debug for ReferenceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceResolver")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// Lazy, single-consumption sequence of optional reference resolvers.
pub type ReferenceStream = Box<dyn Iterator<Item = Option<ReferenceResolver>> + Send>;

/// All references reachable from a service, in traversal order: execution
/// references first, then stereotypes, then tagged values, then references
/// recoverable only from the compiled form. The compiled-form stage is not
/// traversed until the iterator reaches it.
pub fn service_references(
    service: &ServiceDef,
    compiled: Option<Arc<CompiledService>>,
) -> ReferenceStream {
    let execution: Vec<_> = execution_references(&service.execution);
    let stereotypes: Vec<_> = service.stereotypes.iter().map(stereotype_reference).collect();
    let tagged_values: Vec<_> = service
        .tagged_values
        .iter()
        .map(tagged_value_reference)
        .collect();
    let compiled_stage = compiled
        .into_iter()
        .flat_map(|service| compiled_service_references(&service));
    Box::new(
        execution
            .into_iter()
            .chain(stereotypes)
            .chain(tagged_values)
            .chain(compiled_stage),
    )
}

/// Mapping and runtime references of every declared variant, flattened in
/// declaration order.
pub fn execution_references(execution: &Execution) -> Vec<Option<ReferenceResolver>> {
    match execution {
        Execution::Single { binding, .. } => binding_references(binding),
        Execution::Multi { variants, .. } => variants
            .iter()
            .flat_map(|variant| binding_references(&variant.binding))
            .collect(),
    }
}

fn binding_references(binding: &ExecutionBinding) -> Vec<Option<ReferenceResolver>> {
    vec![
        mapping_reference(&binding.mapping),
        runtime_reference(&binding.runtime),
    ]
}

fn mapping_reference(pointer: &PointerRef) -> Option<ReferenceResolver> {
    let target = pointer.path.clone();
    ReferenceResolver::new(pointer.location.clone(), move |model| {
        model.resolve_mapping(&target)
    })
}

fn runtime_reference(pointer: &PointerRef) -> Option<ReferenceResolver> {
    let target = pointer.path.clone();
    ReferenceResolver::new(pointer.location.clone(), move |model| {
        model.resolve_runtime(&target)
    })
}

fn stereotype_reference(stereotype: &StereotypeRef) -> Option<ReferenceResolver> {
    let target = stereotype.profile.clone();
    ReferenceResolver::new(stereotype.location.clone(), move |model| {
        model.resolve_definition(&target)
    })
}

fn tagged_value_reference(tagged_value: &TaggedValueRef) -> Option<ReferenceResolver> {
    let target = tagged_value.tag.clone();
    ReferenceResolver::new(tagged_value.location.clone(), move |model| {
        model.resolve_definition(&target)
    })
}

/// References recoverable only from the post-semantic-analysis form of the
/// service: embedded expressions first, then post-validation parameters and
/// assertion bodies.
fn compiled_service_references(compiled: &CompiledService) -> Vec<Option<ReferenceResolver>> {
    let mut references: Vec<_> = compiled
        .expressions
        .iter()
        .flat_map(expression_references)
        .collect();
    for validation in &compiled.post_validations {
        references.extend(validation.parameters.iter().flat_map(expression_references));
        references.extend(
            validation
                .assertions
                .iter()
                .flat_map(|assertion| expression_references(&assertion.expression)),
        );
    }
    references
}

fn expression_references(expression: &CompiledExpression) -> Vec<Option<ReferenceResolver>> {
    expression
        .references
        .iter()
        .map(|reference| {
            let target = reference.target.clone();
            ReferenceResolver::new(reference.location.clone(), move |model| {
                model.resolve_definition(&target)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::Lambda;

    fn model_with(definitions: &[(&str, TextLocation)]) -> CompiledModel {
        CompiledModel::new(
            definitions
                .iter()
                .map(|(path, location)| (path.to_string(), location.clone()))
                .collect(),
            HashMap::new(),
        )
    }

    #[test]
    fn test_unresolvable_pointer_does_not_abort_the_rest() {
        let execution = Execution::Single {
            lambda: Lambda::default(),
            binding: ExecutionBinding {
                // No span: the factory yields an absent entry.
                mapping: PointerRef::new("model::Mapping", None),
                runtime: PointerRef::new(
                    "model::Runtime",
                    Some(TextLocation::span("doc.mdsl", 5, 13, 5, 27)),
                ),
                options: vec![],
            },
        };
        let references = execution_references(&execution);
        assert_eq!(references.len(), 2);
        assert!(references[0].is_none());

        let runtime = references[1].as_ref().unwrap();
        let definition = TextLocation::span("runtimes.mdsl", 0, 0, 10, 0);
        let model = model_with(&[("model::Runtime", definition.clone())]);
        assert_eq!(runtime.resolve(&model), Some(definition));
    }

    #[test]
    fn test_multi_variant_references_flatten_in_declaration_order() {
        let span = |line| Some(TextLocation::span("doc.mdsl", line, 0, line, 10));
        let execution = Execution::Multi {
            lambda: Lambda::default(),
            key: "key".to_string(),
            variants: vec![
                crate::model::KeyedVariant {
                    key: "dev".to_string(),
                    binding: ExecutionBinding {
                        mapping: PointerRef::new("model::DevMapping", span(1)),
                        runtime: PointerRef::new("model::DevRuntime", span(2)),
                        options: vec![],
                    },
                },
                crate::model::KeyedVariant {
                    key: "prod".to_string(),
                    binding: ExecutionBinding {
                        mapping: PointerRef::new("model::ProdMapping", span(3)),
                        runtime: PointerRef::new("model::ProdRuntime", span(4)),
                        options: vec![],
                    },
                },
            ],
        };
        let lines: Vec<u32> = execution_references(&execution)
            .into_iter()
            .map(|r| r.unwrap().reference_location().interval.start.line)
            .collect();
        assert_eq!(lines, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_unresolved_definition_yields_nothing() {
        let pointer = PointerRef::new(
            "model::Missing",
            Some(TextLocation::span("doc.mdsl", 0, 0, 0, 5)),
        );
        let resolver = mapping_reference(&pointer).unwrap();
        assert_eq!(resolver.resolve(&model_with(&[])), None);
    }
}
