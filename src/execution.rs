//! # Multi-Variant Execution Resolution
//!
//! A service defines its execution either as a single (mapping, runtime,
//! options) binding or as a set of keyed variants selected by a runtime
//! argument. [`resolve_execution`] collapses either shape into one concrete
//! [`SingleExecutionSpec`], which [`generate_plan`] hands to the plan
//! generator together with the platform extension hooks.

use std::collections::HashMap;

use thiserror::Error;

use crate::collaborator::{ExecutionPlan, PlanGenerator, PlanPlatform};
use crate::config::PlatformConfig;
use crate::model::{CompiledModel, Execution, ExecutionBinding, Lambda, ServiceDef};
use crate::{Error, InternalResult};

/// Argument errors raised while matching a runtime argument against declared
/// execution variants. Callers surface these as client-visible errors, never
/// as a silent default.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("missing argument '{key}' selecting an execution variant")]
    MissingVariantArgument { key: String },
    #[error("no execution variant matches value: {value}")]
    UnmatchedVariantKey { value: String },
}

/// One concrete execution specification: a binding plus the invocable
/// expression it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleExecutionSpec {
    pub binding: ExecutionBinding,
    pub lambda: Lambda,
}

/// Resolves the service's execution against the caller's typed arguments.
///
/// A single-variant execution is used directly. For a multi-variant
/// execution, the declared key name is looked up in `args` and the variants
/// are scanned in declaration order for the first whose key equals the
/// argument value; no match fails with an argument error naming the value.
pub fn resolve_execution(
    service: &ServiceDef,
    args: &HashMap<String, serde_json::Value>,
) -> Result<SingleExecutionSpec, ExecutionError> {
    match &service.execution {
        Execution::Single { lambda, binding } => Ok(SingleExecutionSpec {
            binding: binding.clone(),
            lambda: lambda.clone(),
        }),
        Execution::Multi {
            lambda,
            key,
            variants,
        } => {
            let value = args
                .get(key)
                .ok_or_else(|| ExecutionError::MissingVariantArgument { key: key.clone() })?;
            let value = match value.as_str() {
                Some(s) => s.to_string(),
                None => value.to_string(),
            };
            let variant = variants
                .iter()
                .find(|variant| variant.key == value)
                .ok_or_else(|| ExecutionError::UnmatchedVariantKey { value })?;
            Ok(SingleExecutionSpec {
                binding: variant.binding.clone(),
                lambda: lambda.clone(),
            })
        }
    }
}

/// Resolves the execution and hands the specification to the plan generator
/// with the router and transformation extensions for the target platform.
/// What the generator does with it is not this core's concern.
pub fn generate_plan(
    service: &ServiceDef,
    args: &HashMap<String, serde_json::Value>,
    model: &CompiledModel,
    generator: &dyn PlanGenerator,
    extensions: &PlatformConfig,
) -> InternalResult<ExecutionPlan> {
    let spec = resolve_execution(service, args)?;
    generator
        .generate(&spec, model, PlanPlatform::default(), extensions)
        .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::{KeyedVariant, PointerRef};

    fn multi_service() -> ServiceDef {
        ServiceDef {
            path: "model::MyService".to_string(),
            location: None,
            execution: Execution::Multi {
                lambda: Lambda {
                    parameters: vec!["key".to_string()],
                    body: "model::Person.all()".to_string(),
                },
                key: "key".to_string(),
                variants: vec![
                    KeyedVariant {
                        key: "dev".to_string(),
                        binding: ExecutionBinding {
                            mapping: PointerRef::new("model::DevMapping", None),
                            runtime: PointerRef::new("model::DevRuntime", None),
                            options: vec![],
                        },
                    },
                    KeyedVariant {
                        key: "prod".to_string(),
                        binding: ExecutionBinding {
                            mapping: PointerRef::new("model::ProdMapping", None),
                            runtime: PointerRef::new("model::ProdRuntime", None),
                            options: vec![],
                        },
                    },
                ],
            },
            stereotypes: vec![],
            tagged_values: vec![],
            legacy_test: None,
            test_suites: vec![],
        }
    }

    #[test]
    fn test_matching_variant_selected() {
        let args = HashMap::from([("key".to_string(), json!("prod"))]);
        let spec = resolve_execution(&multi_service(), &args).unwrap();
        assert_eq!(spec.binding.mapping.path, "model::ProdMapping");
        assert_eq!(spec.binding.runtime.path, "model::ProdRuntime");
    }

    #[test]
    fn test_unmatched_value_is_an_argument_error() {
        let args = HashMap::from([("key".to_string(), json!("qa"))]);
        let err = resolve_execution(&multi_service(), &args).unwrap_err();
        assert_eq!(
            err,
            ExecutionError::UnmatchedVariantKey {
                value: "qa".to_string()
            }
        );
        assert!(err.to_string().contains("qa"));
    }

    #[test]
    fn test_missing_argument_is_an_argument_error() {
        let err = resolve_execution(&multi_service(), &HashMap::new()).unwrap_err();
        assert_eq!(
            err,
            ExecutionError::MissingVariantArgument {
                key: "key".to_string()
            }
        );
    }

    #[test]
    fn test_single_execution_used_directly() {
        let service = ServiceDef {
            execution: Execution::Single {
                lambda: Lambda::default(),
                binding: ExecutionBinding {
                    mapping: PointerRef::new("model::Mapping", None),
                    runtime: PointerRef::new("model::Runtime", None),
                    options: vec!["opt1".to_string()],
                },
            },
            ..multi_service()
        };
        let spec = resolve_execution(&service, &HashMap::new()).unwrap();
        assert_eq!(spec.binding.mapping.path, "model::Mapping");
        assert_eq!(spec.binding.options, vec!["opt1".to_string()]);
    }
}
