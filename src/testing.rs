//! # Test Execution Aggregation
//!
//! Runs a service's declared test suites (new-style) or its embedded legacy
//! test block (old-style) through the plan-executor collaborator and folds
//! the engine-level outcomes into the result taxonomy. Engine codes
//! SUCCESS/FAILURE/ERROR map one-to-one; anything else defaults to WARNING
//! rather than being dropped. Every failure mode is reported as a result,
//! never as an empty response or a propagated error.

use tracing::instrument;

use crate::collaborator::{
    AssertionOutcome, CollaboratorResult, EngineOutcome, PlanExecutor, TestRun,
};
use crate::config::PlatformConfig;
use crate::model::{CompileResult, CompiledModel, ConstructSupport, ServiceDef};
use crate::result::{ExecutionResult, ResultType};
use crate::text::TextLocation;

/// Maps an engine-level outcome code onto the result taxonomy. Unrecognized
/// codes are surfaced as WARNING so new outcome kinds introduced by the test
/// runner are visible without failing the run.
pub fn to_result_type(outcome: &EngineOutcome) -> ResultType {
    match outcome {
        EngineOutcome::Success => ResultType::Success,
        EngineOutcome::Failure => ResultType::Failure,
        EngineOutcome::Error => ResultType::Error,
        EngineOutcome::Other(_) => ResultType::Warning,
    }
}

/// One result per assertion outcome, ids `[construct_path, assertion_name]`,
/// in the runner's declaration order. A captured engine exception is
/// appended to the message on a fresh line.
pub fn aggregate_runs(
    construct_path: &str,
    location: Option<&TextLocation>,
    runs: &[TestRun],
) -> Vec<ExecutionResult> {
    runs.iter()
        .flat_map(|run| run.outcomes.iter())
        .map(|outcome| assertion_result(construct_path, location, outcome))
        .collect()
}

fn assertion_result(
    construct_path: &str,
    location: Option<&TextLocation>,
    outcome: &AssertionOutcome,
) -> ExecutionResult {
    let mut message = format!("{}.{}: {}", construct_path, outcome.name, outcome.outcome);
    if let Some(trace) = &outcome.failure {
        message.push('\n');
        message.push_str(trace);
    }
    ExecutionResult::with_hierarchy(
        construct_path,
        vec![outcome.name.clone()],
        to_result_type(&outcome.outcome),
        message,
        location.cloned(),
    )
}

/// Runs the service's embedded legacy test block. Declaring no legacy test
/// is itself an ERROR-typed result naming the absence; a section that failed
/// to compile short-circuits to a single ERROR result.
#[instrument(skip(compile, executor, extensions))]
pub async fn run_legacy_tests(
    compile: &CompileResult,
    construct_path: &str,
    executor: &dyn PlanExecutor,
    extensions: &PlatformConfig,
) -> Vec<ExecutionResult> {
    let service = match compile.parse().service(construct_path) {
        Ok(service) => service,
        Err(e) => return vec![ExecutionResult::error_result(&e, None, construct_path, None)],
    };
    let location = service.location.clone();
    if service.legacy_test().is_none() {
        return vec![ExecutionResult::with_id(
            construct_path,
            ResultType::Error,
            format!("unable to find legacy test for service {}", construct_path),
            location,
        )];
    }
    run_with(compile, service, |model| {
        executor.run_legacy_tests(service, model, extensions)
    })
    .await
}

/// Runs the service's declared (new-style) test suites. A service declaring
/// no suites yields no results; compile failure short-circuits to a single
/// ERROR result.
#[instrument(skip(compile, executor, extensions))]
pub async fn run_suite_tests(
    compile: &CompileResult,
    construct_path: &str,
    executor: &dyn PlanExecutor,
    extensions: &PlatformConfig,
) -> Vec<ExecutionResult> {
    let service = match compile.parse().service(construct_path) {
        Ok(service) => service,
        Err(e) => return vec![ExecutionResult::error_result(&e, None, construct_path, None)],
    };
    if service.test_suites().is_empty() {
        return vec![];
    }
    run_with(compile, service, |model| {
        executor.run_tests(service, model, extensions)
    })
    .await
}

async fn run_with<'a, F, Fut>(
    compile: &'a CompileResult,
    service: &'a ServiceDef,
    run: F,
) -> Vec<ExecutionResult>
where
    F: FnOnce(&'a CompiledModel) -> Fut,
    Fut: std::future::Future<Output = CollaboratorResult<Vec<TestRun>>>,
{
    let location = service.location.clone();
    let model = match compile.model() {
        Ok(model) => model.as_ref(),
        Err(e) => {
            return vec![ExecutionResult::error_result(
                &e,
                None,
                &service.path,
                location,
            )]
        }
    };
    match run(model).await {
        Ok(runs) => aggregate_runs(&service.path, location.as_ref(), &runs),
        Err(e) => vec![ExecutionResult::error_result(
            &e,
            None,
            &service.path,
            location,
        )],
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_outcome_mapping_is_one_to_one_with_warning_default() {
        assert_eq!(to_result_type(&EngineOutcome::Success), ResultType::Success);
        assert_eq!(to_result_type(&EngineOutcome::Failure), ResultType::Failure);
        assert_eq!(to_result_type(&EngineOutcome::Error), ResultType::Error);
        assert_eq!(
            to_result_type(&EngineOutcome::Other("SKIPPED".to_string())),
            ResultType::Warning
        );
    }

    #[test]
    fn test_aggregation_ids_and_types() {
        let runs = vec![TestRun {
            outcomes: vec![
                AssertionOutcome {
                    name: "assert1".to_string(),
                    outcome: EngineOutcome::Success,
                    failure: None,
                },
                AssertionOutcome {
                    name: "assert2".to_string(),
                    outcome: EngineOutcome::Other("FLAKY".to_string()),
                    failure: None,
                },
            ],
        }];
        let results = aggregate_runs("model::MyService", None, &runs);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].ids(), ["model::MyService", "assert1"]);
        assert_eq!(results[0].result_type(), ResultType::Success);
        assert_eq!(results[0].message(), "model::MyService.assert1: SUCCESS");
        assert_eq!(results[1].ids(), ["model::MyService", "assert2"]);
        assert_eq!(results[1].result_type(), ResultType::Warning);
        assert_eq!(results[1].message(), "model::MyService.assert2: FLAKY");
    }

    #[test]
    fn test_captured_exception_appends_on_fresh_line() {
        let runs = vec![TestRun {
            outcomes: vec![AssertionOutcome {
                name: "assert1".to_string(),
                outcome: EngineOutcome::Failure,
                failure: Some("expected 3 rows, found 2".to_string()),
            }],
        }];
        let results = aggregate_runs("model::MyService", None, &runs);
        assert_eq!(
            results[0].message(),
            "model::MyService.assert1: FAILURE\nexpected 3 rows, found 2"
        );
    }
}
