//! # Execution Results
//!
//! Every feature of the dispatch core (command execution, test runs, TDS
//! requests) reports back through the same immutable outcome record,
//! [`ExecutionResult`]. Results carry a hierarchical id path (e.g. construct
//! path, then test suite, then assertion), a four-way [`ResultType`]
//! classification, a human-readable message, an optional verbose log message
//! and an optional source location for navigation.

use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;

use crate::text::TextLocation;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResultError {
    #[error("execution result requires at least one id")]
    EmptyIds,
}

pub type ResultResult<T> = Result<T, ResultError>;

/// Four-way outcome classification shared by command execution and test
/// execution. `Success`/`Failure`/`Error` come from executing work; `Warning`
/// is reserved for outcomes that are neither a pass nor a hard failure, such
/// as unrecognized engine-level result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultType {
    Success,
    Failure,
    Warning,
    Error,
}

/// One outcome unit returned to a client. Constructed once by a producing
/// component, immutable thereafter; equality is value-based over all fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionResult {
    ids: Vec<String>,
    result_type: ResultType,
    message: String,
    log_message: Option<String>,
    location: Option<TextLocation>,
}

impl ExecutionResult {
    /// Constructs a result with a hierarchical id path. Fails if `ids` is
    /// empty: a result that cannot be addressed is not presentable.
    pub fn new(
        ids: Vec<String>,
        result_type: ResultType,
        message: impl Into<String>,
        log_message: Option<String>,
        location: Option<TextLocation>,
    ) -> ResultResult<Self> {
        if ids.is_empty() {
            return Err(ResultError::EmptyIds);
        }
        Ok(Self {
            ids,
            result_type,
            message: message.into(),
            log_message,
            location,
        })
    }

    /// Constructs a single-id result without a log message.
    pub fn with_id(
        id: impl Into<String>,
        result_type: ResultType,
        message: impl Into<String>,
        location: Option<TextLocation>,
    ) -> Self {
        // A freshly built singleton id list cannot be empty.
        Self {
            ids: vec![id.into()],
            result_type,
            message: message.into(),
            log_message: None,
            location,
        }
    }

    /// Constructs a result whose id path starts at `first`; non-empty by
    /// construction, so this cannot fail validation.
    pub fn with_hierarchy(
        first: impl Into<String>,
        rest: Vec<String>,
        result_type: ResultType,
        message: impl Into<String>,
        location: Option<TextLocation>,
    ) -> Self {
        let mut ids = vec![first.into()];
        ids.extend(rest);
        Self {
            ids,
            result_type,
            message: message.into(),
            log_message: None,
            location,
        }
    }

    /// Converts a failure into an ERROR-typed result, rendering the error and
    /// its source chain into the log message. When `message` is `None`, the
    /// error's own display is used.
    pub fn error_result(
        error: &(dyn StdError + 'static),
        message: Option<String>,
        id: impl Into<String>,
        location: Option<TextLocation>,
    ) -> Self {
        let rendered = render_error_chain(error);
        let message = message.unwrap_or_else(|| {
            let display = error.to_string();
            if display.is_empty() {
                "Error".to_string()
            } else {
                display
            }
        });
        Self {
            ids: vec![id.into()],
            result_type: ResultType::Error,
            message,
            log_message: Some(rendered),
            location,
        }
    }

    /// The result ids, read hierarchically: for example a construct path, a
    /// test suite id, and a test id. Never empty.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn result_type(&self) -> ResultType {
        self.result_type
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn log_message(&self) -> Option<&str> {
        self.log_message.as_deref()
    }

    /// The log message if present, otherwise the result message.
    pub fn log_message_or_message(&self) -> &str {
        self.log_message.as_deref().unwrap_or(&self.message)
    }

    pub fn location(&self) -> Option<&TextLocation> {
        self.location.as_ref()
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ExecutionResult{{ids=[{}] type={}",
            self.ids.join(", "),
            self.result_type
        )?;
        match &self.location {
            Some(location) => write!(f, " location={}}}", location),
            None => write!(f, " location=none}}"),
        }
    }
}

/// Renders an error and its full source chain, one cause per line. This is
/// the core's analog of a captured stack trace.
pub(crate) fn render_error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str("\ncaused by: ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
