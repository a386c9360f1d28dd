//! # Michibiki: Language Server Feature Dispatch
//!
//! Michibiki is the feature-dispatch core of a language server for a
//! data-service DSL. Given a parsed and compiled slice of source (a
//! *section*), it decides which context-sensitive commands apply to a
//! declared construct, routes client-issued commands to their handlers,
//! resolves every symbolic reference a construct contains for navigation,
//! and runs declared tests, folding all outcomes into one result taxonomy.
//!
//! ## Architecture
//!
//! The core never parses, compiles, or executes anything itself. Grammar
//! parsing, semantic compilation, plan generation, and plan execution are
//! external collaborators reached through the narrow traits in
//! [`collaborator`]; the transport layer (JSON-RPC framing, document sync)
//! sits above the [`dispatch`] boundary.
//!
//! Components, leaves first:
//! - Result model ([`result`]): the immutable outcome record everything
//!   else produces.
//! - Source spans ([`text`]) and the construct/compiled data model
//!   ([`model`]).
//! - Cooperative per-request cancellation ([`cancellation`]).
//! - Command discovery and identifier routing ([`command`], [`dispatch`]).
//! - Multi-variant execution resolution ([`execution`]).
//! - Lazy, fault-tolerant reference resolution ([`reference`]).
//! - Test execution aggregation ([`testing`]).
//! - Static completion tables ([`completion`]) and configuration
//!   ([`config`]).
//!
//! ## Request Model
//!
//! Each client request is one independent unit of work against an immutable
//! compiled snapshot shared across concurrent requests. Blocking work
//! (engine-server registration, test running) lives behind async
//! collaborator traits and runs on tokio workers, so slow requests never
//! starve discovery or completion. Every public operation returns a
//! well-formed result set even on failure; the core never leaks an error to
//! a transport caller.

pub mod cancellation;
pub mod collaborator;
pub mod command;
pub mod completion;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod execution;
pub mod model;
pub mod reference;
pub mod result;
pub mod testing;
pub mod text;

// Re-exports
pub use dispatch::FeatureDispatcher;
pub use error::*;
pub use result::{ExecutionResult, ResultType};
