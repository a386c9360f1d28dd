//! # Command Discovery
//!
//! Commands are context-sensitive actions offered per construct, recomputed
//! on every discovery request and delivered through a consumer callback.
//! Which commands a service offers depends on its shape and on configured
//! collaborators; the policy lives in [`collect_service_commands`].

use thiserror::Error;

use crate::model::{ConstructSupport, ServiceDef};
use crate::text::TextLocation;

pub const EXECUTE_FUNCTION_COMMAND_ID: &str = "michibiki.function.execute";
pub const EXECUTE_FUNCTION_COMMAND_TITLE: &str = "Execute";

pub const REGISTER_SERVICE_COMMAND_ID: &str = "michibiki.service.registerService";
pub const REGISTER_SERVICE_COMMAND_TITLE: &str = "Register service";

pub const RUN_LEGACY_TESTS_COMMAND_ID: &str = "michibiki.service.runLegacyTests";
pub const RUN_LEGACY_TESTS_COMMAND_TITLE: &str = "Run legacy tests";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command id: {id}")]
    UnknownCommand { id: String },
}

/// A command offered to the client for one construct. Not persisted;
/// recomputed on every discovery request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub id: String,
    pub title: String,
    pub location: Option<TextLocation>,
}

impl Command {
    pub fn new(id: &str, title: &str, location: Option<&TextLocation>) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            location: location.cloned(),
        }
    }
}

/// Callback receiving discovered commands in offer order.
pub type CommandConsumer<'a> = dyn FnMut(Command) + 'a;

/// Discovery policy for service constructs:
/// - the generic execute command whenever the service exposes an invocable
///   expression,
/// - the register command only when an engine server collaborator is
///   configured,
/// - the legacy test command only when the service declares an embedded
///   legacy test block.
pub fn collect_service_commands(
    service: &ServiceDef,
    engine_server_configured: bool,
    consumer: &mut CommandConsumer<'_>,
) {
    if service.lambda().is_some() {
        consumer(Command::new(
            EXECUTE_FUNCTION_COMMAND_ID,
            EXECUTE_FUNCTION_COMMAND_TITLE,
            service.location(),
        ));
    }
    if engine_server_configured {
        consumer(Command::new(
            REGISTER_SERVICE_COMMAND_ID,
            REGISTER_SERVICE_COMMAND_TITLE,
            service.location(),
        ));
    }
    if service.legacy_test().is_some() {
        consumer(Command::new(
            RUN_LEGACY_TESTS_COMMAND_ID,
            RUN_LEGACY_TESTS_COMMAND_TITLE,
            service.location(),
        ));
    }
}
