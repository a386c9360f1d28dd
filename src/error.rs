use thiserror::Error;

use crate::collaborator::CollaboratorError;
use crate::command::CommandError;
use crate::execution::ExecutionError;
use crate::model::ModelError;
use crate::result::ResultError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Result error: {0}")]
    Result(#[from] ResultError),
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("Command error: {0}")]
    Command(#[from] CommandError),
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),
    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type InternalResult<T> = Result<T, Error>;

impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }
}
