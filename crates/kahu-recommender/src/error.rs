use kahu_common::error::CommonError;
use kahu_common::openai::OpenAiClientError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Why the remote interpretation could not be used. Both cases end in the local
/// keyword classifier; they are kept apart only for logging.
#[derive(Debug, thiserror::Error)]
pub enum InterpreterFailure {
    #[error("remote interpreter unavailable: {0}")]
    RemoteUnavailable(#[from] OpenAiClientError),

    #[error("unrecoverable completion format: {0}")]
    UnrecoverableFormat(String),
}
