/// Error types shared by the Kahu crates.
///
/// These cover infrastructure (Redis, document encoding) that more than one crate touches.
/// Application-specific errors live in each binary crate and wrap `CommonError` via `#[from]`.

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("redis is not configured")]
    RedisUnavailable,

    #[error("document encoding error: {0}")]
    Document(#[from] serde_json::Error),
}
