use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Typed failure taxonomy exposed to callers.
///
/// The core never retries on its own; `Conflict` in particular is a signal
/// that the caller may retry the whole reservation request.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("no matching products: {0}")]
    NotFound(String),

    #[error("insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("reservation conflict: {0}")]
    Conflict(String),

    #[error("operation exceeded deadline of {0} ms")]
    Timeout(u64),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}
