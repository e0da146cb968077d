use thiserror::Error;

/// Errors raised at the call boundary, before any request reaches the store.
///
/// Store-reported failures are not errors of this kind; they resolve to
/// [`crate::ReplaceOutcome::OtherFailure`] instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OccError {
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    #[error("Invalid version token: {0}")]
    InvalidVersionToken(String),

    #[error("Invalid document body: {0}")]
    InvalidBody(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, OccError>;
