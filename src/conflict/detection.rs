use crate::data_store::locator::DocumentLocator;
use crate::data_store::versioned_document::VersionToken;
use crate::outcome::{ConflictDetails, FailureCause, StoreFailure};
use crate::storage::{StoreError, status};

/// What a failed store request means to the concurrency layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// The store rejected the version precondition.
    Conflict(ConflictDetails),
    /// Anything else.
    Failure(StoreFailure),
}

/// Classifies a failed conditional replace.
///
/// Only a precondition-failed status is a version conflict. Every other
/// status, and every failure without a status, becomes a [`StoreFailure`]
/// with its cause preserved.
pub fn classify(
    error: StoreError,
    locator: &DocumentLocator,
    expected: &VersionToken,
) -> Classification {
    match error {
        StoreError::Status {
            status: status::PRECONDITION_FAILED,
            message,
            current,
        } => Classification::Conflict(ConflictDetails {
            locator: locator.clone(),
            expected: expected.clone(),
            current: current.map(|doc| *doc),
            message,
        }),
        other => Classification::Failure(classify_failure(other)),
    }
}

/// Classifies an error that can never be a version conflict, e.g. from a read.
///
/// A 412 seen here is reported as an unexpected status.
pub fn classify_failure(error: StoreError) -> StoreFailure {
    match error {
        StoreError::Status {
            status, message, ..
        } => StoreFailure {
            cause: cause_for_status(status),
            status: Some(status),
            message,
        },
        StoreError::Timeout(message) => StoreFailure {
            cause: FailureCause::Timeout,
            status: None,
            message,
        },
        StoreError::Cancelled(message) => StoreFailure {
            cause: FailureCause::Cancelled,
            status: None,
            message,
        },
        StoreError::Transport(message) => StoreFailure {
            cause: FailureCause::Network,
            status: None,
            message,
        },
    }
}

fn cause_for_status(code: u16) -> FailureCause {
    match code {
        status::BAD_REQUEST | status::PAYLOAD_TOO_LARGE | status::URI_TOO_LONG => {
            FailureCause::MalformedRequest
        }
        status::UNAUTHORIZED | status::FORBIDDEN => FailureCause::Authorization,
        status::NOT_FOUND | status::GONE => FailureCause::NotFound,
        status::REQUEST_TIMEOUT => FailureCause::Timeout,
        status::TOO_MANY_REQUESTS => FailureCause::Throttled,
        500..=599 => FailureCause::StoreInternal,
        other => FailureCause::Unexpected(other),
    }
}
