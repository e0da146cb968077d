use std::fmt;

use crate::data_store::locator::DocumentLocator;
use crate::data_store::versioned_document::{Document, VersionToken};

/// Result of one replace attempt.
///
/// Created once per replace call and immutable afterwards. Only
/// [`ReplaceOutcome::Replaced`] means the store's state changed.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplaceOutcome {
    /// The store accepted the write and issued this fresh token.
    Replaced(VersionToken),
    /// The submitted token no longer matched the stored one.
    VersionConflict(ConflictDetails),
    /// Any failure unrelated to versioning.
    OtherFailure(StoreFailure),
}

impl ReplaceOutcome {
    pub fn is_replaced(&self) -> bool {
        matches!(self, ReplaceOutcome::Replaced(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ReplaceOutcome::VersionConflict(_))
    }

    /// Returns the new token if the replace succeeded.
    pub fn new_version(&self) -> Option<&VersionToken> {
        match self {
            ReplaceOutcome::Replaced(version) => Some(version),
            _ => None,
        }
    }

    pub fn conflict(&self) -> Option<&ConflictDetails> {
        match self {
            ReplaceOutcome::VersionConflict(details) => Some(details),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&StoreFailure> {
        match self {
            ReplaceOutcome::OtherFailure(failure) => Some(failure),
            _ => None,
        }
    }

    /// Terminal state this outcome represents, before any handler ran.
    pub fn state(&self) -> ReplaceState {
        match self {
            ReplaceOutcome::Replaced(_) => ReplaceState::Replaced,
            ReplaceOutcome::VersionConflict(_) => ReplaceState::ConflictDetected,
            ReplaceOutcome::OtherFailure(_) => ReplaceState::Failed,
        }
    }
}

/// States of a single replace-and-conflict-handling call.
///
/// ```text
/// Issued --store accepts precondition--> Replaced
/// Issued --store rejects precondition--> ConflictDetected --handler invoked--> ConflictObserved
/// Issued --other failure---------------> Failed
/// ```
///
/// Transitions are driven solely by the store's response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceState {
    Issued,
    Replaced,
    ConflictDetected,
    ConflictObserved,
    Failed,
}

/// What a conflict handler gets to see.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictDetails {
    /// The document the replace targeted.
    pub locator: DocumentLocator,
    /// The token the caller submitted.
    pub expected: VersionToken,
    /// The store's current copy, if it returned or we fetched one.
    pub current: Option<Document>,
    /// The store's message for the rejected precondition.
    pub message: String,
}

impl ConflictDetails {
    /// Token currently stored for the document, when a snapshot is available.
    pub fn current_version(&self) -> Option<&VersionToken> {
        self.current.as_ref().map(Document::version)
    }
}

impl fmt::Display for ConflictDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "version conflict on {} (expected {}): {}",
            self.locator, self.expected, self.message
        )
    }
}

/// Classification of a failure unrelated to versioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCause {
    /// Connection-level failure, no response.
    Network,
    Timeout,
    Cancelled,
    Authorization,
    NotFound,
    MalformedRequest,
    /// Request rate exceeded. Never retried here.
    Throttled,
    StoreInternal,
    /// A status with no better classification.
    Unexpected(u16),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Network => write!(f, "network"),
            FailureCause::Timeout => write!(f, "timeout"),
            FailureCause::Cancelled => write!(f, "cancelled"),
            FailureCause::Authorization => write!(f, "authorization"),
            FailureCause::NotFound => write!(f, "not-found"),
            FailureCause::MalformedRequest => write!(f, "malformed-request"),
            FailureCause::Throttled => write!(f, "throttled"),
            FailureCause::StoreInternal => write!(f, "store-internal"),
            FailureCause::Unexpected(status) => write!(f, "unexpected status {status}"),
        }
    }
}

/// A classified store failure with enough detail to log or escalate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFailure {
    pub cause: FailureCause,
    /// Raw status code, `None` when the store never answered.
    pub status: Option<u16>,
    pub message: String,
}

impl fmt::Display for StoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} failure ({}): {}", self.cause, status, self.message),
            None => write!(f, "{} failure: {}", self.cause, self.message),
        }
    }
}

impl std::error::Error for StoreFailure {}
