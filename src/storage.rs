use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::data_store::locator::{CollectionLocator, DocumentLocator};
use crate::data_store::versioned_document::{Document, VersionToken};

/// Response status codes a document store reports, HTTP-style.
pub mod status {
    pub const BAD_REQUEST: u16 = 400;
    pub const UNAUTHORIZED: u16 = 401;
    pub const FORBIDDEN: u16 = 403;
    pub const NOT_FOUND: u16 = 404;
    pub const REQUEST_TIMEOUT: u16 = 408;
    pub const CONFLICT: u16 = 409;
    pub const GONE: u16 = 410;
    /// The store's "version no longer matches" signal.
    pub const PRECONDITION_FAILED: u16 = 412;
    pub const PAYLOAD_TOO_LARGE: u16 = 413;
    pub const URI_TOO_LONG: u16 = 414;
    pub const TOO_MANY_REQUESTS: u16 = 429;
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
    pub const SERVICE_UNAVAILABLE: u16 = 503;
}

/// A failed request as reported by the store client.
///
/// This is the raw collaborator error; [`crate::conflict::detection::classify`]
/// turns it into the outcome taxonomy.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The store answered with a non-success status.
    #[error("Store responded {status}: {message}")]
    Status {
        status: u16,
        message: String,
        /// The store's current copy of the document, when the response carried one.
        current: Option<Box<Document>>,
    },

    /// The transport gave up waiting for a response.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The request was cancelled by the caller before a response arrived.
    #[error("Request cancelled: {0}")]
    Cancelled(String),

    /// Connection-level failure; no response was received.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl StoreError {
    /// Shorthand for a status response without a document snapshot.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        StoreError::Status {
            status,
            message: message.into(),
            current: None,
        }
    }

    /// A precondition failure carrying the store's current copy of the document.
    pub fn precondition_failed(message: impl Into<String>, current: Option<Document>) -> Self {
        StoreError::Status {
            status: status::PRECONDITION_FAILED,
            message: message.into(),
            current: current.map(Box::new),
        }
    }

    /// Returns the status code, if the store answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            StoreError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Client interface of a remote document store.
///
/// The concurrency layer only needs point reads and conditional replaces;
/// `create_document` is used to seed documents. Connection and session
/// lifecycle stay with the implementation.
///
/// Implementations must be `Send` and `Sync` so that many replace calls can be
/// in flight concurrently against one client.
///
/// # Examples
///
/// ```no_run
/// use docdb_concurrency::prelude::*;
/// use std::sync::Arc;
///
/// # futures::executor::block_on(async {
/// let store = Arc::new(MemoryStore::new());
/// let collection = CollectionLocator::new("test", "concurrencyTest");
/// store.create_collection_if_not_exists(&collection);
///
/// let doc = store.create_document(&collection, "doc-1", serde_json::Map::new()).await?;
/// let read = store.read_document(&collection.document("doc-1")).await?;
/// assert_eq!(read.version(), doc.version());
/// # Ok::<(), StoreError>(())
/// # });
/// ```
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads the current body and version token of a document.
    async fn read_document(&self, locator: &DocumentLocator) -> Result<Document, StoreError>;

    /// Replaces the whole body of a document if its current token equals `expected`.
    ///
    /// On success the store issues a fresh token and returns the stored
    /// document. A token mismatch must be reported as
    /// `StoreError::Status { status: 412, .. }`, distinguishable from every
    /// other failure.
    async fn replace_document_if_match(
        &self,
        locator: &DocumentLocator,
        body: Map<String, Value>,
        expected: &VersionToken,
    ) -> Result<Document, StoreError>;

    /// Creates a new document with the given id.
    async fn create_document(
        &self,
        collection: &CollectionLocator,
        id: &str,
        body: Map<String, Value>,
    ) -> Result<Document, StoreError>;
}
