use futures::future::{BoxFuture, FutureExt};
use log::{debug, warn};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::config::ConcurrencyConfig;
use crate::conflict::continuation::PendingReplace;
use crate::conflict::detection::{Classification, classify, classify_failure};
use crate::data_store::locator::DocumentLocator;
use crate::data_store::versioned_document::{Document, SYSTEM_PROPERTIES, VersionToken};
use crate::errors::{OccError, Result};
use crate::outcome::{ReplaceOutcome, StoreFailure};
use crate::storage::DocumentStore;

/// docdb-concurrency prelude
pub mod prelude {
    pub use crate::config::*;
    pub use crate::conflict::continuation::*;
    pub use crate::conflict::detection::*;
    pub use crate::conflict::resolution::*;
    pub use crate::data_store::locator::*;
    pub use crate::data_store::memory::*;
    pub use crate::data_store::versioned_document::*;
    pub use crate::errors::*;
    pub use crate::outcome::*;
    pub use crate::storage::*;
    pub use crate::*;
}

/// Submits version-checked replacements to a document store.
///
/// The replacer holds no state besides its store client and configuration:
/// any number of replace calls, on the same or different documents, may be in
/// flight at once. Mutual exclusion per document comes entirely from the
/// store's conditional write.
#[derive(Clone)]
pub struct VersionedReplacer {
    store: Arc<dyn DocumentStore>,
    config: ConcurrencyConfig,
}

impl VersionedReplacer {
    /// Creates a replacer with the default configuration.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            config: ConcurrencyConfig::default(),
        }
    }

    /// Creates a replacer with an explicit, validated configuration.
    pub fn with_config(store: Arc<dyn DocumentStore>, config: ConcurrencyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &ConcurrencyConfig {
        &self.config
    }

    /// Replaces the document at `locator` with `body` if its stored token is still `expected`.
    ///
    /// Inputs are checked before anything is sent; a malformed locator, an
    /// empty token or a body carrying store-owned properties is returned as an
    /// [`OccError`]. Otherwise the returned [`PendingReplace`] issues exactly
    /// one conditional write when driven and resolves to:
    ///
    /// * [`ReplaceOutcome::Replaced`] with the store's fresh token,
    /// * [`ReplaceOutcome::VersionConflict`] when the store rejected the token,
    /// * [`ReplaceOutcome::OtherFailure`] for everything else.
    ///
    /// The write is never retried here. Resubmitting the same call with the
    /// now stale token deterministically conflicts instead of applying twice.
    ///
    /// # Arguments
    ///
    /// * `locator` - The existing document to replace.
    /// * `body` - The full desired state of the document, not a diff.
    /// * `expected` - The token read before the body was computed.
    pub fn replace(
        &self,
        locator: &DocumentLocator,
        body: Map<String, Value>,
        expected: &VersionToken,
    ) -> Result<PendingReplace> {
        locator.validate()?;
        if expected.is_empty() {
            return Err(OccError::InvalidVersionToken(format!(
                "empty version token for {}",
                locator
            )));
        }
        validate_body(locator, &body)?;

        let store = Arc::clone(&self.store);
        let fetch_snapshot = self.config.fetch_snapshot_on_conflict;
        let locator = locator.clone();
        let expected = expected.clone();

        Ok(PendingReplace::new(async move {
            debug!("Replacing {} if version matches {}", locator, expected);
            match store.replace_document_if_match(&locator, body, &expected).await {
                Ok(stored) => {
                    debug!("Replaced {}: {} -> {}", locator, expected, stored.version());
                    ReplaceOutcome::Replaced(stored.version().clone())
                }
                Err(error) => match classify(error, &locator, &expected) {
                    Classification::Conflict(mut details) => {
                        debug!("Version conflict on {}: {}", locator, details.message);
                        if fetch_snapshot && details.current.is_none() {
                            match store.read_document(&locator).await {
                                Ok(current) => details.current = Some(current),
                                Err(e) => {
                                    debug!("No snapshot for conflict on {}: {}", locator, e)
                                }
                            }
                        }
                        ReplaceOutcome::VersionConflict(details)
                    }
                    Classification::Failure(failure) => {
                        warn!("Replace of {} failed: {}", locator, failure);
                        ReplaceOutcome::OtherFailure(failure)
                    }
                },
            }
        }))
    }

    /// Replaces a previously read document, using the token it was read at.
    pub fn replace_document(
        &self,
        locator: &DocumentLocator,
        document: &Document,
    ) -> Result<PendingReplace> {
        self.replace(locator, document.body(), document.version())
    }

    /// Point-reads the current state of a document.
    pub fn read(
        &self,
        locator: &DocumentLocator,
    ) -> Result<BoxFuture<'static, std::result::Result<Document, StoreFailure>>> {
        locator.validate()?;
        let store = Arc::clone(&self.store);
        let locator = locator.clone();
        Ok(async move {
            store.read_document(&locator).await.map_err(|error| {
                let failure = classify_failure(error);
                warn!("Read of {} failed: {}", locator, failure);
                failure
            })
        }
        .boxed())
    }
}

fn validate_body(locator: &DocumentLocator, body: &Map<String, Value>) -> Result<()> {
    if let Some(name) = SYSTEM_PROPERTIES.iter().find(|name| body.contains_key(**name)) {
        return Err(OccError::InvalidBody(format!(
            "property '{}' is managed by the store",
            name
        )));
    }
    match body.get("id") {
        None => Ok(()),
        Some(Value::String(id)) if id == locator.id() => Ok(()),
        Some(other) => Err(OccError::InvalidBody(format!(
            "body id {} does not match locator id '{}'",
            other,
            locator.id()
        ))),
    }
}
