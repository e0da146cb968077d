use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use uuid::Uuid;

use crate::data_store::locator::{CollectionLocator, DocumentLocator};
use crate::data_store::versioned_document::{Document, SYSTEM_PROPERTIES, VersionToken};
use crate::storage::{DocumentStore, StoreError, status};

/// An in-memory document store with conditional replace semantics.
///
/// Every successful write issues a fresh, quoted UUID ETag. A replace whose
/// token does not match answers 412 together with the current document, the
/// way a real store reports a lost optimistic race.
///
/// Failures can be scripted per document with [`MemoryStore::inject_failure`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    databases: HashSet<String>,
    collections: HashMap<CollectionLocator, HashMap<String, Document>>,
    /// Queued failures keyed by document uri, consumed one per request.
    faults: HashMap<String, VecDeque<StoreError>>,
}

impl MemoryInner {
    fn take_fault(&mut self, uri: &str) -> Option<StoreError> {
        let queue = self.faults.get_mut(uri)?;
        let fault = queue.pop_front();
        if queue.is_empty() {
            self.faults.remove(uri);
        }
        fault
    }

    fn collection_mut(
        &mut self,
        collection: &CollectionLocator,
    ) -> Result<&mut HashMap<String, Document>, StoreError> {
        if !self.databases.contains(collection.database()) {
            return Err(StoreError::status(
                status::NOT_FOUND,
                format!("database '{}' not found", collection.database()),
            ));
        }
        self.collections.get_mut(collection).ok_or_else(|| {
            StoreError::status(
                status::NOT_FOUND,
                format!("collection '{}' not found", collection.uri()),
            )
        })
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the database unless it exists. Returns `true` if it was created.
    pub fn create_database_if_not_exists(&self, database: &str) -> bool {
        self.inner.lock().databases.insert(database.to_string())
    }

    /// Creates the collection, and its database, unless it exists.
    /// Returns `true` if the collection was created.
    pub fn create_collection_if_not_exists(&self, collection: &CollectionLocator) -> bool {
        let mut inner = self.inner.lock();
        inner.databases.insert(collection.database().to_string());
        if inner.collections.contains_key(collection) {
            return false;
        }
        inner.collections.insert(collection.clone(), HashMap::new());
        debug!("Created collection {}", collection);
        true
    }

    /// Makes the next request touching `locator` fail with `error`.
    ///
    /// Injected failures queue up and are consumed in order, one per request.
    pub fn inject_failure(&self, locator: &DocumentLocator, error: StoreError) {
        self.inner
            .lock()
            .faults
            .entry(locator.uri())
            .or_default()
            .push_back(error);
    }

    /// Current stored copy of a document, bypassing fault injection.
    pub fn snapshot(&self, locator: &DocumentLocator) -> Option<Document> {
        self.inner
            .lock()
            .collections
            .get(locator.collection())
            .and_then(|docs| docs.get(locator.id()))
            .cloned()
    }

    /// Unconditionally replaces a document, as a writer that skips the
    /// version check would. Returns the new token, or `None` if the document
    /// does not exist.
    pub fn overwrite(
        &self,
        locator: &DocumentLocator,
        body: Map<String, Value>,
    ) -> Option<VersionToken> {
        let mut inner = self.inner.lock();
        let docs = inner.collections.get_mut(locator.collection())?;
        if !docs.contains_key(locator.id()) {
            return None;
        }
        let document = materialize(locator.id(), body);
        let version = document.version().clone();
        docs.insert(locator.id().to_string(), document);
        Some(version)
    }
}

fn next_etag() -> VersionToken {
    VersionToken::new(format!("\"{}\"", Uuid::new_v4()))
}

/// Builds the stored form of `body`. The id and the store-owned properties
/// are kept outside the user properties.
fn materialize(id: &str, mut body: Map<String, Value>) -> Document {
    body.remove("id");
    for name in SYSTEM_PROPERTIES {
        body.remove(name);
    }
    Document::new(id, next_etag(), body)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read_document(&self, locator: &DocumentLocator) -> Result<Document, StoreError> {
        let mut inner = self.inner.lock();
        if let Some(fault) = inner.take_fault(&locator.uri()) {
            return Err(fault);
        }
        inner
            .collection_mut(locator.collection())?
            .get(locator.id())
            .cloned()
            .ok_or_else(|| {
                StoreError::status(status::NOT_FOUND, format!("document '{}' not found", locator))
            })
    }

    async fn replace_document_if_match(
        &self,
        locator: &DocumentLocator,
        body: Map<String, Value>,
        expected: &VersionToken,
    ) -> Result<Document, StoreError> {
        let mut inner = self.inner.lock();
        if let Some(fault) = inner.take_fault(&locator.uri()) {
            return Err(fault);
        }
        let docs = inner.collection_mut(locator.collection())?;
        let current = docs.get(locator.id()).ok_or_else(|| {
            StoreError::status(status::NOT_FOUND, format!("document '{}' not found", locator))
        })?;
        if current.version() != expected {
            return Err(StoreError::precondition_failed(
                format!(
                    "the operation specified an etag {} that differs from the current {}",
                    expected,
                    current.version()
                ),
                Some(current.clone()),
            ));
        }

        let document = materialize(locator.id(), body);
        docs.insert(locator.id().to_string(), document.clone());
        Ok(document)
    }

    async fn create_document(
        &self,
        collection: &CollectionLocator,
        id: &str,
        body: Map<String, Value>,
    ) -> Result<Document, StoreError> {
        let mut inner = self.inner.lock();
        if let Some(fault) = inner.take_fault(&collection.document(id).uri()) {
            return Err(fault);
        }
        let docs = inner.collection_mut(collection)?;
        if docs.contains_key(id) {
            return Err(StoreError::status(
                status::CONFLICT,
                format!("document '{}' already exists in {}", id, collection),
            ));
        }
        let document = materialize(id, body);
        docs.insert(id.to_string(), document.clone());
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use serde_json::json;

    fn seeded() -> (MemoryStore, CollectionLocator, Document) {
        let store = MemoryStore::new();
        let collection = CollectionLocator::new("test", "concurrencyTest");
        assert!(store.create_collection_if_not_exists(&collection));
        assert!(!store.create_collection_if_not_exists(&collection));
        let doc = block_on(store.create_document(&collection, "doc", Map::new())).unwrap();
        (store, collection, doc)
    }

    #[test]
    fn every_write_issues_a_fresh_token() {
        let (store, collection, doc) = seeded();
        let locator = collection.document("doc");

        let mut body = Map::new();
        body.insert("Property1".into(), json!("modified"));
        let replaced =
            block_on(store.replace_document_if_match(&locator, body, doc.version())).unwrap();

        assert_ne!(replaced.version(), doc.version());
        assert_eq!(replaced.property("Property1"), Some(&json!("modified")));
        assert_eq!(store.snapshot(&locator), Some(replaced));
    }

    #[test]
    fn stale_token_gets_412_with_current_copy() {
        let (store, collection, doc) = seeded();
        let locator = collection.document("doc");
        let newer = store.overwrite(&locator, Map::new()).unwrap();

        let err = block_on(store.replace_document_if_match(&locator, Map::new(), doc.version()))
            .unwrap_err();
        match err {
            StoreError::Status {
                status: code,
                current,
                ..
            } => {
                assert_eq!(code, status::PRECONDITION_FAILED);
                assert_eq!(current.map(|d| d.version().clone()), Some(newer));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn missing_resources_and_duplicates() {
        let (store, collection, _) = seeded();
        let missing = collection.document("nope");
        assert_eq!(
            block_on(store.read_document(&missing)).unwrap_err().status_code(),
            Some(status::NOT_FOUND)
        );
        assert_eq!(
            block_on(store.create_document(&collection, "doc", Map::new()))
                .unwrap_err()
                .status_code(),
            Some(status::CONFLICT)
        );
        assert!(store.create_database_if_not_exists("empty"));
        assert!(!store.create_database_if_not_exists("empty"));
        let no_collection = CollectionLocator::new("empty", "c");
        assert_eq!(
            block_on(store.read_document(&no_collection.document("doc")))
                .unwrap_err()
                .status_code(),
            Some(status::NOT_FOUND)
        );
        let other = CollectionLocator::new("nowhere", "c");
        assert_eq!(
            block_on(store.read_document(&other.document("doc")))
                .unwrap_err()
                .status_code(),
            Some(status::NOT_FOUND)
        );
    }

    #[test]
    fn etags_are_quoted_and_unique() {
        let (store, collection, doc) = seeded();
        let token = doc.version().as_str();
        assert!(token.len() > 2 && token.starts_with('"') && token.ends_with('"'));

        let newer = store.overwrite(&collection.document("doc"), Map::new()).unwrap();
        assert_ne!(newer.as_str(), token);
    }

    #[test]
    fn system_properties_in_a_body_are_not_stored() {
        let (store, collection, _) = seeded();
        let mut body = Map::new();
        body.insert("_etag".into(), json!("\"forged\""));
        body.insert("_ts".into(), json!(0));
        body.insert("Property1".into(), json!("x"));
        let created = block_on(store.create_document(&collection, "raw", body)).unwrap();

        assert!(created.properties().keys().all(|k| !k.starts_with('_')));
        assert_eq!(created.property("Property1"), Some(&json!("x")));

        let serialized = serde_json::to_string(&created).unwrap();
        assert_eq!(serialized.matches("\"_etag\"").count(), 1);
        let value: Value = serde_json::from_str(&serialized).unwrap();
        assert_eq!(value["_etag"], json!(created.version().as_str()));
        let back: Document = serde_json::from_value(value).unwrap();
        assert_eq!(&back, &created);
    }

    #[test]
    fn injected_failures_are_consumed_in_order() {
        let (store, collection, _) = seeded();
        let locator = collection.document("doc");
        store.inject_failure(&locator, StoreError::Timeout("first".into()));
        store.inject_failure(&locator, StoreError::status(status::FORBIDDEN, "second"));

        assert_eq!(
            block_on(store.read_document(&locator)),
            Err(StoreError::Timeout("first".into()))
        );
        assert_eq!(
            block_on(store.read_document(&locator)).unwrap_err().status_code(),
            Some(status::FORBIDDEN)
        );
        assert!(block_on(store.read_document(&locator)).is_ok());
    }
}
