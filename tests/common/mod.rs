//! Common utilities for docdb-concurrency integration tests.
#![allow(dead_code)]

use docdb_concurrency::prelude::*;
use futures::executor::block_on;
use rand::Rng;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use uuid::Uuid;

pub const DATABASE: &str = "test";
pub const COLLECTION: &str = "concurrencyTest";

/// A store with the test collection in place, and a replacer over it.
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub replacer: VersionedReplacer,
    pub collection: CollectionLocator,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(ConcurrencyConfig::default())
    }

    pub fn with_config(config: ConcurrencyConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let collection = CollectionLocator::new(DATABASE, COLLECTION);
        store.create_collection_if_not_exists(&collection);
        let replacer = VersionedReplacer::with_config(store.clone(), config).unwrap();
        Self {
            store,
            replacer,
            collection,
        }
    }

    /// Creates a dummy document with a random id and returns it as read back.
    pub fn create_dummy_document(&self) -> (DocumentLocator, Document) {
        let id = Uuid::new_v4().to_string();
        block_on(self.store.create_document(&self.collection, &id, dummy_body())).unwrap();
        let locator = self.collection.document(id);
        let document = block_on(self.store.read_document(&locator)).unwrap();
        (locator, document)
    }
}

/// Body of a freshly created dummy document.
pub fn dummy_body() -> Map<String, Value> {
    let mut rng = rand::rng();
    let mut body = Map::new();
    body.insert("Property1".to_string(), json!("original"));
    body.insert("Counter".to_string(), json!(0));
    body.insert("Noise".to_string(), json!(rng.random::<u32>()));
    body
}

/// Returns `document` with one property changed.
pub fn modified(document: &Document, value: &str) -> Document {
    let mut changed = document.clone();
    changed.set_property("Property1", value);
    changed
}
