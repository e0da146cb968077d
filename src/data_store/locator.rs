use std::fmt;

use crate::errors::{OccError, Result};

/// Characters a store rejects inside a resource id.
const FORBIDDEN_ID_CHARS: [char; 4] = ['/', '\\', '?', '#'];

/// Identifies a collection inside a database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionLocator {
    database: String,
    collection: String,
}

impl CollectionLocator {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the locator of the document `id` inside this collection.
    pub fn document(&self, id: impl Into<String>) -> DocumentLocator {
        DocumentLocator {
            collection: self.clone(),
            id: id.into(),
        }
    }

    /// Resource path of the collection, `dbs/{database}/colls/{collection}`.
    pub fn uri(&self) -> String {
        format!("dbs/{}/colls/{}", self.database, self.collection)
    }

    /// Checks that both segments are usable as store resource ids.
    pub fn validate(&self) -> Result<()> {
        validate_segment("database", &self.database)?;
        validate_segment("collection", &self.collection)
    }
}

impl fmt::Display for CollectionLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

/// Unambiguously identifies one document: collection plus document id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentLocator {
    collection: CollectionLocator,
    id: String,
}

impl DocumentLocator {
    pub fn new(
        database: impl Into<String>,
        collection: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        CollectionLocator::new(database, collection).document(id)
    }

    pub fn collection(&self) -> &CollectionLocator {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Resource path of the document, `dbs/{database}/colls/{collection}/docs/{id}`.
    pub fn uri(&self) -> String {
        format!("{}/docs/{}", self.collection.uri(), self.id)
    }

    pub fn validate(&self) -> Result<()> {
        self.collection.validate()?;
        validate_segment("document id", &self.id)
    }
}

impl fmt::Display for DocumentLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

fn validate_segment(kind: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(OccError::InvalidLocator(format!("{kind} must not be empty")));
    }
    if let Some(c) = value.chars().find(|c| FORBIDDEN_ID_CHARS.contains(c)) {
        return Err(OccError::InvalidLocator(format!(
            "{kind} '{value}' contains forbidden character '{c}'"
        )));
    }
    Ok(())
}
