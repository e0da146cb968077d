use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Properties owned by the store. Callers may not write them and stores
/// never keep them among a document's user properties.
pub const SYSTEM_PROPERTIES: [&str; 4] = ["_etag", "_rid", "_self", "_ts"];

/// Opaque change token (ETag) issued by a document store.
///
/// A token identifies the exact state of a document a reader observed. It
/// carries no meaning outside the store that issued it and only supports
/// equality: a conditional replace succeeds only if the submitted token
/// equals the one currently stored for the document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    /// Wraps a raw token value as returned by the store.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the token carries no value.
    ///
    /// Stores never issue empty tokens, so an empty token can only come from
    /// caller code and is rejected before a request is sent.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document as read from the store: identifier, version token and properties.
///
/// The document is a call-scoped copy. Mutating it with [`Document::set_property`]
/// only changes the local copy; the store is updated solely by submitting the
/// whole body through a conditional replace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier, unique within its collection.
    id: String,
    /// Store-assigned token of the state this copy was read at.
    #[serde(rename = "_etag")]
    version: VersionToken,
    /// User-defined properties.
    #[serde(flatten)]
    properties: Map<String, Value>,
}

impl Document {
    /// Creates a new `Document`.
    ///
    /// Stores use this to materialize the documents they return; callers
    /// normally obtain documents by reading them.
    ///
    /// # Arguments
    ///
    /// * `id` - The document identifier.
    /// * `version` - The token the store currently holds for this document.
    /// * `properties` - The document's user-defined properties.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use docdb_concurrency::prelude::*;
    /// use serde_json::{json, Map};
    ///
    /// let mut doc = Document::new("doc-1", VersionToken::new("\"0001\""), Map::new());
    /// doc.set_property("Property1", json!("modified"));
    /// assert_eq!(doc.property("Property1"), Some(&json!("modified")));
    /// ```
    pub fn new(
        id: impl Into<String>,
        version: VersionToken,
        properties: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            version,
            properties,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the token this copy was read at.
    pub fn version(&self) -> &VersionToken {
        &self.version
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// Returns the value of a single property, if present.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Sets a property on the local copy, returning the previous value.
    pub fn set_property(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Option<Value> {
        self.properties.insert(name.into(), value.into())
    }

    /// Returns the full replacement body for this document.
    ///
    /// The body holds the user properties plus `id`; the version token is
    /// never part of the body, it travels as the replace precondition.
    pub fn body(&self) -> Map<String, Value> {
        let mut body = self.properties.clone();
        body.insert("id".to_string(), Value::String(self.id.clone()));
        body
    }
}
