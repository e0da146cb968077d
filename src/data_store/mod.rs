/// Document and version token types shared by every component.
pub mod versioned_document;
/// Addressing of collections and documents inside a store.
pub mod locator;
/// In-memory `DocumentStore` with conditional replace semantics.
pub mod memory;
