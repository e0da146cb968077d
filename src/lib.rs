pub mod errors;
pub mod config;
pub mod data_store;
pub mod storage;
pub mod outcome;
pub mod conflict;
pub mod replacer;

// Re-export key types and structs for easier access
pub use errors::{OccError, Result};
pub use config::ConcurrencyConfig;
pub use data_store::locator::{CollectionLocator, DocumentLocator};
pub use data_store::memory::MemoryStore;
pub use data_store::versioned_document::{Document, VersionToken};
pub use storage::{DocumentStore, StoreError};
pub use outcome::{ConflictDetails, FailureCause, ReplaceOutcome, ReplaceState, StoreFailure};
pub use conflict::continuation::PendingReplace;
pub use conflict::resolution::{ConflictResolution, UpdateReport, update_with_retry};
pub use replacer::{VersionedReplacer, prelude};
