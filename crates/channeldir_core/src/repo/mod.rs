//! Document store layer.
//!
//! # Responsibility
//! - Define the per-collection document access contract.
//! - Isolate SQLite query details from association resolution.
//!
//! # Invariants
//! - Every write is checked against an expected version.
//! - The store holds no merge logic; it persists whole documents.

pub mod document_store;
pub mod sqlite_store;

pub use document_store::{
    DocumentStore, DocumentVersion, DocumentWrite, ExpectedVersion, StoreError, StoreResult,
    Versioned,
};
pub use sqlite_store::SqliteDocumentStore;
