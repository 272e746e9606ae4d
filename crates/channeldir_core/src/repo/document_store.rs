//! Document store contract shared by every collection.
//!
//! # Responsibility
//! - Uniform get/bulk-get/list/put/bulk-put/delete over one collection,
//!   selected by the entity type parameter.
//! - Optimistic concurrency through per-document versions.
//!
//! # Invariants
//! - Versions start at 1 and grow by exactly 1 per successful write.
//! - `bulk_put` outcomes are independent; there is no rollback.

use crate::db::DbError;
use crate::model::entity::{Entity, EntityKind};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Monotonic document version.
pub type DocumentVersion = i64;

pub type StoreResult<T> = Result<T, StoreError>;

/// Document together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<E> {
    pub version: DocumentVersion,
    pub entity: E,
}

/// Precondition attached to every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Overwrite or create unconditionally.
    Any,
    /// The document must not exist yet.
    Absent,
    /// The document must still be at this version.
    Exactly(DocumentVersion),
}

/// One pending document write.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentWrite<E> {
    pub entity: E,
    pub expected: ExpectedVersion,
}

impl<E> DocumentWrite<E> {
    pub fn new(entity: E, expected: ExpectedVersion) -> Self {
        Self { entity, expected }
    }
}

/// Errors from document store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    NotFound {
        kind: EntityKind,
        name: String,
    },
    /// Expected version did not match the stored one.
    Conflict {
        kind: EntityKind,
        name: String,
    },
    /// Stored or outgoing document body cannot be (de)serialized.
    InvalidDocument {
        kind: EntityKind,
        name: String,
        message: String,
    },
    /// A thread panicked while holding the connection.
    Poisoned,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { kind, name } => write!(f, "{kind} `{name}` not found"),
            Self::Conflict { kind, name } => {
                write!(f, "{kind} `{name}` was modified concurrently")
            }
            Self::InvalidDocument {
                kind,
                name,
                message,
            } => write!(f, "invalid {kind} document `{name}`: {message}"),
            Self::Poisoned => write!(f, "document store connection is poisoned"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound { .. }
            | Self::Conflict { .. }
            | Self::InvalidDocument { .. }
            | Self::Poisoned => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Per-collection document access.
///
/// The collection is chosen by the entity type parameter. Implementations
/// must be shareable across request threads.
pub trait DocumentStore: Send + Sync {
    fn get<E: Entity>(&self, name: &str) -> StoreResult<Option<Versioned<E>>>;

    /// Loads every existing document among `names`; missing names are absent
    /// from the map.
    fn bulk_get<E: Entity>(&self, names: &[String])
        -> StoreResult<BTreeMap<String, Versioned<E>>>;

    /// Lists the whole collection sorted by name.
    fn list<E: Entity>(&self) -> StoreResult<Vec<Versioned<E>>>;

    /// Writes one document and returns its new version.
    fn put<E: Entity>(&self, write: &DocumentWrite<E>) -> StoreResult<DocumentVersion>;

    /// Writes several documents independently.
    ///
    /// The outer error reports failures that prevented any attempt; the inner
    /// list holds one outcome per write in input order.
    fn bulk_put<E: Entity>(
        &self,
        writes: &[DocumentWrite<E>],
    ) -> StoreResult<Vec<StoreResult<DocumentVersion>>> {
        Ok(writes.iter().map(|write| self.put(write)).collect())
    }

    fn delete(&self, kind: EntityKind, name: &str, expected: ExpectedVersion) -> StoreResult<()>;
}
