//! SQLite-backed document store.
//!
//! # Responsibility
//! - Persist one JSON document per entity in its collection table.
//! - Enforce expected versions inside single SQL statements.
//!
//! # Invariants
//! - Listing order is byte-wise by name (`BINARY` collation).
//! - A stored body always carries the same name as its row key.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::entity::{Entity, EntityKind};
use crate::repo::document_store::{
    DocumentStore, DocumentVersion, DocumentWrite, ExpectedVersion, StoreError, StoreResult,
    Versioned,
};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Upper bound of bound parameters per `IN (...)` lookup.
const BULK_GET_CHUNK: usize = 256;

const NOW_MS: &str = "CAST(strftime('%s', 'now') AS INTEGER) * 1000";

/// Document store over one shared SQLite connection.
///
/// Statements are serialized behind a mutex; read-merge-write cycles of
/// different requests interleave freely and are reconciled by versions.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    /// Wraps an already migrated connection.
    ///
    /// # Errors
    /// - `DbError::UnsupportedSchemaVersion` when the schema is not current.
    /// - `DbError::MissingCollection` when a collection table is absent.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        ensure_collections_ready(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens (creating when needed) a database file and wraps it.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::try_new(open_db(path)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }

    fn connection(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn get<E: Entity>(&self, name: &str) -> StoreResult<Option<Versioned<E>>> {
        let conn = self.connection()?;
        let table = E::KIND.collection();
        let row = conn
            .query_row(
                &format!("SELECT name, version, body FROM {table} WHERE name = ?1;"),
                [name],
                |row| Ok((row.get::<_, String>(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        row.map(|(key, version, body)| decode_row::<E>(key, version, body))
            .transpose()
    }

    fn bulk_get<E: Entity>(
        &self,
        names: &[String],
    ) -> StoreResult<BTreeMap<String, Versioned<E>>> {
        let mut found = BTreeMap::new();
        if names.is_empty() {
            return Ok(found);
        }

        let conn = self.connection()?;
        let table = E::KIND.collection();
        for chunk in names.chunks(BULK_GET_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT name, version, body FROM {table} WHERE name IN ({placeholders});"
            ))?;
            let mut rows = stmt.query(params_from_iter(chunk.iter()))?;
            while let Some(row) = rows.next()? {
                let key: String = row.get(0)?;
                let versioned = decode_row::<E>(key.clone(), row.get(1)?, row.get(2)?)?;
                found.insert(key, versioned);
            }
        }
        Ok(found)
    }

    fn list<E: Entity>(&self) -> StoreResult<Vec<Versioned<E>>> {
        let conn = self.connection()?;
        let table = E::KIND.collection();
        let mut stmt = conn.prepare(&format!(
            "SELECT name, version, body FROM {table} ORDER BY name ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            documents.push(decode_row::<E>(row.get(0)?, row.get(1)?, row.get(2)?)?);
        }
        Ok(documents)
    }

    fn put<E: Entity>(&self, write: &DocumentWrite<E>) -> StoreResult<DocumentVersion> {
        let conn = self.connection()?;
        put_document(&conn, write)
    }

    fn bulk_put<E: Entity>(
        &self,
        writes: &[DocumentWrite<E>],
    ) -> StoreResult<Vec<StoreResult<DocumentVersion>>> {
        let conn = self.connection()?;
        Ok(writes
            .iter()
            .map(|write| put_document(&conn, write))
            .collect())
    }

    fn delete(&self, kind: EntityKind, name: &str, expected: ExpectedVersion) -> StoreResult<()> {
        let conn = self.connection()?;
        let table = kind.collection();
        let changed = match expected {
            ExpectedVersion::Exactly(version) => conn.execute(
                &format!("DELETE FROM {table} WHERE name = ?1 AND version = ?2;"),
                params![name, version],
            )?,
            ExpectedVersion::Any => conn.execute(
                &format!("DELETE FROM {table} WHERE name = ?1;"),
                [name],
            )?,
            // Nothing to delete when the document must not exist.
            ExpectedVersion::Absent => 0,
        };
        if changed == 1 {
            return Ok(());
        }

        let exists: i64 = conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE name = ?1);"),
            [name],
            |row| row.get(0),
        )?;
        if exists == 1 {
            Err(StoreError::Conflict {
                kind,
                name: name.to_string(),
            })
        } else {
            Err(StoreError::NotFound {
                kind,
                name: name.to_string(),
            })
        }
    }
}

fn put_document<E: Entity>(
    conn: &Connection,
    write: &DocumentWrite<E>,
) -> StoreResult<DocumentVersion> {
    let table = E::KIND.collection();
    let name = write.entity.name();
    let body = serde_json::to_string(&write.entity).map_err(|err| StoreError::InvalidDocument {
        kind: E::KIND,
        name: name.to_string(),
        message: err.to_string(),
    })?;

    let written: Option<DocumentVersion> = match write.expected {
        ExpectedVersion::Any => Some(conn.query_row(
            &format!(
                "INSERT INTO {table} (name, version, body) VALUES (?1, 1, ?2)
                 ON CONFLICT(name) DO UPDATE SET
                    version = {table}.version + 1,
                    body = excluded.body,
                    updated_at = {NOW_MS}
                 RETURNING version;"
            ),
            params![name, body],
            |row| row.get(0),
        )?),
        ExpectedVersion::Absent => conn
            .query_row(
                &format!(
                    "INSERT INTO {table} (name, version, body) VALUES (?1, 1, ?2)
                     ON CONFLICT(name) DO NOTHING
                     RETURNING version;"
                ),
                params![name, body],
                |row| row.get(0),
            )
            .optional()?,
        ExpectedVersion::Exactly(version) => conn
            .query_row(
                &format!(
                    "UPDATE {table}
                     SET version = version + 1, body = ?2, updated_at = {NOW_MS}
                     WHERE name = ?1 AND version = ?3
                     RETURNING version;"
                ),
                params![name, body, version],
                |row| row.get(0),
            )
            .optional()?,
    };

    written.ok_or_else(|| StoreError::Conflict {
        kind: E::KIND,
        name: name.to_string(),
    })
}

fn decode_row<E: Entity>(
    key: String,
    version: DocumentVersion,
    body: String,
) -> StoreResult<Versioned<E>> {
    let entity: E = serde_json::from_str(&body).map_err(|err| StoreError::InvalidDocument {
        kind: E::KIND,
        name: key.clone(),
        message: err.to_string(),
    })?;
    if entity.name() != key {
        return Err(StoreError::InvalidDocument {
            kind: E::KIND,
            name: key,
            message: format!("body carries name `{}`", entity.name()),
        });
    }
    Ok(Versioned { version, entity })
}

fn ensure_collections_ready(conn: &Connection) -> StoreResult<()> {
    let latest = latest_version();
    let actual = current_user_version(conn)?;
    if actual != latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: actual,
            latest_supported: latest,
        }
        .into());
    }

    for kind in [EntityKind::Channel, EntityKind::Property, EntityKind::Tag] {
        let table = kind.collection();
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(DbError::MissingCollection(table).into());
        }
    }
    Ok(())
}
