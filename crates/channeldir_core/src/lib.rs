//! Channel directory core.
//! Channels, properties and tags stored as independent documents, with the
//! association rules that keep their edge lists consistent.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use config::{ConfigError, DirectoryConfig};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LoggingError};
pub use model::entity::{
    Attribute, Channel, ChannelRef, Entity, EntityKind, Property, PropertyRef, Tag, TagRef,
};
pub use model::payload::{ChannelPayload, Payload, PropertyPayload, TagPayload};
pub use model::validation::ValidationError;
pub use repo::{DocumentStore, ExpectedVersion, SqliteDocumentStore, StoreError};
pub use search::{ChannelQuery, QueryError};
pub use service::{
    Access, DirectoryError, DirectoryResult, DirectoryService, Outcome, ReferentialError,
    Resolvable, Written,
};

/// Minimal health-check API for embedding callers.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
