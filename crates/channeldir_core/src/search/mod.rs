//! Channel search entry points.
//!
//! # Responsibility
//! - Translate transport query pairs into channel filters.
//! - Keep match semantics inside core so every caller filters alike.

pub mod channel_query;

pub use channel_query::{ChannelQuery, Glob, QueryError, QueryResult};
