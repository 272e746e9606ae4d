//! Directory domain model.
//!
//! # Responsibility
//! - Define channel/property/tag documents and their edge references.
//! - Decode client payloads and validate them before any store access.
//!
//! # Invariants
//! - Every document is identified by its case-sensitive `name`.
//! - Edge lists are sets keyed by peer name and kept sorted by name.
//! - Edges reference peers by name only; documents never own each other.

pub mod entity;
pub mod payload;
pub mod validation;
