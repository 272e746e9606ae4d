//! Directory use-case services.
//!
//! # Responsibility
//! - Orchestrate validation, association resolution and store writes.
//! - Map every failure onto one transport-neutral outcome.

pub mod access;
pub mod directory_service;
pub mod error;
pub mod resolver;

pub use access::Access;
pub use directory_service::DirectoryService;
pub use error::{DirectoryError, DirectoryResult, Outcome, ReferentialError};
pub use resolver::{Resolvable, WritePlan, Written};
