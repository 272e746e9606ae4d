//! Directory service error taxonomy and outcome mapping.

use crate::model::entity::EntityKind;
use crate::model::validation::ValidationError;
use crate::repo::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Resolution failures caused by references to documents that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferentialError {
    /// A payload names peers that do not exist.
    MissingPeers {
        kind: EntityKind,
        name: String,
        peer_kind: EntityKind,
        missing: Vec<String>,
    },
    /// A batch item without a name cannot be addressed.
    UnkeyedItem { kind: EntityKind, index: usize },
}

impl Display for ReferentialError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingPeers {
                kind,
                name,
                peer_kind,
                missing,
            } => write!(
                f,
                "{kind} `{name}` references missing {peer_kind} documents: {}",
                missing.join(", ")
            ),
            Self::UnkeyedItem { kind, index } => {
                write!(f, "{kind} batch item {index} has no name")
            }
        }
    }
}

impl Error for ReferentialError {}

/// Error returned by every directory operation.
#[derive(Debug)]
pub enum DirectoryError {
    Validation(ValidationError),
    Referential(ReferentialError),
    NotFound { kind: EntityKind, name: String },
    Unauthorized { operation: &'static str },
    /// Version conflict that outlived the retry budget.
    Conflict { kind: EntityKind, name: String },
    /// Store I/O failure.
    Store(StoreError),
}

/// Transport-neutral outcome kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Created,
    NotFound,
    Unauthorized,
    BadRequest,
    InternalError,
    Conflict,
    ServiceUnavailable,
}

impl Outcome {
    /// HTTP status code the transport layer reports for this outcome.
    pub fn status_code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Created => 201,
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::InternalError => 500,
            Self::ServiceUnavailable => 503,
        }
    }
}

impl DirectoryError {
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Validation(_) => Outcome::BadRequest,
            Self::Referential(_) => Outcome::InternalError,
            Self::NotFound { .. } => Outcome::NotFound,
            Self::Unauthorized { .. } => Outcome::Unauthorized,
            Self::Conflict { .. } => Outcome::Conflict,
            Self::Store(_) => Outcome::ServiceUnavailable,
        }
    }

    /// Stable short code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(ValidationError::Malformed(_)) => "malformed",
            Self::Validation(_) => "invalid",
            Self::Referential(_) => "referential",
            Self::NotFound { .. } => "not_found",
            Self::Unauthorized { .. } => "unauthorized",
            Self::Conflict { .. } => "conflict",
            Self::Store(_) => "store_unavailable",
        }
    }

    pub(crate) fn not_found(kind: EntityKind, name: &str) -> Self {
        Self::NotFound {
            kind,
            name: name.to_string(),
        }
    }
}

impl Display for DirectoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Referential(err) => write!(f, "{err}"),
            Self::NotFound { kind, name } => write!(f, "{kind} `{name}` not found"),
            Self::Unauthorized { operation } => {
                write!(f, "caller is not authorized to {operation}")
            }
            Self::Conflict { kind, name } => {
                write!(f, "{kind} `{name}` kept changing concurrently")
            }
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DirectoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Referential(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::NotFound { .. } | Self::Unauthorized { .. } | Self::Conflict { .. } => None,
        }
    }
}

impl From<ValidationError> for DirectoryError {
    fn from(value: ValidationError) -> Self {
        match value {
            ValidationError::UnkeyedItem { kind, index } => {
                Self::Referential(ReferentialError::UnkeyedItem { kind, index })
            }
            other => Self::Validation(other),
        }
    }
}

impl From<ReferentialError> for DirectoryError {
    fn from(value: ReferentialError) -> Self {
        Self::Referential(value)
    }
}

impl From<StoreError> for DirectoryError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict { kind, name } => Self::Conflict { kind, name },
            StoreError::NotFound { kind, name } => Self::NotFound { kind, name },
            other => Self::Store(other),
        }
    }
}
