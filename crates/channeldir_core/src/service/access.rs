//! Caller authorization decision as handed over by the transport layer.

use crate::service::error::{DirectoryError, DirectoryResult};

/// Pre-computed authorization of one caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No credentials.
    Anonymous,
    /// Authenticated without the modifying role.
    Reader,
    /// Authenticated with the modifying role.
    Modifier,
}

impl Access {
    pub fn from_decision(authenticated: bool, may_mutate: bool) -> Self {
        match (authenticated, may_mutate) {
            (true, true) => Self::Modifier,
            (true, false) => Self::Reader,
            (false, _) => Self::Anonymous,
        }
    }

    pub fn may_mutate(self) -> bool {
        matches!(self, Self::Modifier)
    }

    /// Fails with `Unauthorized` unless the caller may run `operation`.
    pub fn require_mutation(self, operation: &'static str) -> DirectoryResult<()> {
        if self.may_mutate() {
            Ok(())
        } else {
            Err(DirectoryError::Unauthorized { operation })
        }
    }
}
