//! Error types for the store layer.
//!
//! Repository functions return [`StoreResult`]. The CLI layer wraps these in
//! `anyhow` with context; library callers can match on [`StoreError`] to tell a
//! missing record apart from a driver failure.

use thiserror::Error;

/// Errors surfaced by the repository functions in [`crate::store`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row with the given ID exists.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A stored record could not be parsed back into its entity.
    #[error("malformed {kind} record {id}: {reason}")]
    Malformed {
        kind: &'static str,
        id: String,
        reason: String,
    },

    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    #[error("failed to encode {kind}: {source}")]
    Encode {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn malformed(kind: &'static str, id: impl Into<String>, reason: impl ToString) -> Self {
        Self::Malformed {
            kind,
            id: id.into(),
            reason: reason.to_string(),
        }
    }

    /// `true` for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
