use dao_types::{AccountKey, DecodeError, TimestampError, TxKind};
use thiserror::Error;

/// Errors reported by a ledger client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("ledger request timed out after {0} ms")]
    Timeout(u64),

    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl LedgerError {
    /// Whether retrying the same request later can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Unavailable(_) | LedgerError::Timeout(_))
    }
}

/// Governance core errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DaoError {
    #[error("ledger read failed: {0}")]
    Read(#[from] LedgerError),

    #[error("submitting {kind} transaction failed: {source}")]
    Submission {
        kind: TxKind,
        #[source]
        source: LedgerError,
    },

    #[error("account {key} not found")]
    AccountMissing { key: AccountKey },

    #[error("account {key} is malformed: {reason}")]
    MalformedAccount { key: AccountKey, reason: String },

    #[error(transparent)]
    Timestamp(#[from] TimestampError),

    #[error("embedded transaction could not be decoded: {0}")]
    Decode(String),

    #[error("tally task ended without reporting an outcome")]
    TaskLost,
}

impl From<DecodeError> for DaoError {
    fn from(err: DecodeError) -> Self {
        Self::Decode(err.to_string())
    }
}

impl DaoError {
    /// Whether a retry loop may try again after this error.
    ///
    /// Transient read failures and missing accounts (replication lag) are
    /// retryable. Malformed data and submission failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            DaoError::Read(err) => err.is_transient(),
            DaoError::AccountMissing { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, DaoError>;
