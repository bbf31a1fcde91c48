use thiserror::Error;

/// Errors decoding a stored account payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountDecodeError {
    #[error("unknown account type '{0}'")]
    UnknownType(String),

    #[error("account type could not be determined from payload")]
    Undetermined,

    #[error("malformed account payload: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for AccountDecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Neither the transaction nor its receipt carried a usable timestamp.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TimestampError {
    #[error("transaction has no timestamp and no timestamp receipt was issued")]
    MissingTimestamp,
}

/// Errors decoding a DAO transaction embedded in EVM calldata.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("embedded transaction is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("embedded transaction is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
