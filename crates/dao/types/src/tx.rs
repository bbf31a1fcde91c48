//! Governance transaction records and the helpers that surround injection.

use crate::account::DeveloperPayment;
use crate::error::{DecodeError, TimestampError};
use crate::key::AccountKey;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase-transition transactions submitted to the ledger.
///
/// Every variant carries the submitting node, the submitter address, and an
/// epoch-millisecond timestamp next to its phase-specific references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum GovernanceTx {
    Issue {
        node_id: String,
        from: String,
        issue: AccountKey,
        proposal: AccountKey,
        timestamp: u64,
    },
    DevIssue {
        node_id: String,
        from: String,
        dev_issue: AccountKey,
        timestamp: u64,
    },
    Tally {
        node_id: String,
        from: String,
        issue: AccountKey,
        proposals: Vec<AccountKey>,
        timestamp: u64,
    },
    DevTally {
        node_id: String,
        from: String,
        dev_issue: AccountKey,
        dev_proposals: Vec<AccountKey>,
        timestamp: u64,
    },
    Parameters {
        node_id: String,
        from: String,
        issue: AccountKey,
        timestamp: u64,
    },
    DevParameters {
        node_id: String,
        from: String,
        dev_issue: AccountKey,
        timestamp: u64,
    },
    NodeReward {
        node_id: String,
        from: String,
        to: String,
        timestamp: u64,
    },
    DeveloperPayment {
        node_id: String,
        from: String,
        developer: String,
        payment: DeveloperPayment,
        timestamp: u64,
    },
}

/// Discriminant of a [`GovernanceTx`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Issue,
    DevIssue,
    Tally,
    DevTally,
    Parameters,
    DevParameters,
    NodeReward,
    DeveloperPayment,
}

impl TxKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TxKind::Issue => "issue",
            TxKind::DevIssue => "dev_issue",
            TxKind::Tally => "tally",
            TxKind::DevTally => "dev_tally",
            TxKind::Parameters => "parameters",
            TxKind::DevParameters => "dev_parameters",
            TxKind::NodeReward => "node_reward",
            TxKind::DeveloperPayment => "developer_payment",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GovernanceTx {
    pub fn kind(&self) -> TxKind {
        match self {
            GovernanceTx::Issue { .. } => TxKind::Issue,
            GovernanceTx::DevIssue { .. } => TxKind::DevIssue,
            GovernanceTx::Tally { .. } => TxKind::Tally,
            GovernanceTx::DevTally { .. } => TxKind::DevTally,
            GovernanceTx::Parameters { .. } => TxKind::Parameters,
            GovernanceTx::DevParameters { .. } => TxKind::DevParameters,
            GovernanceTx::NodeReward { .. } => TxKind::NodeReward,
            GovernanceTx::DeveloperPayment { .. } => TxKind::DeveloperPayment,
        }
    }

    pub fn node_id(&self) -> &str {
        match self {
            GovernanceTx::Issue { node_id, .. }
            | GovernanceTx::DevIssue { node_id, .. }
            | GovernanceTx::Tally { node_id, .. }
            | GovernanceTx::DevTally { node_id, .. }
            | GovernanceTx::Parameters { node_id, .. }
            | GovernanceTx::DevParameters { node_id, .. }
            | GovernanceTx::NodeReward { node_id, .. }
            | GovernanceTx::DeveloperPayment { node_id, .. } => node_id,
        }
    }

    pub fn submitter(&self) -> &str {
        match self {
            GovernanceTx::Issue { from, .. }
            | GovernanceTx::DevIssue { from, .. }
            | GovernanceTx::Tally { from, .. }
            | GovernanceTx::DevTally { from, .. }
            | GovernanceTx::Parameters { from, .. }
            | GovernanceTx::DevParameters { from, .. }
            | GovernanceTx::NodeReward { from, .. }
            | GovernanceTx::DeveloperPayment { from, .. } => from,
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            GovernanceTx::Issue { timestamp, .. }
            | GovernanceTx::DevIssue { timestamp, .. }
            | GovernanceTx::Tally { timestamp, .. }
            | GovernanceTx::DevTally { timestamp, .. }
            | GovernanceTx::Parameters { timestamp, .. }
            | GovernanceTx::DevParameters { timestamp, .. }
            | GovernanceTx::NodeReward { timestamp, .. }
            | GovernanceTx::DeveloperPayment { timestamp, .. } => *timestamp,
        }
    }

    /// Stamp the timestamp the transaction is applied at.
    pub fn set_timestamp(&mut self, value: u64) {
        match self {
            GovernanceTx::Issue { timestamp, .. }
            | GovernanceTx::DevIssue { timestamp, .. }
            | GovernanceTx::Tally { timestamp, .. }
            | GovernanceTx::DevTally { timestamp, .. }
            | GovernanceTx::Parameters { timestamp, .. }
            | GovernanceTx::DevParameters { timestamp, .. }
            | GovernanceTx::NodeReward { timestamp, .. }
            | GovernanceTx::DeveloperPayment { timestamp, .. } => *timestamp = value,
        }
    }
}

/// Timestamp agreed by the network for a transaction that was injected
/// without one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampReceipt {
    pub tx_id: String,
    pub cycle_marker: String,
    pub cycle_counter: u64,
    pub timestamp: u64,
}

/// Pick the timestamp a transaction is applied at.
///
/// A non-zero timestamp on the injected transaction wins; otherwise the
/// network-generated receipt is used. Zero counts as absent on both sides.
pub fn resolve_timestamp(
    tx_timestamp: Option<u64>,
    receipt: Option<&TimestampReceipt>,
) -> Result<u64, TimestampError> {
    if let Some(timestamp) = tx_timestamp.filter(|ts| *ts != 0) {
        tracing::debug!(timestamp, "timestamp extracted from the injected tx");
        return Ok(timestamp);
    }
    if let Some(timestamp) = receipt.map(|r| r.timestamp).filter(|ts| *ts != 0) {
        tracing::debug!(timestamp, "timestamp generated by the network nodes");
        return Ok(timestamp);
    }
    Err(TimestampError::MissingTimestamp)
}

/// Body of an inject request: a transaction plus its client timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectRequest<T> {
    pub timestamp: u64,
    pub tx: T,
}

/// Decode a DAO transaction carried as ASCII JSON in EVM calldata.
pub fn decode_embedded_tx<T: DeserializeOwned>(calldata: &[u8]) -> Result<T, DecodeError> {
    let text = std::str::from_utf8(calldata)?;
    tracing::trace!(payload = text, "decoding embedded dao tx");
    Ok(serde_json::from_str(text)?)
}
