//! Boundary to the sharded ledger.
//!
//! The ledger stores accounts and applies submitted transactions. Reads may
//! lag behind applied writes, and a submission is only acknowledged as
//! accepted, never as applied.

use crate::error::{DaoError, LedgerError, Result};
use async_trait::async_trait;
use dao_types::{resolve_type, Account, AccountKey, AccountKind, GovernanceTx};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// An account as served by the ledger: raw data plus state metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerAccount {
    pub account_id: AccountKey,
    pub state_id: String,
    pub data: Value,
    pub timestamp: u64,
}

/// Async read/submit access to the ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Read an account from the local shard or a remote one. `Ok(None)` means
    /// the account does not exist yet (or has not replicated here).
    async fn get_account(
        &self,
        key: &AccountKey,
    ) -> std::result::Result<Option<LedgerAccount>, LedgerError>;

    /// Hand a transaction to the ledger. Returns once it is accepted for
    /// processing.
    async fn submit(&self, tx: GovernanceTx) -> std::result::Result<(), LedgerError>;
}

pub type SharedLedger = Arc<dyn LedgerClient>;

/// Read and decode an account, typed or legacy.
pub async fn read_account(ledger: &dyn LedgerClient, key: &AccountKey) -> Result<Option<Account>> {
    let Some(stored) = ledger.get_account(key).await? else {
        return Ok(None);
    };
    if stored.data.is_null() {
        return Ok(None);
    }
    Account::decode(stored.data)
        .map(Some)
        .map_err(|err| DaoError::MalformedAccount {
            key: key.clone(),
            reason: err.to_string(),
        })
}

/// Cycle counters of the network account.
///
/// Only the counters are decoded so that network records with older or
/// partial parameter layouts still drive the generators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkCycles {
    #[serde(default)]
    pub issue: Option<u64>,
    #[serde(default)]
    pub dev_issue: Option<u64>,
}

/// The parts of an issue account a tally submits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueHead {
    #[serde(default)]
    pub id: Option<AccountKey>,
    #[serde(default)]
    pub proposals: Vec<AccountKey>,
}

/// The parts of a dev-issue account a dev tally submits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevIssueHead {
    #[serde(default)]
    pub id: Option<AccountKey>,
    #[serde(default)]
    pub dev_proposals: Vec<AccountKey>,
}

/// Read the singleton network account's counters. Absence is an error.
pub async fn read_network(ledger: &dyn LedgerClient, key: &AccountKey) -> Result<NetworkCycles> {
    read_projection(ledger, key, AccountKind::Network)
        .await?
        .ok_or_else(|| DaoError::AccountMissing { key: key.clone() })
}

pub async fn read_issue(ledger: &dyn LedgerClient, key: &AccountKey) -> Result<Option<IssueHead>> {
    read_projection(ledger, key, AccountKind::Issue).await
}

pub async fn read_dev_issue(
    ledger: &dyn LedgerClient,
    key: &AccountKey,
) -> Result<Option<DevIssueHead>> {
    read_projection(ledger, key, AccountKind::DevIssue).await
}

/// Decode only the fields of `T`. Payloads whose tag or structure names a
/// different kind are rejected; payloads no rule recognises are accepted.
async fn read_projection<T: DeserializeOwned>(
    ledger: &dyn LedgerClient,
    key: &AccountKey,
    expected: AccountKind,
) -> Result<Option<T>> {
    let Some(stored) = ledger.get_account(key).await? else {
        return Ok(None);
    };
    if stored.data.is_null() {
        return Ok(None);
    }

    let found = resolve_type(Some(&stored.data));
    if found != expected && found != AccountKind::Undetermined {
        return Err(unexpected(key, expected, found));
    }
    serde_json::from_value(stored.data)
        .map(Some)
        .map_err(|err| DaoError::MalformedAccount {
            key: key.clone(),
            reason: err.to_string(),
        })
}

fn unexpected(key: &AccountKey, expected: AccountKind, found: AccountKind) -> DaoError {
    DaoError::MalformedAccount {
        key: key.clone(),
        reason: format!("expected {}, found {}", expected, found),
    }
}
