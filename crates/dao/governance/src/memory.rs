use crate::error::LedgerError;
use crate::ledger::{LedgerAccount, LedgerClient};
use async_trait::async_trait;
use dao_types::{Account, AccountKey, GovernanceTx};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// In-memory ledger used for tests, local runs, and embedding.
///
/// Accounts are seeded directly; submitted transactions are recorded in
/// arrival order and never applied.
#[derive(Default)]
pub struct InMemoryLedger {
    accounts: RwLock<HashMap<AccountKey, LedgerAccount>>,
    submitted: RwLock<Vec<GovernanceTx>>,
    rejecting: AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a typed account under `key`.
    pub async fn put_account(
        &self,
        key: AccountKey,
        account: &Account,
        timestamp: u64,
    ) -> Result<(), LedgerError> {
        let data = account
            .to_value()
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;
        self.put_raw(key, data, timestamp).await;
        Ok(())
    }

    /// Store an arbitrary payload under `key`, e.g. a legacy record.
    pub async fn put_raw(&self, key: AccountKey, data: Value, timestamp: u64) {
        let state_id = state_hash(&data);
        let account = LedgerAccount {
            account_id: key.clone(),
            state_id,
            data,
            timestamp,
        };
        self.accounts.write().await.insert(key, account);
    }

    pub async fn remove(&self, key: &AccountKey) -> Option<LedgerAccount> {
        self.accounts.write().await.remove(key)
    }

    /// Transactions submitted so far, oldest first.
    pub async fn submitted(&self) -> Vec<GovernanceTx> {
        self.submitted.read().await.clone()
    }

    /// Make subsequent submissions fail with [`LedgerError::Rejected`].
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn get_account(&self, key: &AccountKey) -> Result<Option<LedgerAccount>, LedgerError> {
        Ok(self.accounts.read().await.get(key).cloned())
    }

    async fn submit(&self, tx: GovernanceTx) -> Result<(), LedgerError> {
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(LedgerError::Rejected(format!(
                "ledger is not accepting {} transactions",
                tx.kind()
            )));
        }
        self.submitted.write().await.push(tx);
        Ok(())
    }
}

fn state_hash(data: &Value) -> String {
    let bytes = serde_json::to_vec(data).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}
