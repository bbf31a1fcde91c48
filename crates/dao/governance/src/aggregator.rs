//! Read-only reconstruction of every proposal across every issue.

use crate::error::{DaoError, Result};
use crate::ledger::SharedLedger;
use dao_types::{issue_key, proposal_key, AccountKey};
use futures::{stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Proposal reads kept in flight at once for a single issue.
const PROPOSAL_READ_CONCURRENCY: usize = 16;

/// A proposal's raw data together with its position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalEntry {
    pub issue: u64,
    pub index: u64,
    pub key: AccountKey,
    pub data: Value,
}

/// Position of the next proposal to read. Both fields are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalCursor {
    pub issue: u64,
    pub index: u64,
}

impl Default for ProposalCursor {
    fn default() -> Self {
        Self { issue: 1, index: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalPage {
    pub items: Vec<ProposalEntry>,
    pub next: Option<ProposalCursor>,
}

/// Walks `issue-{i}` / `issue-{i}-proposal-{j}` accounts on demand.
///
/// Nothing is cached: every call re-reads the ledger. Missing accounts are
/// skipped, so partially replicated history yields a partial list rather
/// than an error.
#[derive(Clone)]
pub struct ProposalAggregator {
    ledger: SharedLedger,
    network_account: AccountKey,
}

impl ProposalAggregator {
    pub fn new(ledger: SharedLedger, network_account: AccountKey) -> Self {
        Self {
            ledger,
            network_account,
        }
    }

    /// Every proposal, ordered by issue then proposal index.
    pub async fn list_all_proposals(&self) -> Result<Vec<ProposalEntry>> {
        let issues = self.issue_count().await?;
        let mut proposals = Vec::new();

        for issue in 1..=issues {
            let count = self.proposal_count(issue).await?;
            let mut reads = stream::iter(1..=count)
                .map(|index| self.read_proposal(issue, index))
                .buffered(PROPOSAL_READ_CONCURRENCY);
            while let Some(entry) = reads.try_next().await? {
                proposals.extend(entry);
            }
        }

        Ok(proposals)
    }

    /// At most `limit` proposals starting at `cursor`, plus the cursor to
    /// resume from when more issues remain.
    pub async fn list_proposals_page(
        &self,
        cursor: ProposalCursor,
        limit: usize,
    ) -> Result<ProposalPage> {
        let issues = self.issue_count().await?;
        let mut items = Vec::new();
        let mut issue = cursor.issue.max(1);
        let mut index = cursor.index.max(1);

        while issue <= issues && items.len() < limit {
            let count = self.proposal_count(issue).await?;
            while index <= count && items.len() < limit {
                if let Some(entry) = self.read_proposal(issue, index).await? {
                    items.push(entry);
                }
                index += 1;
            }
            if index > count {
                issue += 1;
                index = 1;
            }
        }

        let next = (issue <= issues).then_some(ProposalCursor { issue, index });
        Ok(ProposalPage { items, next })
    }

    async fn issue_count(&self) -> Result<u64> {
        let network = self
            .ledger
            .get_account(&self.network_account)
            .await?
            .ok_or_else(|| DaoError::AccountMissing {
                key: self.network_account.clone(),
            })?;
        Ok(network
            .data
            .get("issue")
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }

    async fn proposal_count(&self, issue: u64) -> Result<u64> {
        let account = self.ledger.get_account(&issue_key(issue)).await?;
        Ok(account
            .and_then(|account| account.data.get("proposalCount").and_then(Value::as_u64))
            .unwrap_or(0))
    }

    async fn read_proposal(&self, issue: u64, index: u64) -> Result<Option<ProposalEntry>> {
        let key = proposal_key(issue, index);
        let entry = self
            .ledger
            .get_account(&key)
            .await?
            .filter(|account| !account.data.is_null())
            .map(|account| ProposalEntry {
                issue,
                index,
                key,
                data: account.data,
            });
        Ok(entry)
    }
}
