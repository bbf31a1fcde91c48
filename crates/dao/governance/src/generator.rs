//! Phase-transition transaction generators.
//!
//! Each generator reads the network account, derives the keys of the cycle it
//! acts on, and submits exactly one transaction. Success means the ledger
//! accepted the submission; nothing here waits for it to be applied.

use crate::clock::{Clock, SystemClock};
use crate::config::GovernanceConfig;
use crate::error::{DaoError, Result};
use crate::ledger::{self, NetworkCycles, SharedLedger};
use dao_types::{
    dev_issue_key, issue_key, proposal_key, AccountKey, DeveloperPayment, GovernanceTx,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Identity a node submits governance transactions under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submitter {
    pub address: String,
    pub node_id: String,
}

impl Submitter {
    pub fn new(address: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            node_id: node_id.into(),
        }
    }
}

/// Which cycle family a tally acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TallyTarget {
    Issue,
    DevIssue,
}

impl TallyTarget {
    /// Cycle number this target is currently at, if the network records it.
    pub fn cycle(self, network: &NetworkCycles) -> Option<u64> {
        match self {
            TallyTarget::Issue => network.issue,
            TallyTarget::DevIssue => network.dev_issue,
        }
    }

    fn counter(self) -> &'static str {
        match self {
            TallyTarget::Issue => "issue",
            TallyTarget::DevIssue => "devIssue",
        }
    }

    pub fn key(self, cycle: u64) -> AccountKey {
        match self {
            TallyTarget::Issue => issue_key(cycle),
            TallyTarget::DevIssue => dev_issue_key(cycle),
        }
    }
}

/// Result of a single tally attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum TallyAttempt {
    /// The (dev-)issue account was found and the tally was submitted.
    Submitted { cycle: u64, tx: GovernanceTx },
    /// The (dev-)issue account has not replicated yet. Nothing was submitted.
    NotReplicated { cycle: u64, key: AccountKey },
    /// The network moved past the expected cycle. Nothing was submitted.
    Superseded { expected: u64, current: u64 },
}

/// Builds and submits governance transactions for one node.
pub struct GovernanceGenerator {
    ledger: SharedLedger,
    submitter: Submitter,
    network_account: AccountKey,
    pay_address: Option<String>,
    clock: Arc<dyn Clock>,
}

impl GovernanceGenerator {
    pub fn new(ledger: SharedLedger, submitter: Submitter, config: &GovernanceConfig) -> Self {
        Self {
            ledger,
            submitter,
            network_account: config.network_account.clone(),
            pay_address: config.pay_address.clone(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    pub fn submitter(&self) -> &Submitter {
        &self.submitter
    }

    pub async fn network(&self) -> Result<NetworkCycles> {
        ledger::read_network(self.ledger.as_ref(), &self.network_account).await
    }

    /// Current cycle of `target`. A network record without the counter is
    /// malformed.
    pub async fn current_cycle(&self, target: TallyTarget) -> Result<u64> {
        let network = self.network().await?;
        target
            .cycle(&network)
            .ok_or_else(|| DaoError::MalformedAccount {
                key: self.network_account.clone(),
                reason: format!("missing `{}` counter", target.counter()),
            })
    }

    /// Open the current issue cycle with its first proposal slot.
    pub async fn raise_issue(&self) -> Result<GovernanceTx> {
        let issue = self.current_cycle(TallyTarget::Issue).await?;
        let tx = GovernanceTx::Issue {
            node_id: self.submitter.node_id.clone(),
            from: self.submitter.address.clone(),
            issue: issue_key(issue),
            proposal: proposal_key(issue, 1),
            timestamp: self.clock.now_ms(),
        };
        self.submit(tx).await
    }

    /// Open the current developer-funding cycle.
    pub async fn raise_dev_issue(&self) -> Result<GovernanceTx> {
        let dev_issue = self.current_cycle(TallyTarget::DevIssue).await?;
        let tx = GovernanceTx::DevIssue {
            node_id: self.submitter.node_id.clone(),
            from: self.submitter.address.clone(),
            dev_issue: dev_issue_key(dev_issue),
            timestamp: self.clock.now_ms(),
        };
        self.submit(tx).await
    }

    /// One tally attempt against whatever cycle the network is at.
    pub async fn try_tally(&self, target: TallyTarget) -> Result<TallyAttempt> {
        self.try_tally_cycle(target, None).await
    }

    /// One tally attempt. When `expected` is set and the network has moved to
    /// another cycle, nothing is submitted.
    pub async fn try_tally_cycle(
        &self,
        target: TallyTarget,
        expected: Option<u64>,
    ) -> Result<TallyAttempt> {
        let cycle = self.current_cycle(target).await?;
        if let Some(expected) = expected.filter(|expected| *expected != cycle) {
            return Ok(TallyAttempt::Superseded {
                expected,
                current: cycle,
            });
        }

        let key = target.key(cycle);
        let node_id = self.submitter.node_id.clone();
        let from = self.submitter.address.clone();
        let tx = match target {
            TallyTarget::Issue => match ledger::read_issue(self.ledger.as_ref(), &key).await? {
                Some(issue) => GovernanceTx::Tally {
                    node_id,
                    from,
                    issue: issue.id.unwrap_or_else(|| key.clone()),
                    proposals: issue.proposals,
                    timestamp: self.clock.now_ms(),
                },
                None => return Ok(not_replicated(target, cycle, key)),
            },
            TallyTarget::DevIssue => {
                match ledger::read_dev_issue(self.ledger.as_ref(), &key).await? {
                    Some(dev_issue) => GovernanceTx::DevTally {
                        node_id,
                        from,
                        dev_issue: dev_issue.id.unwrap_or_else(|| key.clone()),
                        dev_proposals: dev_issue.dev_proposals,
                        timestamp: self.clock.now_ms(),
                    },
                    None => return Ok(not_replicated(target, cycle, key)),
                }
            }
        };

        let tx = self.submit(tx).await?;
        Ok(TallyAttempt::Submitted { cycle, tx })
    }

    /// Ask the ledger to apply the winning parameters of the current issue.
    pub async fn apply_parameters(&self) -> Result<GovernanceTx> {
        let issue = self.current_cycle(TallyTarget::Issue).await?;
        let tx = GovernanceTx::Parameters {
            node_id: self.submitter.node_id.clone(),
            from: self.submitter.address.clone(),
            issue: issue_key(issue),
            timestamp: self.clock.now_ms(),
        };
        self.submit(tx).await
    }

    /// Ask the ledger to apply the winning developer proposals of the current
    /// dev-issue.
    pub async fn apply_dev_parameters(&self) -> Result<GovernanceTx> {
        let dev_issue = self.current_cycle(TallyTarget::DevIssue).await?;
        let tx = GovernanceTx::DevParameters {
            node_id: self.submitter.node_id.clone(),
            from: self.submitter.address.clone(),
            dev_issue: dev_issue_key(dev_issue),
            timestamp: self.clock.now_ms(),
        };
        self.submit(tx).await
    }

    /// Credit this node's reward to the configured pay address.
    pub async fn node_reward(&self) -> Result<GovernanceTx> {
        let to = self
            .pay_address
            .clone()
            .unwrap_or_else(|| self.submitter.address.clone());
        let tx = GovernanceTx::NodeReward {
            node_id: self.submitter.node_id.clone(),
            from: self.submitter.address.clone(),
            to,
            timestamp: self.clock.now_ms(),
        };
        self.submit(tx).await
    }

    /// Release a scheduled developer payment to its target address.
    pub async fn release_developer_payment(
        &self,
        payment: DeveloperPayment,
    ) -> Result<GovernanceTx> {
        let tx = GovernanceTx::DeveloperPayment {
            node_id: self.submitter.node_id.clone(),
            from: self.submitter.address.clone(),
            developer: payment.address.clone(),
            payment,
            timestamp: self.clock.now_ms(),
        };
        self.submit(tx).await
    }

    async fn submit(&self, tx: GovernanceTx) -> Result<GovernanceTx> {
        let kind = tx.kind();
        match self.ledger.submit(tx.clone()).await {
            Ok(()) => {
                info!(
                    tx_type = %kind,
                    node_id = %self.submitter.node_id,
                    "generated governance tx"
                );
                Ok(tx)
            }
            Err(source) => {
                error!(
                    tx_type = %kind,
                    node_id = %self.submitter.node_id,
                    error = %source,
                    "governance tx submission failed"
                );
                Err(DaoError::Submission { kind, source })
            }
        }
    }
}

fn not_replicated(target: TallyTarget, cycle: u64, key: AccountKey) -> TallyAttempt {
    debug!(?target, cycle, key = %key, "tally target account not replicated yet");
    TallyAttempt::NotReplicated { cycle, key }
}
