//! DAO governance core.
//!
//! Builds governance transactions from the current network state, retries
//! tallies until the target issue has replicated to this node, assesses
//! maintenance fees, and reconstructs the full proposal history from
//! content-addressed accounts.
//!
//! All ledger access goes through the [`LedgerClient`] trait; an
//! [`InMemoryLedger`] is provided for tests and local development.

#![deny(unsafe_code)]

pub mod aggregator;
pub mod clock;
pub mod config;
pub mod error;
pub mod generator;
pub mod ledger;
pub mod maintenance;
pub mod memory;
pub mod tally;

pub use aggregator::{ProposalAggregator, ProposalCursor, ProposalEntry, ProposalPage};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{GovernanceConfig, RetryPolicyConfig};
pub use error::{DaoError, LedgerError, Result};
pub use generator::{GovernanceGenerator, Submitter, TallyAttempt, TallyTarget};
pub use ledger::{
    read_account, read_dev_issue, read_issue, read_network, DevIssueHead, IssueHead,
    LedgerAccount, LedgerClient, NetworkCycles, SharedLedger,
};
pub use maintenance::{assess_maintenance, MaintenanceAssessment};
pub use memory::InMemoryLedger;
pub use tally::{RetryPolicy, TallyHandle, TallyLoop, TallyOutcome, TallyScheduler, TallyState};
