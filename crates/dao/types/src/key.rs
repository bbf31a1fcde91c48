//! Content-addressed account keys.
//!
//! Governance accounts are located by hashing a descriptive seed string
//! (`issue-3`, `issue-3-proposal-1`, `dev-issue-2`). Every ledger client must
//! derive the same key from the same seed, so the seed formats here are a
//! stable wire convention.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Length in hex characters of a derived key.
pub const KEY_HEX_LEN: usize = 64;

/// Address of an account on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountKey(String);

impl AccountKey {
    /// Wrap an existing key (for example a configured singleton address).
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive a key from a seed string.
    pub fn derive(seed: &str) -> Self {
        derive_key(seed)
    }

    /// The conventional address of the singleton network account.
    pub fn zero() -> Self {
        Self("0".repeat(KEY_HEX_LEN))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AccountKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Hash a seed string into a content-addressed key (lower-case hex blake3).
pub fn derive_key(seed: &str) -> AccountKey {
    AccountKey(blake3::hash(seed.as_bytes()).to_hex().to_string())
}

/// Seed strings for every governance account kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySeed {
    Issue(u64),
    IssueProposal { issue: u64, proposal: u64 },
    DevIssue(u64),
}

impl KeySeed {
    pub fn key(self) -> AccountKey {
        derive_key(&self.to_string())
    }
}

impl fmt::Display for KeySeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySeed::Issue(n) => write!(f, "issue-{}", n),
            KeySeed::IssueProposal { issue, proposal } => {
                write!(f, "issue-{}-proposal-{}", issue, proposal)
            }
            KeySeed::DevIssue(n) => write!(f, "dev-issue-{}", n),
        }
    }
}

pub fn issue_key(issue: u64) -> AccountKey {
    KeySeed::Issue(issue).key()
}

pub fn proposal_key(issue: u64, proposal: u64) -> AccountKey {
    KeySeed::IssueProposal { issue, proposal }.key()
}

pub fn dev_issue_key(dev_issue: u64) -> AccountKey {
    KeySeed::DevIssue(dev_issue).key()
}
