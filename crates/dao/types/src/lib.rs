//! Shared data model for DAO governance on a sharded ledger.
//!
//! This crate provides:
//! - content-addressed keys for issues, proposals, and dev-issues
//! - the tagged [`Account`] sum type plus a legacy structural resolver
//! - governance transaction records and timestamp resolution

#![deny(unsafe_code)]

pub mod account;
pub mod error;
pub mod key;
pub mod legacy;
pub mod tx;

pub use account::{
    Account, AccountKind, AliasAccount, DevIssueAccount, DevParameters, DevProposalAccount,
    DeveloperPayment, GovernanceWindows, IssueAccount, NetworkAccount, NetworkParameters,
    NodeAccount, ParameterChange, ProposalAccount, UserAccount, Window,
};
pub use error::{AccountDecodeError, DecodeError, TimestampError};
pub use key::{derive_key, dev_issue_key, issue_key, proposal_key, AccountKey, KeySeed};
pub use legacy::resolve_type;
pub use tx::{
    decode_embedded_tx, resolve_timestamp, GovernanceTx, InjectRequest, TimestampReceipt, TxKind,
};
