//! Governance account records.
//!
//! New records always carry an explicit `type` discriminant and are modelled
//! by [`Account`]. Records written before the discriminant existed are read
//! through [`Account::decode`], which falls back to the structural rules in
//! [`crate::legacy`].

use crate::error::AccountDecodeError;
use crate::key::AccountKey;
use crate::legacy;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Logical account variants understood by the governance core.
///
/// `Other` carries an explicit `type` tag this crate does not model, kept
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccountKind {
    User,
    Node,
    Alias,
    DevIssue,
    Issue,
    Network,
    Proposal,
    DevProposal,
    Undetermined,
    Other(String),
}

impl AccountKind {
    /// Discriminant string stored in the `type` field.
    pub fn as_str(&self) -> &str {
        match self {
            AccountKind::User => "UserAccount",
            AccountKind::Node => "NodeAccount",
            AccountKind::Alias => "AliasAccount",
            AccountKind::DevIssue => "DevIssueAccount",
            AccountKind::Issue => "IssueAccount",
            AccountKind::Network => "NetworkAccount",
            AccountKind::Proposal => "ProposalAccount",
            AccountKind::DevProposal => "DevProposalAccount",
            AccountKind::Undetermined => "undetermined",
            AccountKind::Other(tag) => tag,
        }
    }
}

impl Serialize for AccountKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountKind {
    type Err = AccountDecodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "UserAccount" => Ok(AccountKind::User),
            "NodeAccount" => Ok(AccountKind::Node),
            "AliasAccount" => Ok(AccountKind::Alias),
            "DevIssueAccount" => Ok(AccountKind::DevIssue),
            "IssueAccount" => Ok(AccountKind::Issue),
            "NetworkAccount" => Ok(AccountKind::Network),
            "ProposalAccount" => Ok(AccountKind::Proposal),
            "DevProposalAccount" => Ok(AccountKind::DevProposal),
            "undetermined" => Ok(AccountKind::Undetermined),
            other => Err(AccountDecodeError::UnknownType(other.to_string())),
        }
    }
}

/// Tunable network parameters voted on through issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkParameters {
    pub title: String,
    pub description: String,
    pub node_reward_interval: u64,
    pub node_reward_amount: f64,
    pub node_penalty: f64,
    pub stake_required: f64,
    /// Milliseconds between maintenance assessments.
    pub maintenance_interval: u64,
    /// Fraction of the balance charged per full interval.
    pub maintenance_fee: f64,
}

impl Default for NetworkParameters {
    fn default() -> Self {
        Self {
            title: "Default parameters".to_string(),
            description: "Genesis network parameters".to_string(),
            node_reward_interval: 3_600_000,
            node_reward_amount: 1.0,
            node_penalty: 10.0,
            stake_required: 5.0,
            maintenance_interval: 86_400_000,
            maintenance_fee: 0.0001,
        }
    }
}

/// Developer fund parameters voted on through dev-issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevParameters {
    pub title: String,
    pub description: String,
    pub dev_reward_interval: u64,
    pub dev_reward_amount: f64,
    pub dev_maintenance_fee: f64,
}

impl Default for DevParameters {
    fn default() -> Self {
        Self {
            title: "Default developer parameters".to_string(),
            description: "Genesis developer fund parameters".to_string(),
            dev_reward_interval: 3_600_000,
            dev_reward_amount: 1.0,
            dev_maintenance_fee: 0.0,
        }
    }
}

/// Inclusive `[start, end]` millisecond window.
pub type Window = [u64; 2];

/// Phase windows of one governance cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceWindows {
    pub proposal_window: Window,
    pub voting_window: Window,
    pub grace_window: Window,
    pub apply_window: Window,
}

/// A scheduled parameter change, applied when the network reaches `cycle`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterChange {
    pub cycle: u64,
    pub change: Value,
}

/// Singleton global governance state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAccount {
    pub id: AccountKey,
    pub current: NetworkParameters,
    #[serde(default)]
    pub next: Option<NetworkParameters>,
    #[serde(default)]
    pub dev_current: DevParameters,
    #[serde(default)]
    pub dev_next: Option<DevParameters>,
    #[serde(default)]
    pub windows: GovernanceWindows,
    pub dev_windows: GovernanceWindows,
    /// Current issue number, starting at 1.
    pub issue: u64,
    /// Current developer-funding issue number, starting at 1.
    pub dev_issue: u64,
    #[serde(default)]
    pub list_of_changes: Vec<ParameterChange>,
    pub timestamp: u64,
}

impl NetworkAccount {
    /// Genesis state: both cycle counters at 1.
    pub fn genesis(id: AccountKey, current: NetworkParameters, timestamp: u64) -> Self {
        Self {
            id,
            current,
            next: None,
            dev_current: DevParameters::default(),
            dev_next: None,
            windows: GovernanceWindows::default(),
            dev_windows: GovernanceWindows::default(),
            issue: 1,
            dev_issue: 1,
            list_of_changes: Vec::new(),
            timestamp,
        }
    }

    /// Changes scheduled for `cycle`, in insertion order.
    pub fn changes_for_cycle(&self, cycle: u64) -> impl Iterator<Item = &ParameterChange> {
        self.list_of_changes
            .iter()
            .filter(move |change| change.cycle == cycle)
    }
}

/// A parameter-change governance cycle (`issue-{n}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueAccount {
    pub id: AccountKey,
    pub number: u64,
    #[serde(default)]
    pub active: Option<bool>,
    pub proposals: Vec<AccountKey>,
    #[serde(default)]
    pub proposal_count: u64,
    #[serde(default)]
    pub winner: Option<AccountKey>,
    pub timestamp: u64,
}

/// A developer-funding governance cycle (`dev-issue-{n}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevIssueAccount {
    pub id: AccountKey,
    pub number: u64,
    #[serde(default)]
    pub active: Option<bool>,
    pub dev_proposals: Vec<AccountKey>,
    #[serde(default)]
    pub dev_proposal_count: u64,
    #[serde(default)]
    pub winners: Vec<AccountKey>,
    pub timestamp: u64,
}

/// Candidate parameter set within an issue (`issue-{n}-proposal-{j}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalAccount {
    pub id: AccountKey,
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub parameters: NetworkParameters,
    pub power: f64,
    pub total_votes: u64,
    #[serde(default)]
    pub winner: bool,
    pub timestamp: u64,
}

/// Developer payment request within a dev-issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevProposalAccount {
    pub id: AccountKey,
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub pay_address: String,
    pub total_amount: f64,
    #[serde(default)]
    pub payments: Vec<DeveloperPayment>,
    #[serde(default)]
    pub approve: u64,
    #[serde(default)]
    pub reject: u64,
    pub total_votes: u64,
    #[serde(default)]
    pub approved: Option<bool>,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: AccountKey,
    #[serde(default)]
    pub alias: Option<String>,
    pub balance: f64,
    /// Epoch milliseconds of the last maintenance assessment.
    pub last_maintenance: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAccount {
    pub id: AccountKey,
    pub balance: f64,
    pub node_reward_time: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasAccount {
    pub id: AccountKey,
    pub inbox: String,
    pub address: String,
    pub timestamp: u64,
}

/// Scheduled payout to a developer, released by a `developer_payment` tx.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeveloperPayment {
    pub id: String,
    pub address: String,
    pub amount: f64,
    /// Milliseconds after approval before the payment may be released.
    pub delay: u64,
    pub timestamp: u64,
}

/// Typed account record with a mandatory discriminant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Account {
    #[serde(rename = "UserAccount")]
    User(UserAccount),
    #[serde(rename = "NodeAccount")]
    Node(NodeAccount),
    #[serde(rename = "AliasAccount")]
    Alias(AliasAccount),
    #[serde(rename = "DevIssueAccount")]
    DevIssue(DevIssueAccount),
    #[serde(rename = "IssueAccount")]
    Issue(IssueAccount),
    #[serde(rename = "NetworkAccount")]
    Network(NetworkAccount),
    #[serde(rename = "ProposalAccount")]
    Proposal(ProposalAccount),
    #[serde(rename = "DevProposalAccount")]
    DevProposal(DevProposalAccount),
}

impl Account {
    pub fn kind(&self) -> AccountKind {
        match self {
            Account::User(_) => AccountKind::User,
            Account::Node(_) => AccountKind::Node,
            Account::Alias(_) => AccountKind::Alias,
            Account::DevIssue(_) => AccountKind::DevIssue,
            Account::Issue(_) => AccountKind::Issue,
            Account::Network(_) => AccountKind::Network,
            Account::Proposal(_) => AccountKind::Proposal,
            Account::DevProposal(_) => AccountKind::DevProposal,
        }
    }

    /// Decode a stored payload, typed or legacy.
    pub fn decode(value: Value) -> Result<Self, AccountDecodeError> {
        let tagged = value
            .get("type")
            .map(|tag| !tag.is_null())
            .unwrap_or(false);
        if tagged {
            return serde_json::from_value(value).map_err(AccountDecodeError::from);
        }
        Self::from_legacy_value(value)
    }

    /// Decode a payload that predates the `type` discriminant.
    pub fn from_legacy_value(value: Value) -> Result<Self, AccountDecodeError> {
        let kind = legacy::resolve_type(Some(&value));
        Ok(match kind {
            AccountKind::User => Account::User(body(value)?),
            AccountKind::Node => Account::Node(body(value)?),
            AccountKind::Alias => Account::Alias(body(value)?),
            AccountKind::DevIssue => Account::DevIssue(body(value)?),
            AccountKind::Issue => Account::Issue(body(value)?),
            AccountKind::Network => Account::Network(body(value)?),
            AccountKind::Proposal => Account::Proposal(body(value)?),
            AccountKind::DevProposal => Account::DevProposal(body(value)?),
            AccountKind::Undetermined => return Err(AccountDecodeError::Undetermined),
            AccountKind::Other(tag) => return Err(AccountDecodeError::UnknownType(tag)),
        })
    }

    pub fn to_value(&self) -> Result<Value, AccountDecodeError> {
        serde_json::to_value(self).map_err(AccountDecodeError::from)
    }
}

fn body<T: DeserializeOwned>(value: Value) -> Result<T, AccountDecodeError> {
    serde_json::from_value(value).map_err(AccountDecodeError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{issue_key, proposal_key};
    use serde_json::json;

    fn issue(number: u64) -> IssueAccount {
        IssueAccount {
            id: issue_key(number),
            number,
            active: Some(true),
            proposals: vec![proposal_key(number, 1)],
            proposal_count: 1,
            winner: None,
            timestamp: 10,
        }
    }

    #[test]
    fn typed_accounts_carry_their_discriminant() {
        let value = Account::Issue(issue(1)).to_value().unwrap();
        assert_eq!(value["type"], json!("IssueAccount"));
        assert_eq!(value["proposalCount"], json!(1));
    }

    #[test]
    fn decode_prefers_the_explicit_discriminant() {
        let value = Account::Issue(issue(4)).to_value().unwrap();
        let decoded = Account::decode(value).unwrap();
        assert_eq!(decoded, Account::Issue(issue(4)));
    }

    #[test]
    fn decode_falls_back_to_structural_rules_for_legacy_payloads() {
        let legacy = json!({
            "id": issue_key(2),
            "number": 2,
            "proposals": [],
            "proposalCount": 0,
            "timestamp": 5
        });
        let decoded = Account::decode(legacy).unwrap();
        assert_eq!(decoded.kind(), AccountKind::Issue);
    }

    #[test]
    fn legacy_user_without_alias_value_still_resolves() {
        let legacy = json!({
            "id": "user-1",
            "alias": null,
            "balance": 42.0,
            "lastMaintenance": 0,
            "timestamp": 1
        });
        match Account::decode(legacy).unwrap() {
            Account::User(user) => {
                assert_eq!(user.alias, None);
                assert_eq!(user.balance, 42.0);
            }
            other => panic!("expected user account, got {:?}", other.kind()),
        }
    }

    #[test]
    fn undetermined_legacy_payload_is_an_error() {
        let err = Account::decode(json!({ "balance": 1 })).unwrap_err();
        assert!(matches!(err, AccountDecodeError::Undetermined));
    }

    #[test]
    fn structurally_matched_but_incomplete_payload_reports_malformed() {
        let err = Account::decode(json!({ "proposals": "not-a-list" })).unwrap_err();
        assert!(matches!(err, AccountDecodeError::Malformed(_)));
    }

    #[test]
    fn kind_strings_round_trip() {
        for kind in [
            AccountKind::User,
            AccountKind::Node,
            AccountKind::Alias,
            AccountKind::DevIssue,
            AccountKind::Issue,
            AccountKind::Network,
            AccountKind::Proposal,
            AccountKind::DevProposal,
            AccountKind::Undetermined,
        ] {
            assert_eq!(kind.as_str().parse::<AccountKind>().unwrap(), kind);
        }
        assert!("Bogus".parse::<AccountKind>().is_err());
        assert_eq!(AccountKind::Other("Bogus".to_string()).as_str(), "Bogus");
    }

    #[test]
    fn genesis_network_starts_both_cycles_at_one() {
        let network = NetworkAccount::genesis(AccountKey::zero(), NetworkParameters::default(), 0);
        assert_eq!(network.issue, 1);
        assert_eq!(network.dev_issue, 1);
        assert_eq!(network.changes_for_cycle(1).count(), 0);
    }
}
