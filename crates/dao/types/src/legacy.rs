//! Compatibility boundary for accounts stored without a `type` discriminant.
//!
//! Only [`crate::account::Account::decode`] and read-only inspection paths
//! should call into this module. Anything that writes an account must use the
//! tagged [`crate::account::Account`] representation.

use crate::account::AccountKind;
use serde_json::Value;

/// Infer the variant of an untyped account payload.
///
/// Rules are checked in priority order and the first match wins. A key that
/// is present counts even when its value is `null`; only the `type` field
/// treats `null` as absent. An explicit tag is returned as is, with tags the
/// crate does not model kept in [`AccountKind::Other`]. Never fails: a
/// payload no rule matches is [`AccountKind::Undetermined`].
pub fn resolve_type(payload: Option<&Value>) -> AccountKind {
    let data = match payload {
        None | Some(Value::Null) => return AccountKind::Undetermined,
        Some(data) => data,
    };

    if let Some(tag) = data.get("type").filter(|tag| !tag.is_null()) {
        let tag = tag
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| tag.to_string());
        return tag.parse().unwrap_or(AccountKind::Other(tag));
    }

    let has = |field: &str| data.get(field).is_some();

    if has("alias") {
        return AccountKind::User;
    }
    if has("nodeRewardTime") {
        return AccountKind::Node;
    }
    if has("inbox") {
        return AccountKind::Alias;
    }
    if has("devProposals") {
        return AccountKind::DevIssue;
    }
    if has("proposals") {
        return AccountKind::Issue;
    }
    if has("devWindows") {
        return AccountKind::Network;
    }
    if has("totalVotes") {
        if has("power") {
            return AccountKind::Proposal;
        }
        if has("payAddress") {
            return AccountKind::DevProposal;
        }
    }
    AccountKind::Undetermined
}
