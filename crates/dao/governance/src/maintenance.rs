//! Maintenance fee decay on user balances.

use dao_types::{NetworkAccount, UserAccount};
use serde::Serialize;

/// Fee owed at a point in time and the maintenance timestamp to persist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceAssessment {
    pub amount_due: f64,
    pub last_maintenance: u64,
}

impl MaintenanceAssessment {
    pub fn is_due(&self) -> bool {
        self.amount_due > 0.0
    }

    /// Charge the fee and advance the maintenance timestamp on `account`.
    pub fn apply_to(&self, account: &mut UserAccount) {
        account.balance -= self.amount_due;
        account.last_maintenance = self.last_maintenance;
    }
}

/// Compute the maintenance fee owed by `account` at `now`.
///
/// Nothing is owed until a full `maintenanceInterval` has passed since the
/// last assessment. After that the balance decays continuously:
/// `balance * (1 - (1 - fee) ^ (elapsed / interval))`, with partial periods
/// contributing partial decay.
pub fn assess_maintenance(
    now: u64,
    account: &UserAccount,
    network: &NetworkAccount,
) -> MaintenanceAssessment {
    let unchanged = MaintenanceAssessment {
        amount_due: 0.0,
        last_maintenance: account.last_maintenance,
    };

    let interval = network.current.maintenance_interval;
    let elapsed = now.saturating_sub(account.last_maintenance);
    if interval == 0 || elapsed < interval {
        return unchanged;
    }

    let periods = elapsed as f64 / interval as f64;
    let retained = (1.0 - network.current.maintenance_fee).powf(periods);
    let amount_due = account.balance * (1.0 - retained);

    MaintenanceAssessment {
        amount_due: if amount_due.is_finite() { amount_due } else { 0.0 },
        last_maintenance: now,
    }
}
