//! End-to-end governance cycle against the in-memory ledger.
//!
//! Walks one issue from opening through tally, parameter application, and
//! proposal listing, with the issue account replicating late.

use dao_governance::{
    GovernanceConfig, GovernanceGenerator, InMemoryLedger, ManualClock, ProposalAggregator,
    RetryPolicy, Submitter, TallyOutcome, TallyScheduler, TallyTarget,
};
use dao_types::{
    issue_key, proposal_key, Account, AccountKey, GovernanceTx, IssueAccount, NetworkAccount,
    NetworkParameters, ProposalAccount, TxKind,
};
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seeded_ledger() -> Arc<InMemoryLedger> {
    let ledger = Arc::new(InMemoryLedger::new());
    let network = NetworkAccount::genesis(AccountKey::zero(), NetworkParameters::default(), 0);
    ledger
        .put_account(AccountKey::zero(), &Account::Network(network), 0)
        .await
        .unwrap();
    ledger
}

fn proposal(issue: u64, number: u64, fee: f64) -> Account {
    Account::Proposal(ProposalAccount {
        id: proposal_key(issue, number),
        number,
        title: format!("proposal {}", number),
        description: String::new(),
        parameters: NetworkParameters {
            maintenance_fee: fee,
            ..NetworkParameters::default()
        },
        power: 0.0,
        total_votes: 0,
        winner: false,
        timestamp: 10,
    })
}

fn issue(number: u64, proposals: u64) -> Account {
    Account::Issue(IssueAccount {
        id: issue_key(number),
        number,
        active: Some(true),
        proposals: (1..=proposals).map(|j| proposal_key(number, j)).collect(),
        proposal_count: proposals,
        winner: None,
        timestamp: 10,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn issue_cycle_from_open_to_listing() {
    let ledger = seeded_ledger().await;
    let generator = Arc::new(
        GovernanceGenerator::new(
            ledger.clone(),
            Submitter::new("node-address", "node-1"),
            &GovernanceConfig::default(),
        )
        .with_clock(Arc::new(ManualClock::new(5_000))),
    );

    let opened = generator.raise_issue().await.unwrap();
    assert_eq!(opened.kind(), TxKind::Issue);

    // The issue account lands only after the tally loop has started waiting.
    let scheduler = TallyScheduler::new(generator.clone(), RetryPolicy::default());
    let handle = scheduler.spawn(TallyTarget::Issue);
    tokio::time::sleep(Duration::from_millis(1_200)).await;
    assert!(!handle.is_finished());

    ledger.put_account(issue_key(1), &issue(1, 2), 10).await.unwrap();
    ledger
        .put_account(proposal_key(1, 1), &proposal(1, 1, 0.001), 10)
        .await
        .unwrap();
    ledger
        .put_account(proposal_key(1, 2), &proposal(1, 2, 0.002), 10)
        .await
        .unwrap();

    match handle.outcome().await {
        TallyOutcome::Submitted { cycle, attempts, tx } => {
            assert_eq!(cycle, 1);
            assert!(attempts >= 3);
            match tx {
                GovernanceTx::Tally { proposals, .. } => {
                    assert_eq!(proposals, vec![proposal_key(1, 1), proposal_key(1, 2)]);
                }
                other => panic!("expected a tally, got {:?}", other),
            }
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    generator.apply_parameters().await.unwrap();
    generator.node_reward().await.unwrap();

    let kinds: Vec<TxKind> = ledger.submitted().await.iter().map(|tx| tx.kind()).collect();
    assert_eq!(
        kinds,
        vec![TxKind::Issue, TxKind::Tally, TxKind::Parameters, TxKind::NodeReward]
    );
    assert!(ledger
        .submitted()
        .await
        .iter()
        .all(|tx| tx.node_id() == "node-1" && tx.timestamp() == 5_000));

    let aggregator = ProposalAggregator::new(ledger.clone(), AccountKey::zero());
    let listed = aggregator.list_all_proposals().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].data["parameters"]["maintenanceFee"], 0.001);
    assert_eq!(listed[1].data["title"], "proposal 2");
}

#[tokio::test]
async fn rejected_submissions_surface_as_errors() {
    let ledger = seeded_ledger().await;
    ledger.set_rejecting(true);
    let generator = GovernanceGenerator::new(
        ledger.clone(),
        Submitter::new("node-address", "node-1"),
        &GovernanceConfig::default(),
    );

    let err = generator.raise_dev_issue().await.unwrap_err();
    assert!(!err.is_retryable());
    assert!(ledger.submitted().await.is_empty());
}
