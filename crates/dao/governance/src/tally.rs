//! Tally retry loop.
//!
//! A tally can only be built once the (dev-)issue account of the cycle has
//! replicated to this node. The loop polls for it on a fixed delay, submits
//! exactly one tally once it appears, and stops. Loops run as independent
//! tokio tasks and share a shutdown signal owned by [`TallyScheduler`].

use crate::error::DaoError;
use crate::generator::{GovernanceGenerator, TallyAttempt, TallyTarget};
use dao_types::GovernanceTx;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Delays and attempt cap for a tally loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait after the target account was not found.
    pub not_found_delay: Duration,
    /// Wait after a transient read failure.
    pub error_delay: Duration,
    /// `None` retries until the account appears, the cycle rolls over, or
    /// the loop is cancelled.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            not_found_delay: Duration::from_millis(500),
            error_delay: Duration::from_millis(1000),
            max_attempts: None,
        }
    }
}

/// Observable loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TallyState {
    Waiting { attempts: u32 },
    Submitted { attempts: u32 },
}

impl TallyState {
    pub fn attempts(&self) -> u32 {
        match *self {
            TallyState::Waiting { attempts } | TallyState::Submitted { attempts } => attempts,
        }
    }
}

/// How a tally loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TallyOutcome {
    Submitted {
        cycle: u64,
        attempts: u32,
        tx: GovernanceTx,
    },
    /// The network rolled over to another cycle before the account appeared.
    Superseded {
        expected: u64,
        current: u64,
        attempts: u32,
    },
    Cancelled {
        attempts: u32,
    },
    Exhausted {
        attempts: u32,
    },
    /// A non-retryable error: malformed data or a rejected submission.
    Failed {
        attempts: u32,
        error: DaoError,
    },
}

/// One tally loop for one target.
pub struct TallyLoop {
    generator: Arc<GovernanceGenerator>,
    target: TallyTarget,
    policy: RetryPolicy,
    state: watch::Sender<TallyState>,
}

impl TallyLoop {
    pub fn new(
        generator: Arc<GovernanceGenerator>,
        target: TallyTarget,
        policy: RetryPolicy,
    ) -> (Self, watch::Receiver<TallyState>) {
        let (state, state_rx) = watch::channel(TallyState::Waiting { attempts: 0 });
        (
            Self {
                generator,
                target,
                policy,
                state,
            },
            state_rx,
        )
    }

    /// Drive the loop to completion. Returns early with
    /// [`TallyOutcome::Cancelled`] once `shutdown` turns true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> TallyOutcome {
        let node_id = self.generator.submitter().node_id.clone();
        let mut pinned_cycle = None;
        let mut attempts = 0u32;

        loop {
            if *shutdown.borrow() {
                info!(target_kind = ?self.target, attempts, "tally loop cancelled");
                return TallyOutcome::Cancelled { attempts };
            }
            if let Some(max) = self.policy.max_attempts {
                if attempts >= max {
                    warn!(target_kind = ?self.target, attempts, "tally loop gave up");
                    return TallyOutcome::Exhausted { attempts };
                }
            }

            attempts += 1;
            self.state.send_replace(TallyState::Waiting { attempts });

            let delay = match self.generator.try_tally_cycle(self.target, pinned_cycle).await {
                Ok(TallyAttempt::Submitted { cycle, tx }) => {
                    self.state.send_replace(TallyState::Submitted { attempts });
                    info!(
                        target_kind = ?self.target,
                        cycle,
                        attempts,
                        node_id = %node_id,
                        "tally submitted"
                    );
                    return TallyOutcome::Submitted {
                        cycle,
                        attempts,
                        tx,
                    };
                }
                Ok(TallyAttempt::NotReplicated { cycle, .. }) => {
                    pinned_cycle.get_or_insert(cycle);
                    debug!(
                        target_kind = ?self.target,
                        cycle,
                        attempts,
                        "tally waiting for account"
                    );
                    self.policy.not_found_delay
                }
                Ok(TallyAttempt::Superseded { expected, current }) => {
                    info!(
                        target_kind = ?self.target,
                        expected,
                        current,
                        "tally superseded by cycle rollover"
                    );
                    return TallyOutcome::Superseded {
                        expected,
                        current,
                        attempts,
                    };
                }
                Err(err) if err.is_retryable() => {
                    warn!(
                        target_kind = ?self.target,
                        attempts,
                        error = %err,
                        "tally read failed, retrying"
                    );
                    self.policy.error_delay
                }
                Err(err) => {
                    error!(target_kind = ?self.target, attempts, error = %err, "tally failed");
                    return TallyOutcome::Failed {
                        attempts,
                        error: err,
                    };
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(target_kind = ?self.target, attempts, "tally loop cancelled");
                        return TallyOutcome::Cancelled { attempts };
                    }
                }
            }
        }
    }
}

/// Handle to a spawned tally loop. Clones observe the same loop.
#[derive(Clone)]
pub struct TallyHandle {
    pub target: TallyTarget,
    state: watch::Receiver<TallyState>,
    outcome: watch::Receiver<Option<TallyOutcome>>,
}

impl TallyHandle {
    pub fn state(&self) -> TallyState {
        *self.state.borrow()
    }

    /// True once the loop reported an outcome or its task is gone.
    pub fn is_finished(&self) -> bool {
        self.outcome.borrow().is_some() || self.outcome.has_changed().is_err()
    }

    /// Wait for the loop to end. A task that died without reporting (a
    /// panic or runtime shutdown) ends as [`DaoError::TaskLost`].
    pub async fn outcome(&self) -> TallyOutcome {
        let mut outcome = self.outcome.clone();
        let reported = match outcome.wait_for(Option::is_some).await {
            Ok(reported) => reported.clone(),
            Err(_) => None,
        };
        reported.or_else(|| self.outcome.borrow().clone()).unwrap_or_else(|| {
            error!(target_kind = ?self.target, "tally task ended without an outcome");
            TallyOutcome::Failed {
                attempts: self.state().attempts(),
                error: DaoError::TaskLost,
            }
        })
    }
}

/// Spawns tally loops, at most one running loop per target, and stops them
/// all on shutdown.
pub struct TallyScheduler {
    generator: Arc<GovernanceGenerator>,
    policy: RetryPolicy,
    shutdown_tx: watch::Sender<bool>,
    running: Mutex<HashMap<TallyTarget, TallyHandle>>,
}

impl TallyScheduler {
    pub fn new(generator: Arc<GovernanceGenerator>, policy: RetryPolicy) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            generator,
            policy,
            shutdown_tx,
            running: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Start a tally loop for `target` as an independent task, or return the
    /// loop already running for it.
    pub fn spawn(&self, target: TallyTarget) -> TallyHandle {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = running.get(&target).filter(|handle| !handle.is_finished()) {
            debug!(target_kind = ?target, "tally loop already running");
            return handle.clone();
        }

        let (tally, state) = TallyLoop::new(self.generator.clone(), target, self.policy);
        let (outcome_tx, outcome) = watch::channel(None);
        let shutdown = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            let ended = tally.run(shutdown).await;
            outcome_tx.send_replace(Some(ended));
        });

        let handle = TallyHandle {
            target,
            state,
            outcome,
        };
        running.insert(target, handle.clone());
        handle
    }

    /// The most recent loop spawned for `target`, running or finished.
    pub fn handle(&self, target: TallyTarget) -> Option<TallyHandle> {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&target)
            .cloned()
    }

    /// Signal every running loop to stop.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }
}

impl Drop for TallyScheduler {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GovernanceConfig;
    use crate::error::LedgerError;
    use crate::generator::Submitter;
    use crate::ledger::{LedgerAccount, LedgerClient};
    use crate::memory::InMemoryLedger;
    use async_trait::async_trait;
    use dao_types::{
        issue_key, proposal_key, Account, AccountKey, IssueAccount, NetworkAccount,
        NetworkParameters,
    };
    use serde_json::json;
    use std::collections::VecDeque;
    use tokio::time::Instant;

    enum Script {
        Missing,
        Fail(LedgerError),
    }

    /// Serves the network account from an inner ledger and scripts the first
    /// reads of one issue key.
    struct ScriptedLedger {
        inner: InMemoryLedger,
        watched: AccountKey,
        script: Mutex<VecDeque<Script>>,
        reads: Mutex<u32>,
    }

    impl ScriptedLedger {
        async fn new(cycle: u64, script: Vec<Script>) -> Arc<Self> {
            let inner = InMemoryLedger::new();
            let mut network =
                NetworkAccount::genesis(AccountKey::zero(), NetworkParameters::default(), 0);
            network.issue = cycle;
            inner
                .put_account(AccountKey::zero(), &Account::Network(network), 0)
                .await
                .unwrap();
            let issue = IssueAccount {
                id: issue_key(cycle),
                number: cycle,
                active: Some(true),
                proposals: vec![proposal_key(cycle, 1)],
                proposal_count: 1,
                winner: None,
                timestamp: 0,
            };
            inner
                .put_account(issue_key(cycle), &Account::Issue(issue), 0)
                .await
                .unwrap();
            Arc::new(Self {
                inner,
                watched: issue_key(cycle),
                script: Mutex::new(script.into()),
                reads: Mutex::new(0),
            })
        }

        fn reads(&self) -> u32 {
            *self.reads.lock().unwrap()
        }
    }

    #[async_trait]
    impl LedgerClient for ScriptedLedger {
        async fn get_account(
            &self,
            key: &AccountKey,
        ) -> Result<Option<LedgerAccount>, LedgerError> {
            if *key == self.watched {
                *self.reads.lock().unwrap() += 1;
                let step = self.script.lock().unwrap().pop_front();
                match step {
                    Some(Script::Missing) => return Ok(None),
                    Some(Script::Fail(err)) => return Err(err),
                    None => {}
                }
            }
            self.inner.get_account(key).await
        }

        async fn submit(&self, tx: GovernanceTx) -> Result<(), LedgerError> {
            self.inner.submit(tx).await
        }
    }

    fn generator(ledger: Arc<ScriptedLedger>) -> Arc<GovernanceGenerator> {
        Arc::new(GovernanceGenerator::new(
            ledger,
            Submitter::new("0xnode", "node-1"),
            &GovernanceConfig::default(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn submits_once_after_account_replicates() {
        let ledger = ScriptedLedger::new(3, vec![Script::Missing, Script::Missing]).await;
        let scheduler = TallyScheduler::new(generator(ledger.clone()), RetryPolicy::default());

        let started = Instant::now();
        let handle = scheduler.spawn(TallyTarget::Issue);
        let outcome = handle.outcome().await;

        match outcome {
            TallyOutcome::Submitted { cycle, attempts, tx } => {
                assert_eq!(cycle, 3);
                assert_eq!(attempts, 3);
                assert!(matches!(
                    tx,
                    GovernanceTx::Tally { ref issue, .. } if *issue == issue_key(3)
                ));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(started.elapsed() >= Duration::from_millis(1000));
        assert_eq!(handle.state(), TallyState::Submitted { attempts: 3 });
        assert_eq!(ledger.reads(), 3);
        assert_eq!(ledger.inner.submitted().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_spawns_share_one_loop() {
        let script = (0..4).map(|_| Script::Missing).collect();
        let ledger = ScriptedLedger::new(2, script).await;
        let scheduler = TallyScheduler::new(generator(ledger.clone()), RetryPolicy::default());

        let first = scheduler.spawn(TallyTarget::Issue);
        tokio::time::sleep(Duration::from_millis(600)).await;
        let second = scheduler.spawn(TallyTarget::Issue);

        let (first, second) = tokio::join!(first.outcome(), second.outcome());
        assert_eq!(first, second);
        assert!(matches!(first, TallyOutcome::Submitted { attempts: 5, .. }));
        assert_eq!(ledger.reads(), 5);
        assert_eq!(ledger.inner.submitted().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_loops_are_replaced_on_spawn() {
        let ledger = ScriptedLedger::new(1, vec![]).await;
        let scheduler = TallyScheduler::new(generator(ledger.clone()), RetryPolicy::default());

        let first = scheduler.spawn(TallyTarget::Issue).outcome().await;
        assert!(matches!(first, TallyOutcome::Submitted { .. }));
        assert!(scheduler
            .handle(TallyTarget::Issue)
            .is_some_and(|handle| handle.is_finished()));

        let second = scheduler.spawn(TallyTarget::Issue).outcome().await;
        assert!(matches!(second, TallyOutcome::Submitted { .. }));
        assert_eq!(ledger.inner.submitted().await.len(), 2);
        assert!(scheduler.handle(TallyTarget::DevIssue).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn loop_tallies_minimal_issue_records() {
        let ledger = ScriptedLedger::new(4, vec![Script::Missing]).await;
        ledger
            .inner
            .put_raw(
                issue_key(4),
                json!({ "proposals": [proposal_key(4, 1)], "proposalCount": 1 }),
                0,
            )
            .await;
        let scheduler = TallyScheduler::new(generator(ledger.clone()), RetryPolicy::default());

        let outcome = scheduler.spawn(TallyTarget::Issue).outcome().await;

        match outcome {
            TallyOutcome::Submitted { cycle, attempts, tx } => {
                assert_eq!(cycle, 4);
                assert_eq!(attempts, 2);
                assert!(matches!(
                    tx,
                    GovernanceTx::Tally { ref issue, .. } if *issue == issue_key(4)
                ));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn read_errors_back_off_longer() {
        let ledger = ScriptedLedger::new(
            1,
            vec![Script::Fail(LedgerError::Unavailable("shard down".into()))],
        )
        .await;
        let scheduler = TallyScheduler::new(generator(ledger.clone()), RetryPolicy::default());

        let started = Instant::now();
        let outcome = scheduler.spawn(TallyTarget::Issue).outcome().await;

        assert!(matches!(outcome, TallyOutcome::Submitted { attempts: 2, .. }));
        assert!(started.elapsed() >= Duration::from_millis(1000));
        assert_eq!(ledger.inner.submitted().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_read_faults_stop_the_loop() {
        let ledger = ScriptedLedger::new(
            1,
            vec![Script::Fail(LedgerError::Serialization("bad bytes".into()))],
        )
        .await;
        let scheduler = TallyScheduler::new(generator(ledger.clone()), RetryPolicy::default());

        let outcome = scheduler.spawn(TallyTarget::Issue).outcome().await;

        assert!(matches!(outcome, TallyOutcome::Failed { attempts: 1, .. }));
        assert!(ledger.inner.submitted().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_cap_ends_the_loop() {
        let ledger = ScriptedLedger::new(
            1,
            vec![Script::Missing, Script::Missing, Script::Missing],
        )
        .await;
        let policy = RetryPolicy {
            max_attempts: Some(2),
            ..RetryPolicy::default()
        };
        let scheduler = TallyScheduler::new(generator(ledger.clone()), policy);

        let outcome = scheduler.spawn(TallyTarget::Issue).outcome().await;

        assert_eq!(outcome, TallyOutcome::Exhausted { attempts: 2 });
        assert!(ledger.inner.submitted().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_waiting_loops() {
        let script = (0..100).map(|_| Script::Missing).collect();
        let ledger = ScriptedLedger::new(1, script).await;
        let scheduler = TallyScheduler::new(generator(ledger.clone()), RetryPolicy::default());

        let handle = scheduler.spawn(TallyTarget::Issue);
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(matches!(handle.state(), TallyState::Waiting { .. }));
        scheduler.shutdown();

        let outcome = handle.outcome().await;
        assert!(matches!(outcome, TallyOutcome::Cancelled { .. }));
        assert!(ledger.inner.submitted().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_rollover_supersedes_the_loop() {
        let ledger = ScriptedLedger::new(1, vec![Script::Missing]).await;
        let scheduler = TallyScheduler::new(generator(ledger.clone()), RetryPolicy::default());

        let handle = scheduler.spawn(TallyTarget::Issue);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut network =
            NetworkAccount::genesis(AccountKey::zero(), NetworkParameters::default(), 0);
        network.issue = 2;
        ledger
            .inner
            .put_account(AccountKey::zero(), &Account::Network(network), 1)
            .await
            .unwrap();

        let outcome = handle.outcome().await;
        assert_eq!(
            outcome,
            TallyOutcome::Superseded {
                expected: 1,
                current: 2,
                attempts: 2
            }
        );
        assert!(ledger.inner.submitted().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_tally_submission_is_not_retried() {
        let ledger = ScriptedLedger::new(1, vec![]).await;
        ledger.inner.set_rejecting(true);
        let scheduler = TallyScheduler::new(generator(ledger.clone()), RetryPolicy::default());

        let outcome = scheduler.spawn(TallyTarget::Issue).outcome().await;

        match outcome {
            TallyOutcome::Failed { attempts, error } => {
                assert_eq!(attempts, 1);
                assert!(matches!(error, DaoError::Submission { .. }));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(ledger.reads(), 1);
    }
}
