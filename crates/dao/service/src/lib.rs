//! REST surface of the DAO governance daemon.
//!
//! Routes proposal listing, account type inspection, phase triggers and raw
//! transaction injection onto the governance core. Tally phases hand off to
//! the [`TallyScheduler`], which keeps one loop per target.

#![deny(unsafe_code)]

pub mod config;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use config::DaoServiceConfig;
use dao_governance::{
    Clock, DaoError, GovernanceConfig, GovernanceGenerator, InMemoryLedger, LedgerError,
    ProposalAggregator, ProposalCursor, ProposalPage, SharedLedger, Submitter, SystemClock,
    TallyScheduler, TallyState, TallyTarget,
};
use dao_types::{
    resolve_timestamp, resolve_type, Account, AccountKey, DeveloperPayment, GovernanceTx,
    InjectRequest, NetworkAccount, NetworkParameters, TimestampError, TimestampReceipt, TxKind,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

const DEFAULT_PAGE_LIMIT: usize = 50;
const MAX_PAGE_LIMIT: usize = 500;

#[derive(Clone)]
pub struct ServiceState {
    pub ledger: SharedLedger,
    pub generator: Arc<GovernanceGenerator>,
    pub scheduler: Arc<TallyScheduler>,
    pub aggregator: ProposalAggregator,
}

impl ServiceState {
    pub fn new(ledger: SharedLedger, submitter: Submitter, config: &GovernanceConfig) -> Self {
        let generator = Arc::new(GovernanceGenerator::new(ledger.clone(), submitter, config));
        let scheduler = Arc::new(TallyScheduler::new(generator.clone(), config.retry.policy()));
        let aggregator = ProposalAggregator::new(ledger.clone(), config.network_account.clone());
        Self {
            ledger,
            generator,
            scheduler,
            aggregator,
        }
    }

    /// Build a state backed by an in-memory ledger, optionally seeded with a
    /// genesis network account.
    pub async fn bootstrap(
        config: &DaoServiceConfig,
        seed_genesis: bool,
    ) -> Result<Self, ServiceError> {
        let ledger = Arc::new(InMemoryLedger::new());
        if seed_genesis {
            let now = SystemClock.now_ms();
            let key = config.governance.network_account.clone();
            let network = NetworkAccount::genesis(key.clone(), NetworkParameters::default(), now);
            ledger
                .put_account(key.clone(), &Account::Network(network), now)
                .await?;
            info!(network_account = %key, "seeded genesis network account");
        }

        let submitter = Submitter::new(config.node.address.clone(), config.node.node_id.clone());
        Ok(Self::new(ledger, submitter, &config.governance))
    }
}

pub fn build_router(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/api/dao/proposals", get(list_proposals))
        .route("/api/dao/proposals/page", get(list_proposals_page))
        .route("/v1/accounts/:key/type", get(account_type))
        .route(
            "/v1/governance/developer-payment",
            post(release_developer_payment),
        )
        .route("/v1/governance/:phase", post(run_phase))
        .route("/api/inject", post(inject))
        .with_state(state)
}

/// Phase transitions a node can trigger over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernancePhase {
    Issue,
    DevIssue,
    Tally,
    DevTally,
    Parameters,
    DevParameters,
    NodeReward,
}

impl FromStr for GovernancePhase {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issue" => Ok(Self::Issue),
            "dev-issue" => Ok(Self::DevIssue),
            "tally" => Ok(Self::Tally),
            "dev-tally" => Ok(Self::DevTally),
            "parameters" => Ok(Self::Parameters),
            "dev-parameters" => Ok(Self::DevParameters),
            "node-reward" => Ok(Self::NodeReward),
            other => Err(ApiError::bad_request(format!(
                "unknown governance phase '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to seed ledger: {0}")]
    Seed(#[from] LedgerError),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    #[error(transparent)]
    Governance(#[from] DaoError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Timestamp(#[from] TimestampError),
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Http { status, .. } => *status,
            ApiError::Governance(DaoError::AccountMissing { .. }) => StatusCode::NOT_FOUND,
            ApiError::Governance(DaoError::Timestamp(_)) | ApiError::Timestamp(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Governance(DaoError::Read(_) | DaoError::Submission { .. })
            | ApiError::Ledger(_) => StatusCode::BAD_GATEWAY,
            ApiError::Governance(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    node_id: String,
}

async fn health(State(state): State<ServiceState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "dao-service",
        node_id: state.generator.submitter().node_id.clone(),
    })
}

#[derive(Debug, Clone, Serialize)]
struct ProposalsResponse {
    proposals: Vec<Value>,
}

async fn list_proposals(
    State(state): State<ServiceState>,
) -> Result<Json<ProposalsResponse>, ApiError> {
    let proposals = state
        .aggregator
        .list_all_proposals()
        .await
        .map_err(|err| {
            error!(error = %err, "failed to list proposals");
            err
        })?;
    Ok(Json(ProposalsResponse {
        proposals: proposals.into_iter().map(|entry| entry.data).collect(),
    }))
}

#[derive(Debug, Clone, Deserialize)]
struct ProposalPageQuery {
    issue: Option<u64>,
    index: Option<u64>,
    limit: Option<usize>,
}

async fn list_proposals_page(
    State(state): State<ServiceState>,
    Query(query): Query<ProposalPageQuery>,
) -> Result<Json<ProposalPage>, ApiError> {
    let start = ProposalCursor::default();
    let cursor = ProposalCursor {
        issue: query.issue.unwrap_or(start.issue),
        index: query.index.unwrap_or(start.index),
    };
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .clamp(1, MAX_PAGE_LIMIT);
    Ok(Json(
        state.aggregator.list_proposals_page(cursor, limit).await?,
    ))
}

#[derive(Debug, Clone, Serialize)]
struct AccountTypeResponse {
    key: AccountKey,
    #[serde(rename = "type")]
    kind: String,
}

async fn account_type(
    State(state): State<ServiceState>,
    Path(key): Path<String>,
) -> Result<Json<AccountTypeResponse>, ApiError> {
    let key = AccountKey::new(key);
    let account = state.ledger.get_account(&key).await?;
    let kind = resolve_type(account.as_ref().map(|account| &account.data));
    Ok(Json(AccountTypeResponse {
        key,
        kind: kind.as_str().to_string(),
    }))
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum PhaseResponse {
    Submitted { tx: GovernanceTx },
    Scheduled {
        target: TallyTarget,
        state: TallyState,
    },
}

async fn run_phase(
    State(state): State<ServiceState>,
    Path(phase): Path<String>,
) -> Result<Response, ApiError> {
    let phase: GovernancePhase = phase.parse()?;
    let generator = &state.generator;

    let tx = match phase {
        GovernancePhase::Tally | GovernancePhase::DevTally => {
            let target = if phase == GovernancePhase::Tally {
                TallyTarget::Issue
            } else {
                TallyTarget::DevIssue
            };
            let handle = state.scheduler.spawn(target);
            let body = Json(PhaseResponse::Scheduled {
                target,
                state: handle.state(),
            });
            return Ok((StatusCode::ACCEPTED, body).into_response());
        }
        GovernancePhase::Issue => generator.raise_issue().await?,
        GovernancePhase::DevIssue => generator.raise_dev_issue().await?,
        GovernancePhase::Parameters => generator.apply_parameters().await?,
        GovernancePhase::DevParameters => generator.apply_dev_parameters().await?,
        GovernancePhase::NodeReward => generator.node_reward().await?,
    };

    Ok(Json(PhaseResponse::Submitted { tx }).into_response())
}

async fn release_developer_payment(
    State(state): State<ServiceState>,
    Json(payment): Json<DeveloperPayment>,
) -> Result<Json<PhaseResponse>, ApiError> {
    let tx = state.generator.release_developer_payment(payment).await?;
    Ok(Json(PhaseResponse::Submitted { tx }))
}

#[derive(Debug, Clone, Serialize)]
struct InjectResponse {
    result: &'static str,
    tx_type: TxKind,
    timestamp: u64,
}

async fn inject(
    State(state): State<ServiceState>,
    Json(body): Json<Value>,
) -> Result<Json<InjectResponse>, ApiError> {
    let InjectRequest {
        timestamp: client_timestamp,
        mut tx,
    } = serde_json::from_value(body)
        .map_err(|err| ApiError::bad_request(format!("invalid inject request: {}", err)))?;

    let receipt = client_receipt(&tx, client_timestamp);
    let timestamp = resolve_timestamp(Some(tx.timestamp()), Some(&receipt))?;
    tx.set_timestamp(timestamp);
    let tx_type = tx.kind();

    state.ledger.submit(tx).await?;
    info!(tx_type = %tx_type, timestamp, "injected governance tx");

    Ok(Json(InjectResponse {
        result: "accepted",
        tx_type,
        timestamp,
    }))
}

/// Receipt for a tx injected without its own timestamp: the client's request
/// timestamp stands in for the network-agreed one.
fn client_receipt(tx: &GovernanceTx, timestamp: u64) -> TimestampReceipt {
    TimestampReceipt {
        tx_id: format!("{}:{}", tx.kind(), tx.node_id()),
        cycle_marker: String::new(),
        cycle_counter: 0,
        timestamp,
    }
}
