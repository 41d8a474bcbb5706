//! JSON API over the shared ledger.
//!
//! Endpoints:
//! - `GET  /api/balance?discordId=<id>` — read a balance (unknown id → 0)
//! - `POST /api/transfer`               — execute a transfer directly,
//!   no confirmation step
//! - `GET  /health`                     — readiness probe
//!
//! The API is deliberately unauthenticated; it mirrors the chat surface's
//! validation rules and returns `400 {"error": "<reason>"}` on any
//! precondition failure.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tipjar_core::{SharedLedger, TransferError};
use tipjar_gateway::embeds::mention;
use tipjar_gateway::notify::{AuditNotice, Notifier, NoticeAction};
use tracing::{error, info};

#[derive(Clone)]
pub struct ApiState {
    pub ledger: SharedLedger,
    pub notifier: Notifier,
}

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    #[serde(rename = "discordId")]
    pub discord_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BalanceResponse {
    pub balance: u64,
}

#[derive(Debug, Deserialize)]
pub struct TransferBody {
    pub from: Option<String>,
    pub to: Option<String>,
    pub amount: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransferResponse {
    pub success: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub error: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub accounts: usize,
    pub notifier: &'static str,
}

type ApiRejection = (StatusCode, Json<ApiError>);

fn bad_request(reason: &str) -> ApiRejection {
    (StatusCode::BAD_REQUEST, Json(ApiError { error: reason.to_owned() }))
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/balance", get(balance))
        .route("/api/transfer", post(transfer))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: ApiState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.api.start",
        bind_address = %address,
        "balance api started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.api.error",
                error = %error,
                "balance api server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn balance(
    State(state): State<ApiState>,
    Query(query): Query<BalanceQuery>,
) -> Result<Json<BalanceResponse>, ApiRejection> {
    let Some(discord_id) = query.discord_id else {
        return Err(bad_request(TransferError::MissingFields.api_message()));
    };

    Ok(Json(BalanceResponse { balance: state.ledger.balance(&discord_id) }))
}

pub async fn transfer(
    State(state): State<ApiState>,
    Json(body): Json<TransferBody>,
) -> Result<Json<TransferResponse>, ApiRejection> {
    let (Some(from), Some(to), Some(amount)) = (body.from, body.to, body.amount) else {
        return Err(bad_request(TransferError::MissingFields.api_message()));
    };

    if from.trim().is_empty() || to.trim().is_empty() {
        return Err(bad_request(TransferError::MissingFields.api_message()));
    }

    // Strictly positive integer amounts on every path; an explicit 0 is
    // invalid, not missing.
    let amount = match u64::try_from(amount) {
        Ok(amount) if amount > 0 => amount,
        _ => return Err(bad_request(TransferError::InvalidAmount.api_message())),
    };

    state
        .ledger
        .transfer(&from, &to, amount)
        .map_err(|transfer_error| bad_request(transfer_error.api_message()))?;

    state.notifier.notice(
        AuditNotice::new(NoticeAction::TransferExecuted, &from)
            .with_detail("To", mention(&to))
            .with_detail("Amount", amount.to_string()),
    );

    Ok(Json(TransferResponse { success: true }))
}

pub async fn health(State(state): State<ApiState>) -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "ready",
        accounts: state.ledger.account_count(),
        notifier: if state.notifier.is_enabled() { "enabled" } else { "disabled" },
    };

    (StatusCode::OK, Json(payload))
}
