//! JSON RPC surface for lumenchain
//!
//! Inbound calls map 1:1 onto core operations: append, validate, fee
//! estimation. No peer discovery lives here.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::block::Block;
use crate::chain::Blockchain;
use crate::config::FeeConfig;
use crate::crypto::PublicKey;
use crate::error::ChainError;
use crate::transaction::Transaction;

/// Shared server state. The RwLock write guard is what serializes appends:
/// at most one append can be in flight per chain instance.
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<RwLock<Blockchain>>,
    pub fees: FeeConfig,
}

impl AppState {
    pub fn new(chain: Blockchain, fees: FeeConfig) -> Self {
        AppState {
            chain: Arc::new(RwLock::new(chain)),
            fees,
        }
    }
}

#[derive(Debug)]
pub struct ApiError(ChainError);

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ChainError::NotFound(_) => StatusCode::NOT_FOUND,
            ChainError::InvalidTransaction(_)
            | ChainError::InvalidInstruction(_)
            | ChainError::InvalidBlock(_)
            | ChainError::DuplicateTransaction(_)
            | ChainError::CryptoError(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("API failure: {}", self.0);
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[derive(Serialize)]
struct BalanceResponse {
    value: u64,
}

#[derive(Serialize)]
struct LatestBlockhashResponse {
    blockhash: String,
    slot: u64,
}

#[derive(Serialize)]
struct SlotResponse {
    slot: u64,
}

#[derive(Serialize)]
struct AppendResponse {
    block_hash: String,
    slot: u64,
}

#[derive(Serialize)]
struct ValidateResponse {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_invalid_index: Option<u64>,
}

#[derive(Deserialize)]
struct SendTransactionRequest {
    transaction: Transaction,
}

#[derive(Serialize)]
struct FeeResponse {
    fee: u64,
}

async fn get_balance(
    State(state): State<AppState>,
    Path(pubkey): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    // validate the key shape before touching the store
    let key = PublicKey::from_base58(&pubkey)?;
    let chain = state.chain.read().await;
    let value = match chain.persistence.get(&format!("balance:{}", key))? {
        Some(stored) => stored.parse::<u64>().map_err(|e| {
            ChainError::DatabaseError(format!("Corrupt balance for {}: {}", key, e))
        })?,
        None => 0,
    };
    Ok(Json(BalanceResponse { value }))
}

async fn get_latest_blockhash(
    State(state): State<AppState>,
) -> Result<Json<LatestBlockhashResponse>, ApiError> {
    let chain = state.chain.read().await;
    let head = chain.latest()?;
    Ok(Json(LatestBlockhashResponse {
        blockhash: head.hash_hex(),
        slot: head.index,
    }))
}

async fn get_current_slot(State(state): State<AppState>) -> Result<Json<SlotResponse>, ApiError> {
    let chain = state.chain.read().await;
    Ok(Json(SlotResponse {
        slot: chain.latest()?.index,
    }))
}

async fn get_block(
    State(state): State<AppState>,
    Path(index): Path<u64>,
) -> Result<Json<Block>, ApiError> {
    let chain = state.chain.read().await;
    Ok(Json(chain.block(index)?.clone()))
}

async fn send_transaction(
    State(state): State<AppState>,
    Json(request): Json<SendTransactionRequest>,
) -> Result<Json<AppendResponse>, ApiError> {
    let mut chain = state.chain.write().await;
    let hash = chain.record_transaction(request.transaction)?;
    let slot = chain.latest()?.index;
    info!("Recorded transaction in block {}", slot);
    Ok(Json(AppendResponse {
        block_hash: hex::encode(hash),
        slot,
    }))
}

async fn send_block(
    State(state): State<AppState>,
    Json(block): Json<Block>,
) -> Result<Json<AppendResponse>, ApiError> {
    // an externally built block crosses the deserialization boundary here:
    // re-apply the block-level transaction invariants (readiness, unique
    // identity) and verify every carried signature before the chain adopts it
    block.check_transactions()?;
    for tx in &block.transactions {
        if !tx.verify_signatures() {
            return Err(ChainError::InvalidBlock(
                "Block carries a transaction that fails signature verification".to_string(),
            )
            .into());
        }
    }
    let mut chain = state.chain.write().await;
    let hash = chain.append(block)?;
    let slot = chain.latest()?.index;
    info!("Appended external block at slot {}", slot);
    Ok(Json(AppendResponse {
        block_hash: hex::encode(hash),
        slot,
    }))
}

async fn validate_chain(State(state): State<AppState>) -> Json<ValidateResponse> {
    let chain = state.chain.read().await;
    let first_invalid_index = chain.validate();
    Json(ValidateResponse {
        valid: first_invalid_index.is_none(),
        first_invalid_index,
    })
}

async fn estimate_fee(
    State(state): State<AppState>,
    Json(request): Json<SendTransactionRequest>,
) -> Json<FeeResponse> {
    Json(FeeResponse {
        fee: request.transaction.estimated_fee(&state.fees),
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/balance/:pubkey", get(get_balance))
        .route("/latest-blockhash", get(get_latest_blockhash))
        .route("/slot", get(get_current_slot))
        .route("/block/:index", get(get_block))
        .route("/transaction", post(send_transaction))
        .route("/block", post(send_block))
        .route("/validate", get(validate_chain))
        .route("/fee", post(estimate_fee))
        .with_state(state)
}

/// Binds the API server and serves until shutdown.
pub async fn serve(state: AppState, port: u16) -> Result<(), ChainError> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ChainError::ApiError(format!("Failed to bind {}: {}", addr, e)))?;
    info!("API listening on {}", addr);
    axum::serve(listener, router(state))
        .await
        .map_err(|e| ChainError::ApiError(format!("Server error: {}", e)))
}
