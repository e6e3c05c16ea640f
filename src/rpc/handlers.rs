//! Axum handlers for the account and transaction services

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use std::sync::Arc;
use tracing::debug;

use super::error::ApiError;
use super::types::{ApiResponse, HealthResponse, PageQuery, UpdateStatusRequest};
use crate::account::{
    Account, AdjustBalanceRequest, AdjustBalanceResponse, BalanceKeeper, LedgerBalanceKeeper,
    LedgerEntry, OpenAccountRequest,
};
use crate::core_types::{AccountId, TransactionId};
use crate::transaction::Transaction;
use crate::transfer::{TransactionPage, TransferOrchestrator, TransferOutcome, TransferRequest};

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Clone)]
pub struct AccountState {
    pub keeper: Arc<LedgerBalanceKeeper>,
}

#[derive(Clone)]
pub struct TransactionState {
    pub orchestrator: Arc<TransferOrchestrator>,
}

#[derive(Clone)]
pub struct HealthState {
    pub role: String,
}

pub async fn health(State(state): State<HealthState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::success(HealthResponse {
        status: "ok".to_string(),
        role: state.role,
    }))
}

// ============================================================================
// Account service
// ============================================================================

/// POST /rpc/account/adjust-balance
pub async fn adjust_balance(
    State(state): State<AccountState>,
    payload: Result<Json<AdjustBalanceRequest>, JsonRejection>,
) -> ApiResult<AdjustBalanceResponse> {
    let Json(req) = payload?;
    debug!(account_id = %req.account_id, reference = %req.reference, "RPC AdjustBalance");
    let resp = state.keeper.adjust_balance(req).await?;
    Ok(Json(ApiResponse::success(resp)))
}

/// GET /rpc/account/{id}
pub async fn get_account(
    State(state): State<AccountState>,
    Path(id): Path<String>,
) -> ApiResult<Account> {
    let id: AccountId = id.parse()?;
    let account = state.keeper.get_account(id).await?;
    Ok(Json(ApiResponse::success(account)))
}

/// POST /rpc/account/open
pub async fn open_account(
    State(state): State<AccountState>,
    payload: Result<Json<OpenAccountRequest>, JsonRejection>,
) -> ApiResult<Account> {
    let Json(req) = payload?;
    let account = state.keeper.open_account(req).await?;
    Ok(Json(ApiResponse::success(account)))
}

/// POST /rpc/account/{id}/status
pub async fn update_status(
    State(state): State<AccountState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> ApiResult<Account> {
    let id: AccountId = id.parse()?;
    let Json(req) = payload?;
    let account = state.keeper.update_status(id, req.status).await?;
    Ok(Json(ApiResponse::success(account)))
}

/// GET /rpc/account/{id}/ledger
pub async fn get_ledger(
    State(state): State<AccountState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<LedgerEntry>> {
    let id: AccountId = id.parse()?;
    let entries = state.keeper.ledger(id).await?;
    Ok(Json(ApiResponse::success(entries)))
}

// ============================================================================
// Transaction service
// ============================================================================

/// POST /rpc/transaction/transfer
pub async fn create_transfer(
    State(state): State<TransactionState>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> ApiResult<TransferOutcome> {
    let Json(req) = payload?;
    let outcome = state.orchestrator.create_transfer(req).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// GET /rpc/transaction/{id}
pub async fn get_transaction(
    State(state): State<TransactionState>,
    Path(id): Path<String>,
) -> ApiResult<Transaction> {
    let id: TransactionId = id.parse()?;
    let tx = state.orchestrator.get_transaction(id).await?;
    Ok(Json(ApiResponse::success(tx)))
}

/// GET /rpc/transaction/account/{account_id}?page=&page_size=
pub async fn list_transactions(
    State(state): State<TransactionState>,
    Path(account_id): Path<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<TransactionPage> {
    let account_id: AccountId = account_id.parse()?;
    let Query(query) = query?;
    let page = state
        .orchestrator
        .list_transactions(
            account_id,
            query.page.unwrap_or(1),
            query.page_size.unwrap_or(0),
        )
        .await?;
    Ok(Json(ApiResponse::success(page)))
}
