//! Inter-service RPC surface: JSON over HTTP
//!
//! The account service exposes the Balance Keeper; the transaction service
//! exposes the Transfer Orchestrator. One process can host either or both.

pub mod client;
pub mod error;
pub mod handlers;
pub mod types;

pub use client::RpcBalanceKeeper;
pub use error::{ApiError, RpcError};
pub use types::{ApiResponse, PageQuery, UpdateStatusRequest};

use axum::Router;
use axum::routing::{get, post};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::account::LedgerBalanceKeeper;
use crate::transfer::TransferOrchestrator;
use handlers::{AccountState, HealthState, TransactionState};

pub fn account_router(keeper: Arc<LedgerBalanceKeeper>) -> Router {
    Router::new()
        .route("/rpc/account/adjust-balance", post(handlers::adjust_balance))
        .route("/rpc/account/open", post(handlers::open_account))
        .route("/rpc/account/{id}", get(handlers::get_account))
        .route("/rpc/account/{id}/status", post(handlers::update_status))
        .route("/rpc/account/{id}/ledger", get(handlers::get_ledger))
        .with_state(AccountState { keeper })
}

pub fn transaction_router(orchestrator: Arc<TransferOrchestrator>) -> Router {
    Router::new()
        .route("/rpc/transaction/transfer", post(handlers::create_transfer))
        .route("/rpc/transaction/{id}", get(handlers::get_transaction))
        .route(
            "/rpc/transaction/account/{account_id}",
            get(handlers::list_transactions),
        )
        .with_state(TransactionState { orchestrator })
}

/// Compose the routers for the services this process hosts, plus `/health`
pub fn app(
    keeper: Option<Arc<LedgerBalanceKeeper>>,
    orchestrator: Option<Arc<TransferOrchestrator>>,
    role: &str,
) -> Router {
    let mut router = Router::new().route("/health", get(handlers::health).with_state(HealthState {
        role: role.to_string(),
    }));
    if let Some(keeper) = keeper {
        router = router.merge(account_router(keeper));
    }
    if let Some(orchestrator) = orchestrator {
        router = router.merge(transaction_router(orchestrator));
    }
    router
}

/// Bind and serve until the server stops
pub async fn serve(router: Router, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "RPC server listening");
    axum::serve(listener, router).await
}
