//! Ledger Saga service entry point
//!
//! ```text
//! ┌──────────────┐  adjust-balance   ┌──────────────┐
//! │ transaction  │──────────────────▶│   account    │
//! │ orchestrator │◀──────────────────│ balance+ledger│
//! │ + reconciler │     JSON/HTTP     │              │
//! └──────────────┘                   └──────────────┘
//! ```
//!
//! `--role all` hosts both services in one process and skips the HTTP hop.

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use ledger_saga::account::{
    AccountStore, BalanceKeeper, InMemoryAccountStore, LedgerBalanceKeeper, PgAccountStore,
};
use ledger_saga::clock::{SystemClock, UlidGenerator};
use ledger_saga::config::{AppConfig, ServiceRole};
use ledger_saga::db::Database;
use ledger_saga::logging::init_logging;
use ledger_saga::rpc::{self, RpcBalanceKeeper};
use ledger_saga::transaction::{InMemoryTransactionStore, PgTransactionStore, TransactionStore};
use ledger_saga::transfer::{Reconciler, TransferOrchestrator};

#[derive(Debug, Parser)]
#[command(name = "ledger-saga", version, about = "Ledgered accounts and compensating transfers")]
struct Cli {
    /// Config environment, loads config/{env}.yaml
    #[arg(short, long, default_value = "dev")]
    env: String,

    /// Override the configured listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the configured service role
    #[arg(short, long, value_enum)]
    role: Option<ServiceRole>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.env)?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(role) = cli.role {
        config.role = role;
    }

    let _guard = init_logging(&config);
    info!(env = %cli.env, role = config.role.as_str(), "Starting ledger-saga");

    let db = match &config.postgres_url {
        Some(url) => {
            let db = Database::connect(url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            db.migrate().await.context("Failed to run migrations")?;
            Some(db)
        }
        None => {
            warn!("No postgres_url configured, using in-memory stores");
            None
        }
    };

    let keeper = if config.role.hosts_accounts() {
        let store: Arc<dyn AccountStore> = match &db {
            Some(db) => Arc::new(PgAccountStore::new(db.pool().clone())),
            None => Arc::new(InMemoryAccountStore::new()),
        };
        Some(Arc::new(LedgerBalanceKeeper::with_system_providers(store)))
    } else {
        None
    };

    let orchestrator = if config.role.hosts_transactions() {
        let store: Arc<dyn TransactionStore> = match &db {
            Some(db) => Arc::new(PgTransactionStore::new(db.pool().clone())),
            None => Arc::new(InMemoryTransactionStore::new()),
        };
        let balance_keeper: Arc<dyn BalanceKeeper> = match &keeper {
            Some(local) => local.clone() as Arc<dyn BalanceKeeper>,
            None => Arc::new(RpcBalanceKeeper::new(
                config.account_service_url.clone(),
                config.rpc_timeout(),
            )?),
        };
        info!(keeper = balance_keeper.name(), "Transfer orchestrator ready");
        Some(Arc::new(TransferOrchestrator::new(
            store,
            balance_keeper,
            Arc::new(SystemClock),
            Arc::new(UlidGenerator),
            config.rpc_timeout(),
        )
        .with_lease(config.reconciler.stale_threshold())))
    } else {
        None
    };

    if let Some(orchestrator) = &orchestrator
        && config.reconciler.enabled
    {
        let reconciler = Reconciler::new(orchestrator.clone(), config.reconciler.clone());
        tokio::spawn(async move {
            reconciler.run().await;
        });
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    let app = rpc::app(keeper, orchestrator, config.role.as_str());
    rpc::serve(app, addr).await?;

    Ok(())
}
