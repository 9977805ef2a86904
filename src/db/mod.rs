use std::sync::LazyLock;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::instrument;

use crate::util::env::{self, Var};
use crate::var;

pub mod models;
pub mod repositories;

pub mod prelude {
    pub use crate::db::models::event::{LedgerReceipt, NewContribution, PointEvent};
    pub use crate::db::models::user::{RankingEntry, User, UserId};
    pub use crate::db::repositories::Ledger;
    pub use crate::db::repositories::ledger::PgLedger;
    pub use crate::db::repositories::memory::MemoryLedger;
    pub use crate::db::{LedgerError, LedgerResult};
}

static DB_POOL: LazyLock<OnceCell<PgPool>> = LazyLock::new(OnceCell::new);

/// Connects (once) to `DATABASE_URL` and applies pending migrations.
pub async fn db_pool() -> LedgerResult<&'static PgPool> {
    DB_POOL.get_or_try_init(new_pool).await
}

#[instrument]
async fn new_pool() -> LedgerResult<PgPool> {
    let db_url = var!(Var::DatabaseUrl).await?;
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database connected, migrations applied");

    Ok(pool)
}

pub type LedgerResult<T> = core::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),

    #[error(transparent)]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("{0}")]
    EnvError(#[from] env::EnvErr),

    #[error("contribution points must be positive (got {0})")]
    InvalidPoints(i64),

    #[error("message '{message_id}' in chat '{chat_id}' was already recorded")]
    DuplicateEvent { chat_id: String, message_id: String },
}
