use core::fmt;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;
use uuid::Uuid;

use crate::db::models::sql_fragment;
use crate::db::prelude::*;

pub mod ledger;
pub mod memory;

/// The persistence boundary the scoring core writes through.
///
/// `record_contribution` appends the event and moves the aggregate as one all-or-nothing unit;
/// writes for the same user serialize, writes for different users do not contend.
#[async_trait]
pub trait Ledger: Send + Sync + fmt::Debug {
    async fn record_contribution(&self, entry: &NewContribution) -> LedgerResult<LedgerReceipt>;

    async fn get_user(&self, id: &UserId) -> LedgerResult<Option<User>>;

    /// Case-insensitive lookup; the most recently active match wins.
    async fn find_by_name(&self, display_name: &str) -> LedgerResult<Option<User>>;

    /// Top `limit` users by points, then level, then first appearance.
    async fn top_users(&self, limit: i64) -> LedgerResult<Vec<RankingEntry>>;

    async fn rank_of(&self, id: &UserId) -> LedgerResult<Option<i64>>;

    async fn events_for(&self, id: &UserId) -> LedgerResult<Vec<PointEvent>>;

    /// Sum of the user's event log; equals the stored aggregate after every write.
    async fn replay_total(&self, id: &UserId) -> LedgerResult<i64>;

    /// Rewrites the user's aggregate from their event log.
    async fn repair_total(&self, id: &UserId) -> LedgerResult<Option<User>>;
}

pub(crate) fn check_points(entry: &NewContribution) -> LedgerResult<()> {
    if entry.points <= 0 {
        return Err(LedgerError::InvalidPoints(entry.points));
    }

    Ok(())
}

/// Thin wrapper over a Postgres transaction exposing the ledger's write steps.
pub struct Tx {
    inner: Option<Transaction<'static, Postgres>>,
}

impl Tx {
    /// Runs `f` inside a transaction, committing on `Ok` and rolling back (on drop) on `Err`.
    #[instrument(skip(pool, f))]
    pub async fn with_tx<F, Fut, T>(pool: &PgPool, f: F) -> LedgerResult<T>
    where
        F: FnOnce(Tx) -> Fut,
        Fut: Future<Output = (Tx, LedgerResult<T>)>,
    {
        let tx = Self::begin(pool).await?;
        let (mut tx, result) = f(tx).await;

        match result {
            Ok(val) => {
                tx.commit().await?;
                Ok(val)
            }
            Err(e) => {
                tracing::debug!(error = ?e, "transacted query failure, rolling back");
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    pub async fn begin(pool: &PgPool) -> LedgerResult<Self> {
        let inner = pool.begin().await?;
        Ok(Self { inner: Some(inner) })
    }

    pub async fn commit(&mut self) -> LedgerResult<()> {
        match self.inner.take() {
            Some(tx) => Ok(tx.commit().await?),
            None => Err(completed()),
        }
    }

    pub async fn rollback(&mut self) -> LedgerResult<()> {
        match self.inner.take() {
            Some(tx) => Ok(tx.rollback().await?),
            None => Err(completed()),
        }
    }

    fn inner_mut(&mut self) -> LedgerResult<&mut Transaction<'static, Postgres>> {
        self.inner.as_mut().ok_or_else(completed)
    }

    /// Creates the user row on first contribution (keeping the display name fresh otherwise) and
    /// locks it for the rest of the transaction. Returns `(total_points, level, activity_count)`
    /// before this write.
    #[instrument(skip(self))]
    pub async fn lock_user(
        &mut self,
        id: &UserId,
        display_name: &str,
        first_level: i32,
    ) -> LedgerResult<(i64, i32, i64)> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id,
                display_name,
                total_points,
                activity_count,
                level,
                created_at,
                updated_at
            )
            VALUES ($1, $2, 0, 0, $3, NOW(), NOW())
            ON CONFLICT (id)
            DO UPDATE SET
                display_name = EXCLUDED.display_name
            "#,
        )
        .bind(id)
        .bind(display_name)
        .bind(first_level)
        .execute(&mut **self.inner_mut()?)
        .await?;

        let current = sqlx::query_as::<_, (i64, i32, i64)>(
            "SELECT total_points, level, activity_count FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_one(&mut **self.inner_mut()?)
        .await?;

        Ok(current)
    }

    #[instrument(skip(self, entry))]
    pub async fn append_event(&mut self, id: Uuid, entry: &NewContribution) -> LedgerResult<()> {
        let res = sqlx::query(
            r#"
            INSERT INTO point_events (
                id,
                user_id,
                points,
                tag,
                chat_id,
                message_id,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            "#,
        )
        .bind(id)
        .bind(&entry.user_id)
        .bind(entry.points)
        .bind(entry.primary_tag.as_deref())
        .bind(&entry.chat_id)
        .bind(&entry.message_id)
        .execute(&mut **self.inner_mut()?)
        .await;

        match res {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(LedgerError::DuplicateEvent {
                    chat_id: entry.chat_id.clone(),
                    message_id: entry.message_id.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrites the user's aggregate columns.
    #[instrument(skip(self))]
    pub async fn set_total(
        &mut self,
        id: &UserId,
        total: i64,
        level: i32,
        activity_count: i64,
    ) -> LedgerResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET total_points = $2,
                level = $3,
                activity_count = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            sql_fragment::USER_FIELDS
        ))
        .bind(id)
        .bind(total)
        .bind(level)
        .bind(activity_count)
        .fetch_one(&mut **self.inner_mut()?)
        .await?;

        Ok(user)
    }

    /// `(sum of points, number of events)` for the user, read inside this transaction.
    #[instrument(skip(self))]
    pub async fn replay_user(&mut self, id: &UserId) -> LedgerResult<(i64, i64)> {
        let replayed = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                COALESCE(SUM(points), 0)::BIGINT,
                COUNT(*)
            FROM point_events
            WHERE user_id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&mut **self.inner_mut()?)
        .await?;

        Ok(replayed)
    }

    /// Locks an existing user row without creating it.
    pub async fn lock_existing(&mut self, id: &UserId) -> LedgerResult<bool> {
        let found = sqlx::query_scalar::<_, i32>("SELECT 1 FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **self.inner_mut()?)
            .await?;

        Ok(found.is_some())
    }
}

fn completed() -> LedgerError {
    LedgerError::SqlxError(sqlx::Error::Protocol(
        "transaction already completed".into(),
    ))
}
