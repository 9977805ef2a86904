use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use super::{Ledger, Tx, check_points};
use crate::db::models::sql_fragment;
use crate::db::prelude::*;
use crate::scoring::level::LevelBands;

/// Postgres-backed ledger. Each contribution is one transaction holding a row lock on the user,
/// so concurrent writes for the same user queue behind each other.
#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
    levels: LevelBands,
}

impl PgLedger {
    pub fn new(pool: PgPool, levels: LevelBands) -> Self {
        Self { pool, levels }
    }
}

async fn write_contribution(
    tx: &mut Tx,
    levels: &LevelBands,
    entry: &NewContribution,
) -> LedgerResult<LedgerReceipt> {
    let (previous_total, previous_level, activity_count) = tx
        .lock_user(&entry.user_id, &entry.display_name, levels.level_for(0))
        .await?;

    let event_id = Uuid::new_v4();
    tx.append_event(event_id, entry).await?;

    let new_total = previous_total + entry.points;
    let user = tx
        .set_total(
            &entry.user_id,
            new_total,
            levels.level_for(new_total),
            activity_count + 1,
        )
        .await?;

    Ok(LedgerReceipt {
        event_id,
        chat_id: entry.chat_id.clone(),
        points: entry.points,
        previous_total,
        previous_level,
        user,
    })
}

async fn rebuild_total(tx: &mut Tx, levels: &LevelBands, id: &UserId) -> LedgerResult<Option<User>> {
    if !tx.lock_existing(id).await? {
        return Ok(None);
    }

    let (total, events) = tx.replay_user(id).await?;
    let user = tx
        .set_total(id, total, levels.level_for(total), events)
        .await?;

    Ok(Some(user))
}

#[async_trait]
impl Ledger for PgLedger {
    #[instrument(skip(self, entry), fields(user = %entry.user_id, points = entry.points))]
    async fn record_contribution(&self, entry: &NewContribution) -> LedgerResult<LedgerReceipt> {
        check_points(entry)?;

        let levels = &self.levels;
        let receipt = Tx::with_tx(&self.pool, |mut tx| async move {
            let res = write_contribution(&mut tx, levels, entry).await;
            (tx, res)
        })
        .await;

        match receipt {
            Ok(receipt) => {
                tracing::debug!(
                    total = receipt.new_total(),
                    level = receipt.new_level(),
                    "contribution recorded"
                );
                Ok(receipt)
            }
            Err(e) => {
                tracing::error!(error = ?e, "contribution write failure");
                Err(e)
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_user(&self, id: &UserId) -> LedgerResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            sql_fragment::USER_FIELDS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self))]
    async fn find_by_name(&self, display_name: &str) -> LedgerResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {}
            FROM users
            WHERE LOWER(display_name) = LOWER($1)
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
            sql_fragment::USER_FIELDS
        ))
        .bind(display_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self))]
    async fn top_users(&self, limit: i64) -> LedgerResult<Vec<RankingEntry>> {
        let rows = sqlx::query_as::<_, RankingEntry>(
            r#"
            SELECT
                ROW_NUMBER() OVER (
                    ORDER BY total_points DESC, level DESC, created_at ASC, id ASC
                ) AS ranking,
                id,
                display_name,
                total_points,
                level,
                activity_count
            FROM users
            ORDER BY ranking
            LIMIT $1
            "#,
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn rank_of(&self, id: &UserId) -> LedgerResult<Option<i64>> {
        let rank = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT ranking FROM (
                SELECT
                    id,
                    ROW_NUMBER() OVER (
                        ORDER BY total_points DESC, level DESC, created_at ASC, id ASC
                    ) AS ranking
                FROM users
            ) ranked
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rank)
    }

    #[instrument(skip(self))]
    async fn events_for(&self, id: &UserId) -> LedgerResult<Vec<PointEvent>> {
        let events = sqlx::query_as::<_, PointEvent>(&format!(
            r#"
            SELECT {}
            FROM point_events
            WHERE user_id = $1
            ORDER BY seq ASC
            "#,
            sql_fragment::EVENT_FIELDS
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    #[instrument(skip(self))]
    async fn replay_total(&self, id: &UserId) -> LedgerResult<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(points), 0)::BIGINT FROM point_events WHERE user_id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    #[instrument(skip(self))]
    async fn repair_total(&self, id: &UserId) -> LedgerResult<Option<User>> {
        let levels = &self.levels;
        let repaired = Tx::with_tx(&self.pool, |mut tx| async move {
            let res = rebuild_total(&mut tx, levels, id).await;
            (tx, res)
        })
        .await?;

        if let Some(user) = &repaired {
            tracing::info!(user = %user.id, total = user.total_points, "aggregate rebuilt from events");
        }

        Ok(repaired)
    }
}
