use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::{User, UserId};

/// Append-only audit record; a user's `total_points` always equals the sum of their events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PointEvent {
    pub id: Uuid,
    pub user_id: UserId,
    pub points: i64,
    pub tag: Option<String>,
    pub chat_id: String,
    pub message_id: String,
    pub created_at: NaiveDateTime,
}

/// Input to a single ledger write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContribution {
    pub user_id: UserId,
    pub display_name: String,
    pub points: i64,
    pub primary_tag: Option<String>,
    pub chat_id: String,
    pub message_id: String,
}

/// What a committed ledger write produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerReceipt {
    pub event_id: Uuid,
    pub chat_id: String,
    pub points: i64,
    pub previous_total: i64,
    pub previous_level: i32,
    pub user: User,
}

impl LedgerReceipt {
    pub fn new_total(&self) -> i64 {
        self.user.total_points
    }

    pub fn new_level(&self) -> i32 {
        self.user.level
    }

    pub fn leveled_up(&self) -> bool {
        self.user.level > self.previous_level
    }
}
