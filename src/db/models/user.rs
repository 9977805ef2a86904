use core::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct UserId(pub String);

/// Per-user aggregate; only ever mutated through the ledger write path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub total_points: i64,
    pub activity_count: i64,
    pub level: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A row of the ranking projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RankingEntry {
    pub ranking: i64,
    pub id: UserId,
    pub display_name: String,
    pub total_points: i64,
    pub level: i32,
    pub activity_count: i64,
}

impl RankingEntry {
    pub fn from_user(ranking: i64, user: &User) -> Self {
        Self {
            ranking,
            id: user.id.clone(),
            display_name: user.display_name.clone(),
            total_points: user.total_points,
            level: user.level,
            activity_count: user.activity_count,
        }
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        UserId(value)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        UserId(value.to_string())
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
