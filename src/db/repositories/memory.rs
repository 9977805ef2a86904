use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

use super::{Ledger, check_points};
use crate::db::prelude::*;
use crate::scoring::level::LevelBands;

/// Process-local ledger used when no database is configured, and by tests.
///
/// A single lock covers users and events together, so a write is never observable half-applied.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    levels: LevelBands,
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// Insertion order doubles as first-appearance order for ranking ties.
    users: Vec<User>,
    events: Vec<PointEvent>,
}

impl MemoryState {
    fn user_mut(&mut self, id: &UserId) -> Option<&mut User> {
        self.users.iter_mut().find(|u| &u.id == id)
    }

    fn ranked(&self) -> Vec<&User> {
        let mut ranked = self.users.iter().collect::<Vec<_>>();
        // stable: equal users keep insertion order
        ranked.sort_by(|a, b| {
            b.total_points
                .cmp(&a.total_points)
                .then(b.level.cmp(&a.level))
        });
        ranked
    }

    fn replay(&self, id: &UserId) -> (i64, i64) {
        self.events
            .iter()
            .filter(|e| &e.user_id == id)
            .fold((0, 0), |(sum, count), e| (sum + e.points, count + 1))
    }
}

impl MemoryLedger {
    pub fn new(levels: LevelBands) -> Self {
        Self {
            levels,
            state: Mutex::default(),
        }
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    #[instrument(skip(self, entry), fields(user = %entry.user_id, points = entry.points))]
    async fn record_contribution(&self, entry: &NewContribution) -> LedgerResult<LedgerReceipt> {
        check_points(entry)?;

        let mut state = self.state.lock().await;
        if state
            .events
            .iter()
            .any(|e| e.chat_id == entry.chat_id && e.message_id == entry.message_id)
        {
            return Err(LedgerError::DuplicateEvent {
                chat_id: entry.chat_id.clone(),
                message_id: entry.message_id.clone(),
            });
        }

        let now = Utc::now().naive_utc();
        let idx = match state.users.iter().position(|u| u.id == entry.user_id) {
            Some(idx) => idx,
            None => {
                state.users.push(User {
                    id: entry.user_id.clone(),
                    display_name: entry.display_name.clone(),
                    total_points: 0,
                    activity_count: 0,
                    level: self.levels.level_for(0),
                    created_at: now,
                    updated_at: now,
                });
                state.users.len() - 1
            }
        };

        let event_id = Uuid::new_v4();
        state.events.push(PointEvent {
            id: event_id,
            user_id: entry.user_id.clone(),
            points: entry.points,
            tag: entry.primary_tag.clone(),
            chat_id: entry.chat_id.clone(),
            message_id: entry.message_id.clone(),
            created_at: now,
        });

        let user = &mut state.users[idx];

        let previous_total = user.total_points;
        let previous_level = user.level;

        user.display_name = entry.display_name.clone();
        user.total_points += entry.points;
        user.level = self.levels.level_for(user.total_points);
        user.activity_count += 1;
        user.updated_at = now;

        Ok(LedgerReceipt {
            event_id,
            chat_id: entry.chat_id.clone(),
            points: entry.points,
            previous_total,
            previous_level,
            user: user.clone(),
        })
    }

    async fn get_user(&self, id: &UserId) -> LedgerResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| &u.id == id).cloned())
    }

    async fn find_by_name(&self, display_name: &str) -> LedgerResult<Option<User>> {
        let wanted = display_name.to_lowercase();
        let state = self.state.lock().await;

        Ok(state
            .users
            .iter()
            .filter(|u| u.display_name.to_lowercase() == wanted)
            .max_by_key(|u| u.updated_at)
            .cloned())
    }

    async fn top_users(&self, limit: i64) -> LedgerResult<Vec<RankingEntry>> {
        let state = self.state.lock().await;
        let limit = usize::try_from(limit).unwrap_or(0);

        Ok(state
            .ranked()
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, user)| RankingEntry::from_user(i as i64 + 1, user))
            .collect())
    }

    async fn rank_of(&self, id: &UserId) -> LedgerResult<Option<i64>> {
        let state = self.state.lock().await;

        Ok(state
            .ranked()
            .iter()
            .position(|u| &u.id == id)
            .map(|i| i as i64 + 1))
    }

    async fn events_for(&self, id: &UserId) -> LedgerResult<Vec<PointEvent>> {
        let state = self.state.lock().await;
        Ok(state
            .events
            .iter()
            .filter(|e| &e.user_id == id)
            .cloned()
            .collect())
    }

    async fn replay_total(&self, id: &UserId) -> LedgerResult<i64> {
        let state = self.state.lock().await;
        Ok(state.replay(id).0)
    }

    #[instrument(skip(self))]
    async fn repair_total(&self, id: &UserId) -> LedgerResult<Option<User>> {
        let mut state = self.state.lock().await;
        let (total, count) = state.replay(id);
        let level = self.levels.level_for(total);

        Ok(state.user_mut(id).map(|user| {
            user.total_points = total;
            user.activity_count = count;
            user.level = level;
            user.updated_at = Utc::now().naive_utc();
            user.clone()
        }))
    }
}
