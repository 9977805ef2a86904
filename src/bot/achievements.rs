use core::fmt;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use super::replies;
use crate::constants::ACHIEVEMENT_MILESTONES;
use crate::db::prelude::LedgerReceipt;
use crate::scoring::level::LevelBands;

/// Unprompted message for a chat, produced outside the request/reply flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub chat_id: String,
    pub text: String,
}

/// Hook run after a ledger write commits. Must not block.
pub trait ContributionObserver: Send + Sync + fmt::Debug {
    fn on_recorded(&self, receipt: &LedgerReceipt);
}

/// Milestones strictly above `previous` and at or below `current`.
pub fn crossed_milestones(previous: i64, current: i64) -> impl Iterator<Item = i64> {
    ACHIEVEMENT_MILESTONES
        .into_iter()
        .filter(move |m| previous < *m && *m <= current)
}

/// Announces level-ups and points milestones in the chat the contribution came from.
#[derive(Debug, Clone)]
pub struct AchievementNotifier {
    levels: LevelBands,
    tx: UnboundedSender<Notice>,
}

impl AchievementNotifier {
    pub fn new(levels: LevelBands, tx: UnboundedSender<Notice>) -> Self {
        Self { levels, tx }
    }

    fn send(&self, chat_id: &str, text: String) {
        let notice = Notice {
            chat_id: chat_id.to_string(),
            text,
        };

        if let Err(e) = self.tx.send(notice) {
            tracing::warn!(error = ?e, "achievement notice dropped");
        }
    }
}

impl ContributionObserver for AchievementNotifier {
    fn on_recorded(&self, receipt: &LedgerReceipt) {
        let user = &receipt.user;

        if receipt.leveled_up() {
            tracing::info!(user = %user.id, level = user.level, "level up");
            self.send(
                &receipt.chat_id,
                replies::level_up(&user.display_name, user.level, self.levels.title_for(user.level)),
            );
        }

        for milestone in crossed_milestones(receipt.previous_total, receipt.new_total()) {
            tracing::info!(user = %user.id, milestone, "milestone reached");
            self.send(
                &receipt.chat_id,
                replies::milestone(&user.display_name, milestone),
            );
        }
    }
}
