//! Presentation-agnostic entry point: transports hand in an [`IncomingMessage`] and get back
//! structured outcomes (or, through [`Bot::respond`], a rendered chat reply).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::instrument;

pub mod achievements;
pub mod commands;
pub mod replies;

use achievements::{AchievementNotifier, ContributionObserver, Notice};
use commands::BotCommand;

use crate::constants::{GAME_REWARD_POINTS, GAME_SWEEP_INTERVAL};
use crate::db::prelude::*;
use crate::games::challenge::{self, DailyChallenge};
use crate::games::word_guess::{GuessOutcome, StartOutcome, WordGuess};
use crate::scoring::config::ScoringConfig;
use crate::scoring::level::LevelBands;
use crate::scoring::{ContributionResult, Scorer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub user_id: String,
    pub display_name: String,
    pub chat_id: String,
    pub message_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ContributionOutcome {
    /// No text or no known tags.
    Ignored,
    /// Tags matched but nothing was earned; nothing was written.
    Discarded { result: ContributionResult },
    Recorded {
        result: ContributionResult,
        receipt: LedgerReceipt,
    },
    /// The ledger write failed and nothing was awarded.
    Failed {
        result: ContributionResult,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextLevel {
    pub level: i32,
    pub title: String,
    pub points_needed: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub user: User,
    pub rank: i64,
    pub title: String,
    pub next_level: Option<NextLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub stored: i64,
    pub replayed: i64,
    pub consistent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuessReply {
    /// No reward involved: no game, a wrong guess, or a game that already timed out.
    Miss(GuessOutcome),
    Won {
        word: String,
        receipt: LedgerReceipt,
    },
    /// Correct, but the reward could not be written.
    Unrewarded { word: String },
}

#[derive(Debug)]
pub struct Bot {
    scorer: Scorer,
    levels: LevelBands,
    ledger: Arc<dyn Ledger>,
    games: WordGuess,
    observers: Vec<Box<dyn ContributionObserver>>,
    notices: UnboundedSender<Notice>,
}

impl Bot {
    pub fn new(config: &ScoringConfig, ledger: Arc<dyn Ledger>, notices: UnboundedSender<Notice>) -> Self {
        let notifier = AchievementNotifier::new(config.levels.clone(), notices.clone());

        Self {
            scorer: Scorer::from_config(config),
            levels: config.levels.clone(),
            ledger,
            games: WordGuess::default(),
            observers: vec![Box::new(notifier)],
            notices,
        }
    }

    #[cfg(test)]
    pub fn with_games(mut self, games: WordGuess) -> Self {
        self.games = games;
        self
    }

    fn notify(&self, receipt: &LedgerReceipt) {
        for observer in &self.observers {
            observer.on_recorded(receipt);
        }
    }

    /// Scores a message and, when it earned anything, records it.
    #[instrument(skip(self, msg), fields(user = %msg.user_id, chat = %msg.chat_id))]
    pub async fn handle_message(&self, msg: &IncomingMessage) -> ContributionOutcome {
        let Some(scored) = self.scorer.score(&msg.user_id, &msg.text).await else {
            return ContributionOutcome::Ignored;
        };

        if scored.is_empty() {
            tracing::warn!(warnings = ?scored.result.warnings, "contribution discarded");
            return ContributionOutcome::Discarded {
                result: scored.result,
            };
        }

        let entry = NewContribution {
            user_id: UserId::from(msg.user_id.as_str()),
            display_name: msg.display_name.clone(),
            points: scored.result.awarded_points,
            primary_tag: scored.primary_tag.clone(),
            chat_id: msg.chat_id.clone(),
            message_id: msg.message_id.clone(),
        };

        match self.ledger.record_contribution(&entry).await {
            Ok(receipt) => {
                tracing::info!(
                    points = receipt.points,
                    total = receipt.new_total(),
                    "contribution recorded"
                );
                self.notify(&receipt);

                ContributionOutcome::Recorded {
                    result: scored.result,
                    receipt,
                }
            }
            Err(e) => {
                tracing::error!(error = ?e, "failed to record contribution");
                // a write that failed uses up no spam allowance
                self.scorer.release(&msg.user_id, &scored).await;

                ContributionOutcome::Failed {
                    result: scored.result,
                    error: e.to_string(),
                }
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn profile(&self, id: &UserId) -> LedgerResult<Option<UserProfile>> {
        let Some(user) = self.ledger.get_user(id).await? else {
            return Ok(None);
        };

        self.profile_of(user).await.map(Some)
    }

    #[instrument(skip(self))]
    pub async fn profile_by_name(&self, display_name: &str) -> LedgerResult<Option<UserProfile>> {
        let Some(user) = self.ledger.find_by_name(display_name).await? else {
            return Ok(None);
        };

        self.profile_of(user).await.map(Some)
    }

    async fn profile_of(&self, user: User) -> LedgerResult<UserProfile> {
        let rank = self.ledger.rank_of(&user.id).await?.unwrap_or_default();
        let title = self.levels.title_for(user.level).to_string();
        let next_level = self.levels.next_band(user.total_points).map(|band| NextLevel {
            level: band.level,
            title: band.title.clone(),
            points_needed: band.min_points - user.total_points,
        });

        Ok(UserProfile {
            user,
            rank,
            title,
            next_level,
        })
    }

    pub async fn ranking(&self, limit: i64) -> LedgerResult<Vec<RankingEntry>> {
        self.ledger.top_users(limit).await
    }

    #[instrument(skip(self))]
    pub async fn verify(&self, id: &UserId) -> LedgerResult<Option<Verification>> {
        let Some(user) = self.ledger.get_user(id).await? else {
            return Ok(None);
        };

        let replayed = self.ledger.replay_total(id).await?;
        let consistent = replayed == user.total_points;
        if !consistent {
            tracing::error!(
                user = %id,
                stored = user.total_points,
                replayed,
                "aggregate diverged from event log"
            );
        }

        Ok(Some(Verification {
            stored: user.total_points,
            replayed,
            consistent,
        }))
    }

    pub async fn events(&self, id: &UserId) -> LedgerResult<Vec<PointEvent>> {
        self.ledger.events_for(id).await
    }

    /// Rebuilds the stored aggregate from the event log.
    #[instrument(skip(self))]
    pub async fn repair(&self, id: &UserId) -> LedgerResult<Option<User>> {
        self.ledger.repair_total(id).await
    }

    pub fn daily_challenge(&self) -> DailyChallenge {
        challenge::today()
    }

    pub async fn start_game(&self, chat_id: &str) -> StartOutcome {
        self.games.start(chat_id).await
    }

    /// A correct guess is paid through the ledger like any other contribution.
    #[instrument(skip(self, msg), fields(user = %msg.user_id, chat = %msg.chat_id))]
    pub async fn guess(&self, msg: &IncomingMessage, attempt: &str) -> GuessReply {
        let word = match self.games.guess(&msg.chat_id, attempt).await {
            GuessOutcome::Correct { word } => word,
            other => return GuessReply::Miss(other),
        };

        let entry = NewContribution {
            user_id: UserId::from(msg.user_id.as_str()),
            display_name: msg.display_name.clone(),
            points: GAME_REWARD_POINTS,
            primary_tag: None,
            chat_id: msg.chat_id.clone(),
            message_id: msg.message_id.clone(),
        };

        match self.ledger.record_contribution(&entry).await {
            Ok(receipt) => {
                self.notify(&receipt);
                GuessReply::Won { word, receipt }
            }
            Err(e) => {
                tracing::error!(error = ?e, "failed to record game reward");
                GuessReply::Unrewarded { word }
            }
        }
    }

    /// Ends timed-out games and announces the answer in their chats.
    pub async fn sweep_games(&self) -> usize {
        let expired = self.games.sweep_expired().await;

        for game in &expired {
            tracing::debug!(chat = %game.chat_id, "word-guess game expired");
            let notice = Notice {
                chat_id: game.chat_id.clone(),
                text: replies::game_expired(&game.word),
            };

            if let Err(e) = self.notices.send(notice) {
                tracing::warn!(error = ?e, "game expiry notice dropped");
            }
        }

        expired.len()
    }

    pub fn spawn_game_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let bot = Arc::clone(self);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(GAME_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                bot.sweep_games().await;
            }
        })
    }

    /// Routes a chat line to a command or to scoring and renders the reply, if any.
    pub async fn respond(&self, msg: &IncomingMessage) -> Option<String> {
        let Some(cmd) = BotCommand::parse(&msg.text) else {
            let outcome = self.handle_message(msg).await;
            return replies::contribution(&outcome, &msg.display_name, &self.levels);
        };

        let reply = match cmd {
            BotCommand::Profile(target) => {
                let found = match &target {
                    Some(name) => self.profile_by_name(name).await,
                    None => self.profile(&UserId::from(msg.user_id.as_str())).await,
                };
                let name = target.as_deref().unwrap_or(&msg.display_name);

                match found {
                    Ok(Some(profile)) => replies::profile(&profile),
                    Ok(None) => replies::profile_missing(name),
                    Err(e) => {
                        tracing::error!(error = ?e, "profile lookup failed");
                        replies::unavailable()
                    }
                }
            }
            BotCommand::Ranking(limit) => match self.ranking(limit).await {
                Ok(rows) => replies::ranking(&rows),
                Err(e) => {
                    tracing::error!(error = ?e, "ranking query failed");
                    replies::unavailable()
                }
            },
            BotCommand::Challenge => replies::challenge(&self.daily_challenge()),
            BotCommand::Guess(None) => replies::game_started(&self.start_game(&msg.chat_id).await),
            BotCommand::Guess(Some(attempt)) => {
                let reply = self.guess(msg, &attempt).await;
                return replies::guess(&reply, &msg.display_name);
            }
        };

        Some(reply)
    }
}
