//! Chat-facing text. Everything here is a single line so it fits one PRIVMSG.

use super::{ContributionOutcome, GuessReply, UserProfile};
use crate::db::prelude::RankingEntry;
use crate::games::challenge::DailyChallenge;
use crate::games::word_guess::{GuessOutcome, Hint, StartOutcome};
use crate::scoring::level::LevelBands;

/// `None` when there is nothing worth saying (no tags in the message).
pub fn contribution(
    outcome: &ContributionOutcome,
    display_name: &str,
    levels: &LevelBands,
) -> Option<String> {
    let reply = match outcome {
        ContributionOutcome::Ignored => return None,
        ContributionOutcome::Discarded { result } => {
            format!("@{display_name} {}", result.warnings.join(" "))
        }
        ContributionOutcome::Recorded { result, receipt } => {
            let mut reply = format!(
                "@{display_name} +{} points ({} total, level {} {})",
                result.awarded_points,
                receipt.new_total(),
                receipt.new_level(),
                levels.title_for(receipt.new_level()),
            );
            if result.bonus_applied {
                reply.push_str(" incl. long-post bonus");
            }
            for warning in &result.warnings {
                reply.push_str(" | ");
                reply.push_str(warning);
            }
            reply
        }
        ContributionOutcome::Failed { .. } => {
            format!("@{display_name} your points could not be saved right now, nothing was counted")
        }
    };

    Some(reply)
}

pub fn profile(profile: &UserProfile) -> String {
    let user = &profile.user;
    let next = match &profile.next_level {
        Some(next) => format!("{} points to {}", next.points_needed, next.title),
        None => "max level".to_string(),
    };

    format!(
        "{}: {} points, level {} {}, #{} in the ranking, {} contributions ({next})",
        user.display_name, user.total_points, user.level, profile.title, profile.rank, user.activity_count,
    )
}

pub fn profile_missing(display_name: &str) -> String {
    format!("{display_name} hasn't earned any points yet")
}

pub fn ranking(rows: &[RankingEntry]) -> String {
    if rows.is_empty() {
        return "nobody has scored yet".to_string();
    }

    rows.iter()
        .map(|row| format!("{}. {} ({})", row.ranking, row.display_name, row.total_points))
        .collect::<Vec<_>>()
        .join(" | ")
}

pub fn challenge(challenge: &DailyChallenge) -> String {
    format!("challenge for {}: {}", challenge.date, challenge.prompt)
}

fn hint(hint: &Hint) -> String {
    format!("starts with '{}', {} letters", hint.first, hint.len)
}

pub fn game_started(outcome: &StartOutcome) -> String {
    match outcome {
        StartOutcome::Started(h) => format!("guess the word! {} (!adivina <word>)", hint(h)),
        StartOutcome::AlreadyRunning(h) => format!("a game is already running: {}", hint(h)),
    }
}

/// Wrong guesses stay silent.
pub fn guess(reply: &GuessReply, display_name: &str) -> Option<String> {
    let text = match reply {
        GuessReply::Miss(GuessOutcome::Wrong) => return None,
        GuessReply::Miss(GuessOutcome::NoGame) => "no game running, start one with !adivina".to_string(),
        GuessReply::Miss(GuessOutcome::Expired { word }) => game_expired(word),
        GuessReply::Miss(GuessOutcome::Correct { word }) | GuessReply::Unrewarded { word } => {
            format!("@{display_name} got it, the word was {word}!")
        }
        GuessReply::Won { word, receipt } => format!(
            "@{display_name} got it, the word was {word}! +{} points ({} total)",
            receipt.points,
            receipt.new_total()
        ),
    };

    Some(text)
}

pub fn game_expired(word: &str) -> String {
    format!("time's up! the word was {word}")
}

pub fn level_up(display_name: &str, level: i32, title: &str) -> String {
    format!("{display_name} reached level {level}: {title}!")
}

pub fn milestone(display_name: &str, points: i64) -> String {
    format!("{display_name} just passed {points} points!")
}

pub fn unavailable() -> String {
    "can't look that up right now, try again later".to_string()
}
