use std::collections::HashMap;
use std::time::Duration;

use tinyrand::{Rand, RandRange, Seeded, StdRand};
use tinyrand_std::ClockSeed;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::instrument;

use crate::constants::GAME_TIMEOUT;
use crate::scoring::normalize::normalize;

pub const WORDS: [&str; 20] = [
    "director",
    "guion",
    "estreno",
    "película",
    "cámara",
    "actriz",
    "montaje",
    "taquilla",
    "trailer",
    "secuela",
    "comedia",
    "escena",
    "festival",
    "animación",
    "documental",
    "butaca",
    "palomitas",
    "reparto",
    "fotograma",
    "subtítulos",
];

fn pick(max: usize) -> usize {
    let seed = ClockSeed::default().next_u64();
    let mut rng = StdRand::seed(seed);

    rng.next_range(0..max)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hint {
    pub first: char,
    pub len: usize,
}

impl Hint {
    fn of(word: &str) -> Self {
        Self {
            first: word.chars().next().unwrap_or('?'),
            len: word.chars().count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started(Hint),
    AlreadyRunning(Hint),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuessOutcome {
    NoGame,
    Wrong,
    /// The game ended before this guess arrived.
    Expired { word: String },
    Correct { word: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredGame {
    pub chat_id: String,
    pub word: String,
}

#[derive(Debug)]
struct ActiveGame {
    word: &'static str,
    normalized: String,
    started_at: Instant,
}

/// One running word-guess game per chat.
///
/// Has its own lock; nothing here touches the spam guard.
#[derive(Debug)]
pub struct WordGuess {
    words: &'static [&'static str],
    timeout: Duration,
    games: Mutex<HashMap<String, ActiveGame>>,
}

impl Default for WordGuess {
    fn default() -> Self {
        Self::new(&WORDS, GAME_TIMEOUT)
    }
}

impl WordGuess {
    pub fn new(words: &'static [&'static str], timeout: Duration) -> Self {
        Self {
            words,
            timeout,
            games: Mutex::new(HashMap::new()),
        }
    }

    #[instrument(skip(self))]
    pub async fn start(&self, chat_id: &str) -> StartOutcome {
        let now = Instant::now();
        let mut games = self.games.lock().await;

        if let Some(game) = games.get(chat_id) {
            if now.saturating_duration_since(game.started_at) < self.timeout {
                return StartOutcome::AlreadyRunning(Hint::of(game.word));
            }
        }

        let word = match self.words.len() {
            0 => "cine",
            len => self.words[pick(len)],
        };

        games.insert(
            chat_id.to_string(),
            ActiveGame {
                word,
                normalized: normalize(word),
                started_at: now,
            },
        );
        tracing::debug!(chat = chat_id, "word-guess game started");

        StartOutcome::Started(Hint::of(word))
    }

    /// A correct guess ends the game. The caller owns the reward.
    #[instrument(skip(self))]
    pub async fn guess(&self, chat_id: &str, attempt: &str) -> GuessOutcome {
        let now = Instant::now();
        let mut games = self.games.lock().await;

        let Some(game) = games.get(chat_id) else {
            return GuessOutcome::NoGame;
        };

        if now.saturating_duration_since(game.started_at) >= self.timeout {
            let word = game.word.to_string();
            games.remove(chat_id);
            return GuessOutcome::Expired { word };
        }

        if normalize(attempt.trim()) != game.normalized {
            return GuessOutcome::Wrong;
        }

        let word = game.word.to_string();
        games.remove(chat_id);

        GuessOutcome::Correct { word }
    }

    /// Removes every game past its timeout and reports them.
    pub async fn sweep_expired(&self) -> Vec<ExpiredGame> {
        let now = Instant::now();
        let mut games = self.games.lock().await;
        let mut expired = Vec::new();

        games.retain(|chat_id, game| {
            let alive = now.saturating_duration_since(game.started_at) < self.timeout;
            if !alive {
                expired.push(ExpiredGame {
                    chat_id: chat_id.clone(),
                    word: game.word.to_string(),
                });
            }
            alive
        });

        expired
    }

    #[cfg(test)]
    async fn running(&self) -> usize {
        self.games.lock().await.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const ONE_WORD: [&str; 1] = ["película"];

    fn game() -> WordGuess {
        WordGuess::new(&ONE_WORD, GAME_TIMEOUT)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_gives_hint() {
        let games = game();

        let hint = Hint { first: 'p', len: 8 };
        assert_eq!(games.start("#cine").await, StartOutcome::Started(hint));
        assert_eq!(games.start("#cine").await, StartOutcome::AlreadyRunning(hint));
        assert_eq!(games.running().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guess_ignores_case_and_accents() {
        let games = game();
        games.start("#cine").await;

        assert_eq!(games.guess("#cine", "pelicua").await, GuessOutcome::Wrong);
        assert_eq!(
            games.guess("#cine", " PELICULA ").await,
            GuessOutcome::Correct {
                word: "película".to_string()
            }
        );
        assert_eq!(games.guess("#cine", "película").await, GuessOutcome::NoGame);
    }

    #[tokio::test(start_paused = true)]
    async fn test_games_are_per_chat() {
        let games = game();
        games.start("#cine").await;

        assert_eq!(games.guess("#series", "película").await, GuessOutcome::NoGame);
        assert!(matches!(
            games.guess("#cine", "película").await,
            GuessOutcome::Correct { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_guess_after_timeout_expires() {
        let games = game();
        games.start("#cine").await;

        tokio::time::advance(GAME_TIMEOUT).await;

        assert_eq!(
            games.guess("#cine", "película").await,
            GuessOutcome::Expired {
                word: "película".to_string()
            }
        );
        assert_eq!(games.running().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let games = game();
        games.start("#cine").await;

        tokio::time::advance(Duration::from_secs(60)).await;
        games.start("#series").await;
        assert!(games.sweep_expired().await.is_empty());

        tokio::time::advance(Duration::from_secs(61)).await;
        let expired = games.sweep_expired().await;

        assert_eq!(
            expired,
            vec![ExpiredGame {
                chat_id: "#cine".to_string(),
                word: "película".to_string(),
            }]
        );
        assert_eq!(games.running().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_timeout() {
        let games = game();
        games.start("#cine").await;

        tokio::time::advance(GAME_TIMEOUT + Duration::from_secs(1)).await;

        assert!(matches!(
            games.start("#cine").await,
            StartOutcome::Started(_)
        ));
    }

    #[test]
    fn test_word_list_has_guessable_words() {
        for word in WORDS {
            assert!(!normalize(word).is_empty());
            assert!(word.chars().all(char::is_alphabetic));
        }
    }
}
