use serde::{Deserialize, Serialize};
use tracing::instrument;

pub mod config;
pub mod hashtag;
pub mod level;
pub mod normalize;
pub mod spam;
pub mod validate;

use config::ScoringConfig;
use hashtag::{HashtagTable, count_words};
use spam::SpamGuard;

/// What a message earned, independent of any chat platform's formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionResult {
    pub awarded_points: i64,
    pub warnings: Vec<String>,
    pub matched_tags: Vec<String>,
    pub bonus_applied: bool,
}

/// A scored message, ready to be written to the ledger when `result.awarded_points > 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredContribution {
    pub result: ContributionResult,
    /// Normalized form of the first tag that earned points
    pub primary_tag: Option<String>,
    /// Normalized tags that used up spam-guard allowance
    pub counted_tags: Vec<String>,
}

impl ScoredContribution {
    pub fn is_empty(&self) -> bool {
        self.result.awarded_points <= 0
    }
}

/// Runs a message through extraction, spam suppression and content validation.
#[derive(Debug)]
pub struct Scorer {
    hashtags: HashtagTable,
    guard: SpamGuard,
}

impl Scorer {
    pub fn new(hashtags: HashtagTable, guard: SpamGuard) -> Self {
        Self { hashtags, guard }
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self::new(config.hashtags.clone(), SpamGuard::default())
    }

    /// Returns `None` when the message has no text or no known tags.
    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn score(&self, user_id: &str, text: &str) -> Option<ScoredContribution> {
        if text.trim().is_empty() {
            return None;
        }

        let tags = self.hashtags.extract(text);
        if tags.is_empty() {
            return None;
        }

        let word_count = count_words(text);
        let mut result = ContributionResult::default();
        let mut primary_tag = None;
        let mut counted_tags = Vec::with_capacity(tags.len());

        for tag in tags {
            result.matched_tags.push(tag.original.clone());
            counted_tags.push(tag.normalized.clone());

            if self.guard.should_suppress(user_id, &tag.normalized).await {
                result.warnings.push(format!(
                    "#{} was used too often in the last few minutes, it earns nothing this time",
                    tag.original
                ));
                continue;
            }

            let award = validate::award_for(&tag, word_count);
            if let Some(warning) = award.warning {
                tracing::debug!(tag = %tag.normalized, word_count, "degraded under-length tag");
                result.warnings.push(warning);
            }

            result.awarded_points += award.points;
            primary_tag.get_or_insert(tag.normalized);
        }

        // the bonus never rescues a message whose tags were all suppressed
        if result.awarded_points > 0 {
            if let Some(bonus) = validate::length_bonus(text) {
                result.awarded_points += bonus;
                result.bonus_applied = true;
            }
        }

        tracing::debug!(
            user = user_id,
            points = result.awarded_points,
            tags = ?result.matched_tags,
            "scored message"
        );

        Some(ScoredContribution {
            result,
            primary_tag,
            counted_tags,
        })
    }

    /// Undoes the spam-guard uses of a message that was never recorded.
    pub async fn release(&self, user_id: &str, scored: &ScoredContribution) {
        self.guard.release(user_id, &scored.counted_tags).await;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn scorer() -> Scorer {
        Scorer::from_config(&ScoringConfig::default())
    }

    fn words(n: usize) -> String {
        vec!["w"; n].join(" ")
    }

    #[tokio::test]
    async fn test_no_tags_is_none() {
        let scorer = scorer();
        assert!(scorer.score("u1", "").await.is_none());
        assert!(scorer.score("u1", "   ").await.is_none());
        assert!(scorer.score("u1", "hola a todos").await.is_none());
        assert!(scorer.score("u1", "#desconocido").await.is_none());
    }

    #[tokio::test]
    async fn test_critica_word_threshold() {
        let scorer = scorer();

        let short = scorer
            .score("u1", &format!("#critica {}", words(24)))
            .await
            .unwrap();
        assert_eq!(short.result.awarded_points, 5);
        assert_eq!(short.result.warnings.len(), 1);

        let full = scorer
            .score("u2", &format!("#critica {}", words(25)))
            .await
            .unwrap();
        assert_eq!(full.result.awarded_points, 10);
        assert!(full.result.warnings.is_empty());
        assert_eq!(full.primary_tag.as_deref(), Some("critica"));
    }

    #[tokio::test]
    async fn test_resena_word_threshold() {
        let scorer = scorer();

        let short = scorer
            .score("u1", &format!("{} #reseña", words(14)))
            .await
            .unwrap();
        assert_eq!(short.result.awarded_points, 3);
        assert_eq!(short.result.warnings.len(), 1);

        let full = scorer
            .score("u2", &format!("{} #reseña", words(15)))
            .await
            .unwrap();
        assert_eq!(full.result.awarded_points, 7);
        assert_eq!(full.primary_tag.as_deref(), Some("resena"));
    }

    #[tokio::test]
    async fn test_length_bonus() {
        let scorer = scorer();

        let base = "#aporte ";
        let long = format!("{base}{}", "x".repeat(151 - base.len()));
        assert_eq!(long.chars().count(), 151);

        let scored = scorer.score("u1", &long).await.unwrap();
        assert_eq!(scored.result.awarded_points, 5);
        assert!(scored.result.bonus_applied);

        let exact = format!("{base}{}", "x".repeat(150 - base.len()));
        assert_eq!(exact.chars().count(), 150);

        let scored = scorer.score("u2", &exact).await.unwrap();
        assert_eq!(scored.result.awarded_points, 3);
        assert!(!scored.result.bonus_applied);
    }

    #[tokio::test]
    async fn test_bonus_is_once_per_message() {
        let scorer = scorer();
        let text = format!("#aporte #debate #pelicula {}", "y".repeat(200));

        let scored = scorer.score("u1", &text).await.unwrap();
        assert_eq!(scored.result.awarded_points, 3 + 3 + 5 + 2);
        assert_eq!(scored.result.matched_tags, vec!["aporte", "debate", "pelicula"]);
    }

    #[tokio::test]
    async fn test_duplicate_tags_score_once() {
        let scorer = scorer();
        let scored = scorer
            .score("u1", "#Pelicula y otra vez #película y #PELICULA")
            .await
            .unwrap();

        assert_eq!(scored.result.awarded_points, 5);
        assert_eq!(scored.result.matched_tags, vec!["Pelicula"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fourth_repeat_is_suppressed() {
        let scorer = scorer();

        for _ in 0..3 {
            let scored = scorer.score("u1", "#aporte").await.unwrap();
            assert_eq!(scored.result.awarded_points, 3);
            tokio::time::advance(std::time::Duration::from_secs(10)).await;
        }

        let fourth = scorer.score("u1", "#aporte").await.unwrap();
        assert_eq!(fourth.result.awarded_points, 0);
        assert_eq!(fourth.result.warnings.len(), 1);
        assert!(fourth.is_empty());
        assert!(fourth.primary_tag.is_none());
        assert_eq!(fourth.result.matched_tags, vec!["aporte"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_returns_counted_tags() {
        let scorer = scorer();

        let scored = scorer.score("u1", "#aporte #desconocido #pelicula").await.unwrap();
        assert_eq!(scored.counted_tags, vec!["aporte", "pelicula"]);

        for _ in 0..2 {
            scorer.score("u1", "#aporte").await;
        }
        scorer.release("u1", &scored).await;

        let again = scorer.score("u1", "#aporte").await.unwrap();
        assert_eq!(again.result.awarded_points, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suppressed_message_gets_no_bonus() {
        let scorer = scorer();
        for _ in 0..3 {
            scorer.score("u1", "#aporte").await;
        }

        let text = format!("#aporte {}", "z".repeat(200));
        let scored = scorer.score("u1", &text).await.unwrap();

        assert_eq!(scored.result.awarded_points, 0);
        assert!(!scored.result.bonus_applied);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_suppression_keeps_other_tags() {
        let scorer = scorer();
        for _ in 0..3 {
            scorer.score("u1", "#aporte").await;
        }

        let scored = scorer.score("u1", "#aporte #pelicula").await.unwrap();
        assert_eq!(scored.result.awarded_points, 5);
        assert_eq!(scored.primary_tag.as_deref(), Some("pelicula"));
        assert_eq!(scored.result.warnings.len(), 1);
    }
}
