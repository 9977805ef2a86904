use crate::constants::{BONUS_CHAR_THRESHOLD, BONUS_POINTS, CRITICA_MIN_WORDS, RESENA_MIN_WORDS};

use super::hashtag::MatchedTag;

/// Points awarded for a single tag after length validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAward {
    pub points: i64,
    pub warning: Option<String>,
}

/// Built-in word minimum for a normalized tag.
pub fn required_words(tag: &str) -> Option<usize> {
    match tag {
        "critica" => Some(CRITICA_MIN_WORDS),
        "resena" => Some(RESENA_MIN_WORDS),
        _ => None,
    }
}

/// Applies the tag's minimum word policy. Under-length contributions are degraded to half the
/// points (floored, at least 1) instead of rejected.
pub fn award_for(tag: &MatchedTag, word_count: usize) -> TagAward {
    match tag.min_words {
        Some(min_words) if word_count < min_words => TagAward {
            points: (tag.points / 2).max(1),
            warning: Some(format!(
                "#{} needs at least {min_words} words for full points ({word_count} counted), \
                 awarding half",
                tag.original
            )),
        },
        _ => TagAward {
            points: tag.points,
            warning: None,
        },
    }
}

/// Flat once-per-message bonus for messages longer than the threshold (in characters).
pub fn length_bonus(text: &str) -> Option<i64> {
    (text.chars().count() > BONUS_CHAR_THRESHOLD).then_some(BONUS_POINTS)
}

#[cfg(test)]
mod test {
    use super::*;

    fn tag(normalized: &str, points: i64, min_words: Option<usize>) -> MatchedTag {
        MatchedTag {
            original: normalized.to_string(),
            normalized: normalized.to_string(),
            points,
            min_words,
        }
    }

    #[test]
    fn test_critica_threshold() {
        let critica = tag("critica", 10, Some(25));

        let short = award_for(&critica, 24);
        assert_eq!(short.points, 5);
        assert!(short.warning.is_some());

        let full = award_for(&critica, 25);
        assert_eq!(full.points, 10);
        assert!(full.warning.is_none());
    }

    #[test]
    fn test_resena_threshold() {
        let resena = tag("resena", 7, Some(15));

        assert_eq!(award_for(&resena, 14).points, 3);
        assert_eq!(award_for(&resena, 15).points, 7);
    }

    #[test]
    fn test_degrade_never_reaches_zero() {
        let tiny = tag("tiny", 1, Some(10));
        let award = award_for(&tiny, 0);

        assert_eq!(award.points, 1);
        assert!(award.warning.is_some());
    }

    #[test]
    fn test_required_words() {
        assert_eq!(required_words("critica"), Some(25));
        assert_eq!(required_words("resena"), Some(15));
        assert_eq!(required_words("aporte"), None);
    }

    #[test]
    fn test_no_minimum() {
        let aporte = tag("aporte", 3, None);
        assert_eq!(award_for(&aporte, 0), TagAward { points: 3, warning: None });
    }

    #[test]
    fn test_length_bonus_is_strictly_greater() {
        assert_eq!(length_bonus(&"a".repeat(150)), None);
        assert_eq!(length_bonus(&"a".repeat(151)), Some(2));
        // counted in characters, not bytes
        assert_eq!(length_bonus(&"ñ".repeat(100)), None);
    }
}
