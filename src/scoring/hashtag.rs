use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::normalize::{is_tag_char, normalize};

/// A single scoring table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashtagDefinition {
    /// Normalized tag body, no leading `#`
    pub tag: String,
    pub points: i64,
    /// Minimum counted words before the tag earns full points
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_words: Option<usize>,
}

impl HashtagDefinition {
    pub fn new(tag: &str, points: i64) -> Self {
        Self {
            tag: normalize(tag),
            points,
            min_words: None,
        }
    }

    pub fn with_min_words(mut self, min_words: usize) -> Self {
        self.min_words = Some(min_words);
        self
    }
}

/// A tag occurrence found in a message that matched the scoring table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedTag {
    /// Tag as the user typed it, without the `#`
    pub original: String,
    pub normalized: String,
    pub points: i64,
    pub min_words: Option<usize>,
}

/// Immutable lookup table keyed by normalized tag.
#[derive(Debug, Clone, Default)]
pub struct HashtagTable {
    entries: HashMap<String, HashtagDefinition>,
}

impl HashtagTable {
    pub fn new(definitions: Vec<HashtagDefinition>) -> Self {
        let entries = definitions
            .into_iter()
            .map(|def| (def.tag.clone(), def))
            .collect();

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, tag: &str) -> Option<&HashtagDefinition> {
        self.entries.get(tag)
    }

    /// Returns every known tag in `text` in first-occurrence order, each normalized tag at most
    /// once. Unknown tags are skipped.
    pub fn extract(&self, text: &str) -> Vec<MatchedTag> {
        let mut seen = HashSet::new();
        let mut matched = Vec::new();

        for body in tag_bodies(text) {
            let normalized = normalize(body);
            let Some(def) = self.entries.get(&normalized) else {
                continue;
            };

            if seen.insert(normalized.clone()) {
                matched.push(MatchedTag {
                    original: body.to_string(),
                    normalized,
                    points: def.points,
                    min_words: def.min_words,
                });
            }
        }

        matched
    }
}

/// Yields the body of every `#word` token in `text`.
fn tag_bodies(text: &str) -> impl Iterator<Item = &str> {
    text.match_indices('#').filter_map(move |(idx, _)| {
        let start = idx + 1;
        let rest = text.get(start..)?;
        let len = rest
            .char_indices()
            .find(|(_, ch)| !is_tag_char(*ch))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());

        if len == 0 { None } else { rest.get(..len) }
    })
}

/// Counts whitespace-separated words, ignoring hashtag tokens.
///
/// Only the text before a token's first `#` can make it a word, so `(#aporte)` counts as
/// nothing and `texto,#critica` counts once.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace()
        .filter(|token| {
            let lead = token.split('#').next().unwrap_or_default();
            lead.chars().any(char::is_alphanumeric)
        })
        .count()
}

#[cfg(test)]
mod test {
    use super::*;

    fn table() -> HashtagTable {
        HashtagTable::new(vec![
            HashtagDefinition::new("pelicula", 5),
            HashtagDefinition::new("critica", 10).with_min_words(25),
            HashtagDefinition::new("reseña", 7).with_min_words(15),
            HashtagDefinition::new("aporte", 3),
        ])
    }

    #[test]
    fn test_case_and_accent_invariance() {
        let table = table();
        for text in [
            "mira esta #PELICULA",
            "mira esta #pelicula",
            "mira esta #Pelicula",
            "mira esta #Película",
        ] {
            let matched = table.extract(text);
            assert_eq!(matched.len(), 1, "{text}");
            assert_eq!(matched[0].normalized, "pelicula");
            assert_eq!(matched[0].points, 5);
        }
    }

    #[test]
    fn test_unicode_tag_body() {
        let matched = table().extract("mi #reseña de hoy");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].original, "reseña");
        assert_eq!(matched[0].normalized, "resena");
        assert_eq!(matched[0].points, 7);
        assert_eq!(matched[0].min_words, Some(15));
    }

    #[test]
    fn test_first_occurrence_order_and_dedupe() {
        let matched = table().extract("#Aporte y #critica, otra vez #APORTE y #crítica");
        let tags: Vec<_> = matched.iter().map(|m| m.normalized.as_str()).collect();
        assert_eq!(tags, vec!["aporte", "critica"]);
        // first spelling wins
        assert_eq!(matched[0].original, "Aporte");
        assert_eq!(matched[1].original, "critica");
    }

    #[test]
    fn test_unknown_tags_ignored() {
        let matched = table().extract("#random #nada # #pelicula!");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].normalized, "pelicula");
    }

    #[test]
    fn test_no_tags() {
        assert!(table().extract("").is_empty());
        assert!(table().extract("solo texto, sin etiquetas").is_empty());
        assert!(table().extract("####").is_empty());
    }

    #[test]
    fn test_punctuation_terminates_tag() {
        let matched = table().extract("(#aporte).");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].original, "aporte");
    }

    #[test]
    fn test_count_words_skips_hashtags() {
        assert_eq!(count_words("uno dos #critica tres"), 3);
        assert_eq!(count_words("   "), 0);
        assert_eq!(count_words("#a #b"), 0);
    }

    #[test]
    fn test_count_words_skips_punctuated_hashtags() {
        assert_eq!(count_words("(#aporte) muy buena"), 2);
        assert_eq!(count_words("texto,#critica fin"), 2);
        assert_eq!(count_words("\"#reseña\" ¡#critica! -- ok"), 1);
        assert_eq!(count_words("aprendiendo C# hoy"), 3);
    }
}
