//! Scoring data loaded once at startup: the hashtag table and the level bands.
//!
//! The document is plain JSON:
//!
//! ```json
//! {
//!     "hashtags": [{ "tag": "critica", "points": 10, "min_words": 25 }],
//!     "levels": [{ "level": 1, "title": "Novato", "min_points": 0 }]
//! }
//! ```
//!
//! Either key may be omitted to keep the built-in defaults for that half.
//! `critica` and `resena` keep their word minimums when an entry leaves `min_words` out.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use super::hashtag::{HashtagDefinition, HashtagTable};
use super::level::{LevelBand, LevelBands};
use super::normalize::{is_tag_char, normalize};
use super::validate::required_words;
use crate::constants::{CRITICA_MIN_WORDS, LEVEL_COUNT, RESENA_MIN_WORDS};

pub type ConfigResult<T> = core::result::Result<T, ConfigError>;

#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub hashtags: HashtagTable,
    pub levels: LevelBands,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    hashtags: Option<Vec<HashtagDefinition>>,
    #[serde(default)]
    levels: Option<Vec<LevelBand>>,
}

impl ScoringConfig {
    /// Loads from `path` when given, otherwise returns the built-in defaults.
    #[instrument]
    pub fn load(path: Option<&str>) -> ConfigResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                tracing::info!("no scoring config path set, using built-in table");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&raw)?;

        tracing::info!(
            path = %path.as_ref().display(),
            hashtags = config.hashtags.len(),
            "loaded scoring config"
        );

        Ok(config)
    }

    pub fn from_json(raw: &str) -> ConfigResult<Self> {
        let raw: RawConfig = serde_json::from_str(raw)?;

        let hashtags = match raw.hashtags {
            Some(defs) => validate_hashtags(defs)?,
            None => default_hashtags(),
        };

        let levels = match raw.levels {
            Some(bands) => validate_levels(bands)?,
            None => LevelBands::default(),
        };

        Ok(Self { hashtags, levels })
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            hashtags: default_hashtags(),
            levels: LevelBands::default(),
        }
    }
}

pub fn default_hashtags() -> HashtagTable {
    HashtagTable::new(vec![
        HashtagDefinition::new("pelicula", 5),
        HashtagDefinition::new("serie", 5),
        HashtagDefinition::new("critica", 10).with_min_words(CRITICA_MIN_WORDS),
        HashtagDefinition::new("resena", 7).with_min_words(RESENA_MIN_WORDS),
        HashtagDefinition::new("aporte", 3),
        HashtagDefinition::new("recomendacion", 4),
        HashtagDefinition::new("debate", 3),
        HashtagDefinition::new("documental", 5),
        HashtagDefinition::new("anime", 4),
        HashtagDefinition::new("trivia", 2),
    ])
}

fn validate_hashtags(defs: Vec<HashtagDefinition>) -> ConfigResult<HashtagTable> {
    let mut seen = HashSet::new();
    let mut validated = Vec::with_capacity(defs.len());

    for mut def in defs {
        let body = def.tag.trim_start_matches('#');
        if body.is_empty() || !body.chars().all(is_tag_char) {
            return Err(ConfigError::InvalidTag(def.tag));
        }

        def.tag = normalize(body);
        if def.points <= 0 {
            return Err(ConfigError::InvalidPoints {
                tag: def.tag,
                points: def.points,
            });
        }

        if !seen.insert(def.tag.clone()) {
            return Err(ConfigError::DuplicateTag(def.tag));
        }

        if def.min_words.is_none() {
            def.min_words = required_words(&def.tag);
        }

        validated.push(def);
    }

    Ok(HashtagTable::new(validated))
}

fn validate_levels(bands: Vec<LevelBand>) -> ConfigResult<LevelBands> {
    if bands.len() != LEVEL_COUNT {
        return Err(ConfigError::InvalidBands(format!(
            "expected {LEVEL_COUNT} bands, found {}",
            bands.len()
        )));
    }

    if bands.first().map(|b| b.min_points) != Some(0) {
        return Err(ConfigError::InvalidBands(
            "first band must start at 0 points".to_string(),
        ));
    }

    for (idx, band) in bands.iter().enumerate() {
        if band.level != idx as i32 + 1 {
            return Err(ConfigError::InvalidBands(format!(
                "band {idx} has level {}, expected {}",
                band.level,
                idx + 1
            )));
        }
    }

    for pair in bands.windows(2) {
        if pair[1].min_points <= pair[0].min_points {
            return Err(ConfigError::InvalidBands(format!(
                "level {} must start above level {}",
                pair[1].level, pair[0].level
            )));
        }
    }

    Ok(LevelBands::from_validated(bands))
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("invalid tag '{0}'")]
    InvalidTag(String),

    #[error("tag '{tag}' has non-positive points ({points})")]
    InvalidPoints { tag: String, points: i64 },

    #[error("tag '{0}' is defined more than once")]
    DuplicateTag(String),

    #[error("invalid level bands: {0}")]
    InvalidBands(String),
}
