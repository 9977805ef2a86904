use serde::{Deserialize, Serialize};

/// One level band; covers `min_points` up to (not including) the next band's `min_points`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelBand {
    pub level: i32,
    pub title: String,
    pub min_points: i64,
}

impl LevelBand {
    pub fn new(level: i32, title: &str, min_points: i64) -> Self {
        Self {
            level,
            title: title.to_string(),
            min_points,
        }
    }
}

/// Ordered, validated level bands. The last band is unbounded above.
///
/// Construct through [`ScoringConfig`](super::config::ScoringConfig) so the ordering invariants
/// hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelBands {
    bands: Vec<LevelBand>,
}

impl LevelBands {
    pub(super) fn from_validated(bands: Vec<LevelBand>) -> Self {
        Self { bands }
    }

    pub fn band_for(&self, points: i64) -> &LevelBand {
        self.bands
            .iter()
            .rev()
            .find(|band| points >= band.min_points)
            .unwrap_or(&self.bands[0])
    }

    pub fn level_for(&self, points: i64) -> i32 {
        self.band_for(points).level
    }

    pub fn title_for(&self, level: i32) -> &str {
        self.bands
            .iter()
            .find(|band| band.level == level)
            .map(|band| band.title.as_str())
            .unwrap_or("?")
    }

    /// The band above the one `points` falls in, if any.
    pub fn next_band(&self, points: i64) -> Option<&LevelBand> {
        self.bands.iter().find(|band| band.min_points > points)
    }

    pub fn bands(&self) -> &[LevelBand] {
        &self.bands
    }
}

impl Default for LevelBands {
    fn default() -> Self {
        Self::from_validated(vec![
            LevelBand::new(1, "Novato", 0),
            LevelBand::new(2, "Aficionado", 100),
            LevelBand::new(3, "Cinéfilo", 250),
            LevelBand::new(4, "Crítico", 500),
            LevelBand::new(5, "Leyenda", 1000),
        ])
    }
}
