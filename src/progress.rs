//! Read-only progress queries.
//!
//! [`ProgressQueryService`] derives dashboard views from a stored
//! [`UserExposureRecord`]: aggregate summaries, learning recommendations,
//! and mastered-item lists. A user with no record gets a well-defined
//! zero-valued summary, never an error.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{MasteryLevel, MasteryLevels, SessionEntry, UserExposureRecord};
use crate::store::{ExposureStore, StoreError};

/// How many recent sessions a progress summary includes.
const RECENT_SESSIONS: usize = 10;

/// How many items each recommendation list may hold.
const RECOMMENDATION_CAP: usize = 20;

/// Aggregate character counts. Field names are per-kind because they
/// appear as-is in the progress JSON consumed by dashboard clients.
#[derive(Debug, Clone, Serialize)]
pub struct CharacterStats {
    /// Distinct characters ever observed.
    pub total_characters_seen: usize,
    /// Sum of all character-level exposure counters.
    pub total_character_exposures: u64,
    /// Character count per mastery tier, ordered beginner -> mastered.
    pub mastery_breakdown: BTreeMap<MasteryLevel, u64>,
}

impl CharacterStats {
    fn empty() -> Self {
        Self {
            total_characters_seen: 0,
            total_character_exposures: 0,
            mastery_breakdown: BTreeMap::new(),
        }
    }
}

/// Aggregate word counts, symmetric with [`CharacterStats`].
#[derive(Debug, Clone, Serialize)]
pub struct WordStats {
    pub total_words_seen: usize,
    pub total_word_exposures: u64,
    pub mastery_breakdown: BTreeMap<MasteryLevel, u64>,
}

impl WordStats {
    fn empty() -> Self {
        Self {
            total_words_seen: 0,
            total_word_exposures: 0,
            mastery_breakdown: BTreeMap::new(),
        }
    }
}

/// Aggregates over the session log.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub avg_characters_per_session: f64,
    pub avg_words_per_session: f64,
    pub first_session: Option<DateTime<Utc>>,
    pub last_session: Option<DateTime<Utc>>,
}

impl SessionStats {
    fn empty() -> Self {
        Self {
            total_sessions: 0,
            avg_characters_per_session: 0.0,
            avg_words_per_session: 0.0,
            first_session: None,
            last_session: None,
        }
    }
}

/// Full dashboard view for one user.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSummary {
    pub character_stats: CharacterStats,
    pub word_stats: WordStats,
    pub session_stats: SessionStats,
    pub mastery_levels: MasteryLevels,
    /// Last 10 sessions, chronological, most recent last.
    pub recent_sessions: Vec<SessionEntry>,
    /// Number of tracking calls for this user.
    pub total_exposures: u64,
    pub unique_files: usize,
}

impl ProgressSummary {
    fn empty() -> Self {
        Self {
            character_stats: CharacterStats::empty(),
            word_stats: WordStats::empty(),
            session_stats: SessionStats::empty(),
            mastery_levels: MasteryLevels::default(),
            recent_sessions: Vec::new(),
            total_exposures: 0,
            unique_files: 0,
        }
    }
}

/// Items currently worth focusing on: the `learning` tier only.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendations {
    pub characters: Vec<String>,
    pub words: Vec<String>,
}

/// Mastered-item lists, filtered by requested kind.
#[derive(Debug, Clone, Serialize)]
pub struct MasteredItems {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub characters: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<String>>,
}

/// Which item kind(s) a mastered-items query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKindFilter {
    Characters,
    Words,
    Both,
}

impl FromStr for ItemKindFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "characters" => Ok(ItemKindFilter::Characters),
            "words" => Ok(ItemKindFilter::Words),
            "both" => Ok(ItemKindFilter::Both),
            other => Err(format!(
                "invalid item kind: '{}'. Must be characters, words, or both.",
                other
            )),
        }
    }
}

/// Read-only aggregation over stored exposure records.
pub struct ProgressQueryService {
    store: Arc<dyn ExposureStore>,
}

impl ProgressQueryService {
    pub fn new(store: Arc<dyn ExposureStore>) -> Self {
        Self { store }
    }

    /// Full dashboard summary. Unknown users get the zero-valued summary.
    pub async fn get_user_progress(&self, user_id: &str) -> Result<ProgressSummary, StoreError> {
        let record = match self.store.load(user_id).await? {
            Some(r) => r,
            None => return Ok(ProgressSummary::empty()),
        };

        let recent_start = record
            .learning_sessions
            .len()
            .saturating_sub(RECENT_SESSIONS);

        Ok(ProgressSummary {
            character_stats: CharacterStats {
                total_characters_seen: record.character_exposure.len(),
                total_character_exposures: record
                    .character_exposure
                    .values()
                    .map(|e| e.total_exposures)
                    .sum(),
                mastery_breakdown: mastery_breakdown(&record.mastery_levels.characters),
            },
            word_stats: WordStats {
                total_words_seen: record.word_exposure.len(),
                total_word_exposures: record
                    .word_exposure
                    .values()
                    .map(|e| e.total_exposures)
                    .sum(),
                mastery_breakdown: mastery_breakdown(&record.mastery_levels.words),
            },
            session_stats: session_stats(&record.learning_sessions),
            recent_sessions: record.learning_sessions[recent_start..].to_vec(),
            mastery_levels: record.mastery_levels,
            total_exposures: record.total_exposures,
            unique_files: record.unique_files_analyzed.len(),
        })
    }

    /// Items at the `learning` tier (strictly — neither beginner nor
    /// familiar/mastered), capped at 20 per kind, in the record's natural
    /// iteration order.
    pub async fn get_learning_recommendations(
        &self,
        user_id: &str,
    ) -> Result<Recommendations, StoreError> {
        let record = match self.store.load(user_id).await? {
            Some(r) => r,
            None => {
                return Ok(Recommendations {
                    characters: Vec::new(),
                    words: Vec::new(),
                })
            }
        };

        Ok(Recommendations {
            characters: items_at_level(
                &record.mastery_levels.characters,
                MasteryLevel::Learning,
                Some(RECOMMENDATION_CAP),
            ),
            words: items_at_level(
                &record.mastery_levels.words,
                MasteryLevel::Learning,
                Some(RECOMMENDATION_CAP),
            ),
        })
    }

    /// Unbounded lists of items at the `mastered` tier, filtered by kind.
    pub async fn get_mastered_items(
        &self,
        user_id: &str,
        kind: ItemKindFilter,
    ) -> Result<MasteredItems, StoreError> {
        let record = self
            .store
            .load(user_id)
            .await?
            .unwrap_or_else(|| UserExposureRecord::new(user_id));

        let characters = matches!(kind, ItemKindFilter::Characters | ItemKindFilter::Both).then(
            || items_at_level(&record.mastery_levels.characters, MasteryLevel::Mastered, None),
        );
        let words = matches!(kind, ItemKindFilter::Words | ItemKindFilter::Both).then(|| {
            items_at_level(&record.mastery_levels.words, MasteryLevel::Mastered, None)
        });

        Ok(MasteredItems { characters, words })
    }
}

fn mastery_breakdown(
    mastery: &indexmap::IndexMap<String, crate::models::MasteryRecord>,
) -> BTreeMap<MasteryLevel, u64> {
    let mut breakdown: BTreeMap<MasteryLevel, u64> = BTreeMap::new();
    for record in mastery.values() {
        *breakdown.entry(record.level).or_insert(0) += 1;
    }
    breakdown
}

fn session_stats(sessions: &[SessionEntry]) -> SessionStats {
    if sessions.is_empty() {
        return SessionStats::empty();
    }
    let n = sessions.len() as f64;
    SessionStats {
        total_sessions: sessions.len(),
        avg_characters_per_session: sessions
            .iter()
            .map(|s| s.characters_encountered as f64)
            .sum::<f64>()
            / n,
        avg_words_per_session: sessions
            .iter()
            .map(|s| s.words_encountered as f64)
            .sum::<f64>()
            / n,
        first_session: sessions.first().map(|s| s.timestamp),
        last_session: sessions.last().map(|s| s.timestamp),
    }
}

fn items_at_level(
    mastery: &indexmap::IndexMap<String, crate::models::MasteryRecord>,
    level: MasteryLevel,
    cap: Option<usize>,
) -> Vec<String> {
    let iter = mastery
        .iter()
        .filter(|(_, rec)| rec.level == level)
        .map(|(item, _)| item.clone());
    match cap {
        Some(n) => iter.take(n).collect(),
        None => iter.collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store_memory::MemoryExposureStore;
    use crate::tracker::ExposureTracker;
    use indexmap::IndexMap;

    fn counts(pairs: &[(&str, i64)]) -> IndexMap<String, i64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn services() -> (ExposureTracker, ProgressQueryService) {
        let store = Arc::new(MemoryExposureStore::new());
        let tracker = ExposureTracker::new(store.clone(), 200);
        let progress = ProgressQueryService::new(store);
        (tracker, progress)
    }

    #[tokio::test]
    async fn test_unknown_user_zero_summary() {
        let (_, progress) = services();
        let summary = progress.get_user_progress("nobody").await.unwrap();
        assert_eq!(summary.character_stats.total_characters_seen, 0);
        assert_eq!(summary.word_stats.total_word_exposures, 0);
        assert_eq!(summary.session_stats.total_sessions, 0);
        assert!(summary.session_stats.first_session.is_none());
        assert!(summary.recent_sessions.is_empty());
        assert_eq!(summary.total_exposures, 0);
        assert_eq!(summary.unique_files, 0);
    }

    #[tokio::test]
    async fn test_summary_aggregates() {
        let (tracker, progress) = services();
        tracker
            .track_exposure(
                "u1",
                &counts(&[("你", 3), ("好", 1)]),
                &counts(&[("你好", 1)]),
                "f1",
                "a.txt",
            )
            .await
            .unwrap();
        tracker
            .track_exposure("u1", &counts(&[("你", 4)]), &counts(&[]), "f2", "b.txt")
            .await
            .unwrap();

        let summary = progress.get_user_progress("u1").await.unwrap();
        assert_eq!(summary.character_stats.total_characters_seen, 2);
        assert_eq!(summary.character_stats.total_character_exposures, 8);
        assert_eq!(summary.word_stats.total_words_seen, 1);
        assert_eq!(summary.total_exposures, 2);
        assert_eq!(summary.unique_files, 2);
        assert_eq!(summary.session_stats.total_sessions, 2);
        assert!((summary.session_stats.avg_characters_per_session - 1.5).abs() < f64::EPSILON);
        assert!((summary.session_stats.avg_words_per_session - 0.5).abs() < f64::EPSILON);
        assert!(summary.session_stats.first_session <= summary.session_stats.last_session);
        // 你 has 7 exposures over 2 files: learning tier.
        assert_eq!(
            summary.character_stats.mastery_breakdown[&MasteryLevel::Learning],
            1
        );
        assert_eq!(
            summary.character_stats.mastery_breakdown[&MasteryLevel::Beginner],
            1
        );
    }

    #[tokio::test]
    async fn test_recent_sessions_last_ten_in_order() {
        let (tracker, progress) = services();
        for i in 1..=13 {
            tracker
                .track_exposure(
                    "u1",
                    &counts(&[("一", 1)]),
                    &counts(&[]),
                    &format!("f{i}"),
                    "doc",
                )
                .await
                .unwrap();
        }
        let summary = progress.get_user_progress("u1").await.unwrap();
        assert_eq!(summary.recent_sessions.len(), 10);
        assert_eq!(summary.recent_sessions[0].file_id, "f4");
        assert_eq!(summary.recent_sessions[9].file_id, "f13");
    }

    #[tokio::test]
    async fn test_recommendations_strictly_learning_tier() {
        let (tracker, progress) = services();
        // 你: 6 exposures / 1 file -> learning. 好: 2 -> beginner.
        // 書: 27 exposures over 3 files -> familiar.
        tracker
            .track_exposure(
                "u1",
                &counts(&[("你", 6), ("好", 2)]),
                &counts(&[]),
                "f1",
                "a",
            )
            .await
            .unwrap();
        for i in 2..=4 {
            tracker
                .track_exposure(
                    "u1",
                    &counts(&[("書", 9)]),
                    &counts(&[]),
                    &format!("f{i}"),
                    "b",
                )
                .await
                .unwrap();
        }

        let recs = progress.get_learning_recommendations("u1").await.unwrap();
        assert_eq!(recs.characters, ["你"]);
        assert!(recs.words.is_empty());
    }

    #[tokio::test]
    async fn test_recommendations_capped_at_twenty() {
        let (tracker, progress) = services();
        let items: Vec<String> = (0..30).map(|i| format!("c{i}")).collect();
        let pairs: Vec<(&str, i64)> = items.iter().map(|s| (s.as_str(), 6)).collect();
        tracker
            .track_exposure("u1", &counts(&pairs), &counts(&[]), "f1", "a")
            .await
            .unwrap();

        let recs = progress.get_learning_recommendations("u1").await.unwrap();
        assert_eq!(recs.characters.len(), 20);
        // Natural iteration order, not frequency order.
        assert_eq!(recs.characters[0], "c0");
        assert_eq!(recs.characters[19], "c19");
    }

    #[tokio::test]
    async fn test_mastered_items_filters_by_kind() {
        let (tracker, progress) = services();
        for i in 0..5 {
            tracker
                .track_exposure(
                    "u1",
                    &counts(&[("你", 10)]),
                    &counts(&[("你好", 8)]),
                    &format!("f{i}"),
                    "a",
                )
                .await
                .unwrap();
        }

        let both = progress
            .get_mastered_items("u1", ItemKindFilter::Both)
            .await
            .unwrap();
        assert_eq!(both.characters.as_deref(), Some(&["你".to_string()][..]));
        assert_eq!(both.words.as_deref(), Some(&["你好".to_string()][..]));

        let chars_only = progress
            .get_mastered_items("u1", ItemKindFilter::Characters)
            .await
            .unwrap();
        assert!(chars_only.characters.is_some());
        assert!(chars_only.words.is_none());
    }

    #[tokio::test]
    async fn test_summary_json_uses_per_kind_field_names() {
        let (tracker, progress) = services();
        tracker
            .track_exposure(
                "u1",
                &counts(&[("你", 3)]),
                &counts(&[("你好", 1)]),
                "f1",
                "a.txt",
            )
            .await
            .unwrap();

        let summary = progress.get_user_progress("u1").await.unwrap();
        let json = serde_json::to_value(&summary).unwrap();

        // Dashboard clients depend on these exact keys.
        assert_eq!(json["character_stats"]["total_characters_seen"], 1);
        assert_eq!(json["character_stats"]["total_character_exposures"], 3);
        assert_eq!(json["word_stats"]["total_words_seen"], 1);
        assert_eq!(json["word_stats"]["total_word_exposures"], 1);
        assert!(json["character_stats"].get("total_seen").is_none());
        assert!(json["word_stats"].get("total_item_exposures").is_none());
    }

    #[test]
    fn test_item_kind_filter_parse() {
        assert_eq!(
            "both".parse::<ItemKindFilter>().unwrap(),
            ItemKindFilter::Both
        );
        assert!("everything".parse::<ItemKindFilter>().is_err());
    }
}
