//! Core data models for exposure tracking.
//!
//! One [`UserExposureRecord`] exists per user and is the unit of storage
//! consistency: the whole record is loaded, mutated, and saved in a single
//! transaction. Exposure maps are insertion-ordered (`IndexMap`) because
//! recommendation output follows the store's natural iteration order.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Mastery tier for a character or word. Ordered: a tier compares greater
/// than every tier below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasteryLevel {
    Beginner,
    Learning,
    Familiar,
    Mastered,
}

impl MasteryLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MasteryLevel::Beginner => "beginner",
            MasteryLevel::Learning => "learning",
            MasteryLevel::Familiar => "familiar",
            MasteryLevel::Mastered => "mastered",
        }
    }
}

impl std::fmt::Display for MasteryLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation of an item within a single analysis event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyObservation {
    pub file_id: String,
    pub filename: String,
    pub frequency: u64,
    pub date: DateTime<Utc>,
}

/// Accumulated exposure for one character or word, for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemExposure {
    /// Sum of all observed frequencies across all events. Never capped.
    pub total_exposures: u64,
    /// File ids that contributed at least one occurrence. Insertion-ordered set.
    pub files_seen_in: Vec<String>,
    /// Immutable after creation.
    pub first_seen: DateTime<Utc>,
    /// Updated on every event that touches the item.
    pub last_seen: DateTime<Utc>,
    /// Audit trail of per-event observations, bounded by `history_cap`
    /// (oldest evicted first). Eviction never affects the counters above.
    pub frequency_history: Vec<FrequencyObservation>,
}

impl ItemExposure {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            total_exposures: 0,
            files_seen_in: Vec::new(),
            first_seen: now,
            last_seen: now,
            frequency_history: Vec::new(),
        }
    }

    pub fn files_count(&self) -> usize {
        self.files_seen_in.len()
    }
}

/// Cached classification for one item, derived in full from its
/// [`ItemExposure`] counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasteryRecord {
    pub level: MasteryLevel,
    pub exposures: u64,
    pub files_count: usize,
    pub last_updated: DateTime<Utc>,
}

/// Derived mastery maps, split by item kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MasteryLevels {
    pub characters: IndexMap<String, MasteryRecord>,
    pub words: IndexMap<String, MasteryRecord>,
}

/// One tracking call, as it appears in the session log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub session_id: String,
    pub file_id: String,
    pub filename: String,
    pub timestamp: DateTime<Utc>,
    /// Distinct characters in the event's frequency map.
    pub characters_encountered: usize,
    /// Distinct words in the event's frequency map.
    pub words_encountered: usize,
    /// Items whose exposure entry was created (not merely updated) by this event.
    pub new_characters: usize,
    pub new_words: usize,
}

/// Full per-user learning record. Created lazily on first tracking call,
/// never deleted by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserExposureRecord {
    pub user_id: String,
    pub character_exposure: IndexMap<String, ItemExposure>,
    pub word_exposure: IndexMap<String, ItemExposure>,
    /// Derived state, rebuilt by the tracker. Never independently mutated.
    #[serde(default)]
    pub mastery_levels: MasteryLevels,
    /// Chronological, capped at 50 entries, oldest evicted first.
    pub learning_sessions: Vec<SessionEntry>,
    /// Number of successful tracking calls, not the sum of item exposures.
    pub total_exposures: u64,
    /// Insertion-ordered set of every file id ever tracked for this user.
    pub unique_files_analyzed: Vec<String>,
}

impl UserExposureRecord {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            character_exposure: IndexMap::new(),
            word_exposure: IndexMap::new(),
            mastery_levels: MasteryLevels::default(),
            learning_sessions: Vec::new(),
            total_exposures: 0,
            unique_files_analyzed: Vec::new(),
        }
    }
}
