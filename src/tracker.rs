//! Exposure ingestion.
//!
//! [`ExposureTracker::track_exposure`] is the single write path: it folds
//! one analysis event (per-character and per-word frequency maps from one
//! file) into the user's [`UserExposureRecord`], appends a session entry,
//! reclassifies the touched items, and persists the whole record.
//!
//! Calls for the same user are serialized through a per-user async mutex:
//! the update is a read-modify-write over the full record and two racing
//! writers would double-count "new" items and lose session increments.
//! Distinct users proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::debug;
use uuid::Uuid;

use crate::mastery;
use crate::models::{
    FrequencyObservation, ItemExposure, MasteryLevel, MasteryRecord, SessionEntry,
    UserExposureRecord,
};
use crate::store::{ExposureStore, StoreError};

/// Session log bound: only the most recent 50 tracking calls are retained.
pub const SESSION_CAP: usize = 50;

/// Ingests analysis events and maintains per-user exposure records.
pub struct ExposureTracker {
    store: Arc<dyn ExposureStore>,
    history_cap: usize,
    user_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ExposureTracker {
    pub fn new(store: Arc<dyn ExposureStore>, history_cap: usize) -> Self {
        Self {
            store,
            history_cap,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Fold one analysis event into the user's record and persist it.
    ///
    /// Frequencies `<= 0` are skipped entirely: they neither create an
    /// item nor append history. Empty maps still record a session and
    /// still count as a tracking call. Returns the session entry that was
    /// appended.
    pub async fn track_exposure(
        &self,
        user_id: &str,
        character_counts: &IndexMap<String, i64>,
        word_counts: &IndexMap<String, i64>,
        file_id: &str,
        filename: &str,
    ) -> Result<SessionEntry, StoreError> {
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        let now = Utc::now();
        let mut record = self
            .store
            .load(user_id)
            .await?
            .unwrap_or_else(|| UserExposureRecord::new(user_id));

        let mut session = SessionEntry {
            session_id: Uuid::new_v4().to_string(),
            file_id: file_id.to_string(),
            filename: filename.to_string(),
            timestamp: now,
            characters_encountered: character_counts.len(),
            words_encountered: word_counts.len(),
            new_characters: 0,
            new_words: 0,
        };

        // Character pass fully precedes the word pass; the two maps are
        // disjoint namespaces so order across kinds is not observable.
        let touched_chars = apply_counts(
            &mut record.character_exposure,
            character_counts,
            file_id,
            filename,
            now,
            self.history_cap,
            &mut session.new_characters,
        );
        let touched_words = apply_counts(
            &mut record.word_exposure,
            word_counts,
            file_id,
            filename,
            now,
            self.history_cap,
            &mut session.new_words,
        );

        record.learning_sessions.push(session.clone());
        if record.learning_sessions.len() > SESSION_CAP {
            let excess = record.learning_sessions.len() - SESSION_CAP;
            record.learning_sessions.drain(..excess);
        }

        record.total_exposures += 1;
        if !record.unique_files_analyzed.iter().any(|f| f == file_id) {
            record.unique_files_analyzed.push(file_id.to_string());
        }

        update_mastery(
            &mut record,
            &touched_chars,
            &touched_words,
            session.new_characters,
            session.new_words,
            now,
        );

        self.store.save(user_id, &record).await?;

        debug!(
            user_id,
            file_id,
            new_characters = session.new_characters,
            new_words = session.new_words,
            "tracked exposure event"
        );

        Ok(session)
    }

    fn lock_for(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.user_locks.lock().unwrap();
        // An entry referenced only by the map belongs to a user with no
        // call in flight; drop those so the map tracks active users
        // rather than every user ever seen.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Fold one frequency map into an exposure map. Bumps `new_items` for
/// every entry created, and returns the keys that were touched.
fn apply_counts(
    exposure: &mut IndexMap<String, ItemExposure>,
    counts: &IndexMap<String, i64>,
    file_id: &str,
    filename: &str,
    now: DateTime<Utc>,
    history_cap: usize,
    new_items: &mut usize,
) -> Vec<String> {
    let mut touched = Vec::with_capacity(counts.len());

    for (item, &freq) in counts {
        if freq <= 0 {
            continue;
        }
        let freq = freq as u64;

        let entry = exposure.entry(item.clone()).or_insert_with(|| {
            *new_items += 1;
            ItemExposure::new(now)
        });

        entry.total_exposures += freq;
        entry.last_seen = now;
        entry.frequency_history.push(FrequencyObservation {
            file_id: file_id.to_string(),
            filename: filename.to_string(),
            frequency: freq,
            date: now,
        });
        if entry.frequency_history.len() > history_cap {
            let excess = entry.frequency_history.len() - history_cap;
            entry.frequency_history.drain(..excess);
        }
        if !entry.files_seen_in.iter().any(|f| f == file_id) {
            entry.files_seen_in.push(file_id.to_string());
        }

        touched.push(item.clone());
    }

    touched
}

/// Reclassify the items touched by this event. Classification reads only
/// the item's own counters, so this yields the same mastery maps as a
/// full rebuild. Records whose mastery maps are out of step with the
/// exposure maps (older or hand-edited data) get a full rebuild instead.
fn update_mastery(
    record: &mut UserExposureRecord,
    touched_chars: &[String],
    touched_words: &[String],
    new_chars: usize,
    new_words: usize,
    now: DateTime<Utc>,
) {
    // Every exposure entry except the ones created by this event must
    // already have a mastery entry; anything else means the record
    // predates the mastery maps (or was edited out of band) and gets a
    // full rebuild.
    let needs_full = record.mastery_levels.characters.len() + new_chars
        != record.character_exposure.len()
        || record.mastery_levels.words.len() + new_words != record.word_exposure.len();

    if needs_full {
        record.mastery_levels.characters.clear();
        for (item, exp) in &record.character_exposure {
            record.mastery_levels.characters.insert(
                item.clone(),
                mastery_record(
                    mastery::classify_character(exp.total_exposures, exp.files_count()),
                    exp,
                    now,
                ),
            );
        }
        record.mastery_levels.words.clear();
        for (item, exp) in &record.word_exposure {
            record.mastery_levels.words.insert(
                item.clone(),
                mastery_record(
                    mastery::classify_word(exp.total_exposures, exp.files_count()),
                    exp,
                    now,
                ),
            );
        }
        return;
    }

    for item in touched_chars {
        if let Some(exp) = record.character_exposure.get(item) {
            record.mastery_levels.characters.insert(
                item.clone(),
                mastery_record(
                    mastery::classify_character(exp.total_exposures, exp.files_count()),
                    exp,
                    now,
                ),
            );
        }
    }
    for item in touched_words {
        if let Some(exp) = record.word_exposure.get(item) {
            record.mastery_levels.words.insert(
                item.clone(),
                mastery_record(
                    mastery::classify_word(exp.total_exposures, exp.files_count()),
                    exp,
                    now,
                ),
            );
        }
    }
}

fn mastery_record(level: MasteryLevel, exp: &ItemExposure, now: DateTime<Utc>) -> MasteryRecord {
    MasteryRecord {
        level,
        exposures: exp.total_exposures,
        files_count: exp.files_count(),
        last_updated: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store_memory::MemoryExposureStore;

    fn counts(pairs: &[(&str, i64)]) -> IndexMap<String, i64> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }

    fn tracker() -> ExposureTracker {
        ExposureTracker::new(Arc::new(MemoryExposureStore::new()), 200)
    }

    async fn load(t: &ExposureTracker, user: &str) -> UserExposureRecord {
        t.store.load(user).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_first_event_scenario() {
        let t = tracker();
        let session = t
            .track_exposure(
                "u1",
                &counts(&[("你", 3), ("好", 1)]),
                &counts(&[("你好", 1)]),
                "f1",
                "hello.txt",
            )
            .await
            .unwrap();

        assert_eq!(session.characters_encountered, 2);
        assert_eq!(session.words_encountered, 1);
        assert_eq!(session.new_characters, 2);
        assert_eq!(session.new_words, 1);

        let record = load(&t, "u1").await;
        let ni = &record.character_exposure["你"];
        assert_eq!(ni.total_exposures, 3);
        assert_eq!(ni.files_seen_in, ["f1"]);
        assert!(ni.first_seen <= ni.last_seen);
        assert_eq!(
            record.mastery_levels.characters["你"].level,
            MasteryLevel::Beginner
        );
        assert_eq!(record.word_exposure["你好"].total_exposures, 1);
        assert_eq!(
            record.mastery_levels.words["你好"].level,
            MasteryLevel::Beginner
        );
        assert_eq!(record.total_exposures, 1);
        assert_eq!(record.learning_sessions.len(), 1);
        assert_eq!(record.unique_files_analyzed, ["f1"]);
    }

    #[tokio::test]
    async fn test_second_identical_event_has_no_new_items() {
        let t = tracker();
        let chars = counts(&[("你", 3), ("好", 1)]);
        let words = counts(&[("你好", 1)]);

        t.track_exposure("u1", &chars, &words, "f1", "a.txt")
            .await
            .unwrap();
        let second = t
            .track_exposure("u1", &chars, &words, "f1", "a.txt")
            .await
            .unwrap();

        assert_eq!(second.new_characters, 0);
        assert_eq!(second.new_words, 0);

        let record = load(&t, "u1").await;
        assert_eq!(record.total_exposures, 2);
        assert_eq!(record.learning_sessions.len(), 2);
        // Same file twice: files_seen_in stays a single-entry set.
        assert_eq!(record.character_exposure["你"].files_seen_in, ["f1"]);
        assert_eq!(record.unique_files_analyzed, ["f1"]);
    }

    #[tokio::test]
    async fn test_exposure_additivity() {
        let t = tracker();
        let freqs = [7i64, 1, 12, 4];
        for (i, f) in freqs.iter().enumerate() {
            t.track_exposure(
                "u1",
                &counts(&[("學", *f)]),
                &counts(&[]),
                &format!("f{i}"),
                "doc",
            )
            .await
            .unwrap();
        }
        let record = load(&t, "u1").await;
        assert_eq!(
            record.character_exposure["學"].total_exposures,
            freqs.iter().sum::<i64>() as u64
        );
        assert_eq!(record.character_exposure["學"].files_count(), freqs.len());
    }

    #[tokio::test]
    async fn test_threshold_crossing_to_mastered() {
        let t = tracker();
        for i in 0..5 {
            t.track_exposure(
                "u1",
                &counts(&[("你", 10)]),
                &counts(&[]),
                &format!("f{i}"),
                "doc",
            )
            .await
            .unwrap();
        }
        let record = load(&t, "u1").await;
        let mastery = &record.mastery_levels.characters["你"];
        assert_eq!(mastery.exposures, 50);
        assert_eq!(mastery.files_count, 5);
        assert_eq!(mastery.level, MasteryLevel::Mastered);
    }

    #[tokio::test]
    async fn test_mastery_never_moves_down() {
        let t = tracker();
        let mut prev = MasteryLevel::Beginner;
        for i in 0..12 {
            t.track_exposure(
                "u1",
                &counts(&[("書", 5)]),
                &counts(&[]),
                &format!("f{i}"),
                "doc",
            )
            .await
            .unwrap();
            let level = load(&t, "u1").await.mastery_levels.characters["書"].level;
            assert!(level >= prev, "mastery dropped on call {i}");
            prev = level;
        }
        assert_eq!(prev, MasteryLevel::Mastered);
    }

    #[tokio::test]
    async fn test_session_cap_evicts_oldest() {
        let t = tracker();
        for i in 1..=51 {
            t.track_exposure(
                "u1",
                &counts(&[("一", 1)]),
                &counts(&[]),
                &format!("f{i}"),
                &format!("doc{i}.txt"),
            )
            .await
            .unwrap();
        }
        let record = load(&t, "u1").await;
        assert_eq!(record.learning_sessions.len(), SESSION_CAP);
        // Call #1 evicted; #2..#51 retained in order.
        assert_eq!(record.learning_sessions[0].file_id, "f2");
        assert_eq!(record.learning_sessions[49].file_id, "f51");
        // The record-level call counter is not affected by eviction.
        assert_eq!(record.total_exposures, 51);
    }

    #[tokio::test]
    async fn test_empty_maps_still_record_a_session() {
        let t = tracker();
        let session = t
            .track_exposure("u1", &counts(&[]), &counts(&[]), "f1", "empty.txt")
            .await
            .unwrap();
        assert_eq!(session.characters_encountered, 0);
        assert_eq!(session.new_characters, 0);

        let record = load(&t, "u1").await;
        assert_eq!(record.total_exposures, 1);
        assert_eq!(record.learning_sessions.len(), 1);
        assert!(record.character_exposure.is_empty());
    }

    #[tokio::test]
    async fn test_non_positive_frequencies_skipped() {
        let t = tracker();
        t.track_exposure(
            "u1",
            &counts(&[("你", 0), ("好", -2), ("嗎", 1)]),
            &counts(&[]),
            "f1",
            "doc.txt",
        )
        .await
        .unwrap();

        let record = load(&t, "u1").await;
        assert!(!record.character_exposure.contains_key("你"));
        assert!(!record.character_exposure.contains_key("好"));
        assert_eq!(record.character_exposure["嗎"].total_exposures, 1);
        // Every created item has at least one exposure.
        for exp in record.character_exposure.values() {
            assert!(exp.total_exposures >= 1);
        }
    }

    #[tokio::test]
    async fn test_history_cap_evicts_oldest_observation() {
        let store = Arc::new(MemoryExposureStore::new());
        let t = ExposureTracker::new(store, 5);
        for i in 0..7 {
            t.track_exposure(
                "u1",
                &counts(&[("一", 1)]),
                &counts(&[]),
                &format!("f{i}"),
                "doc",
            )
            .await
            .unwrap();
        }
        let record = load(&t, "u1").await;
        let exp = &record.character_exposure["一"];
        assert_eq!(exp.frequency_history.len(), 5);
        assert_eq!(exp.frequency_history[0].file_id, "f2");
        // Counters ignore history eviction.
        assert_eq!(exp.total_exposures, 7);
        assert_eq!(exp.files_count(), 7);
    }

    #[tokio::test]
    async fn test_mastery_map_consistent_after_every_call() {
        let t = tracker();
        for i in 0..4 {
            t.track_exposure(
                "u1",
                &counts(&[("你", 2), ("好", 8)]),
                &counts(&[("你好", 3)]),
                &format!("f{i}"),
                "doc",
            )
            .await
            .unwrap();
            let record = load(&t, "u1").await;
            assert_eq!(
                record.mastery_levels.characters.len(),
                record.character_exposure.len()
            );
            assert_eq!(record.mastery_levels.words.len(), record.word_exposure.len());
            for (item, exp) in &record.character_exposure {
                let m = &record.mastery_levels.characters[item];
                assert_eq!(m.exposures, exp.total_exposures);
                assert_eq!(m.files_count, exp.files_count());
            }
        }
    }

    #[tokio::test]
    async fn test_full_rebuild_when_mastery_maps_missing() {
        let store = Arc::new(MemoryExposureStore::new());
        let t = ExposureTracker::new(store.clone(), 200);
        t.track_exposure("u1", &counts(&[("你", 6)]), &counts(&[]), "f1", "doc")
            .await
            .unwrap();

        // Simulate a record persisted before mastery maps existed.
        let mut record = store.load("u1").await.unwrap().unwrap();
        record.mastery_levels = Default::default();
        store.save("u1", &record).await.unwrap();

        t.track_exposure("u1", &counts(&[("好", 1)]), &counts(&[]), "f2", "doc")
            .await
            .unwrap();
        let record = store.load("u1").await.unwrap().unwrap();
        assert_eq!(record.mastery_levels.characters.len(), 2);
        assert_eq!(
            record.mastery_levels.characters["你"].level,
            MasteryLevel::Learning
        );
    }

    #[tokio::test]
    async fn test_concurrent_same_user_calls_serialize() {
        let store = Arc::new(MemoryExposureStore::new());
        let t = Arc::new(ExposureTracker::new(store.clone(), 200));

        let mut handles = Vec::new();
        for i in 0..8 {
            let t = t.clone();
            handles.push(tokio::spawn(async move {
                t.track_exposure(
                    "u1",
                    &counts(&[("你", 1)]),
                    &counts(&[]),
                    &format!("f{i}"),
                    "doc",
                )
                .await
                .unwrap()
            }));
        }
        let sessions: Vec<SessionEntry> = futures_join(handles).await;

        // Exactly one call observed the item as new.
        let new_total: usize = sessions.iter().map(|s| s.new_characters).sum();
        assert_eq!(new_total, 1);

        let record = store.load("u1").await.unwrap().unwrap();
        assert_eq!(record.total_exposures, 8);
        assert_eq!(record.character_exposure["你"].total_exposures, 8);
        assert_eq!(record.learning_sessions.len(), 8);
    }

    #[tokio::test]
    async fn test_idle_user_locks_evicted() {
        let t = tracker();
        for i in 0..5 {
            t.track_exposure(
                &format!("u{i}"),
                &counts(&[("一", 1)]),
                &counts(&[]),
                "f1",
                "doc",
            )
            .await
            .unwrap();
        }
        // Calls have all completed; only the most recent user can still
        // be in the map.
        let locks = t.user_locks.lock().unwrap();
        assert_eq!(locks.len(), 1);
        assert!(locks.contains_key("u4"));
    }

    async fn futures_join(
        handles: Vec<tokio::task::JoinHandle<SessionEntry>>,
    ) -> Vec<SessionEntry> {
        let mut out = Vec::with_capacity(handles.len());
        for h in handles {
            out.push(h.await.unwrap());
        }
        out
    }
}
