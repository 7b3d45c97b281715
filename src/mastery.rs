//! Mastery tier classification.
//!
//! Pure threshold rules mapping `(total_exposures, files_count)` to a
//! [`MasteryLevel`]. Characters and words carry separate thresholds —
//! any given word occurs far less often than its constituent characters,
//! so word tiers are reachable with fewer exposures.
//!
//! Conditions are checked highest tier first; the first match wins. The
//! thresholds are monotonic, so a tier can never be lost while cumulative
//! counters only grow.

use crate::models::MasteryLevel;

/// Classify a single Han character.
///
/// Tiers: mastered (>= 50 exposures across >= 5 files), familiar
/// (>= 20 across >= 3), learning (>= 5 exposures), else beginner.
pub fn classify_character(exposures: u64, files_count: usize) -> MasteryLevel {
    if exposures >= 50 && files_count >= 5 {
        MasteryLevel::Mastered
    } else if exposures >= 20 && files_count >= 3 {
        MasteryLevel::Familiar
    } else if exposures >= 5 {
        MasteryLevel::Learning
    } else {
        MasteryLevel::Beginner
    }
}

/// Classify a word (possibly multi-character).
///
/// Tiers: mastered (>= 30 across >= 4 files), familiar (>= 10 across
/// >= 2), learning (>= 3 exposures), else beginner.
pub fn classify_word(exposures: u64, files_count: usize) -> MasteryLevel {
    if exposures >= 30 && files_count >= 4 {
        MasteryLevel::Mastered
    } else if exposures >= 10 && files_count >= 2 {
        MasteryLevel::Familiar
    } else if exposures >= 3 {
        MasteryLevel::Learning
    } else {
        MasteryLevel::Beginner
    }
}
