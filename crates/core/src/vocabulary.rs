//! Backend status vocabulary, per job kind.
//!
//! Each backend service reports status with its own words (`done`,
//! `completed`, `success`, ...). This module is the single closed table
//! mapping those words onto [`JobStatus`]. Anything not listed is treated
//! as "no new information" by the caller.

use crate::job::{JobKind, JobStatus};

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Words every kind understands.
pub const COMMON_VOCABULARY: &[(&str, JobStatus)] = &[
    ("pending", JobStatus::Pending),
    ("created", JobStatus::Pending),
    ("processing", JobStatus::Processing),
    ("failed", JobStatus::Failed),
];

const VIDEO_GENERATION_VOCABULARY: &[(&str, JobStatus)] = &[
    ("waiting", JobStatus::Pending),
    ("completed", JobStatus::Succeeded),
];

const PHOTO_GENERATION_VOCABULARY: &[(&str, JobStatus)] = &[
    ("completed", JobStatus::Succeeded),
    ("success", JobStatus::Succeeded),
];

const TRANSLATION_VOCABULARY: &[(&str, JobStatus)] = &[("success", JobStatus::Succeeded)];

const CLONE_DUB_VOCABULARY: &[(&str, JobStatus)] = &[
    ("done", JobStatus::Succeeded),
    ("completed", JobStatus::Succeeded),
    ("error", JobStatus::Failed),
];

/// Kind-specific words, checked after [`COMMON_VOCABULARY`].
pub fn kind_vocabulary(kind: JobKind) -> &'static [(&'static str, JobStatus)] {
    match kind {
        JobKind::VideoGeneration => VIDEO_GENERATION_VOCABULARY,
        JobKind::PhotoGeneration => PHOTO_GENERATION_VOCABULARY,
        JobKind::Translation => TRANSLATION_VOCABULARY,
        JobKind::CloneDub => CLONE_DUB_VOCABULARY,
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Map a raw backend status onto the normalized set.
///
/// Matching ignores surrounding whitespace and ASCII case. Returns `None`
/// for words outside the table.
pub fn normalize_status(kind: JobKind, raw: &str) -> Option<JobStatus> {
    let needle = raw.trim().to_ascii_lowercase();
    COMMON_VOCABULARY
        .iter()
        .chain(kind_vocabulary(kind))
        .find(|(word, _)| *word == needle)
        .map(|(_, status)| *status)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Succeeded,
        JobStatus::Failed,
    ];

    #[test]
    fn every_table_entry_normalizes_to_its_status() {
        for kind in JobKind::ALL {
            for (word, status) in COMMON_VOCABULARY.iter().chain(kind_vocabulary(kind)) {
                assert_eq!(
                    normalize_status(kind, word),
                    Some(*status),
                    "{kind}: '{word}' should map to {status}"
                );
            }
        }
    }

    #[test]
    fn every_kind_can_reach_every_status() {
        for kind in JobKind::ALL {
            for status in ALL_STATUSES {
                let reachable = COMMON_VOCABULARY
                    .iter()
                    .chain(kind_vocabulary(kind))
                    .any(|(_, s)| *s == status);
                assert!(reachable, "{kind} has no word for {status}");
            }
        }
    }

    #[test]
    fn kind_words_do_not_shadow_common_words() {
        for kind in JobKind::ALL {
            for (word, _) in kind_vocabulary(kind) {
                assert!(
                    !COMMON_VOCABULARY.iter().any(|(common, _)| common == word),
                    "{kind}: '{word}' duplicates a common word"
                );
            }
        }
    }

    #[test]
    fn success_words_differ_per_kind() {
        assert_eq!(
            normalize_status(JobKind::Translation, "success"),
            Some(JobStatus::Succeeded)
        );
        assert_eq!(
            normalize_status(JobKind::VideoGeneration, "completed"),
            Some(JobStatus::Succeeded)
        );
        assert_eq!(
            normalize_status(JobKind::CloneDub, "done"),
            Some(JobStatus::Succeeded)
        );
        assert_eq!(normalize_status(JobKind::Translation, "done"), None);
    }

    #[test]
    fn matching_ignores_case_and_whitespace() {
        assert_eq!(
            normalize_status(JobKind::VideoGeneration, "  Completed\n"),
            Some(JobStatus::Succeeded)
        );
        assert_eq!(
            normalize_status(JobKind::PhotoGeneration, "PROCESSING"),
            Some(JobStatus::Processing)
        );
    }

    #[test]
    fn unknown_words_are_not_recognized() {
        assert_eq!(normalize_status(JobKind::VideoGeneration, "queued_for_review"), None);
        assert_eq!(normalize_status(JobKind::CloneDub, ""), None);
    }
}
