//! Domain types shared across the pipeline: scraped feeds, normalized
//! educational records, and the appendix answer tuples.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// One scraped portal post. Immutable once collected; persisted to the
/// feeds snapshot for replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub author: String,
    /// Free text subject line; unreliable, defaults to "No Subject"
    pub subject: String,
    pub content: String,
    /// `None` covers both absent and "Unknown" timestamps
    #[serde(default)]
    pub post_date: Option<DateTime<FixedOffset>>,
    /// Optional verbatim note surfaced under "Important Notes"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A unit of normalized, subject-grouped content produced by the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct EducationalRecord {
    pub subject_name: String,
    pub teacher_name: String,
    /// ISO date, or blank when the classifier omitted it
    pub date: String,
    pub topics: Vec<Topic>,
    pub is_educational: bool,
}

/// Placeholder used when the classifier does not name a teacher.
pub const UNKNOWN_TEACHER: &str = "Unknown Teacher";

/// Default subject line for posts without one.
pub const NO_SUBJECT: &str = "No Subject";

#[derive(Debug, Clone, PartialEq)]
pub struct Topic {
    pub topic_name: String,
    /// Three sections; the third is always the quiz section
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub name: String,
    pub is_table: bool,
    pub content: SectionContent,
}

/// Canonical section payloads. Every historical quiz shape collapses into
/// `Quiz` before any rendering happens.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionContent {
    Text(String),
    Vocabulary(Vec<VocabRow>),
    Quiz(Vec<QuizPair>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VocabRow {
    pub name: String,
    pub meaning: String,
    pub example: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizPair {
    pub question: String,
    pub answer: String,
}

/// A reconciled answer-key tuple. Uniqueness key for the appendix is
/// `(subject, topic, trimmed question)`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizAnswer {
    pub subject: String,
    pub topic: String,
    pub question: String,
    pub answer: String,
}

/// Why a raw post was dropped during collection. Makes skip causes
/// enumerable and testable instead of implicit branch fallthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingAuthor,
    MissingContent,
    AuthorNotAllowed,
    OlderThanCutoff,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SkipReason::MissingAuthor => "missing author",
            SkipReason::MissingContent => "missing content",
            SkipReason::AuthorNotAllowed => "author not in allow-list",
            SkipReason::OlderThanCutoff => "older than cutoff",
        };
        f.write_str(s)
    }
}
