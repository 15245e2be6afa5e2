//! Tolerant parsing of the classifier response into typed records.
//!
//! The text-generation service is free-text and its JSON shape has drifted
//! across prompt revisions, so everything here dispatches on which keys are
//! actually present, never on a version number. Each legacy shape has one
//! pure mapping into the canonical representation.
//!
//! Failure contract: a response that is not JSON at all yields zero records
//! for the whole call. Truncated arrays are not mined for valid prefixes.

use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::extract_json_from_text;
use crate::model::{
    EducationalRecord, QuizPair, Section, SectionContent, Topic, VocabRow, UNKNOWN_TEACHER,
};

/// Index of the quiz section within a topic (sections are numbered 1-3).
const QUIZ_SECTION_INDEX: usize = 2;

/// Everything a classifier response yields: the educational records plus
/// the aggregated important notes (deadlines, field trips, supply requests).
/// Notes are collected from every entry, educational or not, so a pure
/// logistics post still surfaces its reminders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedBatch {
    pub records: Vec<EducationalRecord>,
    pub notes: Vec<String>,
}

/// Parse a raw classifier response.
///
/// Accepts a JSON array or a single object (wrapped as a one-element list);
/// keeps entries with `is_educational == true` in their original order and
/// drops the rest with a log line. Important notes are gathered from all
/// entries and deduplicated in first-seen order. Anything unparsable yields
/// an empty batch.
pub fn parse_batch(raw: &str) -> ParsedBatch {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ParsedBatch::default();
    }

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        // The contract forbids fences, but strip them before giving up
        Err(_) => match extract_json_from_text(trimmed)
            .and_then(|candidate| serde_json::from_str(&candidate).ok())
        {
            Some(v) => v,
            None => {
                warn!("classifier response is not valid JSON, yielding no records");
                return ParsedBatch::default();
            }
        },
    };

    let entries = match value {
        Value::Array(entries) => entries,
        object @ Value::Object(_) => vec![object],
        other => {
            warn!(kind = value_kind(&other), "unexpected top-level JSON value");
            return ParsedBatch::default();
        }
    };

    let mut batch = ParsedBatch::default();
    let mut seen_notes = std::collections::HashSet::new();
    for entry in &entries {
        for note in notes_from_value(entry) {
            if seen_notes.insert(note.clone()) {
                batch.notes.push(note);
            }
        }
        match record_from_value(entry) {
            Some(record) if record.is_educational => batch.records.push(record),
            Some(record) => {
                debug!(subject = %record.subject_name, "dropping non-educational entry");
            }
            None => debug!(kind = value_kind(entry), "dropping malformed entry"),
        }
    }
    batch
}

fn notes_from_value(value: &Value) -> Vec<String> {
    value
        .get("important_notes")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn record_from_value(value: &Value) -> Option<EducationalRecord> {
    let obj = value.as_object()?;

    let subject_name = obj
        .get("subject_name")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("General")
        .trim()
        .to_string();

    let teacher_name = obj
        .get("teacher_name")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(UNKNOWN_TEACHER)
        .trim()
        .to_string();

    let date = obj
        .get("date")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string();

    let is_educational = obj
        .get("is_educational")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let topics = obj
        .get("topics")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(topic_from_value).collect())
        .unwrap_or_default();

    Some(EducationalRecord {
        subject_name,
        teacher_name,
        date,
        topics,
        is_educational,
    })
}

fn topic_from_value(value: &Value) -> Option<Topic> {
    let obj = value.as_object()?;

    let topic_name = obj
        .get("topic_name")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("Untitled Topic")
        .trim()
        .to_string();

    let sections = obj
        .get("sections")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .enumerate()
                .map(|(idx, section)| section_from_value(section, idx == QUIZ_SECTION_INDEX))
                .collect()
        })
        .unwrap_or_default();

    Some(Topic {
        topic_name,
        sections,
    })
}

fn section_from_value(value: &Value, is_quiz_section: bool) -> Section {
    let empty = serde_json::Map::new();
    let obj = value.as_object().unwrap_or(&empty);

    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string();

    let is_table = obj.get("is_table").and_then(Value::as_bool).unwrap_or(false);

    let raw_content = obj.get("content").unwrap_or(&Value::Null);

    // Section 3 is always the quiz section, regardless of declared shape
    let content = if is_quiz_section {
        SectionContent::Quiz(flatten_quiz(raw_content))
    } else {
        classify_content(raw_content)
    };

    Section {
        name,
        is_table,
        content,
    }
}

/// Decide what a non-quiz section's content is, by inspecting its shape.
fn classify_content(value: &Value) -> SectionContent {
    match value {
        Value::String(s) => SectionContent::Text(s.trim().to_string()),
        Value::Array(items) => match items.iter().find_map(Value::as_object) {
            Some(obj) if obj.contains_key("question") => {
                SectionContent::Quiz(flatten_quiz(value))
            }
            Some(_) => SectionContent::Vocabulary(vocab_rows(items)),
            // List of plain strings renders as paragraphs
            None => SectionContent::Text(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
        },
        Value::Object(_) => SectionContent::Quiz(flatten_quiz(value)),
        _ => SectionContent::Text(String::new()),
    }
}

/// Flatten any historical quiz shape into question/answer pairs:
/// a flat list, a `{current_grade, next_grade}` split (current first),
/// or a `{questions: [...]}` wrapper.
pub fn flatten_quiz(value: &Value) -> Vec<QuizPair> {
    match value {
        Value::Array(items) => pairs_from_array(items),
        Value::Object(obj) => {
            if obj.contains_key("current_grade") || obj.contains_key("next_grade") {
                let mut pairs = Vec::new();
                for key in ["current_grade", "next_grade"] {
                    if let Some(Value::Array(items)) = obj.get(key) {
                        pairs.extend(pairs_from_array(items));
                    }
                }
                pairs
            } else if let Some(questions) = obj.get("questions") {
                flatten_quiz(questions)
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}

fn pairs_from_array(items: &[Value]) -> Vec<QuizPair> {
    items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let question = obj.get("question")?.as_str()?.to_string();
            let answer = obj
                .get("answer")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            Some(QuizPair { question, answer })
        })
        .collect()
}

/// Vocabulary rows keep their order; missing fields become empty strings
/// and are never inferred.
fn vocab_rows(items: &[Value]) -> Vec<VocabRow> {
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|obj| VocabRow {
            name: field(obj, "name"),
            meaning: field(obj, "meaning"),
            example: field(obj, "example"),
        })
        .collect()
}

fn field(obj: &serde_json::Map<String, Value>, key: &str) -> String {
    obj.get(key).and_then(Value::as_str).unwrap_or("").to_string()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
