//! Classification of collected feeds into educational records.
//!
//! One call per run: the whole feed batch goes out in a single structured
//! prompt, and every failure mode (request build, transport, bad response)
//! degrades to an empty batch. The caller treats that as "no educational
//! content found this cycle", never as a fatal error.

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::{LlmProvider, LlmRequest};
use crate::model::Feed;
use crate::normalize::{self, ParsedBatch};

const SYSTEM_INSTRUCTION: &str =
    "You are a precise educational assistant that converts school feed posts \
     into structured study material and returns only raw valid JSON.";

/// Classify the feed batch into educational records and important notes
/// for the given grade.
pub async fn classify_feeds(
    provider: &dyn LlmProvider,
    feeds: &[Feed],
    grade: &str,
) -> ParsedBatch {
    if feeds.is_empty() {
        info!("no feeds collected, skipping classification");
        return ParsedBatch::default();
    }

    let raw = match build_prompt(feeds, grade) {
        Ok(prompt) => {
            let request = LlmRequest {
                system: Some(SYSTEM_INSTRUCTION.to_string()),
                prompt,
                max_tokens: None,
                temperature: Some(0.3),
                timeout_seconds: None,
            };
            match provider.generate(request).await {
                Ok(response) => {
                    info!(
                        tokens = response.usage.total_tokens,
                        model = %response.model,
                        "classification call completed"
                    );
                    response.content
                }
                Err(e) => {
                    warn!(error = %e, "classification call failed, continuing with no records");
                    String::new()
                }
            }
        }
        Err(e) => {
            // Request construction problems also degrade to an empty response
            warn!(error = %e, "failed to build classification request");
            String::new()
        }
    };

    let batch = normalize::parse_batch(&raw);
    info!(
        records = batch.records.len(),
        notes = batch.notes.len(),
        "classification produced records"
    );
    batch
}

/// Embed the feed batch and grade label into the structured prompt.
fn build_prompt(feeds: &[Feed], grade: &str) -> Result<String> {
    let feeds_json =
        serde_json::to_string_pretty(feeds).context("failed to serialize feed batch")?;

    Ok(format!(
        r#"Parse the weekly school feed posts below into study material for a {grade} student.

Return a raw JSON array. Each element describes one subject grouping:

{{
  "subject_name": "Math",
  "teacher_name": "name if stated, otherwise omit",
  "date": "ISO date if stated, otherwise omit",
  "is_educational": true,
  "important_notes": ["deadline, field trip, or supply reminder, verbatim"],
  "topics": [
    {{
      "topic_name": "Area",
      "sections": [
        {{"name": "Reading Material", "is_table": false, "content": "plain text"}},
        {{"name": "Vocabulary", "is_table": true, "content": [{{"name": "term", "meaning": "definition", "example": "usage"}}]}},
        {{"name": "Quiz", "is_table": false, "content": [{{"question": "...", "answer": "..."}}]}}
      ]
    }}
  ]
}}

Rules:
- Every topic has exactly three sections and the third is always the quiz.
- A post with no educational content becomes an element with "is_educational": false and no topics.
- Put deadlines, field trips, supply requests, and policy reminders into "important_notes", not topics; omit the field when a post has none.
- Include every lesson, worksheet, page number, and skill mentioned; do not drop material because the posts interleave subjects.
- Capitalize subject names.
- Output must be raw valid JSON with no markdown fences and no commentary.

FEED POSTS:
{feeds_json}
"#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_grade_and_feed_content() {
        let feeds = vec![Feed {
            author: "Ms. Rivera".to_string(),
            subject: "Math this week".to_string(),
            content: "area = length x width".to_string(),
            post_date: None,
            note: None,
        }];

        let prompt = build_prompt(&feeds, "3rd Grade").expect("prompt");
        assert!(prompt.contains("3rd Grade"));
        assert!(prompt.contains("area = length x width"));
        assert!(prompt.contains("is_educational"));
        assert!(prompt.contains("important_notes"));
    }
}
