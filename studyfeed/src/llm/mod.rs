use anyhow::Result;

/// Core trait for text-generation providers.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for a given prompt
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse>;
}

/// Request structure for LLM generation
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Optional system instruction sent before the user prompt
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
}

/// Response from LLM generation
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: UsageMetadata,
    pub model: String,
}

/// Token usage metadata
#[derive(Debug, Clone, Default)]
pub struct UsageMetadata {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

pub mod classifier;
pub mod remote;

/// Helper to extract JSON from text that might contain markdown backticks or
/// preamble. The classifier contract forbids fences, but responses have
/// drifted before; arrays and objects are both recognized.
pub fn extract_json_from_text(text: &str) -> Option<String> {
    // 1. Try to find content between ```json and ```
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim().to_string());
        }
    }

    // 2. Try to find content between ``` and ```
    if let Some(start) = text.find("```") {
        let rest = &text[start + 3..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim().to_string());
        }
    }

    // 3. Bare payload: take the outermost array or object brackets,
    //    whichever opens first
    let array = bracket_span(text, '[', ']');
    let object = bracket_span(text, '{', '}');
    match (array, object) {
        (Some((a_start, a_end)), Some((o_start, _))) if a_start < o_start => {
            Some(text[a_start..=a_end].to_string())
        }
        (_, Some((o_start, o_end))) => Some(text[o_start..=o_end].to_string()),
        (Some((a_start, a_end)), None) => Some(text[a_start..=a_end].to_string()),
        (None, None) => None,
    }
}

/// Outermost `open`..`close` span, or None when the closing bracket
/// precedes the opening one (free-text responses can contain either
/// bracket in isolation).
fn bracket_span(text: &str, open: char, close: char) -> Option<(usize, usize)> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (start <= end).then_some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_json() {
        let text = "Here you go:\n```json\n[{\"a\": 1}]\n```";
        assert_eq!(extract_json_from_text(text).unwrap(), "[{\"a\": 1}]");
    }

    #[test]
    fn extracts_bare_array_not_inner_object() {
        let text = "noise [ {\"a\": 1}, {\"b\": 2} ] trailing";
        assert_eq!(
            extract_json_from_text(text).unwrap(),
            "[ {\"a\": 1}, {\"b\": 2} ]"
        );
    }

    #[test]
    fn extracts_bare_object() {
        let text = "prefix {\"a\": 1} suffix";
        assert_eq!(extract_json_from_text(text).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn no_json_present() {
        assert_eq!(extract_json_from_text("nothing here"), None);
    }

    #[test]
    fn reversed_brackets_yield_none() {
        // Free-text refusals can close a bracket before opening one.
        assert_eq!(
            extract_json_from_text("No data] available for [your request"),
            None
        );
        assert_eq!(extract_json_from_text("sorry} nothing {here"), None);
    }

    #[test]
    fn reversed_array_falls_back_to_object() {
        let text = "scores] were {\"a\": 1} for [context";
        assert_eq!(extract_json_from_text(text).unwrap(), "{\"a\": 1}");
    }
}
