use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured clinical summary of a session. Every field is populated
/// after normalization; missing model output is replaced by the
/// documented defaults rather than surfaced as an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub summary: String,
    pub mood_label: String,
    pub repeated_questions: Vec<String>,
    pub key_moments: Vec<String>,
    pub tags: Vec<String>,
    pub agitation_score: f64,
    pub suggestions: Option<String>,
}

impl Default for SummaryRecord {
    fn default() -> Self {
        Self {
            summary: "No summary provided".to_string(),
            mood_label: "unknown".to_string(),
            repeated_questions: Vec::new(),
            key_moments: Vec::new(),
            tags: Vec::new(),
            agitation_score: 0.0,
            suggestions: None,
        }
    }
}

/// Strip a leading markdown code fence line and, if present, the
/// matching trailing fence, keeping only the interior content.
fn strip_fences(text: &str) -> &str {
    if !text.starts_with("```") {
        return text;
    }
    let interior = match text.find('\n') {
        Some(idx) => &text[idx + 1..],
        None => return "",
    };
    match interior.rfind("```") {
        Some(idx) => &interior[..idx],
        None => interior,
    }
}

/// Locate the JSON candidate in raw generated text: everything between
/// the first `{` and the last `}`. Intentionally a permissive scan, not
/// a parser, so that preambles and trailing commentary are tolerated.
fn json_candidate(raw: &str) -> Option<&str> {
    let body = strip_fences(raw.trim());
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&body[start..=end])
}

fn parse_candidate(raw: &str) -> Option<Map<String, Value>> {
    serde_json::from_str(json_candidate(raw)?).ok()
}

/// Normalize an Extract or Analyze stage response into the parsed JSON
/// mapping, verbatim. These stages have no safe default because the
/// next stage depends on their shape, so failure to locate or parse a
/// JSON object is an error.
pub fn extract_object(raw: &str) -> Result<Map<String, Value>, PipelineError> {
    let candidate = json_candidate(raw).ok_or_else(|| {
        PipelineError::MalformedResponse(
            "no JSON object found in response".to_string(),
        )
    })?;
    serde_json::from_str(candidate)
        .map_err(|e| PipelineError::MalformedResponse(e.to_string()))
}

/// Normalize a Summary stage response. Never fails: a response that
/// cannot be parsed degrades to a record of defaults carrying the raw
/// text as the summary, so the session request still completes and a
/// clinician sees what the model actually said.
pub fn summary_record(raw: &str) -> SummaryRecord {
    match parse_candidate(raw) {
        Some(map) => record_from_map(&map),
        None => fallback_record(raw),
    }
}

fn record_from_map(map: &Map<String, Value>) -> SummaryRecord {
    let summary = map
        .get("summary")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| "No summary provided".to_string());

    // The chain prompt asks for "tone", the single-stage prompt for
    // "mood_label"; accept either.
    let mood_label = map
        .get("tone")
        .or_else(|| map.get("mood_label"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| "unknown".to_string());

    SummaryRecord {
        summary,
        mood_label,
        repeated_questions: string_list(map.get("repeated_questions")),
        key_moments: string_list(map.get("key_moments")),
        tags: string_list(map.get("tags")),
        // Unvalidated pass-through; range enforcement is left to
        // whoever renders the score.
        agitation_score: map
            .get("agitation_score")
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
        suggestions: map
            .get("suggestions")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

fn fallback_record(raw: &str) -> SummaryRecord {
    let trimmed = raw.trim();
    let summary = if trimmed.is_empty() {
        "No summary provided".to_string()
    } else {
        let chars: Vec<char> = trimmed.chars().collect();
        if chars.len() > 200 {
            format!("{}...", chars[..200].iter().collect::<String>())
        } else {
            trimmed.to_string()
        }
    };
    SummaryRecord {
        summary,
        suggestions: Some("Unable to parse detailed analysis".to_string()),
        ..SummaryRecord::default()
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| match item.as_str() {
                    Some(s) => s.to_string(),
                    None => item.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{extract_object, summary_record, SummaryRecord};
    use crate::error::PipelineError;
    use serde_json::json;

    #[test]
    fn fenced_summary_parses_with_defaults() {
        let raw = "```json\n{\"summary\":\"ok\",\"agitation_score\":1.5}\n```";
        let record = summary_record(raw);
        assert_eq!(record.summary, "ok");
        assert_eq!(record.agitation_score, 1.5);
        assert_eq!(record.mood_label, "unknown");
        assert!(record.repeated_questions.is_empty());
        assert!(record.key_moments.is_empty());
        assert!(record.tags.is_empty());
        assert!(record.suggestions.is_none());
    }

    #[test]
    fn summary_never_fails() {
        for raw in [
            "",
            "   \n  ",
            "the model refused to answer",
            "{ definitely not json",
            "```\nstill not json\n```",
            "}{",
        ] {
            let record = summary_record(raw);
            assert!(!record.summary.is_empty(), "for input {:?}", raw);
            assert_eq!(record.mood_label, "unknown");
            assert_eq!(record.agitation_score, 0.0);
        }
    }

    #[test]
    fn empty_input_gets_placeholder_summary() {
        let record = summary_record("");
        assert_eq!(record.summary, "No summary provided");
        assert_eq!(
            record.suggestions.as_deref(),
            Some("Unable to parse detailed analysis")
        );
    }

    #[test]
    fn garbage_input_keeps_raw_text_truncated() {
        let long = "x".repeat(300);
        let record = summary_record(&long);
        assert_eq!(record.summary.len(), 203);
        assert!(record.summary.ends_with("..."));
    }

    #[test]
    fn tone_takes_precedence_over_mood_label() {
        let raw = r#"{"summary":"s","tone":"calm","mood_label":"anxious"}"#;
        let record = summary_record(raw);
        assert_eq!(record.mood_label, "calm");

        let raw = r#"{"summary":"s","mood_label":"anxious"}"#;
        let record = summary_record(raw);
        assert_eq!(record.mood_label, "anxious");
    }

    #[test]
    fn non_string_sequence_items_are_stringified() {
        let raw = r#"{"repeated_questions":["what time is it?",3],"tags":[{"a":1}]}"#;
        let record = summary_record(raw);
        assert_eq!(
            record.repeated_questions,
            vec!["what time is it?".to_string(), "3".to_string()]
        );
        assert_eq!(record.tags, vec![r#"{"a":1}"#.to_string()]);
    }

    #[test]
    fn summary_missing_all_fields_is_all_defaults() {
        let record = summary_record("{}");
        assert_eq!(record, SummaryRecord::default());
    }

    #[test]
    fn extract_tolerates_prose_and_fences() -> anyhow::Result<()> {
        let raw = "Here is the extraction you asked for:\n```json\n{\"topics\": [\"breakfast\"], \"count\": 2}\n```";
        let map = extract_object(raw)?;
        assert_eq!(map.get("topics"), Some(&json!(["breakfast"])));
        assert_eq!(map.get("count"), Some(&json!(2)));
        Ok(())
    }

    #[test]
    fn extract_returns_mapping_verbatim() -> anyhow::Result<()> {
        let raw = r#"{"nested": {"deep": [1, 2, 3]}, "flag": true}"#;
        let map = extract_object(raw)?;
        assert_eq!(map.get("nested"), Some(&json!({"deep": [1, 2, 3]})));
        assert_eq!(map.get("flag"), Some(&json!(true)));
        Ok(())
    }

    #[test]
    fn extract_without_json_is_malformed_response() {
        for raw in ["", "no braces here", "]["] {
            let err = extract_object(raw).unwrap_err();
            assert!(
                matches!(err, PipelineError::MalformedResponse(_)),
                "for input {:?}",
                raw
            );
        }
    }

    #[test]
    fn extract_with_unparsable_candidate_is_malformed_response() {
        let err = extract_object("{not valid json}").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedResponse(_)));
    }

    #[test]
    fn fence_without_trailing_marker_still_parses() {
        let raw = "```json\n{\"summary\":\"ok\"}";
        let record = summary_record(raw);
        assert_eq!(record.summary, "ok");
    }
}
