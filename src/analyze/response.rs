//! Response normalisation
//!
//! Pulls the completion text out of the provider envelope, then tries to find
//! the JSON report the model was asked to emit. Anything that can't be parsed
//! degrades to `{"raw_response": <text>}`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Real,
    Fake,
    Misleading,
    Unverifiable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub source_title: String,
    pub source_url: String,
    pub summary: String,
    pub similarity_score: f64,
    pub reputation_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredibilityProof {
    pub claim_verified: String,
    pub matched_fact: String,
    pub source_proof_url: String,
}

/// The report shape requested from the model. Used only to check conformance;
/// the model's object is always returned untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictReport {
    pub input_type: String,
    pub input_content: String,
    pub verdict: Verdict,
    pub confidence_score: f64,
    pub evidence: Vec<Evidence>,
    pub analysis_summary: String,
    pub credibility_proof: Vec<CredibilityProof>,
}

impl VerdictReport {
    /// Describe why `value` is not a well-formed report, if it isn't.
    pub fn conformance_problem(value: &Value) -> Option<String> {
        let report: VerdictReport = match serde_json::from_value(value.clone()) {
            Ok(report) => report,
            Err(e) => return Some(e.to_string()),
        };
        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        if !in_range(report.confidence_score) {
            return Some(format!("confidence_score {} out of range", report.confidence_score));
        }
        if report
            .evidence
            .iter()
            .any(|e| !in_range(e.similarity_score) || !in_range(e.reputation_score))
        {
            return Some("evidence score out of range".to_string());
        }
        None
    }
}

/// `choices[0].message.content` from a chat-completion envelope. Content
/// given as an array of text parts is concatenated.
pub fn completion_text(envelope: &Value) -> AppResult<String> {
    let content = envelope
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .ok_or_else(|| {
            AppError::Provider(format!(
                "Unexpected response shape: no choices[0].message.content in {}",
                truncate(&envelope.to_string(), 500)
            ))
        })?;

    match content {
        Value::String(s) => Ok(s.clone()),
        Value::Array(parts) => Ok(parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("")),
        other => Err(AppError::Provider(format!(
            "Unexpected response shape: message content is {}",
            truncate(&other.to_string(), 200)
        ))),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Strip a surrounding Markdown code fence (```json ... ```), if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string on the opening line.
    match body.find('\n') {
        Some(pos) => body[pos + 1..].trim(),
        None => body.trim(),
    }
}

fn parse_object(candidate: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// End index (exclusive) of the balanced object starting at `start`, which
/// must point at `{`. Braces inside JSON strings are ignored.
fn balanced_object_end(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Find the JSON object embedded in model output.
///
/// Tried in order: the whole text (fence stripped), each top-level balanced
/// `{...}` candidate left to right, and finally the span from the first `{` to the
/// last `}`.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let body = strip_code_fence(text);
    if let Some(value) = parse_object(body) {
        return Some(value);
    }

    // Only top-level candidates: never restart inside an object that is
    // still open, or a nested fragment would pass for the whole report.
    let mut cursor = 0;
    while let Some(pos) = text[cursor..].find('{') {
        let start = cursor + pos;
        let Some(end) = balanced_object_end(text, start) else {
            break;
        };
        if let Some(value) = parse_object(&text[start..end]) {
            return Some(value);
        }
        cursor = end;
    }

    let first = text.find('{')?;
    let last = text.rfind('}')?;
    if last <= first {
        return None;
    }
    parse_object(&text[first..=last])
}

/// Turn completion text into the response body: the embedded object, or the
/// raw text wrapper.
pub fn normalize(text: &str) -> Value {
    match extract_json_object(text) {
        Some(value) => {
            if let Some(problem) = VerdictReport::conformance_problem(&value) {
                crate::logger::warn(
                    "analyze",
                    &format!("Model report does not match the requested schema: {}", problem),
                );
            }
            value
        }
        None => {
            crate::logger::warn("analyze", "No JSON object in model output, returning raw text");
            json!({ "raw_response": text })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_object_is_returned_verbatim() {
        let text = r#"{"verdict":"Real","confidence_score":90}"#;
        assert_eq!(normalize(text), json!({"verdict": "Real", "confidence_score": 90}));
    }

    #[test]
    fn object_surrounded_by_prose() {
        let text = r#"Here is the answer: {"verdict":"Fake"} Thanks."#;
        assert_eq!(normalize(text), json!({"verdict": "Fake"}));
    }

    #[test]
    fn no_braces_falls_back_to_raw() {
        let text = "I cannot verify this claim.";
        assert_eq!(normalize(text), json!({"raw_response": text}));
    }

    #[test]
    fn unparseable_braces_fall_back_to_raw() {
        let text = "Result: {verdict: Fake} maybe";
        assert_eq!(normalize(text), json!({"raw_response": text}));
    }

    #[test]
    fn code_fenced_object() {
        let text = "```json\n{\"verdict\": \"Misleading\"}\n```";
        assert_eq!(extract_json_object(text), Some(json!({"verdict": "Misleading"})));
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_scanner() {
        let text = r#"Note {draft} then {"analysis_summary": "uses } and { chars", "verdict": "Real"} and {"x": 1}"#;
        assert_eq!(
            extract_json_object(text),
            Some(json!({"analysis_summary": "uses } and { chars", "verdict": "Real"}))
        );
    }

    #[test]
    fn truncated_report_with_nested_evidence_falls_back_to_raw() {
        let text = r#"{"verdict": "Fake", "confidence_score": 80, "evidence": [{"source_title": "Reuters", "source_url": "https://r.test"}, {"source_title": "AP""#;
        assert_eq!(normalize(text), json!({"raw_response": text}));
    }

    #[test]
    fn invalid_outer_object_does_not_yield_inner_one() {
        let text = r#"{verdict: Fake, details: {"source_title": "A"}}"#;
        assert_eq!(normalize(text), json!({"raw_response": text}));
    }

    #[test]
    fn later_top_level_object_is_still_found() {
        let text = r#"Draft {not json} final: {"verdict": "Real"}"#;
        assert_eq!(extract_json_object(text), Some(json!({"verdict": "Real"})));
    }

    #[test]
    fn nested_objects_are_kept_whole() {
        let text = r#"Report: {"verdict":"Fake","evidence":[{"source_title":"A"}]} end"#;
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["evidence"][0]["source_title"], "A");
    }

    #[test]
    fn truncated_output_is_not_an_object() {
        assert_eq!(extract_json_object(r#"{"verdict": "Fake", "evidence": ["#), None);
    }

    #[test]
    fn top_level_array_is_not_accepted() {
        assert_eq!(extract_json_object("[1, 2, 3]"), None);
    }

    #[test]
    fn completion_text_from_envelope() {
        let env = json!({"choices": [{"message": {"role": "assistant", "content": "hello"}}]});
        assert_eq!(completion_text(&env).unwrap(), "hello");

        let env = json!({"choices": [{"message": {"content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]}}]});
        assert_eq!(completion_text(&env).unwrap(), "ab");
    }

    #[test]
    fn completion_text_rejects_bad_envelopes() {
        assert!(matches!(completion_text(&json!({"choices": []})), Err(AppError::Provider(_))));
        assert!(matches!(
            completion_text(&json!({"error": {"message": "quota"}})),
            Err(AppError::Provider(_))
        ));
        assert!(matches!(
            completion_text(&json!({"choices": [{"message": {"content": null}}]})),
            Err(AppError::Provider(_))
        ));
    }

    #[test]
    fn conformance_check() {
        let good = json!({
            "input_type": "text",
            "input_content": "claim",
            "verdict": "Fake",
            "confidence_score": 88,
            "evidence": [{
                "source_title": "Reuters",
                "source_url": "https://reuters.com/x",
                "summary": "Refutes",
                "similarity_score": 70,
                "reputation_score": 95
            }],
            "analysis_summary": "No basis.",
            "credibility_proof": []
        });
        assert_eq!(VerdictReport::conformance_problem(&good), None);

        let mut bad = good.clone();
        bad["confidence_score"] = json!(140);
        assert!(VerdictReport::conformance_problem(&bad).is_some());

        let mut bad = good;
        bad["verdict"] = json!("Probably fake");
        assert!(VerdictReport::conformance_problem(&bad).is_some());
    }
}
