//! Instruction template sent to the completion model.
//!
//! The template is used twice: verbatim as the system message, and rendered
//! with the submission's fields as the user message.

use super::submission::InputType;

const TYPE_PLACEHOLDER: &str = "{input_type}";
const CONTENT_PLACEHOLDER: &str = "{input_content}";

/// Stand-in for the content of image submissions; the image itself travels as
/// a separate message part.
pub const IMAGE_CONTENT_PLACEHOLDER: &str = "[attached image]";

pub const INSTRUCTION_TEMPLATE: &str = r#"
You are an advanced AI misinformation detection and verification system with real-time web search and multi-modal input analysis.

Input:
- User provides content that can be:
  - Text or article URL
  - Image (analyze for manipulation/deepfake)
  - Video URL or description (analyze for manipulation)

Tasks:
1. Analyze input and classify as Real, Fake, Misleading, or Unverifiable.
2. Provide a JSON report with verdict, confidence, evidence, explanation, and credibility proof.

Output ONLY the following JSON format:

{
  "input_type": "{input_type}",
  "input_content": "{input_content}",
  "verdict": "Real | Fake | Misleading | Unverifiable",
  "confidence_score": 0-100,
  "evidence": [
    {
      "source_title": "Source title",
      "source_url": "https://source-link.com",
      "summary": "How this source supports or refutes the content",
      "similarity_score": 0-100,
      "reputation_score": 0-100
    }
  ],
  "analysis_summary": "Clear explanation of findings and verdict.",
  "credibility_proof": [
    {
      "claim_verified": "Exact claim or element verified or disproven",
      "matched_fact": "Fact or data from a source supporting/refuting the claim",
      "source_proof_url": "https://source-link.com"
    }
  ]
}

Do not include anything outside this JSON.
"#;

/// Make a value safe to sit inside a double-quoted JSON string in the
/// template: backslashes and quotes are escaped, each line break becomes a
/// space.
pub fn escape_field(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\n' => out.push(' '),
            // CRLF counts as one break.
            '\r' => {}
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            c if c.is_control() => out.push(' '),
            c => out.push(c),
        }
    }
    out
}

/// Render the user instruction for a submission. Placeholders are replaced
/// in a single pass over the template, so placeholder-like text inside the
/// submitted content is never substituted again.
pub fn render_instruction(input_type: InputType, input_content: &str) -> String {
    let input_type = escape_field(input_type.as_str());
    let input_content = escape_field(input_content);

    let mut out = String::with_capacity(INSTRUCTION_TEMPLATE.len() + input_content.len());
    let mut rest = INSTRUCTION_TEMPLATE;
    loop {
        let next_type = rest.find(TYPE_PLACEHOLDER);
        let next_content = rest.find(CONTENT_PLACEHOLDER);
        let (pos, placeholder, value) = match (next_type, next_content) {
            (Some(t), Some(c)) if t < c => (t, TYPE_PLACEHOLDER, &input_type),
            (Some(t), None) => (t, TYPE_PLACEHOLDER, &input_type),
            (_, Some(c)) => (c, CONTENT_PLACEHOLDER, &input_content),
            (None, None) => break,
        };
        out.push_str(&rest[..pos]);
        out.push_str(value);
        rest = &rest[pos + placeholder.len()..];
    }
    out.push_str(rest);
    out
}
