//! Tolerant JSON extraction from LLM output (§4.2 "Parsing"): the model's
//! text may be wrapped in prose, fenced code blocks, or mildly truncated
//! JSON. Grounded on the teacher's `extract_tag_content`
//! (`application/services/llm_service.rs`) — tolerant substring scanning
//! over raw text rather than a full parser — generalized from XML tags to
//! JSON object/array extraction plus a bracket-balancing repair pass.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no syntactically recoverable JSON value found in model output")]
    NoJsonFound,
}

/// Extracts the first syntactically balanced JSON object/array from `text`,
/// trying progressively looser strategies: (a) a ```json fenced block, (b)
/// any fenced block, (c) the slice between the first `{`/`[` and the last
/// `}`/`]`, (d) the whole text. Each candidate is first tried verbatim,
/// then with missing closing brackets repaired.
pub fn extract_json(text: &str) -> Result<Value, ParseError> {
    let mut candidates = Vec::new();

    if let Some(block) = fenced_block(text, Some("json")) {
        candidates.push(block);
    }
    if let Some(block) = fenced_block(text, None) {
        candidates.push(block);
    }
    if let Some(slice) = bracket_slice(text) {
        candidates.push(slice);
    }
    candidates.push(text);

    for candidate in candidates {
        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Ok(value) = serde_json::from_str(trimmed) {
            return Ok(value);
        }
        let repaired = balance_brackets(trimmed);
        if let Ok(value) = serde_json::from_str(&repaired) {
            return Ok(value);
        }
    }

    Err(ParseError::NoJsonFound)
}

/// Finds the first ``` fenced block. When `lang` is `Some`, only a fence
/// opened with that language tag (e.g. ` ```json`) matches; `None` matches
/// any fence.
fn fenced_block<'a>(text: &'a str, lang: Option<&str>) -> Option<&'a str> {
    let fence = "```";
    let mut search_from = 0;
    while let Some(rel_start) = text[search_from..].find(fence) {
        let open_start = search_from + rel_start;
        let after_fence = open_start + fence.len();
        let line_end = text[after_fence..]
            .find('\n')
            .map(|i| after_fence + i)
            .unwrap_or(text.len());
        let tag = text[after_fence..line_end].trim();

        let matches_lang = match lang {
            Some(want) => tag.eq_ignore_ascii_case(want),
            None => true,
        };

        if matches_lang {
            let content_start = if line_end < text.len() {
                line_end + 1
            } else {
                line_end
            };
            if let Some(rel_close) = text[content_start..].find(fence) {
                let content_end = content_start + rel_close;
                return Some(&text[content_start..content_end]);
            }
            return None;
        }

        search_from = after_fence;
    }
    None
}

/// Slices between the first `{`/`[` and the last matching `}`/`]`.
fn bracket_slice(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let opener = text.as_bytes()[start];
    let closer = if opener == b'{' { '}' } else { ']' };
    let end = text.rfind(closer)?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Walks `s` tracking string-literal/escape state and bracket nesting,
/// then appends whatever closing brackets/quotes are still open at the
/// end — repairs the common "truncated mid-object" failure mode without
/// touching well-formed input.
fn balance_brackets(s: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in s.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&ch) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    let mut repaired = s.to_string();
    if in_string {
        repaired.push('"');
    }
    while let Some(closer) = stack.pop() {
        repaired.push(closer);
    }
    repaired
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_from_json_fenced_block() {
        let text = "Here is your story:\n```json\n{\"title\": \"The Forest\"}\n```\nEnjoy!";
        assert_eq!(extract_json(text).unwrap(), json!({"title": "The Forest"}));
    }

    #[test]
    fn extracts_from_untagged_fenced_block() {
        let text = "```\n{\"title\": \"The Forest\"}\n```";
        assert_eq!(extract_json(text).unwrap(), json!({"title": "The Forest"}));
    }

    #[test]
    fn extracts_from_prose_wrapped_object() {
        let text = "Sure, here's the config: {\"a\": 1, \"b\": [1,2,3]} hope that helps!";
        assert_eq!(extract_json(text).unwrap(), json!({"a": 1, "b": [1,2,3]}));
    }

    #[test]
    fn repairs_missing_trailing_brackets() {
        let text = "{\"a\": 1, \"b\": {\"c\": 2}";
        assert_eq!(extract_json(text).unwrap(), json!({"a": 1, "b": {"c": 2}}));
    }

    #[test]
    fn repairs_missing_bracket_inside_fenced_block() {
        let text = "```json\n{\"scenes\": [\"one\", \"two\"\n```";
        assert_eq!(extract_json(text).unwrap(), json!({"scenes": ["one", "two"]}));
    }

    #[test]
    fn ignores_brackets_inside_string_literals() {
        let text = "{\"text\": \"use [brackets] and {braces} in prose\"}";
        let value = extract_json(text).unwrap();
        assert_eq!(value["text"], json!("use [brackets] and {braces} in prose"));
    }

    #[test]
    fn errors_on_genuinely_non_json_text() {
        assert_eq!(extract_json("just a sentence with no structure"), Err(ParseError::NoJsonFound));
    }

    #[test]
    fn array_root_value_is_supported() {
        let text = "[1, 2, 3";
        assert_eq!(extract_json(text).unwrap(), json!([1, 2, 3]));
    }
}
