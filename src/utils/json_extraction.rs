//! JSON payload extraction for model responses.
//!
//! Both the scenario generator and the verifier receive JSON from a model
//! that may wrap it in markdown code fences (```json ... ```) or surround it
//! with prose. This module is the single place that strips that wrapping;
//! the call sites then parse the payload strictly with `serde_json`.

use regex::Regex;

/// Extract the JSON payload from a model response.
///
/// Strategy order:
/// 1. A ```json fenced block, if one contains a JSON value start.
/// 2. A generic ``` fenced block.
/// 3. The span from the first `{` or `[` to its matching close delimiter.
/// 4. Otherwise the trimmed input, unchanged (the caller's parse will fail
///    with a diagnosable error that includes the raw text).
pub fn extract_json_payload(content: &str) -> String {
    let trimmed = content.trim();

    if let Some(block) = extract_fenced_block(trimmed) {
        if let Some(span) = extract_value_span(&block) {
            return span;
        }
        return block;
    }

    if let Some(span) = extract_value_span(trimmed) {
        return span;
    }

    trimmed.to_string()
}

/// Extract the contents of the first fenced code block, preferring ```json.
fn extract_fenced_block(content: &str) -> Option<String> {
    // Regexes are fixed literals; compile failure is impossible at runtime.
    let json_fence = Regex::new(r"```json\s*\n?([\s\S]*?)\n?```").ok()?;
    if let Some(caps) = json_fence.captures(content) {
        return Some(caps.get(1)?.as_str().trim().to_string());
    }

    let generic_fence = Regex::new(r"```(?:\w+)?\s*\n?([\s\S]*?)\n?```").ok()?;
    if let Some(caps) = generic_fence.captures(content) {
        return Some(caps.get(1)?.as_str().trim().to_string());
    }

    None
}

/// Find the first JSON value (object or array) and return its full span.
fn extract_value_span(content: &str) -> Option<String> {
    let obj_start = content.find('{');
    let arr_start = content.find('[');

    let (start, open, close) = match (obj_start, arr_start) {
        (Some(o), Some(a)) if a < o => (a, '[', ']'),
        (Some(o), _) => (o, '{', '}'),
        (None, Some(a)) => (a, '[', ']'),
        (None, None) => return None,
    };

    let end = find_matching_delimiter(&content[start..], open, close)?;
    Some(content[start..=start + end].to_string())
}

/// Find the matching close delimiter, honoring string literals and escapes.
fn find_matching_delimiter(s: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrapped_array_passes_through() {
        let input = r#"[{"category": "braking"}]"#;
        assert_eq!(extract_json_payload(input), input);
    }

    #[test]
    fn test_json_fence_stripped() {
        let input = "```json\n[{\"category\": \"braking\"}]\n```";
        assert_eq!(extract_json_payload(input), r#"[{"category": "braking"}]"#);
    }

    #[test]
    fn test_fenced_and_unfenced_arrays_extract_identically() {
        let array = r#"[{"answer": "yes"}, {"answer": "no"}]"#;
        let fenced = format!("```json\n{array}\n```");
        assert_eq!(extract_json_payload(array), extract_json_payload(&fenced));
    }

    #[test]
    fn test_generic_fence_stripped() {
        let input = "```\n{\"answer\": \"no\"}\n```";
        assert_eq!(extract_json_payload(input), r#"{"answer": "no"}"#);
    }

    #[test]
    fn test_prose_around_object() {
        let input = r#"Here is the verdict: {"answer": "yes", "reasoning": "it fell"} done."#;
        assert_eq!(
            extract_json_payload(input),
            r#"{"answer": "yes", "reasoning": "it fell"}"#
        );
    }

    #[test]
    fn test_array_before_object_wins() {
        let input = r#"[1, 2] and then {"a": 1}"#;
        assert_eq!(extract_json_payload(input), "[1, 2]");
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let input = r#"{"text": "not a close } brace"}"#;
        assert_eq!(extract_json_payload(input), input);
    }

    #[test]
    fn test_escaped_quotes() {
        let input = r#"{"text": "he said \"ok\""}"#;
        assert_eq!(extract_json_payload(input), input);
    }

    #[test]
    fn test_truncated_json_returned_as_is() {
        // No matching close delimiter: fall through to trimmed input so the
        // caller's parse error carries the raw text.
        let input = r#"[{"category": "braking""#;
        assert_eq!(extract_json_payload(input), input);
    }

    #[test]
    fn test_malformed_text_returned_trimmed() {
        let input = "  no json here  ";
        assert_eq!(extract_json_payload(input), "no json here");
    }

    #[test]
    fn test_nested_array() {
        let input = r#"[[1, 2], [3, 4]]"#;
        assert_eq!(extract_json_payload(input), input);
    }
}
