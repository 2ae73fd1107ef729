use std::sync::LazyLock;

use regex::Regex;

static LEADING_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*(output|result|response|answer)\s*:\s*").unwrap());

static LINE_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*Line \d+:\s*").unwrap());

/// Strip the decoration oracles wrap around payloads: code fences,
/// `Output:`-style lead-ins, and per-line `Line N:` prefixes. The payload
/// itself is never altered, so normalizing twice is a no-op.
pub fn normalize(response: &str) -> String {
    let without_fences = strip_code_fences(response);
    let without_labels = LEADING_LABEL_RE.replace_all(&without_fences, "");
    let cleaned = LINE_PREFIX_RE.replace_all(&without_labels, "");
    cleaned.trim().to_string()
}

/// Drop fence delimiter lines (``` or ```json etc.) while keeping the fenced
/// content. Oracles fence payloads inconsistently, so the delimiters carry
/// no information.
fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_json_code_fence() {
        let raw = "```json\n{\"function\": \"main\"}\n```";
        assert_eq!(normalize(raw), "{\"function\": \"main\"}");
    }

    #[test]
    fn test_strips_leading_label() {
        let raw = "Output: {\"function\": \"main\"}";
        assert_eq!(normalize(raw), "{\"function\": \"main\"}");
    }

    #[test]
    fn test_strips_line_prefixes() {
        let raw = "Line 1: {\"function\":\nLine 2: \"main\"}";
        assert_eq!(normalize(raw), "{\"function\":\n\"main\"}");
    }

    #[test]
    fn test_label_inside_payload_untouched() {
        // Only line-leading labels are decoration.
        let raw = "{\"rationale\": \"the result: tainted\"}";
        assert_eq!(normalize(raw), raw);
    }

    #[test]
    fn test_idempotent() {
        let raw = "```\nResponse: {\"a\": 1}\n```";
        let once = normalize(raw);
        assert_eq!(normalize(&once), once);
    }
}
