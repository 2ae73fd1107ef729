use serde_json::Value;
use tracing::trace;

/// Strict decode first, then decode after mechanical repair. `None` when
/// even the repaired text is not valid JSON.
pub fn decode_or_repair(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }
    let repaired = repair(text);
    match serde_json::from_str(&repaired) {
        Ok(value) => {
            trace!(before = text.len(), after = repaired.len(), "segment decoded after repair");
            Some(value)
        }
        Err(_) => None,
    }
}

/// Mechanical repair for the damage truncated or sloppy oracle output
/// actually shows: unbalanced delimiters, unterminated strings, trailing or
/// repeated commas. Every pass is string-aware, so valid JSON passes through
/// byte-identical and repairing already-repaired text changes nothing.
pub fn repair(text: &str) -> String {
    let balanced = balance_delimiters(text.trim());
    let stripped = strip_trailing_commas(&balanced);
    let collapsed = drop_commas_following(&stripped, ',');
    drop_commas_following(&collapsed, '[')
}

/// Close an unterminated string literal and append the closers for every
/// still-open brace or bracket, innermost first. Unmatched closers are left
/// alone; such text stays invalid and the caller treats it as prose.
fn balance_delimiters(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in text.chars() {
        out.push(ch);
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
    if in_string {
        if escaped {
            // Text was cut mid-escape; complete the sequence before closing.
            out.push('\\');
        }
        out.push('"');
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

/// Remove commas whose next structural character closes a container,
/// e.g. `[1, 2,]` or `{"a": 1, }`.
fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mask = string_mask(&chars);
    let mut out = String::with_capacity(text.len());

    for (i, &ch) in chars.iter().enumerate() {
        if ch == ',' && !mask[i] {
            let next = chars[i + 1..]
                .iter()
                .zip(&mask[i + 1..])
                .find(|(c, m)| **m || !c.is_whitespace());
            match next {
                Some((c, m)) if !*m && (*c == '}' || *c == ']') => continue,
                None => continue,
                _ => {}
            }
        }
        out.push(ch);
    }
    out
}

/// Remove structural commas directly preceded by `after` (`,` collapses
/// repeated commas, `[` fixes a comma opening an array).
fn drop_commas_following(text: &str, after: char) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mask = string_mask(&chars);
    let mut out = String::with_capacity(text.len());
    let mut last_structural: Option<char> = None;

    for (i, &ch) in chars.iter().enumerate() {
        if ch == ',' && !mask[i] && last_structural == Some(after) {
            continue;
        }
        out.push(ch);
        if mask[i] {
            // A string literal counts as a preceding value.
            last_structural = Some('"');
        } else if !ch.is_whitespace() {
            last_structural = Some(ch);
        }
    }
    out
}

/// Per-char flags marking string-literal content, enclosing quotes included,
/// so the comma passes never edit inside strings.
fn string_mask(chars: &[char]) -> Vec<bool> {
    let mut mask = vec![false; chars.len()];
    let mut in_string = false;
    let mut escaped = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            mask[i] = true;
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
        } else if ch == '"' {
            mask[i] = true;
            in_string = true;
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_json_unchanged() {
        let text = r#"{"a": [1, 2], "b": "x, }"}"#;
        assert_eq!(repair(text), text);
        assert!(decode_or_repair(text).is_some());
    }

    #[test]
    fn test_closes_unbalanced_delimiters() {
        let repaired = repair(r#"{"items": [{"file": "a.c", "line": 3"#);
        let value: Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["items"][0]["line"], 3);
    }

    #[test]
    fn test_closes_unterminated_string() {
        let repaired = repair(r#"{"rationale": "unbounded cop"#);
        let value: Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["rationale"], "unbounded cop");
    }

    #[test]
    fn test_strips_trailing_comma() {
        let value = decode_or_repair(r#"{"vars": ["a", "b",], "n": 1,}"#).unwrap();
        assert_eq!(value["vars"][1], "b");
        assert_eq!(value["n"], 1);
    }

    #[test]
    fn test_collapses_repeated_and_leading_array_commas() {
        let value = decode_or_repair(r#"{"vars": [, "a",, "b"]}"#).unwrap();
        assert_eq!(value["vars"][0], "a");
        assert_eq!(value["vars"][1], "b");
    }

    #[test]
    fn test_repair_is_idempotent() {
        let broken = r#"{"a": [1,, 2,], "s": "keep , } this"#;
        let once = repair(broken);
        assert_eq!(repair(&once), once);
        assert!(decode_or_repair(broken).is_some());
    }

    #[test]
    fn test_commas_inside_strings_untouched() {
        let text = r#"{"s": "a,, b,] ,}"}"#;
        assert_eq!(repair(text), text);
        let value = decode_or_repair(text).unwrap();
        assert_eq!(value["s"], "a,, b,] ,}");
    }

    #[test]
    fn test_truncated_mid_escape() {
        let repaired = repair(r#"{"s": "path \"#);
        assert!(serde_json::from_str::<Value>(&repaired).is_ok());
    }

    #[test]
    fn test_hopeless_text_fails_cleanly() {
        assert!(decode_or_repair("not json at all").is_none());
        assert!(decode_or_repair("{world}").is_none());
    }
}
