/// Byte spans of balanced JSON objects and arrays in `text`, in order.
///
/// A single character scan tracks delimiter depth and string state, so
/// braces inside string literals never open or close a span. Quotes in
/// surrounding prose (depth 0) are ignored rather than treated as string
/// openers, which keeps apostrophe-free prose like `The "function" is ...`
/// from swallowing a following payload.
pub fn segments(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
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
            '"' if depth > 0 => in_string = true,
            '{' | '[' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' | ']' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        spans.push(&text[start..i + ch.len_utf8()]);
                    }
                }
            }
            _ => {}
        }
    }
    spans
}

/// The payload following `LABEL=` in `text`.
///
/// The label must sit on an identifier boundary, so searching for
/// `FINDINGS` never matches inside `END_FINDINGS`. If the payload opens but
/// never closes (a truncated response), the unbalanced tail is returned so
/// the caller can attempt repair.
pub fn labeled_block<'a>(text: &'a str, label: &str) -> Option<&'a str> {
    let mut search_from = 0;
    while let Some(found) = text[search_from..].find(label) {
        let at = search_from + found;
        let after_label = at + label.len();
        search_from = after_label;

        let bounded = text[..at]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric() && c != '_');
        if !bounded {
            continue;
        }
        let Some(after_eq) = text[after_label..].trim_start().strip_prefix('=') else {
            continue;
        };
        let body = after_eq.trim_start();
        if !(body.starts_with('{') || body.starts_with('[')) {
            continue;
        }
        return Some(leading_span(body).unwrap_or_else(|| body.trim_end()));
    }
    None
}

/// The balanced span starting at the first byte of `text`, if it closes.
fn leading_span(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
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
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[..i + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
