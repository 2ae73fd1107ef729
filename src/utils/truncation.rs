const MAX_LOG_LENGTH: usize = 2_000;
const MAX_ERROR_LENGTH: usize = 600;

/// Middle-truncate oracle text for log lines, keeping the head (the record)
/// and the tail (the labeled findings). Splits only on char boundaries;
/// oracle output is arbitrary UTF-8.
pub fn truncate_for_log(text: &str) -> String {
    if text.len() <= MAX_LOG_LENGTH {
        return text.to_string();
    }
    let half = MAX_LOG_LENGTH / 2;
    let head_end = boundary_at_or_before(text, half);
    let tail_start = boundary_at_or_after(text, text.len() - half);
    format!(
        "{} ... [{} bytes elided] ... {}",
        &text[..head_end],
        tail_start - head_end,
        &text[tail_start..]
    )
}

/// Head-truncate an error message for report records.
pub fn truncate_error(error: &str) -> String {
    if error.len() <= MAX_ERROR_LENGTH {
        return error.to_string();
    }
    let end = boundary_at_or_before(error, MAX_ERROR_LENGTH);
    format!("{}...", &error[..end])
}

fn boundary_at_or_before(text: &str, index: usize) -> usize {
    let mut i = index.min(text.len());
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn boundary_at_or_after(text: &str, index: usize) -> usize {
    let mut i = index.min(text.len());
    while i < text.len() && !text.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_untouched() {
        assert_eq!(truncate_for_log("short"), "short");
        assert_eq!(truncate_error("short"), "short");
    }

    #[test]
    fn test_long_text_keeps_head_and_tail() {
        let text = format!("HEAD{}TAIL", "x".repeat(5_000));
        let truncated = truncate_for_log(&text);
        assert!(truncated.starts_with("HEAD"));
        assert!(truncated.ends_with("TAIL"));
        assert!(truncated.contains("bytes elided"));
        assert!(truncated.len() < text.len());
    }

    #[test]
    fn test_multibyte_boundaries_respected() {
        let text = "é".repeat(3_000);
        let truncated = truncate_for_log(&text);
        assert!(truncated.contains("bytes elided"));

        let error = "ü".repeat(1_000);
        let truncated = truncate_error(&error);
        assert!(truncated.ends_with("..."));
    }
}
