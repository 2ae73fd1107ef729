use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::models::{AnalysisPhase, Finding};
use crate::parser::{decode_or_repair, findings_from_items, labeled_block};

/// Sinks worth recovering a textual mention of. Matching is word-bounded,
/// so `read` never fires on `thread` or `already`.
const KNOWN_SINKS: [&str; 16] = [
    "memcpy", "memmove", "strcpy", "strcat", "sprintf", "snprintf", "fprintf", "system", "exec",
    "popen", "malloc", "realloc", "alloca", "free", "read", "write",
];

static FILE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([\w./\\-]+\.(?:c|h|cc|cpp|hpp|rs|go|py|java)):(\d+)").unwrap()
});

/// Recover findings from the raw text of a final response whose structured
/// evidence did not parse: first the labeled payloads, then `file:line`
/// mentions that share a line with a known sink call.
pub fn salvage_findings(raw: &str) -> Vec<Finding> {
    for label in ["END_FINDINGS", "FINDINGS"] {
        if let Some(block) = labeled_block(raw, label) {
            if let Some(value) = decode_or_repair(block) {
                let items = findings_from_items(&value, AnalysisPhase::End);
                if !items.is_empty() {
                    return items;
                }
            }
        }
    }

    let mut recovered: Vec<Finding> = Vec::new();
    for line in raw.lines() {
        let lowered = line.to_lowercase();
        let Some(sink) = KNOWN_SINKS.iter().find(|s| contains_word(&lowered, s)) else {
            continue;
        };
        for caps in FILE_LINE_RE.captures_iter(line) {
            recovered.push(Finding {
                file: caps[1].to_string(),
                line: caps[2].parse().unwrap_or(0),
                function: String::new(),
                sink_function: Some(sink.to_string()),
                rule_ids: Vec::new(),
                rationale: "recovered from final response text".to_string(),
                phase: Some(AnalysisPhase::End),
                refs: Vec::new(),
                code_excerpt: None,
                suspected: false,
            });
        }
    }
    let mut seen = HashSet::new();
    recovered.retain(|f| seen.insert(f.identifier()));
    recovered
}

/// True when the final response explicitly reported an empty evidence list,
/// as opposed to failing to produce one.
pub fn reported_empty_evidence(raw: &str) -> bool {
    for label in ["END_FINDINGS", "FINDINGS"] {
        let Some(value) = labeled_block(raw, label).and_then(decode_or_repair) else {
            continue;
        };
        let empty = match &value {
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => match map.get("items") {
                Some(Value::Array(items)) => items.is_empty(),
                Some(_) => false,
                None => map.is_empty(),
            },
            _ => false,
        };
        if empty {
            return true;
        }
    }
    false
}

fn contains_word(text: &str, word: &str) -> bool {
    let mut search = 0;
    while let Some(found) = text[search..].find(word) {
        let at = search + found;
        let end = at + word.len();
        let before_ok = text[..at]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric() && c != '_');
        let after_ok = text[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric() && c != '_');
        if before_ok && after_ok {
            return true;
        }
        search = end;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_salvages_labeled_block_from_prose() {
        let raw = "The vulnerability is confirmed.\nEND_FINDINGS={\"items\": [{\"file\": \"src/io.c\", \"line\": 42, \"sink_function\": \"memcpy\"}]}\nDone.";
        let findings = salvage_findings(raw);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].file, "src/io.c");
        assert_eq!(findings[0].line, 42);
    }

    #[test]
    fn test_salvages_file_line_next_to_sink_mention() {
        let raw = "Tainted length flows into the memcpy call at src/io.c:42, overflowing dst.\nUnrelated note about src/other.c:7 with no dangerous call.";
        let findings = salvage_findings(raw);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].file, "src/io.c");
        assert_eq!(findings[0].line, 42);
        assert_eq!(findings[0].sink_function.as_deref(), Some("memcpy"));
        assert_eq!(findings[0].rationale, "recovered from final response text");
    }

    #[test]
    fn test_sink_word_boundary() {
        // "thread" and "already" must not count as a `read` mention.
        let raw = "The thread already handled src/io.c:10 safely.";
        assert!(salvage_findings(raw).is_empty());
    }

    #[test]
    fn test_duplicate_mentions_deduplicated() {
        let raw = "strcpy at lib/str.c:9 is unsafe.\nAgain, strcpy at lib/str.c:9.";
        assert_eq!(salvage_findings(raw).len(), 1);
    }

    #[test]
    fn test_reported_empty_evidence() {
        assert!(reported_empty_evidence("END_FINDINGS={\"items\": []}"));
        assert!(reported_empty_evidence("FINDINGS=[]"));
        assert!(!reported_empty_evidence(
            "END_FINDINGS={\"items\": [{\"file\": \"a.c\"}]}"
        ));
        assert!(!reported_empty_evidence("no labels in this text"));
    }
}
