use serde_json::Value;

use crate::models::{AnalysisPhase, Finding};

/// Findings from a decoded `FINDINGS`/`END_FINDINGS` payload: either
/// `{"items": [...]}` or a bare array. Items are coerced loosely; an item
/// without a usable `file` is dropped rather than failing the batch.
pub fn findings_from_items(value: &Value, phase: AnalysisPhase) -> Vec<Finding> {
    let items = match value {
        Value::Array(items) => items.as_slice(),
        _ => match value.get("items") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => return Vec::new(),
        },
    };
    items
        .iter()
        .filter_map(|item| finding_from_item(item, phase))
        .collect()
}

fn finding_from_item(item: &Value, phase: AnalysisPhase) -> Option<Finding> {
    let file = loose_string(item.get("file")?)?;
    Some(Finding {
        file,
        line: loose_line(item.get("line")),
        function: item
            .get("function")
            .and_then(loose_string)
            .unwrap_or_default(),
        sink_function: item.get("sink_function").and_then(loose_string),
        rule_ids: rule_ids(item),
        rationale: item
            .get("rationale")
            .and_then(loose_string)
            .unwrap_or_default(),
        phase: Some(phase),
        refs: Vec::new(),
        code_excerpt: item.get("code_excerpt").and_then(loose_string),
        suspected: false,
    })
}

/// Rule identifiers in any of the shapes oracles produce: the nested
/// `rule_matches` object from the protocol, a bare `rule_matches` array, or
/// a flat `rule_id`/`rule` key.
fn rule_ids(item: &Value) -> Vec<String> {
    let mut rules: Vec<String> = Vec::new();
    match item.get("rule_matches") {
        Some(Value::Array(list)) => rules.extend(list.iter().filter_map(loose_string)),
        Some(matches) => {
            if let Some(primary) = matches.get("rule_id").and_then(loose_string) {
                rules.push(primary);
            }
            if let Some(Value::Array(others)) = matches.get("others") {
                rules.extend(others.iter().filter_map(loose_string));
            }
        }
        None => {}
    }
    for key in ["rule_id", "rule"] {
        if let Some(rule) = item.get(key).and_then(loose_string) {
            if !rules.contains(&rule) {
                rules.push(rule);
            }
        }
    }
    rules
}

fn loose_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn loose_line(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
