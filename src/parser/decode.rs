use serde_json::Value;
use tracing::debug;

use crate::models::{
    AnalysisPhase, EndRecord, Finding, MiddleRecord, PhaseRecord, Severity, StartRecord,
};

use super::findings::findings_from_items;
use super::normalize::normalize;
use super::repair::decode_or_repair;
use super::result::ParseResult;
use super::segment::{labeled_block, segments};

/// Parse one oracle response against the protocol for `phase`.
///
/// Decoration is stripped, every balanced JSON span is decoded (with repair),
/// the labeled findings payload is extracted, and the loose values are
/// coerced into the phase's typed record. Fields may arrive split across
/// several objects; the first object providing a field wins. The response is
/// `Unparseable` only when nothing decoded at all.
pub fn parse_response(response: &str, phase: AnalysisPhase) -> ParseResult {
    let text = normalize(response);

    let findings = phase_findings(&text, phase);

    let mut decoded: Vec<Value> = segments(&text)
        .into_iter()
        .filter_map(decode_or_repair)
        .collect();
    if decoded.is_empty() {
        // Truncated output often ends mid-object with no balanced span left.
        if let Some(value) = unbalanced_tail(&text) {
            decoded.push(value);
        }
    }

    if decoded.is_empty() && findings.is_empty() {
        debug!(phase = %phase, "response had no decodable payload");
        return ParseResult::Unparseable {
            raw: response.to_string(),
        };
    }

    let record = match phase {
        AnalysisPhase::Start => PhaseRecord::Start(start_from_values(&decoded, findings)),
        AnalysisPhase::Middle => PhaseRecord::Middle(middle_from_values(&decoded, findings)),
        AnalysisPhase::End => PhaseRecord::End(end_from_values(&decoded, findings)),
    };
    ParseResult::from_record(record)
}

fn phase_findings(text: &str, phase: AnalysisPhase) -> Vec<Finding> {
    let block = match phase {
        AnalysisPhase::End => {
            // Lenient: accept the non-final label on the final position too.
            labeled_block(text, "END_FINDINGS").or_else(|| labeled_block(text, "FINDINGS"))
        }
        _ => labeled_block(text, "FINDINGS"),
    };
    block
        .and_then(decode_or_repair)
        .map(|value| findings_from_items(&value, phase))
        .unwrap_or_default()
}

fn unbalanced_tail(text: &str) -> Option<Value> {
    let start = text.find(['{', '['])?;
    decode_or_repair(text[start..].trim())
}

fn start_from_values(values: &[Value], findings: Vec<Finding>) -> StartRecord {
    StartRecord {
        function: string_field(values, "function"),
        tainted_vars: string_list_field(values, "tainted_vars"),
        propagation: string_list_field(values, "propagation"),
        sanitizers: string_list_field(values, "sanitizers").unwrap_or_default(),
        rationale: string_field(values, "rationale"),
        findings,
    }
}

fn middle_from_values(values: &[Value], findings: Vec<Finding>) -> MiddleRecord {
    MiddleRecord {
        function: string_field(values, "function"),
        tainted_vars: string_list_field(values, "tainted_vars"),
        propagation: string_list_field(values, "propagation"),
        sanitizers: string_list_field(values, "sanitizers").unwrap_or_default(),
        sink_reached: bool_field(values, "sink_reached"),
        rationale: string_field(values, "rationale"),
        findings,
    }
}

const DETAIL_KEYS: [&str; 5] = [
    "vulnerability_type",
    "vulnerable_lines",
    "why_no_vulnerability",
    "decision_rationale",
    "severity",
];

fn end_from_values(values: &[Value], findings: Vec<Finding>) -> EndRecord {
    let details = values
        .iter()
        .find(|v| DETAIL_KEYS.iter().any(|key| v.get(key).is_some()))
        .cloned();
    EndRecord {
        vulnerability_found: bool_field(values, "vulnerability_found"),
        vulnerability_type: string_field(values, "vulnerability_type"),
        vulnerable_lines: lines_field(values, "vulnerable_lines"),
        why_no_vulnerability: string_field(values, "why_no_vulnerability"),
        decision_rationale: string_field(values, "decision_rationale"),
        severity: string_field(values, "severity").and_then(|s| Severity::parse(&s)),
        details,
        findings,
    }
}

/// First string (or number, stringified) under `key` across the decoded
/// objects. Blank strings count as absent.
fn string_field(values: &[Value], key: &str) -> Option<String> {
    values.iter().find_map(|v| match v.get(key)? {
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
    })
}

/// First list under `key`. A bare string splits on commas; `"none"` and an
/// explicit empty array both mean "present but empty", which satisfies the
/// criticality check.
fn string_list_field(values: &[Value], key: &str) -> Option<Vec<String>> {
    values.iter().find_map(|v| match v.get(key)? {
        Value::Array(items) => Some(items.iter().filter_map(scalar_to_string).collect()),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
                Some(Vec::new())
            } else {
                Some(
                    trimmed
                        .split(',')
                        .map(|part| part.trim().to_string())
                        .filter(|part| !part.is_empty())
                        .collect(),
                )
            }
        }
        _ => None,
    })
}

fn bool_field(values: &[Value], key: &str) -> Option<bool> {
    values.iter().find_map(|v| match v.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// `vulnerable_lines` arrives as a string, a number, or an array of either;
/// all collapse to one display string.
fn lines_field(values: &[Value], key: &str) -> Option<String> {
    values.iter().find_map(|v| match v.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(scalar_to_string).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        _ => None,
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
