use crate::models::AnalysisPhase;
use crate::parser::segments;

/// Markers the phase requires, each worth a full point when present.
fn phase_markers(phase: AnalysisPhase) -> &'static [&'static str] {
    match phase {
        AnalysisPhase::Start => &["function", "tainted_vars", "FINDINGS="],
        AnalysisPhase::Middle => &["function", "propagation", "FINDINGS="],
        AnalysisPhase::End => &["vulnerability_found", "END_FINDINGS="],
    }
}

const STRUCTURAL_WEIGHTS: [(f64, &str); 3] = [
    (0.3, "\"items\""),
    (0.2, "\"file\""),
    (0.2, "\"line\""),
];

const DECODABLE_WEIGHT: f64 = 0.5;

/// Score a raw response in [0, 1] against what the phase requires.
///
/// Required markers dominate the score; structural hints (a strictly
/// decodable body, an items array, file/line keys) lift a
/// malformed-but-close response enough that the conservative policy leaves
/// it alone while the aggressive one still corrects it.
pub fn quality_score(response: &str, phase: AnalysisPhase) -> f64 {
    let markers = phase_markers(phase);

    let mut score = 0.0;
    let mut max = 0.0;

    for marker in markers {
        max += 1.0;
        if response.contains(marker) {
            score += 1.0;
        }
    }

    max += DECODABLE_WEIGHT;
    if has_decodable_body(response) {
        score += DECODABLE_WEIGHT;
    }

    for (weight, needle) in STRUCTURAL_WEIGHTS {
        max += weight;
        if response.contains(needle) {
            score += weight;
        }
    }

    (score / max).clamp(0.0, 1.0)
}

/// Any balanced top-level span that strictly decodes as JSON.
fn has_decodable_body(response: &str) -> bool {
    segments(response)
        .iter()
        .any(|span| serde_json::from_str::<serde_json::Value>(span).is_ok())
}
