use crate::models::{AnalysisPhase, Chain, SinkDescriptor};

/// System prompt establishing the analysis contract. The payload shapes it
/// references are the same shapes the parser decodes, so every prompt and
/// every correction speak one format.
pub const SYSTEM_PROMPT: &str = "\
You are a static taint-analysis engine. You trace untrusted data through a \
call chain one function at a time and report structured results.

Rules:
- Respond only with JSON in the exact shapes requested. No prose outside \
JSON, no markdown fences.
- Treat function parameters, external input, and anything previously \
reported tainted as untrusted.
- Report propagation steps as \"source -> destination\" strings.
- Evidence lists always use the labeled form FINDINGS={\"items\": [...]} \
or END_FINDINGS={\"items\": [...]}, exactly as requested per step.";

const START_SHAPE: &str = r#"{"function": "<name>", "tainted_vars": ["<var>"], "propagation": ["<src> -> <dst>"], "sanitizers": ["<call>"], "rationale": "<short>"}
FINDINGS={"items": [{"file": "<path>", "line": <int>, "function": "<name>", "sink_function": "<name>", "rule_matches": {"rule_id": "<id>", "others": []}, "rationale": "<short>"}]}"#;

const MIDDLE_SHAPE: &str = r#"{"function": "<name>", "tainted_vars": ["<var>"], "propagation": ["<src> -> <dst>"], "sanitizers": ["<call>"], "sink_reached": <bool>, "rationale": "<short>"}
FINDINGS={"items": [{"file": "<path>", "line": <int>, "function": "<name>", "sink_function": "<name>", "rule_matches": {"rule_id": "<id>", "others": []}, "rationale": "<short>"}]}"#;

const END_SHAPE: &str = r#"{"vulnerability_found": <bool>}
{"vulnerability_type": "<class or CWE>", "vulnerable_lines": "<file:line>", "severity": "<critical|high|medium|low|info>", "decision_rationale": "<short>", "why_no_vulnerability": "<short, only when false>"}
END_FINDINGS={"items": [{"file": "<path>", "line": <int>, "function": "<name>", "sink_function": "<name>", "rule_matches": {"rule_id": "<id>", "others": []}, "rationale": "<short>"}]}"#;

/// Canonical response shape for a phase. Sent with every initial prompt and
/// re-sent verbatim as the correction when a response is unparseable.
pub fn payload_shape(phase: AnalysisPhase) -> &'static str {
    match phase {
        AnalysisPhase::Start => START_SHAPE,
        AnalysisPhase::Middle => MIDDLE_SHAPE,
        AnalysisPhase::End => END_SHAPE,
    }
}

/// Build the initial query for one chain position.
pub fn initial_prompt(
    phase: AnalysisPhase,
    chain: &Chain,
    position: usize,
    vd: &SinkDescriptor,
    previous_taint: Option<&str>,
) -> String {
    let function = chain
        .functions
        .get(position)
        .map(String::as_str)
        .unwrap_or("<unknown>");

    match phase {
        AnalysisPhase::Start => start_prompt(chain, function, vd),
        AnalysisPhase::Middle => middle_prompt(chain, position, function, previous_taint),
        AnalysisPhase::End => end_prompt(chain, position, function, vd, previous_taint),
    }
}

fn sink_line(vd: &SinkDescriptor) -> String {
    let mut line = format!("Sink: {} at {}:{}", vd.sink, vd.file, vd.line);
    let params = vd.tainted_params();
    if !params.is_empty() {
        let indices: Vec<String> = params.iter().map(|p| p.to_string()).collect();
        line.push_str(&format!(" (tainted parameter indices: {})", indices.join(", ")));
    }
    line
}

fn start_prompt(chain: &Chain, function: &str, vd: &SinkDescriptor) -> String {
    let mut prompt = format!(
        "Begin the taint analysis of this call chain.\n\n\
         Call chain: {}\n{}\n\n",
        chain.path(),
        sink_line(vd),
    );
    prompt.push_str(&format!(
        "Position 1 of {}: `{}`.\n\
         Treat the parameters and any external input of `{}` as untrusted. \
         Identify which variables are tainted, how taint propagates through \
         calls and assignments, and any sanitization you observe.\n\n",
        chain.len(),
        function,
        function,
    ));
    prompt.push_str(&format!("Respond in exactly this format:\n{}", START_SHAPE));
    prompt
}

fn middle_prompt(
    chain: &Chain,
    position: usize,
    function: &str,
    previous_taint: Option<&str>,
) -> String {
    let mut prompt = String::from("Continue the taint analysis.\n\n");
    prompt.push_str(&format!(
        "Position {} of {}: `{}`.\n",
        position + 1,
        chain.len(),
        function,
    ));
    if let Some(summary) = previous_taint {
        prompt.push_str(&format!("Established so far: {}.\n", summary));
    }
    prompt.push_str(&format!(
        "Propagate taint through `{}`: which incoming values remain tainted, \
         how they move, whether any sanitizer intervenes, and whether tainted \
         data reaches a dangerous call inside this function.\n\n",
        function,
    ));
    prompt.push_str(&format!("Respond in exactly this format:\n{}", MIDDLE_SHAPE));
    prompt
}

fn end_prompt(
    chain: &Chain,
    position: usize,
    function: &str,
    vd: &SinkDescriptor,
    previous_taint: Option<&str>,
) -> String {
    let mut prompt = String::from("Render the final verdict for this call chain.\n\n");

    // A single-function chain arrives here with no prior context, so the
    // verdict prompt must introduce the chain itself.
    if previous_taint.is_none() {
        prompt.push_str(&format!("Call chain: {}\n", chain.path()));
    }

    prompt.push_str(&format!(
        "Position {} of {}: `{}`.\n",
        position + 1,
        chain.len(),
        function,
    ));
    if let Some(summary) = previous_taint {
        prompt.push_str(&format!("Established so far: {}.\n", summary));
    }
    prompt.push_str(&format!(
        "{}\n\
         Decide whether tainted data reaches this sink with an exploitable \
         effect. Justify the decision either way.\n\n",
        sink_line(vd),
    ));
    prompt.push_str(&format!("Respond in exactly this format:\n{}", END_SHAPE));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LineRef;

    fn chain() -> Chain {
        Chain {
            functions: vec!["main".into(), "parse_input".into(), "copy_buffer".into()],
            call_sites: vec![],
        }
    }

    fn vd() -> SinkDescriptor {
        SinkDescriptor {
            file: "src/io.c".into(),
            line: LineRef::Single(42),
            sink: "memcpy".into(),
            param_index: Some(2),
            param_indices: vec![],
        }
    }

    #[test]
    fn test_start_prompt_introduces_chain_and_sink() {
        let prompt = initial_prompt(AnalysisPhase::Start, &chain(), 0, &vd(), None);
        assert!(prompt.contains("main -> parse_input -> copy_buffer"));
        assert!(prompt.contains("memcpy at src/io.c:42"));
        assert!(prompt.contains("Position 1 of 3: `main`"));
        assert!(prompt.contains("FINDINGS="));
    }

    #[test]
    fn test_middle_prompt_carries_previous_state() {
        let prompt = initial_prompt(
            AnalysisPhase::Middle,
            &chain(),
            1,
            &vd(),
            Some("tainted in main: argv"),
        );
        assert!(prompt.contains("Position 2 of 3: `parse_input`"));
        assert!(prompt.contains("Established so far: tainted in main: argv."));
        assert!(prompt.contains("sink_reached"));
    }

    #[test]
    fn test_end_prompt_demands_decision_and_final_evidence() {
        let prompt = initial_prompt(
            AnalysisPhase::End,
            &chain(),
            2,
            &vd(),
            Some("tainted in parse_input: buf"),
        );
        assert!(prompt.contains("Position 3 of 3: `copy_buffer`"));
        assert!(prompt.contains("vulnerability_found"));
        assert!(prompt.contains("END_FINDINGS="));
        // The chain was already introduced at position 0.
        assert!(!prompt.contains("Call chain:"));
    }

    #[test]
    fn test_single_function_chain_end_prompt_introduces_chain() {
        let solo = Chain { functions: vec!["handler".into()], call_sites: vec![] };
        let prompt = initial_prompt(AnalysisPhase::End, &solo, 0, &vd(), None);
        assert!(prompt.contains("Call chain: handler"));
        assert!(prompt.contains("Position 1 of 1: `handler`"));
    }

    #[test]
    fn test_payload_shapes_match_parser_expectations() {
        assert!(payload_shape(AnalysisPhase::Start).contains("tainted_vars"));
        assert!(payload_shape(AnalysisPhase::Middle).contains("sink_reached"));
        assert!(payload_shape(AnalysisPhase::End).contains("why_no_vulnerability"));
    }
}
