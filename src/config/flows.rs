use std::path::Path;

use tracing::warn;

use super::schema::FLOWS_SCHEMA;
use crate::errors::ChainscanError;
use crate::models::FlowRecord;

/// Load the candidate-flow input produced by the static-analysis
/// collaborator. Schema problems are advisory warnings; the strict serde
/// decode and the per-record checks decide acceptance.
pub async fn load_flows(path: &Path) -> Result<Vec<FlowRecord>, ChainscanError> {
    if !path.exists() {
        return Err(ChainscanError::InvalidInput(format!(
            "Flows file not found: {}",
            path.display()
        )));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let value: serde_json::Value = serde_json::from_str(&content)?;

    for message in schema_errors(&value)? {
        warn!(validation_error = %message, "Flows schema warning");
    }

    let flows: Vec<FlowRecord> = serde_json::from_value(value)?;

    for (index, flow) in flows.iter().enumerate() {
        if flow.chains.is_empty() {
            return Err(ChainscanError::InvalidInput(format!(
                "flow {} has an empty function_chain",
                index
            )));
        }
        if flow.vd.file.is_empty() || flow.vd.sink.is_empty() {
            return Err(ChainscanError::InvalidInput(format!(
                "flow {} has an incomplete sink descriptor",
                index
            )));
        }
    }

    Ok(flows)
}

/// Strict validation for the `validate` subcommand: schema violations are
/// returned, not just logged.
pub async fn validate_flows(path: &Path) -> Result<usize, ChainscanError> {
    let flows = load_flows(path).await?;
    let content = tokio::fs::read_to_string(path).await?;
    let value: serde_json::Value = serde_json::from_str(&content)?;

    let messages = schema_errors(&value)?;
    if !messages.is_empty() {
        return Err(ChainscanError::InvalidInput(format!(
            "flows file violates the input schema: {}",
            messages.join("; ")
        )));
    }

    Ok(flows.len())
}

fn schema_errors(value: &serde_json::Value) -> Result<Vec<String>, ChainscanError> {
    let compiled = jsonschema::JSONSchema::compile(&FLOWS_SCHEMA)
        .map_err(|e| ChainscanError::Internal(format!("flows schema compilation error: {}", e)))?;

    let messages = match compiled.validate(value) {
        Ok(()) => Ok(Vec::new()),
        Err(errors) => Ok(errors
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect()),
    };
    messages
}
