use std::path::Path;

use tracing::warn;

use super::schema::CONFIG_SCHEMA;
use super::types::EngineConfig;
use crate::errors::ChainscanError;

pub async fn load_config(path: &Path) -> Result<EngineConfig, ChainscanError> {
    if !path.exists() {
        return Err(ChainscanError::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > 1_048_576 {
        return Err(ChainscanError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let yaml: serde_yaml::Value = serde_yaml::from_str(&content)?;

    validate_schema(&yaml)?;

    let config: EngineConfig = serde_yaml::from_value(yaml)?;
    config.validate()?;

    Ok(config)
}

/// Validate config against the JSON schema for structural correctness.
/// Advisory: mismatches are logged, the typed parse decides acceptance.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<(), ChainscanError> {
    let json_value: serde_json::Value = serde_json::to_value(yaml)
        .map_err(|e| ChainscanError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| ChainscanError::Config(format!("Schema compilation error: {}", e)))?;

    if let Err(errors) = compiled.validate(&json_value) {
        for e in errors {
            warn!(validation_error = %format!("{} at {}", e, e.instance_path), "Config schema warning");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_config_error() {
        let result = load_config(Path::new("/nonexistent/chainscan.yaml")).await;
        assert!(matches!(result, Err(ChainscanError::Config(_))));
    }

    #[tokio::test]
    async fn test_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        tokio::fs::write(
            &path,
            "oracle:\n  provider: local\n  base_url: http://localhost:8000/v1\ncache:\n  capacity: 50\nrun:\n  workers: 2\n",
        )
        .await
        .unwrap();

        let config = load_config(&path).await.unwrap();
        assert_eq!(config.oracle.provider, "local");
        assert_eq!(config.cache.capacity, 50);
        assert_eq!(config.run.workers, 2);
    }

    #[tokio::test]
    async fn test_semantic_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        tokio::fs::write(&path, "run:\n  workers: 0\n").await.unwrap();
        assert!(load_config(&path).await.is_err());
    }
}
