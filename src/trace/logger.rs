use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::conversation::Exchange;
use crate::errors::ChainscanError;
use crate::models::SinkDescriptor;

/// One line of the conversation trace: everything said while analyzing one
/// chain, plus the outcome. Serialized as JSON Lines so traces stream and
/// partial files stay usable after a crash.
#[derive(Debug, Serialize)]
pub struct TraceRecord<'a> {
    pub flow_id: String,
    pub chain: &'a [String],
    pub sink_info: &'a SinkDescriptor,
    pub conversations: &'a [Exchange],
    pub result: serde_json::Value,
}

pub struct TraceLogger {
    path: PathBuf,
}

impl TraceLogger {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Truncate the trace file and create parent directories; a rerun never
    /// appends to a stale trace.
    pub async fn initialize(&self) -> Result<(), ChainscanError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, b"").await?;
        Ok(())
    }

    pub async fn log_chain(&self, record: &TraceRecord<'_>) -> Result<(), ChainscanError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::PromptType;
    use crate::models::{AnalysisPhase, LineRef};
    use serde_json::json;

    fn vd() -> SinkDescriptor {
        SinkDescriptor {
            file: "src/io.c".into(),
            line: LineRef::Single(42),
            sink: "memcpy".into(),
            param_index: Some(2),
            param_indices: vec![],
        }
    }

    #[tokio::test]
    async fn test_trace_is_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let logger = TraceLogger::new(&path);
        logger.initialize().await.unwrap();

        let chain = vec!["main".to_string(), "copy_buffer".to_string()];
        let exchanges = vec![Exchange::new(
            "main",
            0,
            AnalysisPhase::Start,
            PromptType::Initial,
            "prompt text".to_string(),
            "response text".to_string(),
        )];
        let sink = vd();

        for flow_id in ["flow-0", "flow-1"] {
            logger
                .log_chain(&TraceRecord {
                    flow_id: flow_id.to_string(),
                    chain: &chain,
                    sink_info: &sink,
                    conversations: &exchanges,
                    result: json!({"decision": "clean"}),
                })
                .await
                .unwrap();
        }

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["flow_id"], "flow-0");
        assert_eq!(first["sink_info"]["sink"], "memcpy");
        assert_eq!(first["conversations"][0]["position"], 0);
        assert_eq!(first["result"]["decision"], "clean");
    }

    #[tokio::test]
    async fn test_initialize_truncates_previous_trace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/trace.jsonl");
        let logger = TraceLogger::new(&path);

        logger.initialize().await.unwrap();
        logger
            .log_chain(&TraceRecord {
                flow_id: "flow-0".into(),
                chain: &[],
                sink_info: &vd(),
                conversations: &[],
                result: json!({}),
            })
            .await
            .unwrap();
        logger.initialize().await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(content.is_empty());
    }
}
