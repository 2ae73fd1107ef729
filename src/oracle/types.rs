use serde::{Deserialize, Serialize};

/// One completed oracle call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleResponse {
    pub content: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub model: String,
}

impl OracleResponse {
    /// Whitespace-only content is the degenerate failure mode handled by
    /// the protocol retry path, not a transport error.
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// A single role-tagged message in the conversation sent to the oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: &str) -> Self {
        Self { role: "system".to_string(), content: content.to_string() }
    }
    pub fn user(content: &str) -> Self {
        Self { role: "user".to_string(), content: content.to_string() }
    }
    pub fn assistant(content: &str) -> Self {
        Self { role: "assistant".to_string(), content: content.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_detection() {
        let resp = OracleResponse {
            content: "  \n\t ".into(),
            input_tokens: None,
            output_tokens: None,
            model: "test".into(),
        };
        assert!(resp.is_empty());
    }

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::system("s").role, "system");
        assert_eq!(Message::user("u").role, "user");
        assert_eq!(Message::assistant("a").role, "assistant");
    }
}
