use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainscanError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Oracle API error: {0}")]
    OracleApi(String),

    #[error("Rate limited: {0}")]
    RateLimit(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Empty oracle response at position {position} after {attempts} correction attempts")]
    EmptyResponse { position: usize, attempts: u32 },

    #[error("Chain analysis failed at {function} (position {position}): {source}")]
    ChainAnalysis {
        function: String,
        position: usize,
        #[source]
        source: Box<ChainscanError>,
    },

    #[error("Cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChainscanError {
    /// Wrap an error with the chain position where it surfaced.
    pub fn at_position(self, function: &str, position: usize) -> Self {
        ChainscanError::ChainAnalysis {
            function: function.to_string(),
            position,
            source: Box::new(self),
        }
    }

    /// The innermost error, unwrapping chain-analysis attribution layers.
    pub fn root(&self) -> &ChainscanError {
        match self {
            ChainscanError::ChainAnalysis { source, .. } => source.root(),
            other => other,
        }
    }
}
