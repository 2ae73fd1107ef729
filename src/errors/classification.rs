use super::types::ChainscanError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub retryable: bool,
}

impl ChainscanError {
    /// Classify this error to determine its type and whether the transport
    /// retry helper may re-attempt the operation that produced it.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Retryable errors
            ChainscanError::RateLimit(_) => ErrorClassification {
                error_type: "RateLimitError",
                retryable: true,
            },
            ChainscanError::Network(_) => ErrorClassification {
                error_type: "NetworkError",
                retryable: true,
            },
            ChainscanError::Timeout(_) => ErrorClassification {
                error_type: "TimeoutError",
                retryable: true,
            },
            ChainscanError::OracleApi(_) => ErrorClassification {
                error_type: "OracleApiError",
                retryable: true,
            },
            ChainscanError::Io(_) => ErrorClassification {
                error_type: "IoError",
                retryable: true,
            },
            ChainscanError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                retryable: true,
            },

            // Non-retryable errors
            ChainscanError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                retryable: false,
            },
            ChainscanError::InvalidInput(_) => ErrorClassification {
                error_type: "InvalidInputError",
                retryable: false,
            },
            ChainscanError::Authentication(_) => ErrorClassification {
                error_type: "AuthenticationError",
                retryable: false,
            },
            ChainscanError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                retryable: false,
            },
            ChainscanError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                retryable: false,
            },
            ChainscanError::Cancelled => ErrorClassification {
                error_type: "CancelledError",
                retryable: false,
            },

            // Protocol-level retries already ran; the transport layer must
            // not re-attempt these.
            ChainscanError::EmptyResponse { .. } => ErrorClassification {
                error_type: "EmptyResponseError",
                retryable: false,
            },
            ChainscanError::ChainAnalysis { source, .. } => {
                let inner = source.classify();
                ErrorClassification {
                    error_type: inner.error_type,
                    retryable: false,
                }
            }
        }
    }
}
