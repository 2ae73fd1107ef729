use serde::{Deserialize, Serialize};

/// How eagerly a low-quality response is re-queried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryPolicy {
    /// One correction when the response is clearly below par.
    #[default]
    Intelligent,
    /// Corrections while quality stays under a high bar, up to the cap.
    Aggressive,
    /// One correction, and only for near-garbage responses.
    Conservative,
}

impl RetryPolicy {
    /// Whether a response scoring `quality` deserves another correction.
    /// `attempt` counts corrections already sent for this position; the
    /// `max_attempts` cap binds every policy.
    pub fn wants_retry(&self, quality: f64, attempt: u32, max_attempts: u32) -> bool {
        if attempt >= max_attempts {
            return false;
        }
        match self {
            RetryPolicy::Intelligent => attempt == 0 && quality < 0.8,
            RetryPolicy::Aggressive => quality < 0.9,
            RetryPolicy::Conservative => attempt == 0 && quality < 0.3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RetryPolicy::Intelligent => "intelligent",
            RetryPolicy::Aggressive => "aggressive",
            RetryPolicy::Conservative => "conservative",
        }
    }
}

impl std::fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
