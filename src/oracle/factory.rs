use super::openai::OpenAiOracle;
use super::provider::Oracle;
use crate::errors::ChainscanError;

/// Build an oracle provider from configuration. Everything speaks the
/// OpenAI-compatible chat-completions wire shape; `local` just requires an
/// explicit base URL.
pub fn create_oracle(
    provider_name: &str,
    api_key: &str,
    model: Option<&str>,
    base_url: Option<&str>,
    max_tokens: u32,
) -> Result<Box<dyn Oracle>, ChainscanError> {
    match provider_name {
        "openai" => match base_url {
            Some(url) => Ok(Box::new(OpenAiOracle::with_base_url(api_key, model, url, max_tokens))),
            None => Ok(Box::new(OpenAiOracle::new(api_key, model, max_tokens))),
        },
        "local" | "openai-compatible" => {
            let url = base_url.ok_or_else(|| {
                ChainscanError::Config(format!(
                    "provider '{}' requires an explicit base_url",
                    provider_name
                ))
            })?;
            Ok(Box::new(OpenAiOracle::with_base_url(api_key, model, url, max_tokens)))
        }
        other => Err(ChainscanError::Config(format!(
            "Unknown oracle provider: {}",
            other
        ))),
    }
}
