//! Backend selection from configuration.

use crate::{MockClient, OpenAiClient};
use scrivener_core::{LlmConfig, LlmProvider};
use scrivener_error::{LlmError, LlmErrorKind, ScrivenerResult};
use scrivener_interface::TextGenerator;
use std::str::FromStr;
use tracing::{info, warn};

/// Parse a provider name such as `"openai"` or `"mock"`.
///
/// # Errors
///
/// Returns [`LlmErrorKind::UnsupportedProvider`] for unknown names.
pub fn provider_from_name(name: &str) -> ScrivenerResult<LlmProvider> {
    LlmProvider::from_str(&name.trim().to_lowercase())
        .map_err(|_| LlmError::new(LlmErrorKind::UnsupportedProvider(name.to_string())).into())
}

/// Build the generator selected by `config`.
///
/// An `openai` provider without `OPENAI_API_KEY` falls back to the mock
/// backend with a warning.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn build_generator(config: &LlmConfig) -> ScrivenerResult<Box<dyn TextGenerator>> {
    match config.provider() {
        LlmProvider::OpenAi => match OpenAiClient::new(config) {
            Ok(client) => {
                info!(model = %config.model(), "Using OpenAI backend");
                Ok(Box::new(client))
            }
            Err(e) if is_missing_key(&e) => {
                warn!("OPENAI_API_KEY not set, falling back to mock backend");
                Ok(Box::new(MockClient::from_config(config)))
            }
            Err(e) => Err(e),
        },
        LlmProvider::Mock => {
            info!(delay_ms = *config.mock_delay_ms(), "Using mock backend");
            Ok(Box::new(MockClient::from_config(config)))
        }
    }
}

fn is_missing_key(err: &scrivener_error::ScrivenerError) -> bool {
    matches!(
        err.kind(),
        scrivener_error::ScrivenerErrorKind::Llm(LlmError {
            kind: LlmErrorKind::MissingApiKey,
            ..
        })
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_names() {
        assert_eq!(provider_from_name("openai").unwrap(), LlmProvider::OpenAi);
        assert_eq!(provider_from_name(" Mock ").unwrap(), LlmProvider::Mock);
        assert!(provider_from_name("anthropic").is_err());
    }

    #[test]
    fn test_mock_provider_builds_mock() {
        let generator = build_generator(&LlmConfig::default()).unwrap();
        assert_eq!(generator.provider_name(), "mock");
        assert_eq!(generator.model_name(), crate::MOCK_MODEL);
    }
}
