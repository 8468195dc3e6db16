//! Generative-language calls through `edgequake-llm`.
//!
//! [`LlmGenerator`] adapts any [`LLMProvider`] to the pipeline's
//! [`TextGenerator`] seam. Provider construction lives in
//! [`resolve_provider`] so the CLI and library callers share one fallback
//! chain.

use super::encode::encode_attachment;
use super::reorder::{Attachment, TextGenerator};
use crate::config::PipelineConfig;
use crate::error::{ServiceError, SlideError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Images beyond this many are dropped from a single call.
pub const MAX_ATTACHMENTS: usize = 3;

/// Default model when falling back to Gemini.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// [`TextGenerator`] backed by an `edgequake-llm` provider.
pub struct LlmGenerator {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }
}

#[async_trait]
impl TextGenerator for LlmGenerator {
    async fn generate(
        &self,
        prompt: &str,
        attachments: &[Attachment],
    ) -> Result<String, ServiceError> {
        if attachments.len() > MAX_ATTACHMENTS {
            warn!(
                "{} attachments supplied; only the first {} are sent",
                attachments.len(),
                MAX_ATTACHMENTS
            );
        }

        let message = if attachments.is_empty() {
            ChatMessage::user(prompt)
        } else {
            let images = attachments
                .iter()
                .take(MAX_ATTACHMENTS)
                .map(encode_attachment)
                .collect();
            ChatMessage::user_with_images(prompt, images)
        };

        let response = self
            .provider
            .chat(&[message], Some(&self.options))
            .await
            .map_err(|e| ServiceError::Api(e.to_string()))?;

        debug!(
            "LLM: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Build `CompletionOptions` from the pipeline config.
fn build_options(config: &PipelineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, SlideError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        SlideError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`)
/// 2. **Named provider** (`config.provider_name`, model from `config.model`
///    or [`DEFAULT_GEMINI_MODEL`])
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`)
/// 4. **Gemini** when `GEMINI_API_KEY` is set
/// 5. **Full auto-detection** (`ProviderFactory::from_env`)
pub fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, SlideError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);

    if let Some(ref name) = config.provider_name {
        info!("Using LLM provider '{}' with model '{}'", name, model);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if std::env::var("GEMINI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_provider("gemini", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| SlideError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, or pass --provider/--model.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_follow_config() {
        let config = PipelineConfig::builder()
            .temperature(0.4)
            .max_tokens(1024)
            .build()
            .unwrap();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.4));
        assert_eq!(opts.max_tokens, Some(1024));
    }

    #[test]
    fn defaults_are_conservative() {
        let opts = build_options(&PipelineConfig::default());
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(4096));
    }
}
