//! LLM client port (§6 "LLM client contract").

use async_trait::async_trait;
use std::time::Duration;

use crate::application::errors::LlmError;
use crate::domain::value_objects::UserId;

#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    pub temperature: f32,
    pub timeout: Duration,
}

impl GenerationParams {
    /// §4.1 "invokes... with `params{temperature≈0.2}`".
    pub fn default_for_generation(timeout: Duration) -> Self {
        Self {
            temperature: 0.2,
            timeout,
        }
    }
}

/// §4.1 "cost/token data are carried in the LLM response; if absent they
/// are omitted."
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub estimated_cost_usd: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub text: String,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait AiClient: Send + Sync {
    async fn generate_text(
        &self,
        user_id: UserId,
        system_prompt: &str,
        user_input: &str,
        params: GenerationParams,
    ) -> Result<GenerationOutcome, LlmError>;
}
