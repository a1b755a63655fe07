//! `GenerationResult` — read-only audit trail written once by GW (§3, §8
//! invariant 5: "for every `task_id`, at most one row exists").

use chrono::{DateTime, Utc};

use crate::domain::value_objects::{PromptType, TaskId, UserId};

#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub task_id: TaskId,
    pub user_id: UserId,
    pub prompt_type: PromptType,
    pub generated_text: Option<String>,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub estimated_cost_usd: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl GenerationResult {
    pub fn success(
        task_id: TaskId,
        user_id: UserId,
        prompt_type: PromptType,
        generated_text: String,
        prompt_tokens: Option<i64>,
        completion_tokens: Option<i64>,
        estimated_cost_usd: Option<f64>,
    ) -> Self {
        Self {
            task_id,
            user_id,
            prompt_type,
            generated_text: Some(generated_text),
            prompt_tokens,
            completion_tokens,
            estimated_cost_usd,
            created_at: Utc::now(),
            completed_at: Some(Utc::now()),
            error: None,
        }
    }

    pub fn failure(task_id: TaskId, user_id: UserId, prompt_type: PromptType, error: impl Into<String>) -> Self {
        Self {
            task_id,
            user_id,
            prompt_type,
            generated_text: None,
            prompt_tokens: None,
            completion_tokens: None,
            estimated_cost_usd: None,
            created_at: Utc::now(),
            completed_at: Some(Utc::now()),
            error: Some(error.into()),
        }
    }
}
