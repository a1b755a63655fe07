//! Postgres-backed `GenerationResultRepositoryPort` — write-once audit
//! trail, upserted on redelivery of the same `task_id` (§4.1, §8 invariant 5).

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::str::FromStr;

use crate::application::errors::RepositoryError;
use crate::application::ports::outbound::GenerationResultRepositoryPort;
use crate::domain::entities::GenerationResult;
use crate::domain::value_objects::{PromptType, TaskId, UserId};

pub struct PostgresGenerationResultRepository {
    pool: PgPool,
}

impl PostgresGenerationResultRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_result(row: &sqlx::postgres::PgRow) -> Result<GenerationResult, RepositoryError> {
        let prompt_type_str: String = row.get("prompt_type");
        let prompt_type = PromptType::from_str(&prompt_type_str)
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        Ok(GenerationResult {
            task_id: TaskId::from_uuid(row.get("task_id")),
            user_id: UserId::from_uuid(row.get("user_id")),
            prompt_type,
            generated_text: row.get("generated_text"),
            prompt_tokens: row.get("prompt_tokens"),
            completion_tokens: row.get("completion_tokens"),
            estimated_cost_usd: row.get("estimated_cost_usd"),
            created_at: row.get("created_at"),
            completed_at: row.get("completed_at"),
            error: row.get("error"),
        })
    }
}

#[async_trait]
impl GenerationResultRepositoryPort for PostgresGenerationResultRepository {
    async fn upsert(&self, result: &GenerationResult) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO generation_results
                (task_id, user_id, prompt_type, generated_text, prompt_tokens,
                 completion_tokens, estimated_cost_usd, created_at, completed_at, error)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (task_id, prompt_type) DO UPDATE SET
                generated_text = EXCLUDED.generated_text,
                prompt_tokens = EXCLUDED.prompt_tokens,
                completion_tokens = EXCLUDED.completion_tokens,
                estimated_cost_usd = EXCLUDED.estimated_cost_usd,
                completed_at = EXCLUDED.completed_at,
                error = EXCLUDED.error
            "#,
        )
        .bind(result.task_id.as_uuid())
        .bind(result.user_id.as_uuid())
        .bind(result.prompt_type.as_str())
        .bind(&result.generated_text)
        .bind(result.prompt_tokens)
        .bind(result.completion_tokens)
        .bind(result.estimated_cost_usd)
        .bind(result.created_at)
        .bind(result.completed_at)
        .bind(&result.error)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get(
        &self,
        task_id: TaskId,
        prompt_type: PromptType,
    ) -> Result<Option<GenerationResult>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM generation_results WHERE task_id = $1 AND prompt_type = $2")
            .bind(task_id.as_uuid())
            .bind(prompt_type.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        row.as_ref().map(Self::row_to_result).transpose()
    }
}
