//! Generator Worker (GW, §4.1): a competing consumer of `generation_tasks`
//! that serialises a prompt, calls the LLM with bounded retries, records a
//! `GenerationResult`, and publishes a `NotificationPayload`. Grounded on
//! the teacher's `LLMQueueService::run_worker` consume-loop shape, adapted
//! from an in-process queue to a `BrokerPort` consumer.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use uuid::Uuid;

use crate::application::dto::{NotificationPayload, NotificationStatus};
use crate::application::errors::{BrokerError, RepositoryError};
use crate::application::ports::outbound::{
    substitute_user_input, AiClient, BrokerPort, GenerationParams, GenerationResultRepositoryPort,
    PromptTemplatePort,
};
use crate::application::topology::{
    GENERATION_TASKS_QUEUE, INTERNAL_UPDATES_EXCHANGE, INTERNAL_UPDATES_QUEUE,
};
use crate::domain::entities::GenerationResult;
use crate::domain::value_objects::{PromptType, TaskId, UserId};

/// §6 wire shape; GW only reads the fields it needs to drive generation.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncomingTask {
    task_id: Uuid,
    user_id: Uuid,
    prompt_type: String,
    user_input: String,
    #[serde(default)]
    story_config_id: Option<Uuid>,
    #[serde(default)]
    published_story_id: Option<Uuid>,
    #[serde(default)]
    state_hash: Option<String>,
    #[serde(default)]
    game_state_id: Option<Uuid>,
}

pub struct GeneratorWorkerConfig {
    pub max_attempts: u32,
    pub base_retry_delay: Duration,
    pub ai_timeout: Duration,
    pub consumer_tag: String,
}

pub struct GeneratorWorkerService {
    broker: Arc<dyn BrokerPort>,
    prompts: Arc<dyn PromptTemplatePort>,
    ai: Arc<dyn AiClient>,
    results: Arc<dyn GenerationResultRepositoryPort>,
    config: GeneratorWorkerConfig,
}

impl GeneratorWorkerService {
    pub fn new(
        broker: Arc<dyn BrokerPort>,
        prompts: Arc<dyn PromptTemplatePort>,
        ai: Arc<dyn AiClient>,
        results: Arc<dyn GenerationResultRepositoryPort>,
        config: GeneratorWorkerConfig,
    ) -> Self {
        Self {
            broker,
            prompts,
            ai,
            results,
            config,
        }
    }

    /// §4.1, §5 "prefetch=1 serialises per-worker processing but multiple
    /// worker instances compete on the queue". Runs until the broker
    /// consumer is exhausted (connection loss); the binary reconnects.
    pub async fn run(&self) -> Result<(), BrokerError> {
        let mut consumer = self
            .broker
            .consume(GENERATION_TASKS_QUEUE, &self.config.consumer_tag, 1)
            .await?;

        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(d) => d,
                Err(e) => {
                    tracing::error!(error = %e, "broker delivery error");
                    continue;
                }
            };

            metrics::counter!("tasks_received").increment(1);
            let processing_start = std::time::Instant::now();

            let task: IncomingTask = match serde_json::from_slice(&delivery.data) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(error = %e, "unparseable GenerationTaskPayload");
                    let _ = delivery.nack(false).await;
                    continue;
                }
            };

            let (result, notification) = self.handle_task(&task).await;

            metrics::histogram!("task_processing_duration")
                .record(processing_start.elapsed().as_secs_f64());

            match self.results.upsert(&result).await {
                Ok(()) => match self.publish_notification(&notification).await {
                    Ok(()) => {
                        let _ = delivery.ack().await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, task_id = %task.task_id, "notify_error");
                        metrics::counter!("tasks_failed", "error_type" => "notify_error")
                            .increment(1);
                        let _ = delivery.nack(false).await;
                    }
                },
                Err(e) => {
                    tracing::error!(error = %e, task_id = %task.task_id, "save_error");
                    metrics::counter!("tasks_failed", "error_type" => "save_error").increment(1);
                    let _ = delivery.nack(false).await;
                }
            }
        }

        Ok(())
    }

    async fn publish_notification(&self, notification: &NotificationPayload) -> Result<(), RepositoryError> {
        let bytes = serde_json::to_vec(notification)
            .map_err(|e| RepositoryError::Backend(format!("notification serialize: {e}")))?;
        self.broker
            .publish(INTERNAL_UPDATES_EXCHANGE, INTERNAL_UPDATES_QUEUE, &bytes)
            .await
            .map_err(|e| RepositoryError::Backend(format!("notification publish: {e}")))
    }

    /// Core of §4.1 `Handle(payload)`: prompt preparation, retried AI call,
    /// terminal `GenerationResult`/`NotificationPayload` pair.
    async fn handle_task(&self, task: &IncomingTask) -> (GenerationResult, NotificationPayload) {
        let task_id = TaskId::from_uuid(task.task_id);
        let user_id = UserId::from_uuid(task.user_id);

        let prompt_type: PromptType = match task.prompt_type.parse() {
            Ok(pt) => pt,
            Err(e) => {
                return self.terminal_error(task, task_id, user_id, format!("prompt_preparation: {e}"));
            }
        };

        if task.user_input.trim().is_empty() {
            return self.terminal_error(task, task_id, user_id, "user_input_empty".to_string());
        }

        let template = match self.prompts.load(prompt_type).await {
            Ok(t) => t,
            Err(e) => {
                return self.terminal_error(task, task_id, user_id, format!("prompt_preparation: {e}"));
            }
        };
        let system_prompt = substitute_user_input(&template, &task.user_input);

        let params = GenerationParams::default_for_generation(self.config.ai_timeout);

        match self.generate_with_retry(user_id, &system_prompt, &task.user_input, params).await {
            Ok(outcome) => {
                metrics::counter!("tasks_succeeded").increment(1);
                if let Some(tokens) = outcome.usage.prompt_tokens {
                    metrics::histogram!("ai_tokens", "type" => "prompt").record(tokens as f64);
                }
                if let Some(tokens) = outcome.usage.completion_tokens {
                    metrics::histogram!("ai_tokens", "type" => "completion").record(tokens as f64);
                }
                if let Some(cost) = outcome.usage.estimated_cost_usd {
                    metrics::histogram!("ai_estimated_cost_usd").record(cost);
                }

                let result = GenerationResult::success(
                    task_id,
                    user_id,
                    prompt_type,
                    outcome.text.clone(),
                    outcome.usage.prompt_tokens,
                    outcome.usage.completion_tokens,
                    outcome.usage.estimated_cost_usd,
                );
                let notification = NotificationPayload {
                    task_id: task.task_id,
                    user_id: task.user_id,
                    prompt_type: task.prompt_type.clone(),
                    status: NotificationStatus::Success,
                    generated_text: Some(outcome.text),
                    error_details: None,
                    story_config_id: task.story_config_id,
                    published_story_id: task.published_story_id,
                    state_hash: task.state_hash.clone(),
                    game_state_id: task.game_state_id,
                };
                (result, notification)
            }
            Err(last_error) => {
                metrics::counter!("tasks_failed", "error_type" => "ai_error").increment(1);
                self.terminal_error(task, task_id, user_id, last_error)
            }
        }
    }

    /// §4.1 "retrying up to `max_attempts` with exponential backoff (base
    /// `baseDelay`, factor 2, jitter ±10%) on any AI error. One call has a
    /// hard timeout (`aiTimeout`)."
    async fn generate_with_retry(
        &self,
        user_id: UserId,
        system_prompt: &str,
        user_input: &str,
        params: GenerationParams,
    ) -> Result<crate::application::ports::outbound::GenerationOutcome, String> {
        let mut last_error = String::from("no attempts made");

        for attempt in 0..self.config.max_attempts {
            let started = std::time::Instant::now();
            let call = self.ai.generate_text(user_id, system_prompt, user_input, params);
            let outcome = tokio::time::timeout(self.config.ai_timeout, call).await;
            metrics::histogram!("ai_request_duration").record(started.elapsed().as_secs_f64());

            match outcome {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => last_error = "AI call timed out".to_string(),
            }

            if attempt + 1 < self.config.max_attempts {
                tokio::time::sleep(self.backoff_delay(attempt)).await;
            }
        }

        Err(last_error)
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.base_retry_delay.as_millis() as f64;
        let exponential = base * 2f64.powi(attempt as i32);
        let jitter = rand::thread_rng().gen_range(-0.1..=0.1);
        let with_jitter = (exponential * (1.0 + jitter)).max(0.0);
        Duration::from_millis(with_jitter as u64)
    }

    fn terminal_error(
        &self,
        task: &IncomingTask,
        task_id: TaskId,
        user_id: UserId,
        error: String,
    ) -> (GenerationResult, NotificationPayload) {
        let prompt_type: PromptType = task.prompt_type.parse().unwrap_or(PromptType::Narrator);
        let result = GenerationResult::failure(task_id, user_id, prompt_type, error.clone());
        let notification = NotificationPayload {
            task_id: task.task_id,
            user_id: task.user_id,
            prompt_type: task.prompt_type.clone(),
            status: NotificationStatus::Error,
            generated_text: None,
            error_details: Some(error),
            story_config_id: task.story_config_id,
            published_story_id: task.published_story_id,
            state_hash: task.state_hash.clone(),
            game_state_id: task.game_state_id,
        };
        (result, notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::errors::LlmError;
    use crate::application::ports::outbound::GenerationOutcome;
    use crate::application::ports::outbound::TokenUsage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct AlwaysFailAi {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl AiClient for AlwaysFailAi {
        async fn generate_text(
            &self,
            _user_id: UserId,
            _system_prompt: &str,
            _user_input: &str,
            _params: GenerationParams,
        ) -> Result<GenerationOutcome, LlmError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::Upstream("boom".to_string()))
        }
    }

    struct SucceedsOnceAi;

    #[async_trait]
    impl AiClient for SucceedsOnceAi {
        async fn generate_text(
            &self,
            _user_id: UserId,
            _system_prompt: &str,
            _user_input: &str,
            _params: GenerationParams,
        ) -> Result<GenerationOutcome, LlmError> {
            Ok(GenerationOutcome {
                text: "{\"title\": \"The Forest\"}".to_string(),
                usage: TokenUsage {
                    prompt_tokens: Some(10),
                    completion_tokens: Some(20),
                    estimated_cost_usd: Some(0.002),
                },
            })
        }
    }

    struct FakePrompts;

    #[async_trait]
    impl PromptTemplatePort for FakePrompts {
        async fn load(&self, _prompt_type: PromptType) -> Result<String, crate::application::errors::PromptTemplateError> {
            Ok("System: {{USER_INPUT}}".to_string())
        }
    }

    struct NullResults {
        saved: Mutex<Vec<GenerationResult>>,
    }

    #[async_trait]
    impl GenerationResultRepositoryPort for NullResults {
        async fn upsert(&self, result: &GenerationResult) -> Result<(), RepositoryError> {
            self.saved.lock().unwrap().push(result.clone());
            Ok(())
        }

        async fn get(
            &self,
            _task_id: TaskId,
            _prompt_type: PromptType,
        ) -> Result<Option<GenerationResult>, RepositoryError> {
            Ok(None)
        }
    }

    struct NullBroker;

    #[async_trait]
    impl BrokerPort for NullBroker {
        async fn declare_exchange(
            &self,
            _spec: &crate::application::ports::outbound::ExchangeSpec,
        ) -> Result<(), BrokerError> {
            Ok(())
        }
        async fn declare_queue(
            &self,
            _spec: &crate::application::ports::outbound::QueueSpec,
        ) -> Result<(), BrokerError> {
            Ok(())
        }
        async fn publish(&self, _exchange: &str, _routing_key: &str, _payload: &[u8]) -> Result<(), BrokerError> {
            Ok(())
        }
        async fn consume(
            &self,
            _queue: &str,
            _consumer_tag: &str,
            _prefetch: u16,
        ) -> Result<Box<dyn crate::application::ports::outbound::Consumer>, BrokerError> {
            unimplemented!("not exercised by these tests")
        }
    }

    fn task() -> IncomingTask {
        IncomingTask {
            task_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            prompt_type: "narrator".to_string(),
            user_input: "a forest adventure".to_string(),
            story_config_id: Some(Uuid::new_v4()),
            published_story_id: None,
            state_hash: None,
            game_state_id: None,
        }
    }

    fn service(ai: Arc<dyn AiClient>) -> GeneratorWorkerService {
        GeneratorWorkerService::new(
            Arc::new(NullBroker),
            Arc::new(FakePrompts),
            ai,
            Arc::new(NullResults {
                saved: Mutex::new(Vec::new()),
            }),
            GeneratorWorkerConfig {
                max_attempts: 3,
                base_retry_delay: Duration::from_millis(1),
                ai_timeout: Duration::from_secs(1),
                consumer_tag: "test".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn exhausted_retries_produce_a_terminal_error_notification() {
        let svc = service(Arc::new(AlwaysFailAi {
            attempts: AtomicU32::new(0),
        }));
        let (result, notification) = svc.handle_task(&task()).await;
        assert!(result.error.is_some());
        assert_eq!(notification.status, NotificationStatus::Error);
    }

    #[tokio::test]
    async fn successful_generation_carries_usage_into_the_result() {
        let svc = service(Arc::new(SucceedsOnceAi));
        let (result, notification) = svc.handle_task(&task()).await;
        assert_eq!(result.prompt_tokens, Some(10));
        assert_eq!(notification.status, NotificationStatus::Success);
        assert!(notification.generated_text.unwrap().contains("The Forest"));
    }

    #[test]
    fn empty_user_input_is_a_terminal_validation_error() {
        let svc = service(Arc::new(SucceedsOnceAi));
        let mut t = task();
        t.user_input = "   ".to_string();
        let task_id = TaskId::from_uuid(t.task_id);
        let user_id = UserId::from_uuid(t.user_id);
        let (result, notification) = svc.terminal_error(&t, task_id, user_id, "user_input_empty".to_string());
        assert_eq!(result.error.as_deref(), Some("user_input_empty"));
        assert_eq!(notification.status, NotificationStatus::Error);
    }
}
