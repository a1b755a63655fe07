//! Generator Worker binary (§4.1, §5): connects to Postgres and the
//! broker, declares the shared topology, and runs the GW consume loop
//! with reconnect-with-backoff around `GeneratorWorkerService::run`.
//! Grounded on the teacher's `main.rs` startup sequence (dotenv →
//! tracing init → config load → state init → spawn workers).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use novelforge_engine::application::services::generator_worker_service::{
    GeneratorWorkerConfig, GeneratorWorkerService,
};
use novelforge_engine::application::topology;
use novelforge_engine::infrastructure::broker::AmqpBroker;
use novelforge_engine::infrastructure::config::AppConfig;
use novelforge_engine::infrastructure::llm::{FilesystemPromptTemplateLoader, HttpAiClient};
use novelforge_engine::infrastructure::persistence::{self, PostgresGenerationResultRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "novelforge_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting generator worker");

    let config = AppConfig::from_env()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .idle_timeout(config.database_idle_timeout)
        .connect(&config.database_url)
        .await
        .context("connecting to Postgres")?;
    persistence::migrate(&pool).await?;

    let results = Arc::new(PostgresGenerationResultRepository::new(pool.clone()));
    let prompts = Arc::new(FilesystemPromptTemplateLoader::new(config.prompts_dir.clone()));
    let ai = Arc::new(HttpAiClient::new(
        config.llm_base_url.clone(),
        config.llm_model.clone(),
        config.llm_api_key.clone(),
    ));

    let worker_config = GeneratorWorkerConfig {
        max_attempts: config.ai_max_attempts,
        base_retry_delay: config.ai_base_retry_delay,
        ai_timeout: config.ai_timeout,
        consumer_tag: "generator-worker".to_string(),
    };

    tokio::spawn(async move {
        if let Err(e) = novelforge_engine::infrastructure::metrics::install_prometheus_exporter(
            &config.metrics_listen_addr,
        ) {
            tracing::error!(error = %e, "failed to install metrics exporter");
        }
    });

    let health_addr = config.health_listen_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = novelforge_engine::infrastructure::health::serve(&health_addr).await {
            tracing::error!(error = %e, "liveness server exited");
        }
    });

    // §5 "broker reconnections use bounded exponential backoff": on a
    // dropped connection the consumer loop ends and we reconnect, ramping
    // the delay each consecutive failure and resetting it on success.
    let mut backoff = Duration::from_secs(1);
    loop {
        match AmqpBroker::connect(&config.amqp_url).await {
            Ok(broker) => {
                let broker: Arc<dyn novelforge_engine::application::ports::outbound::BrokerPort> =
                    Arc::new(broker);
                if let Err(e) = declare_topology(&broker).await {
                    tracing::error!(error = %e, "failed to declare broker topology");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(30));
                    continue;
                }

                let service = GeneratorWorkerService::new(
                    broker,
                    prompts.clone(),
                    ai.clone(),
                    results.clone(),
                    GeneratorWorkerConfig {
                        max_attempts: worker_config.max_attempts,
                        base_retry_delay: worker_config.base_retry_delay,
                        ai_timeout: worker_config.ai_timeout,
                        consumer_tag: worker_config.consumer_tag.clone(),
                    },
                );

                backoff = Duration::from_secs(1);
                if let Err(e) = service.run().await {
                    tracing::error!(error = %e, "generator worker consume loop ended");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to connect to broker");
            }
        }

        tracing::info!(delay_secs = backoff.as_secs(), "reconnecting generator worker");
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(Duration::from_secs(30));
    }
}

async fn declare_topology(
    broker: &Arc<dyn novelforge_engine::application::ports::outbound::BrokerPort>,
) -> Result<(), novelforge_engine::application::errors::BrokerError> {
    for exchange in topology::all_exchanges() {
        broker.declare_exchange(&exchange).await?;
    }
    for queue in topology::all_queues() {
        broker.declare_queue(&queue).await?;
    }
    Ok(())
}
