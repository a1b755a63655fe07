//! Notification Consumer binary (§4.2, §5): wires every repository the
//! state machine touches, the Scene Cache, the Task Dispatcher (acting as
//! the inbound `GenerationPipelineUseCase`), and the DLQ maintenance
//! consumer (SPEC_FULL §11), then runs the NC consume loop with
//! reconnect-with-backoff. Grounded on the teacher's `main.rs` startup
//! sequence.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use novelforge_engine::application::ports::inbound::GenerationPipelineUseCase;
use novelforge_engine::application::ports::outbound::BrokerPort;
use novelforge_engine::application::services::notification_consumer_service::NotificationConsumerService;
use novelforge_engine::application::services::scene_cache_service::SceneCacheService;
use novelforge_engine::application::services::task_dispatcher::TaskDispatcher;
use novelforge_engine::application::topology;
use novelforge_engine::infrastructure::broker::AmqpBroker;
use novelforge_engine::infrastructure::config::AppConfig;
use novelforge_engine::infrastructure::dlq_maintenance::DlqMaintenanceConsumer;
use novelforge_engine::infrastructure::persistence::{
    self, PostgresDeviceTokenRepository, PostgresImageReferenceRepository,
    PostgresPlayerGameStateRepository, PostgresPlayerProgressRepository,
    PostgresPublishedStoryRepository, PostgresStoryConfigRepository,
    PostgresStorySceneRepository,
};
use novelforge_engine::infrastructure::scene_reservation_registry::DashMapReservationRegistry;

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

    tracing::info!("starting notification consumer");

    let config = AppConfig::from_env()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .idle_timeout(config.database_idle_timeout)
        .connect(&config.database_url)
        .await
        .context("connecting to Postgres")?;
    persistence::migrate(&pool).await?;

    let story_configs = Arc::new(PostgresStoryConfigRepository::new(pool.clone()));
    let published_stories = Arc::new(PostgresPublishedStoryRepository::new(pool.clone()));
    let game_states = Arc::new(PostgresPlayerGameStateRepository::new(pool.clone()));
    let progress = Arc::new(PostgresPlayerProgressRepository::new(pool.clone()));
    let scenes = Arc::new(PostgresStorySceneRepository::new(pool.clone()));
    let images = Arc::new(PostgresImageReferenceRepository::new(pool.clone()));
    let device_tokens = Arc::new(PostgresDeviceTokenRepository::new(pool.clone()));

    let registry = Arc::new(DashMapReservationRegistry::new());
    let scene_cache = Arc::new(SceneCacheService::new(scenes.clone(), registry));

    // SPEC_FULL §11 "scene registry restart reconstruction": seed the
    // in-memory reservation registry from whatever is still mid-build
    // according to Postgres, since the registry itself is not ground
    // truth (§9).
    if let Ok(pending) = game_states.find_stuck(Utc::now()).await {
        let mut seeds = Vec::with_capacity(pending.len());
        for gs in pending {
            if let Ok(Some(p)) = progress.get(gs.player_progress_id).await {
                seeds.push((gs.published_story_id, p.state_hash));
            }
        }
        let count = seeds.len();
        scene_cache.rebuild_from_pending(seeds);
        tracing::info!(count, "reconstructed scene-build reservations from pending game states");
    }

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

    let mut backoff = Duration::from_secs(1);
    loop {
        match AmqpBroker::connect(&config.amqp_url).await {
            Ok(broker) => {
                let broker: Arc<dyn BrokerPort> = Arc::new(broker);
                if let Err(e) = declare_topology(&broker).await {
                    tracing::error!(error = %e, "failed to declare broker topology");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(30));
                    continue;
                }

                // Re-wire the dispatcher's own publish path onto the live
                // broker connection, then spawn the DLQ sweep against the
                // same connection.
                let dispatcher: Arc<dyn GenerationPipelineUseCase> = Arc::new(TaskDispatcher::new(
                    story_configs.clone(),
                    published_stories.clone(),
                    game_states.clone(),
                    progress.clone(),
                    scenes.clone(),
                    scene_cache.clone(),
                    broker.clone(),
                    config.max_active_generations_per_user,
                ));

                let dlq = DlqMaintenanceConsumer::new(
                    broker.clone(),
                    story_configs.clone(),
                    published_stories.clone(),
                    game_states.clone(),
                    "dlq-maintenance",
                );
                let dlq_sweep_interval = config.reaper_sweep_interval;
                let dlq_task = tokio::spawn(async move {
                    loop {
                        match dlq.drain_once().await {
                            Ok(handled) if handled > 0 => {
                                tracing::info!(handled, "dlq maintenance sweep marked aggregates error");
                            }
                            Ok(_) => {}
                            Err(e) => tracing::error!(error = %e, "dlq maintenance sweep failed"),
                        }
                        tokio::time::sleep(dlq_sweep_interval).await;
                    }
                });

                let service = NotificationConsumerService::new(
                    story_configs.clone(),
                    published_stories.clone(),
                    game_states.clone(),
                    images.clone(),
                    device_tokens.clone(),
                    scene_cache.clone(),
                    dispatcher,
                    broker,
                    "notification-consumer",
                );

                backoff = Duration::from_secs(1);
                if let Err(e) = service.run().await {
                    tracing::error!(error = %e, "notification consumer consume loop ended");
                }
                dlq_task.abort();
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to connect to broker");
            }
        }

        tracing::info!(delay_secs = backoff.as_secs(), "reconnecting notification consumer");
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(Duration::from_secs(30));
    }
}

async fn declare_topology(
    broker: &Arc<dyn BrokerPort>,
) -> Result<(), novelforge_engine::application::errors::BrokerError> {
    for exchange in topology::all_exchanges() {
        broker.declare_exchange(&exchange).await?;
    }
    for queue in topology::all_queues() {
        broker.declare_queue(&queue).await?;
    }
    Ok(())
}
