//! Stuck-Task Reaper binary (§4.5, §5): periodically sweeps drafts,
//! published stories, and player game states for rows stuck mid-generation
//! past their threshold and flips them to `error`. Grounded on the
//! teacher's `main.rs` startup sequence; the sweep loop itself mirrors the
//! teacher's hourly queue-cleanup worker shape.

use std::sync::Arc;

use anyhow::Context;
use rand::Rng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use novelforge_engine::application::services::stuck_task_reaper::{
    ReaperThresholds, StuckTaskReaper,
};
use novelforge_engine::infrastructure::config::AppConfig;
use novelforge_engine::infrastructure::persistence::{
    self, PostgresPlayerGameStateRepository, PostgresPublishedStoryRepository,
    PostgresStoryConfigRepository,
};

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

    tracing::info!("starting stuck-task reaper");

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

    let reaper = StuckTaskReaper::new(
        story_configs,
        published_stories,
        game_states,
        ReaperThresholds {
            drafts: config.reaper_draft_threshold,
            published_stories: config.reaper_published_story_threshold,
            player_game_states: config.reaper_player_game_state_threshold,
        },
    );

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

    // §5 "staggered by a few seconds at boot" so multiple reaper
    // replicas don't all sweep in lockstep.
    let stagger = std::time::Duration::from_millis(rand::thread_rng().gen_range(0..5_000));
    tokio::time::sleep(stagger).await;

    let sweep_interval = config.reaper_sweep_interval;
    loop {
        match reaper.sweep_once().await {
            Ok(report) if report.total() > 0 => {
                tracing::info!(
                    drafts = report.drafts_reaped,
                    published_stories = report.published_stories_reaped,
                    player_game_states = report.player_game_states_reaped,
                    "reaper swept stuck aggregates"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "reaper sweep failed"),
        }
        tokio::time::sleep(sweep_interval).await;
    }
}
