//! Application configuration (SPEC_FULL §10.3), grounded on the teacher's
//! `AppConfig::from_env` shape — plain `std::env::var` + `anyhow::Context`,
//! no `config` crate (the teacher lists it but never imports it; dropped,
//! see DESIGN.md).

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub amqp_url: String,

    pub database_url: String,
    pub database_max_connections: u32,
    pub database_idle_timeout: Duration,

    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub ai_timeout: Duration,
    pub ai_max_attempts: u32,
    pub ai_base_retry_delay: Duration,

    pub reaper_draft_threshold: Duration,
    pub reaper_published_story_threshold: Duration,
    pub reaper_player_game_state_threshold: Duration,
    pub reaper_sweep_interval: Duration,

    pub max_active_generations_per_user: i64,

    pub prompts_dir: String,

    pub metrics_listen_addr: String,
    pub health_listen_addr: String,
}

fn env_duration_secs(key: &str, default_secs: u64) -> Result<Duration> {
    let secs = match env::var(key) {
        Ok(v) => v.parse::<u64>().with_context(|| format!("{key} must be an integer number of seconds"))?,
        Err(_) => default_secs,
    };
    Ok(Duration::from_secs(secs))
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            amqp_url: env_or("AMQP_URL", "amqp://127.0.0.1:5672/%2f"),

            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL environment variable is required")?,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", "10")
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
            database_idle_timeout: env_duration_secs("DATABASE_IDLE_TIMEOUT_SECS", 300)?,

            llm_base_url: env_or("LLM_BASE_URL", "http://localhost:11434/v1"),
            llm_model: env_or("LLM_MODEL", "gpt-4o-mini"),
            llm_api_key: env::var("LLM_API_KEY").ok(),
            ai_timeout: env_duration_secs("AI_TIMEOUT_SECS", 60)?,
            ai_max_attempts: env_or("AI_MAX_ATTEMPTS", "3")
                .parse()
                .context("AI_MAX_ATTEMPTS must be a positive integer")?,
            ai_base_retry_delay: env_duration_secs("AI_BASE_RETRY_DELAY_SECS", 2)?,

            reaper_draft_threshold: env_duration_secs("REAPER_DRAFT_THRESHOLD_SECS", 10 * 60)?,
            reaper_published_story_threshold: env_duration_secs(
                "REAPER_PUBLISHED_STORY_THRESHOLD_SECS",
                60 * 60,
            )?,
            reaper_player_game_state_threshold: env_duration_secs(
                "REAPER_PLAYER_GAME_STATE_THRESHOLD_SECS",
                30 * 60,
            )?,
            reaper_sweep_interval: env_duration_secs("REAPER_SWEEP_INTERVAL_SECS", 60)?,

            max_active_generations_per_user: env_or("MAX_ACTIVE_GENERATIONS_PER_USER", "3")
                .parse()
                .context("MAX_ACTIVE_GENERATIONS_PER_USER must be an integer")?,

            prompts_dir: env_or("PROMPTS_DIR", "./prompts"),

            metrics_listen_addr: env_or("METRICS_LISTEN_ADDR", "0.0.0.0:9000"),
            health_listen_addr: env_or("HEALTH_LISTEN_ADDR", "0.0.0.0:8080"),
        })
    }
}
