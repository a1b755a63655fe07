//! Postgres-backed `DeviceTokenRepositoryPort` (§3, SPEC_FULL §11
//! push-notification supplement).

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::str::FromStr;

use crate::application::errors::RepositoryError;
use crate::application::ports::outbound::DeviceTokenRepositoryPort;
use crate::domain::entities::{DeviceToken, Platform};
use crate::domain::value_objects::{DeviceTokenId, UserId};

pub struct PostgresDeviceTokenRepository {
    pool: PgPool,
}

impl PostgresDeviceTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_token(row: &sqlx::postgres::PgRow) -> Result<DeviceToken, RepositoryError> {
        let platform_str: String = row.get("platform");
        let platform =
            Platform::from_str(&platform_str).map_err(|e| RepositoryError::Backend(e.to_string()))?;

        Ok(DeviceToken {
            id: DeviceTokenId::from_uuid(row.get("id")),
            user_id: UserId::from_uuid(row.get("user_id")),
            token: row.get("token"),
            platform,
        })
    }
}

#[async_trait]
impl DeviceTokenRepositoryPort for PostgresDeviceTokenRepository {
    async fn register(&self, token: &DeviceToken) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO device_tokens (id, user_id, token, platform)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, token) DO UPDATE SET platform = EXCLUDED.platform
            "#,
        )
        .bind(token.id.as_uuid())
        .bind(token.user_id.as_uuid())
        .bind(&token.token)
        .bind(token.platform.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn unregister(&self, user_id: UserId, token: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM device_tokens WHERE user_id = $1 AND token = $2")
            .bind(user_id.as_uuid())
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<DeviceToken>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM device_tokens WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        rows.iter().map(Self::row_to_token).collect()
    }
}
