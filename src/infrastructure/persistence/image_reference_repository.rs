//! Postgres-backed `ImageReferenceRepositoryPort` — idempotent upsert
//! target for image-generator result messages (§3, §6).

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::application::errors::RepositoryError;
use crate::application::ports::outbound::ImageReferenceRepositoryPort;
use crate::domain::entities::ImageReference;

pub struct PostgresImageReferenceRepository {
    pool: PgPool,
}

impl PostgresImageReferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImageReferenceRepositoryPort for PostgresImageReferenceRepository {
    async fn upsert(&self, reference: &ImageReference) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO image_references (reference_key, image_url)
            VALUES ($1, $2)
            ON CONFLICT (reference_key) DO UPDATE SET image_url = EXCLUDED.image_url
            "#,
        )
        .bind(&reference.reference_key)
        .bind(&reference.image_url)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, reference_key: &str) -> Result<Option<ImageReference>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM image_references WHERE reference_key = $1")
            .bind(reference_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        Ok(row.map(|r| ImageReference {
            reference_key: r.get("reference_key"),
            image_url: r.get("image_url"),
        }))
    }
}
