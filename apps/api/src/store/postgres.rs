use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::catalog::CatalogEntry;
use crate::models::transcript::TranscriptRow;
use crate::store::{AdvisorStore, NewRecommendation, NewScholarship};

/// `AdvisorStore` over the shared Postgres pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdvisorStore for PgStore {
    async fn latest_transcript(&self, user_id: Uuid) -> Result<Option<TranscriptRow>, sqlx::Error> {
        sqlx::query_as::<_, TranscriptRow>(
            r#"
            SELECT id, user_id, filename, text_extracted, created_at
            FROM transcripts
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_courses(&self, limit: i64) -> Result<Vec<CatalogEntry>, sqlx::Error> {
        sqlx::query_as::<_, CatalogEntry>(
            r#"
            SELECT id, code, name, learning_outcomes AS description, link
            FROM courses
            ORDER BY code ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn save_recommendation(&self, rec: NewRecommendation) -> Result<Uuid, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO recommendations (id, user_id, transcript_id, source, payload)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(rec.user_id)
        .bind(rec.transcript_id)
        .bind(&rec.source)
        .bind(&rec.payload)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn save_scholarship(&self, scholarship: NewScholarship) -> Result<Uuid, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO scholarships (id, user_id, title, description, match_score, link)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(scholarship.user_id)
        .bind(&scholarship.title)
        .bind(&scholarship.description)
        .bind(scholarship.match_score)
        .bind(&scholarship.link)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }
}
