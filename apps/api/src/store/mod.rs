//! Persistence collaborator used by the recommendation pipelines.
//!
//! `AppState` holds an `Arc<dyn AdvisorStore>`; production wires `PgStore`,
//! tests wire the in-memory store.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::models::catalog::CatalogEntry;
use crate::models::transcript::TranscriptRow;

pub mod postgres;

#[cfg(test)]
pub mod memory;

/// A generated recommendation payload ready to be stored.
#[derive(Debug, Clone)]
pub struct NewRecommendation {
    pub user_id: Uuid,
    pub transcript_id: Uuid,
    /// Model id that produced the payload.
    pub source: String,
    /// The `{courses, scholarships}` body returned to the caller.
    pub payload: Value,
}

#[derive(Debug, Clone)]
pub struct NewScholarship {
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub match_score: Option<f64>,
    pub link: Option<String>,
}

#[async_trait]
pub trait AdvisorStore: Send + Sync {
    /// Most recently uploaded transcript for the user, if any.
    async fn latest_transcript(&self, user_id: Uuid) -> Result<Option<TranscriptRow>, sqlx::Error>;

    /// Catalog snapshot ordered by code, at most `limit` rows.
    async fn list_courses(&self, limit: i64) -> Result<Vec<CatalogEntry>, sqlx::Error>;

    /// Returns the id of the stored row.
    async fn save_recommendation(&self, rec: NewRecommendation) -> Result<Uuid, sqlx::Error>;

    async fn save_scholarship(&self, scholarship: NewScholarship) -> Result<Uuid, sqlx::Error>;
}
