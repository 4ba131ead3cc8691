use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TranscriptRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub filename: String,
    /// Text pulled out of the uploaded document; `None` until extraction has run.
    pub text_extracted: Option<String>,
    pub created_at: DateTime<Utc>,
}
