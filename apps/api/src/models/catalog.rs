use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A row of the authoritative course catalog. Read-only to this service.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CatalogEntry {
    pub id: Uuid,
    /// Unique, compared case-insensitively.
    pub code: String,
    pub name: String,
    /// Learning outcomes / course description.
    pub description: Option<String>,
    /// Canonical course page.
    pub link: Option<String>,
}
