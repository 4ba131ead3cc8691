//! In-memory `AdvisorStore` for pipeline and router tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::catalog::CatalogEntry;
use crate::models::transcript::TranscriptRow;
use crate::store::{AdvisorStore, NewRecommendation, NewScholarship};

#[derive(Default)]
pub struct MemoryStore {
    pub transcripts: Mutex<Vec<TranscriptRow>>,
    pub courses: Mutex<Vec<CatalogEntry>>,
    pub recommendations: Mutex<Vec<NewRecommendation>>,
    pub scholarships: Mutex<Vec<NewScholarship>>,
    /// When set, every save fails with a database error.
    pub fail_writes: bool,
    /// Only the scholarship with this title fails to save.
    pub fail_scholarship_title: Option<String>,
}

impl MemoryStore {
    pub fn with_transcript(user_id: Uuid, text: Option<&str>) -> Self {
        let store = Self::default();
        store.add_transcript(user_id, text);
        store
    }

    pub fn add_transcript(&self, user_id: Uuid, text: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        self.transcripts.lock().unwrap().push(TranscriptRow {
            id,
            user_id,
            filename: "transcript.pdf".to_string(),
            text_extracted: text.map(String::from),
            created_at: Utc::now(),
        });
        id
    }

    pub fn add_course(&self, code: &str, name: &str, link: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        self.courses.lock().unwrap().push(CatalogEntry {
            id,
            code: code.to_string(),
            name: name.to_string(),
            description: Some(format!("Learning outcomes of {name}")),
            link: link.map(String::from),
        });
        id
    }

    pub fn saved_recommendations(&self) -> usize {
        self.recommendations.lock().unwrap().len()
    }

    pub fn saved_scholarship_titles(&self) -> Vec<String> {
        self.scholarships
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.title.clone())
            .collect()
    }
}

#[async_trait]
impl AdvisorStore for MemoryStore {
    async fn latest_transcript(&self, user_id: Uuid) -> Result<Option<TranscriptRow>, sqlx::Error> {
        Ok(self
            .transcripts
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.user_id == user_id)
            .max_by_key(|t| t.created_at)
            .cloned())
    }

    async fn list_courses(&self, limit: i64) -> Result<Vec<CatalogEntry>, sqlx::Error> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self.courses.lock().unwrap().iter().take(limit).cloned().collect())
    }

    async fn save_recommendation(&self, rec: NewRecommendation) -> Result<Uuid, sqlx::Error> {
        if self.fail_writes {
            return Err(sqlx::Error::PoolTimedOut);
        }
        self.recommendations.lock().unwrap().push(rec);
        Ok(Uuid::new_v4())
    }

    async fn save_scholarship(&self, scholarship: NewScholarship) -> Result<Uuid, sqlx::Error> {
        if self.fail_writes || self.fail_scholarship_title.as_deref() == Some(scholarship.title.as_str()) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        self.scholarships.lock().unwrap().push(scholarship);
        Ok(Uuid::new_v4())
    }
}
