//! Recommendation pipelines.
//!
//! Courses:      transcript → catalog snapshot → prompt → structured completion
//!               → normalize → attach catalog links → rank/classify → persist → respond.
//! Scholarships: transcript → prompt → structured completion → normalize → rank
//!               → persist top rows → respond.
//!
//! A model reply with no usable records degrades to an empty result, never an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::LlmClient;
use crate::recommendation::catalog_matcher::attach_links;
use crate::recommendation::normalizer::recover;
use crate::recommendation::prompt_builder::{
    build_recommendation_messages, build_scholarship_messages,
};
use crate::recommendation::ranking::{rank, rank_and_classify};
use crate::recommendation::record::{RecommendationKind, RecommendationRecord};
use crate::store::{AdvisorStore, NewRecommendation, NewScholarship};

/// How many of the ranked scholarships are written back to the store.
pub const PERSISTED_SCHOLARSHIPS: usize = 5;

// ────────────────────────────────────────────────────────────────────────────
// Request / response models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRecommendationsRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub preferences: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateScholarshipsRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationResponse {
    pub user_id: Uuid,
    /// `None` when the payload could not be persisted or there was nothing to persist.
    pub recommendation_id: Option<Uuid>,
    pub courses: Vec<RecommendationRecord>,
    pub scholarships: Vec<RecommendationRecord>,
    pub analyzed_at: DateTime<Utc>,
    /// Model id that produced the records.
    pub source: String,
    pub transcript_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScholarshipResponse {
    pub user_id: Uuid,
    pub scholarships: Vec<RecommendationRecord>,
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub transcript_id: Uuid,
}

// ────────────────────────────────────────────────────────────────────────────
// Pipelines
// ────────────────────────────────────────────────────────────────────────────

pub async fn generate_recommendations(
    store: &dyn AdvisorStore,
    llm: &LlmClient,
    catalog_limit: i64,
    request: GenerateRecommendationsRequest,
) -> Result<RecommendationResponse, AppError> {
    let (transcript_id, transcript) = load_transcript_text(store, request.user_id).await?;

    let catalog = store.list_courses(catalog_limit).await?;
    if catalog.is_empty() {
        return Err(AppError::CatalogEmpty);
    }
    info!(
        "Generating recommendations for user {} against {} catalog entries",
        request.user_id,
        catalog.len()
    );

    let messages =
        build_recommendation_messages(&transcript, &catalog, request.preferences.as_deref());
    let model_request = llm.structured_request(messages);
    let raw = llm.complete(&model_request).await?;

    let mut records = extract_records(&raw, request.user_id);
    let summary = attach_links(&mut records, &catalog);
    info!(
        by_code = summary.by_code,
        by_title = summary.by_title,
        unmatched = summary.unmatched,
        "Catalog matching complete"
    );

    let classified = rank_and_classify(records);
    info!(
        "Ranked {} courses and {} scholarships for user {}",
        classified.courses.len(),
        classified.scholarships.len(),
        request.user_id
    );

    let recommendation_id = if classified.courses.is_empty() && classified.scholarships.is_empty() {
        None
    } else {
        let payload = json!({
            "courses": classified.courses,
            "scholarships": classified.scholarships,
        });
        let saved = store
            .save_recommendation(NewRecommendation {
                user_id: request.user_id,
                transcript_id,
                source: model_request.model.clone(),
                payload,
            })
            .await;
        match saved {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Failed to persist recommendations for user {}: {e}", request.user_id);
                None
            }
        }
    };

    Ok(RecommendationResponse {
        user_id: request.user_id,
        recommendation_id,
        courses: classified.courses,
        scholarships: classified.scholarships,
        analyzed_at: Utc::now(),
        source: model_request.model,
        transcript_id,
    })
}

pub async fn generate_scholarships(
    store: &dyn AdvisorStore,
    llm: &LlmClient,
    request: GenerateScholarshipsRequest,
) -> Result<ScholarshipResponse, AppError> {
    let (transcript_id, transcript) = load_transcript_text(store, request.user_id).await?;

    let model_request = llm.structured_request(build_scholarship_messages(&transcript));
    let raw = llm.complete(&model_request).await?;

    let mut scholarships = extract_records(&raw, request.user_id);
    rank(&mut scholarships);
    for record in scholarships.iter_mut() {
        record.kind = RecommendationKind::Scholarship;
    }

    let mut saved = 0;
    for record in scholarships.iter().take(PERSISTED_SCHOLARSHIPS) {
        let row = NewScholarship {
            user_id: request.user_id,
            title: record.title.clone(),
            description: Some(record.description.clone()).filter(|d| !d.is_empty()),
            match_score: Some(record.match_score).filter(|m| *m > 0.0),
            link: record.link.clone(),
        };
        match store.save_scholarship(row).await {
            Ok(_) => saved += 1,
            Err(e) => warn!("Failed to save scholarship '{}': {e}", record.title),
        }
    }
    info!(
        "Generated {} scholarships for user {} ({} persisted)",
        scholarships.len(),
        request.user_id,
        saved
    );

    Ok(ScholarshipResponse {
        user_id: request.user_id,
        scholarships,
        generated_at: Utc::now(),
        source: model_request.model,
        transcript_id,
    })
}

/// Latest transcript id and its trimmed extracted text.
async fn load_transcript_text(
    store: &dyn AdvisorStore,
    user_id: Uuid,
) -> Result<(Uuid, String), AppError> {
    let transcript = store
        .latest_transcript(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No transcript found for user {user_id}")))?;

    let text = transcript
        .text_extracted
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    if text.is_empty() {
        return Err(AppError::Validation(
            "Transcript has no extracted text".to_string(),
        ));
    }

    Ok((transcript.id, text.to_string()))
}

/// Runs the normalizer and logs which strategy, if any, recovered the records.
fn extract_records(raw: &str, user_id: Uuid) -> Vec<RecommendationRecord> {
    let recovered = recover(raw);
    match recovered.strategy() {
        Some(strategy) => {
            let records = recovered.into_records();
            info!(
                strategy = strategy.as_str(),
                records = records.len(),
                "Recovered records from model output"
            );
            records
        }
        None => {
            warn!(
                "{} (user {user_id}); returning an empty result",
                AppError::NoExtractableRecords
            );
            Vec::new()
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedBackend;
    use crate::llm_client::{LlmError, Role};
    use crate::store::memory::MemoryStore;

    const CATALOG_LIMIT: i64 = 100;

    fn seeded_store(user_id: Uuid) -> MemoryStore {
        let store = MemoryStore::with_transcript(user_id, Some("BSc Computer Science, ML focus"));
        store.add_course("TIES4911", "Deep Learning", Some("L1"));
        store.add_course("TIEA3456", "Cloud Computing", Some("L2"));
        store
    }

    fn request(user_id: Uuid) -> GenerateRecommendationsRequest {
        GenerateRecommendationsRequest {
            user_id,
            preferences: Some("AI".to_string()),
        }
    }

    #[tokio::test]
    async fn test_recommendations_end_to_end() {
        let user_id = Uuid::new_v4();
        let store = seeded_store(user_id);
        let reply = r#"{"recommendations":[
            {"title":"Cloud Computing TIEA3456","match":60},
            {"title":"Deep Learning","code":"TIES4911","match":90},
            {"title":"Nordic Master Scholarship","match":75},
            {"title":"   ","match":99}
        ]}"#;
        let (llm, backend) = ScriptedBackend::replying(reply).into_client();

        let response = generate_recommendations(&store, &llm, CATALOG_LIMIT, request(user_id))
            .await
            .unwrap();

        let titles: Vec<_> = response.courses.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Deep Learning", "Cloud Computing TIEA3456"]);
        assert_eq!(response.courses[0].link.as_deref(), Some("L1"));
        assert_eq!(response.courses[1].code.as_deref(), Some("TIEA3456"));
        assert_eq!(response.courses[1].link.as_deref(), Some("L2"));
        assert_eq!(response.scholarships.len(), 1);
        assert_eq!(response.scholarships[0].kind, RecommendationKind::Scholarship);
        assert_eq!(response.source, "scripted-model");
        assert!(response.recommendation_id.is_some());
        assert_eq!(store.saved_recommendations(), 1);

        let sent = backend.last_request().unwrap();
        assert!(sent.force_json);
        assert_eq!(sent.messages[0].role, Role::System);
        assert!(sent.messages[1].content.contains("TIES4911 | Deep Learning"));
    }

    #[tokio::test]
    async fn test_catalog_link_scenario() {
        let user_id = Uuid::new_v4();
        let store = MemoryStore::with_transcript(user_id, Some("transcript"));
        store.add_course("TIES4911", "Deep Learning", Some("L1"));
        let (llm, _) =
            ScriptedBackend::replying(r#"[{"title":"Deep Learning","code":"TIES4911","match":90}]"#)
                .into_client();

        let response = generate_recommendations(&store, &llm, CATALOG_LIMIT, request(user_id))
            .await
            .unwrap();
        assert_eq!(response.courses[0].link.as_deref(), Some("L1"));
    }

    #[tokio::test]
    async fn test_model_invented_link_is_dropped_for_unknown_course() {
        let user_id = Uuid::new_v4();
        let store = seeded_store(user_id);
        let (llm, _) = ScriptedBackend::replying(
            r#"[{"title":"Philosophy of Mind","link":"http://hallucinated.example","match":50}]"#,
        )
        .into_client();

        let response = generate_recommendations(&store, &llm, CATALOG_LIMIT, request(user_id))
            .await
            .unwrap();
        assert_eq!(response.courses.len(), 1);
        assert!(response.courses[0].link.is_none());
        assert!(response.courses[0].code.is_none());
    }

    #[tokio::test]
    async fn test_empty_model_output_returns_empty_result() {
        let user_id = Uuid::new_v4();
        let store = seeded_store(user_id);
        let (llm, _) = ScriptedBackend::replying("").into_client();

        let response = generate_recommendations(&store, &llm, CATALOG_LIMIT, request(user_id))
            .await
            .unwrap();
        assert!(response.courses.is_empty());
        assert!(response.scholarships.is_empty());
        assert!(response.recommendation_id.is_none());
        assert_eq!(store.saved_recommendations(), 0);
    }

    #[tokio::test]
    async fn test_empty_catalog_is_an_error() {
        let user_id = Uuid::new_v4();
        let store = MemoryStore::with_transcript(user_id, Some("transcript"));
        let (llm, backend) = ScriptedBackend::replying("[]").into_client();

        let err = generate_recommendations(&store, &llm, CATALOG_LIMIT, request(user_id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CatalogEmpty));
        assert!(backend.last_request().is_none());
    }

    #[tokio::test]
    async fn test_missing_transcript_is_not_found() {
        let store = MemoryStore::default();
        let (llm, _) = ScriptedBackend::replying("[]").into_client();
        let err = generate_recommendations(&store, &llm, CATALOG_LIMIT, request(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_blank_transcript_text_is_rejected() {
        let user_id = Uuid::new_v4();
        let store = MemoryStore::with_transcript(user_id, Some("   \n"));
        store.add_course("C1", "Course", None);
        let (llm, _) = ScriptedBackend::replying("[]").into_client();

        let err = generate_recommendations(&store, &llm, CATALOG_LIMIT, request(user_id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_model_failure_surfaces_as_llm_error() {
        let user_id = Uuid::new_v4();
        let store = seeded_store(user_id);
        let (llm, _) = ScriptedBackend::failing(LlmError::BackendError {
            status: 500,
            body: "boom".into(),
        })
        .into_client();

        let err = generate_recommendations(&store, &llm, CATALOG_LIMIT, request(user_id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Llm(LlmError::BackendError { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_persistence_failure_still_returns_records() {
        let user_id = Uuid::new_v4();
        let mut store = seeded_store(user_id);
        store.fail_writes = true;
        let (llm, _) = ScriptedBackend::replying(r#"[{"title":"Deep Learning","match":90}]"#)
            .into_client();

        let response = generate_recommendations(&store, &llm, CATALOG_LIMIT, request(user_id))
            .await
            .unwrap();
        assert_eq!(response.courses.len(), 1);
        assert!(response.recommendation_id.is_none());
    }

    #[tokio::test]
    async fn test_catalog_limit_bounds_prompt() {
        let user_id = Uuid::new_v4();
        let store = seeded_store(user_id);
        let (llm, backend) = ScriptedBackend::replying("[]").into_client();

        generate_recommendations(&store, &llm, 1, request(user_id))
            .await
            .unwrap();
        let prompt = &backend.last_request().unwrap().messages[1].content;
        assert!(prompt.contains("TIES4911"));
        assert!(!prompt.contains("TIEA3456"));
    }

    #[tokio::test]
    async fn test_scholarships_ranked_typed_and_top_five_persisted() {
        let user_id = Uuid::new_v4();
        let store = MemoryStore::with_transcript(user_id, Some("MSc Physics"));
        let items: Vec<String> = (1..=7)
            .map(|i| format!(r#"{{"title":"Grant {i}","match":{},"link":" https://x/{i} "}}"#, i * 10))
            .collect();
        let reply = format!(r#"{{"scholarships":[{}]}}"#, items.join(","));
        let (llm, _) = ScriptedBackend::replying(reply).into_client();

        let response = generate_scholarships(&store, &llm, GenerateScholarshipsRequest { user_id })
            .await
            .unwrap();

        assert_eq!(response.scholarships.len(), 7);
        assert_eq!(response.scholarships[0].title, "Grant 7");
        assert_eq!(response.scholarships[0].link.as_deref(), Some("https://x/7"));
        assert!(response
            .scholarships
            .iter()
            .all(|r| r.kind == RecommendationKind::Scholarship));
        assert_eq!(
            store.saved_scholarship_titles(),
            vec!["Grant 7", "Grant 6", "Grant 5", "Grant 4", "Grant 3"]
        );
    }

    #[tokio::test]
    async fn test_scholarship_save_failure_is_per_row() {
        let user_id = Uuid::new_v4();
        let mut store = MemoryStore::with_transcript(user_id, Some("MSc Physics"));
        store.fail_scholarship_title = Some("Bad".to_string());
        let (llm, _) = ScriptedBackend::replying(
            r#"[{"title":"Good","match":80},{"title":"Bad","match":70},{"title":"Fine","match":0}]"#,
        )
        .into_client();

        let response = generate_scholarships(&store, &llm, GenerateScholarshipsRequest { user_id })
            .await
            .unwrap();
        assert_eq!(response.scholarships.len(), 3);
        assert_eq!(store.saved_scholarship_titles(), vec!["Good", "Fine"]);
        let fine = store.scholarships.lock().unwrap()[1].clone();
        assert!(fine.match_score.is_none());
        assert!(fine.description.is_none());
    }
}
