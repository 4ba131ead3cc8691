//! Ranking and lexical classification of recommendation records.

use std::cmp::Ordering;

use serde::Serialize;

use crate::recommendation::record::{RecommendationKind, RecommendationRecord};

const SCHOLARSHIP_MARKER: &str = "scholarship";

/// Records split by kind, each list in rank order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Classified {
    pub courses: Vec<RecommendationRecord>,
    pub scholarships: Vec<RecommendationRecord>,
}

/// Sorts by match score, highest first.
///
/// `sort_by` is stable, so records with equal scores keep the order the model
/// returned them in.
pub fn rank(records: &mut [RecommendationRecord]) {
    records.sort_by(|a, b| {
        b.match_score
            .partial_cmp(&a.match_score)
            .unwrap_or(Ordering::Equal)
    });
}

/// Lexical rule: a title mentioning "scholarship" is a scholarship, everything else a course.
pub fn classify(record: &RecommendationRecord) -> RecommendationKind {
    if record.title.to_lowercase().contains(SCHOLARSHIP_MARKER) {
        RecommendationKind::Scholarship
    } else {
        RecommendationKind::Course
    }
}

/// Ranks, retypes and partitions the records.
pub fn rank_and_classify(mut records: Vec<RecommendationRecord>) -> Classified {
    rank(&mut records);

    let mut classified = Classified::default();
    for mut record in records {
        record.kind = classify(&record);
        match record.kind {
            RecommendationKind::Scholarship => classified.scholarships.push(record),
            RecommendationKind::Course => classified.courses.push(record),
        }
    }
    classified
}
