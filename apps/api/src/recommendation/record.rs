//! The recommendation record produced from model output.
//!
//! Every field has a default, a few accept alternate names, and scores may
//! arrive as numeric strings.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    #[default]
    Course,
    Scholarship,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    #[serde(rename = "type", default, deserialize_with = "lenient_kind")]
    pub kind: RecommendationKind,
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, alias = "rationale", deserialize_with = "lenient_text")]
    pub description: String,
    /// 0–100, clamped on the way in.
    #[serde(rename = "match", default, deserialize_with = "lenient_score")]
    pub match_score: f64,
    #[serde(
        default,
        alias = "course_code",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_optional_text"
    )]
    pub code: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_optional_text"
    )]
    pub link: Option<String>,
    /// Catalog row id. Only ever set by catalog matching, never read from model output.
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<Uuid>,
}

impl RecommendationRecord {
    pub fn new(title: impl Into<String>, match_score: f64) -> Self {
        Self {
            kind: RecommendationKind::Course,
            title: title.into(),
            description: String::new(),
            match_score: clamp_score(match_score),
            code: None,
            link: None,
            course_id: None,
        }
    }

    /// Trims every text field and drops blank optionals.
    /// Returns `None` when the title is empty after trimming.
    pub fn normalized(mut self) -> Option<Self> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return None;
        }
        self.description = self.description.trim().to_string();
        self.code = trim_optional(self.code);
        self.link = trim_optional(self.link);
        Some(self)
    }
}

fn trim_optional(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn lenient_kind<'de, D: Deserializer<'de>>(d: D) -> Result<RecommendationKind, D::Error> {
    let raw = Option::<Value>::deserialize(d)?;
    Ok(match raw {
        Some(Value::String(s)) if s.trim().to_lowercase().starts_with("scholarship") => {
            RecommendationKind::Scholarship
        }
        _ => RecommendationKind::Course,
    })
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

fn lenient_optional_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Option::<String>::deserialize(d)
}

fn lenient_score<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let raw = Option::<Value>::deserialize(d)?;
    let score = match raw {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(clamp_score(score))
}
