// All LLM prompt constants for the Recommendation module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for course recommendations. Replace `{json_only}` and
/// `{match_rule}` with the shared fragments before sending.
pub const RECOMMENDATION_SYSTEM_TEMPLATE: &str = r#"You are an academic advisor AI.
Given a student's transcript and a catalog of university courses, recommend the most relevant courses and any scholarships the student is likely eligible for.

Return a JSON object with this EXACT schema (no extra fields):
{
  "recommendations": [
    {
      "type": "course",
      "title": "Deep Learning",
      "description": "Why it fits this student, one or two sentences",
      "match": 92.5,
      "code": "TIES4911"
    }
  ]
}

Rules:
- "type" is "course" or "scholarship".
- "title" is never empty.
- {match_rule}
- "code" MUST be copied exactly from the catalog listing. Omit it for scholarships or when unsure.
- Only recommend courses that appear in the catalog listing.

{json_only}"#;

/// User prompt for course recommendations.
/// Replace `{transcript}`, `{catalog}` and `{preferences}` before sending.
pub const RECOMMENDATION_PROMPT_TEMPLATE: &str = r#"The following text is an academic transcript. Analyze the student's background and recommend the most relevant university courses.

Transcript:
"""
{transcript}
"""

Available courses (CODE | Name: description):
{catalog}

Student preferences:
{preferences}"#;

/// Shown in place of preferences when the student gave none.
pub const NO_PREFERENCES: &str = "None stated.";

/// System prompt for scholarship discovery. Replace `{json_only}` and `{match_rule}`.
pub const SCHOLARSHIP_SYSTEM_TEMPLATE: &str = r#"You are EduSphere AI, an assistant that finds scholarships a student could realistically apply for.

Return a JSON object with this EXACT schema (no extra fields):
{
  "scholarships": [
    {
      "title": "Scholarship name",
      "description": "Eligibility and why it fits, one or two sentences",
      "match": 80,
      "link": "https://official.site/scholarship"
    }
  ]
}

Rules:
- "title" is never empty.
- {match_rule}
- "link" is the official page when you know it, otherwise an empty string.

{json_only}"#;

/// User prompt for scholarship discovery. Replace `{transcript}` before sending.
pub const SCHOLARSHIP_PROMPT_TEMPLATE: &str = r#"Based on this academic transcript, list scholarships the student is a strong candidate for.

Transcript:
"""
{transcript}
"""

Return at most 10 scholarships, strongest fit first."#;
