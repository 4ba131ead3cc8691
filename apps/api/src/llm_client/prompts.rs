// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting fragments only.

/// Appended to every structured-output system prompt.
pub const JSON_ONLY_INSTRUCTION: &str = "\
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON. \
    Do NOT use markdown code fences or backticks. \
    Do NOT include explanations or apologies.";

/// Schema rule shared by every recommendation-style output.
pub const MATCH_SCORE_RULE: &str =
    "\"match\" is a number from 0 to 100 estimating how well the item fits the student.";
