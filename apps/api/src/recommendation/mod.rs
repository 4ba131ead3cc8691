// Transcript-driven course and scholarship recommendations.
// Model output is untrusted: normalizer → catalog_matcher → ranking turn it into records.
// All LLM calls go through llm_client.

pub mod catalog_matcher;
pub mod generator;
pub mod handlers;
pub mod normalizer;
pub mod prompt_builder;
pub mod prompts;
pub mod ranking;
pub mod record;
