//! Builds the system/user message pairs for the recommendation pipelines.
//! Pure string assembly; nothing here touches the network or the store.

use crate::llm_client::prompts::{JSON_ONLY_INSTRUCTION, MATCH_SCORE_RULE};
use crate::llm_client::ChatMessage;
use crate::models::catalog::CatalogEntry;
use crate::recommendation::prompts::{
    NO_PREFERENCES, RECOMMENDATION_PROMPT_TEMPLATE, RECOMMENDATION_SYSTEM_TEMPLATE,
    SCHOLARSHIP_PROMPT_TEMPLATE, SCHOLARSHIP_SYSTEM_TEMPLATE,
};

/// Catalog descriptions are cut to this many characters in the prompt.
pub const CATALOG_DESCRIPTION_CHARS: usize = 150;

pub fn build_recommendation_messages(
    transcript: &str,
    catalog: &[CatalogEntry],
    preferences: Option<&str>,
) -> Vec<ChatMessage> {
    let system = fill_template(
        RECOMMENDATION_SYSTEM_TEMPLATE,
        &[("match_rule", MATCH_SCORE_RULE), ("json_only", JSON_ONLY_INSTRUCTION)],
    );

    let preferences = preferences
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(NO_PREFERENCES);

    let listing = catalog_listing(catalog);
    let user = fill_template(
        RECOMMENDATION_PROMPT_TEMPLATE,
        &[
            ("catalog", listing.as_str()),
            ("preferences", preferences),
            ("transcript", transcript.trim()),
        ],
    );

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

pub fn build_scholarship_messages(transcript: &str) -> Vec<ChatMessage> {
    let system = fill_template(
        SCHOLARSHIP_SYSTEM_TEMPLATE,
        &[("match_rule", MATCH_SCORE_RULE), ("json_only", JSON_ONLY_INSTRUCTION)],
    );
    let user = fill_template(SCHOLARSHIP_PROMPT_TEMPLATE, &[("transcript", transcript.trim())]);

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Substitutes `{name}` placeholders in one pass over `template`.
/// Inserted values are never rescanned, and unknown placeholders are left as written.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// One line per entry: `- CODE | Name: description`.
fn catalog_listing(catalog: &[CatalogEntry]) -> String {
    catalog
        .iter()
        .map(|entry| {
            let description = entry
                .description
                .as_deref()
                .map(|d| truncate_chars(&collapse_whitespace(d), CATALOG_DESCRIPTION_CHARS))
                .unwrap_or_default();
            let line = format!("- {} | {}", entry.code.trim(), entry.name.trim());
            if description.is_empty() {
                line
            } else {
                format!("{line}: {description}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Newlines in catalog text would break the one-entry-per-line listing.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", text[..byte_idx].trim_end()),
        None => text.to_string(),
    }
}
