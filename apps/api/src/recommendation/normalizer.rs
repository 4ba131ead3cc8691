//! Response normalizer: recovers a record list from untrusted model text.
//!
//! Model output may be a bare JSON array, an object wrapping the array under a
//! known key, or prose surrounding an array. Strategies run in a fixed order and
//! the first one yielding at least one usable record wins. Everything here is a
//! pure function of the input text: no I/O, no logging.

use serde_json::{Map, Value};

use crate::recommendation::record::RecommendationRecord;

/// Keys a model may use to wrap the array, tried in this order.
pub const WRAPPER_KEYS: [&str; 3] = ["courses", "recommendations", "scholarships"];

/// Which recovery strategy produced the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    DirectArray,
    WrappedObject,
    EmbeddedSlice,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::DirectArray => "direct_array",
            Strategy::WrappedObject => "wrapped_object",
            Strategy::EmbeddedSlice => "embedded_slice",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecoveredOutput {
    /// The whole text was a JSON array.
    Array(Vec<RecommendationRecord>),
    /// The whole text was an object with the array under `key`.
    WrappedObject {
        key: &'static str,
        records: Vec<RecommendationRecord>,
    },
    /// An array was sliced out of surrounding text.
    Embedded(Vec<RecommendationRecord>),
    Unrecoverable,
}

impl RecoveredOutput {
    pub fn strategy(&self) -> Option<Strategy> {
        match self {
            RecoveredOutput::Array(_) => Some(Strategy::DirectArray),
            RecoveredOutput::WrappedObject { .. } => Some(Strategy::WrappedObject),
            RecoveredOutput::Embedded(_) => Some(Strategy::EmbeddedSlice),
            RecoveredOutput::Unrecoverable => None,
        }
    }

    pub fn into_records(self) -> Vec<RecommendationRecord> {
        match self {
            RecoveredOutput::Array(records)
            | RecoveredOutput::WrappedObject { records, .. }
            | RecoveredOutput::Embedded(records) => records,
            RecoveredOutput::Unrecoverable => Vec::new(),
        }
    }
}

type StrategyFn = fn(&str) -> Option<RecoveredOutput>;

const STRATEGIES: [StrategyFn; 3] = [parse_direct_array, parse_wrapped_object, slice_embedded_array];

/// Runs the strategy chain, stopping at the first non-empty result.
pub fn recover(raw: &str) -> RecoveredOutput {
    STRATEGIES
        .iter()
        .find_map(|strategy| strategy(raw))
        .unwrap_or(RecoveredOutput::Unrecoverable)
}

/// Convenience wrapper: the recovered records, or an empty list.
pub fn normalize(raw: &str) -> Vec<RecommendationRecord> {
    recover(raw).into_records()
}

fn parse_direct_array(raw: &str) -> Option<RecoveredOutput> {
    let items: Vec<Value> = serde_json::from_str(raw).ok()?;
    non_empty(records_from_values(items)).map(RecoveredOutput::Array)
}

fn parse_wrapped_object(raw: &str) -> Option<RecoveredOutput> {
    let mut object: Map<String, Value> = serde_json::from_str(raw).ok()?;
    WRAPPER_KEYS.iter().find_map(|key| match object.remove(*key) {
        Some(Value::Array(items)) => non_empty(records_from_values(items))
            .map(|records| RecoveredOutput::WrappedObject { key: *key, records }),
        _ => None,
    })
}

fn slice_embedded_array(raw: &str) -> Option<RecoveredOutput> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end <= start {
        return None;
    }
    let items: Vec<Value> = serde_json::from_str(&raw[start..=end]).ok()?;
    non_empty(records_from_values(items)).map(RecoveredOutput::Embedded)
}

/// Decodes elements one by one so a single malformed element does not sink the rest.
fn records_from_values(items: Vec<Value>) -> Vec<RecommendationRecord> {
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<RecommendationRecord>(item).ok())
        .filter_map(RecommendationRecord::normalized)
        .collect()
}

fn non_empty(records: Vec<RecommendationRecord>) -> Option<Vec<RecommendationRecord>> {
    (!records.is_empty()).then_some(records)
}
