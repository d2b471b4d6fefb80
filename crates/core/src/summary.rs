//! Run summaries built from a workflow's configured `information` fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rules::resolve_path;
use crate::types::FormData;

/// One configured summary column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InformationField {
    pub label: String,
    pub field_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryEntry {
    pub label: String,
    pub value: Value,
}

/// Parse the stored `information` column; anything but a list of
/// `{label, fieldKey}` objects yields no fields.
pub fn parse_information(raw: &Value) -> Vec<InformationField> {
    serde_json::from_value(raw.clone()).unwrap_or_default()
}

/// Look up every field in the merged run data; missing paths map to null.
pub fn summarize(fields: &[InformationField], data: &FormData) -> Vec<SummaryEntry> {
    let root = Value::Object(data.clone());
    fields
        .iter()
        .map(|field| SummaryEntry {
            label: field.label.clone(),
            value: resolve_path(&root, &field.field_key)
                .cloned()
                .unwrap_or(Value::Null),
        })
        .collect()
}
