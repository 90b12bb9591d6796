use smol_str::SmolStr;

use crate::error::{ColumnError, OversizeDiagnostics};
use crate::field_value::FieldMap;
use crate::types::HostRef;

// ─── Encode ─────────────────────────────────────────────────────────────────

/// Encode a field mapping into the canonical payload text: one JSON object,
/// keys in sorted order (FieldMap is a BTreeMap), no extra framing.
///
/// Lossless for every supported value kind; equal mappings always produce
/// byte-identical text.
pub fn encode(fields: &FieldMap) -> String {
    let map: serde_json::Map<String, serde_json::Value> = fields
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::from(v.clone())))
        .collect();
    serde_json::Value::Object(map).to_string()
}

/// Encode and enforce the column's byte limit. The limit check runs here,
/// before the text can ever reach a persistence collaborator.
pub fn encode_checked(
    fields: &FieldMap,
    byte_limit: Option<usize>,
    host: &HostRef,
    column_name: &SmolStr,
) -> Result<String, ColumnError> {
    let text = encode(fields);
    if let Some(limit) = byte_limit {
        if text.len() > limit {
            return Err(ColumnError::PayloadTooLong(Box::new(OversizeDiagnostics {
                host: host.clone(),
                column_name: column_name.clone(),
                actual: text.len(),
                limit,
                encoded: text,
            })));
        }
    }
    Ok(text)
}
