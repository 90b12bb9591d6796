use arrayvec::ArrayVec;
use smol_str::SmolStr;

use crate::error::{ColumnError, EncodingDiagnostics, PayloadRun, UnparseableDiagnostics};
use crate::field_value::{FieldMap, FieldValue};
use crate::types::HostRef;

// ─── Encoding scan ──────────────────────────────────────────────────────────

/// Outcome of a failed UTF-8 scan, before host/column context is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingScan {
    pub first_bad_position: usize,
    pub invalid_sequences: Vec<ArrayVec<u8, 4>>,
    pub runs: Vec<PayloadRun>,
}

/// Validate `raw` as UTF-8.
///
/// On failure the whole payload is scanned, not just the prefix: every
/// rejected sequence is collected (deduplicated, in order of first
/// appearance) and the payload is split into alternating valid/invalid runs
/// whose concatenation reproduces `raw` exactly.
pub fn scan_encoding(raw: &[u8]) -> Result<&str, EncodingScan> {
    if let Ok(text) = std::str::from_utf8(raw) {
        return Ok(text);
    }

    let mut runs: Vec<PayloadRun> = Vec::new();
    let mut invalid_sequences: Vec<ArrayVec<u8, 4>> = Vec::new();
    let mut first_bad_position = None;
    let mut offset = 0;

    while offset < raw.len() {
        match std::str::from_utf8(&raw[offset..]) {
            Ok(_) => {
                runs.push(PayloadRun {
                    valid: true,
                    bytes: raw[offset..].to_vec(),
                });
                break;
            }
            Err(e) => {
                let valid_len = e.valid_up_to();
                if valid_len > 0 {
                    runs.push(PayloadRun {
                        valid: true,
                        bytes: raw[offset..offset + valid_len].to_vec(),
                    });
                }
                // error_len is None only for a truncated sequence at the end
                let bad_len = e.error_len().unwrap_or(raw.len() - offset - valid_len);
                let bad_start = offset + valid_len;
                let bad = &raw[bad_start..bad_start + bad_len];

                first_bad_position.get_or_insert(bad_start);

                let mut seq: ArrayVec<u8, 4> = ArrayVec::new();
                for b in bad.iter().take(4) {
                    seq.push(*b);
                }
                if !invalid_sequences.contains(&seq) {
                    invalid_sequences.push(seq);
                }
                runs.push(PayloadRun {
                    valid: false,
                    bytes: bad.to_vec(),
                });
                offset = bad_start + bad_len;
            }
        }
    }

    Err(EncodingScan {
        // from_utf8 failed above, so at least one run is invalid
        first_bad_position: first_bad_position.unwrap_or(0),
        invalid_sequences,
        runs,
    })
}

// ─── Parse ──────────────────────────────────────────────────────────────────

/// Parse validated payload text into a field mapping.
///
/// Blank text decodes to an empty mapping (an empty or NULL storage column
/// means "no fields yet", not corruption). Anything else must parse as a
/// JSON object; keys the schema does not know are preserved so they survive
/// the next encode untouched.
pub fn parse_fields(
    text: &str,
    host: &HostRef,
    column_name: &SmolStr,
) -> Result<FieldMap, ColumnError> {
    if text.trim().is_empty() {
        return Ok(FieldMap::new());
    }

    let unparseable = |parser_error: String| {
        ColumnError::UnparseablePayload(Box::new(UnparseableDiagnostics {
            host: host.clone(),
            column_name: column_name.clone(),
            raw: text.to_string(),
            parser_error,
        }))
    };

    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Object(obj)) => Ok(obj
            .into_iter()
            .map(|(k, v)| (SmolStr::from(k), FieldValue::from(v)))
            .collect()),
        Ok(other) => Err(unparseable(format!(
            "top-level value must be an object of field/value pairs, got {}",
            FieldValue::from(other).kind_label()
        ))),
        Err(e) => Err(unparseable(e.to_string())),
    }
}

/// Attach host/column context to a failed scan.
pub(crate) fn encoding_failure(
    raw: &[u8],
    scan: EncodingScan,
    host: &HostRef,
    column_name: &SmolStr,
) -> ColumnError {
    ColumnError::IncorrectlyEncodedPayload(Box::new(EncodingDiagnostics {
        host: host.clone(),
        column_name: column_name.clone(),
        raw: raw.to_vec(),
        first_bad_position: scan.first_bad_position,
        invalid_sequences: scan.invalid_sequences,
        runs: scan.runs,
    }))
}

/// Full decode pipeline: encoding scan, then structured parse.
pub fn decode(
    raw: &[u8],
    host: &HostRef,
    column_name: &SmolStr,
) -> Result<FieldMap, ColumnError> {
    match scan_encoding(raw) {
        Ok(text) => parse_fields(text, host, column_name),
        Err(scan) => Err(encoding_failure(raw, scan, host, column_name)),
    }
}
