use arrayvec::ArrayVec;
use smol_str::SmolStr;
use thiserror::Error;

use crate::types::HostRef;

/// Longest payload snippet embedded in an error message. Keeps messages
/// readable in logs even when the offending payload is tens of kilobytes.
pub const MESSAGE_SNIPPET_LEN: usize = 160;

/// Truncate `s` to at most `max` bytes on a char boundary, appending "..."
/// when anything was cut.
pub(crate) fn snippet(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// Render bytes as lowercase space-separated hex ("c3 28").
pub(crate) fn hex_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{:02x}", b));
    }
    out
}

// ─── Configuration-time errors ──────────────────────────────────────────────

/// Fatal errors raised while building a FieldSet or binding a HostModel.
/// Meant to abort startup, never to surface at runtime.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("duplicate field `{field}` in packed column `{column}`")]
    DuplicateField { column: SmolStr, field: SmolStr },

    #[error(
        "cannot delegate field `{field}` of packed column `{column}`: \
         host type `{host_type}` already has a member named `{member}`"
    )]
    DelegationConflict {
        host_type: SmolStr,
        column: SmolStr,
        field: SmolStr,
        member: SmolStr,
    },
}

// ─── Forensic diagnostics ───────────────────────────────────────────────────

/// One contiguous run of payload bytes, either entirely valid text or one
/// rejected byte sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadRun {
    pub valid: bool,
    pub bytes: Vec<u8>,
}

impl PayloadRun {
    /// The run as text. Lossy for invalid runs.
    pub fn as_text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Everything known about a payload that failed text-encoding validation.
///
/// `runs` covers the full payload: concatenating all run bytes reproduces
/// `raw` exactly, with `valid` flagging which stretches parsed as UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingDiagnostics {
    pub host: HostRef,
    pub column_name: SmolStr,
    pub raw: Vec<u8>,
    /// Zero-based byte offset of the first rejected sequence.
    pub first_bad_position: usize,
    /// Distinct rejected byte sequences, in order of first appearance.
    /// A UTF-8 sequence is at most 4 bytes long.
    pub invalid_sequences: Vec<ArrayVec<u8, 4>>,
    pub runs: Vec<PayloadRun>,
}

impl EncodingDiagnostics {
    /// Hex form of every distinct rejected sequence.
    pub fn invalid_sequences_hex(&self) -> Vec<String> {
        self.invalid_sequences
            .iter()
            .map(|seq| hex_bytes(seq))
            .collect()
    }

    pub fn message(&self) -> String {
        let seqs = self.invalid_sequences_hex().join(", ");
        format!(
            "stored text for {} column `{}` is not valid UTF-8: \
             first invalid sequence at byte position {}, rejected sequences [{}]; raw: \"{}\"",
            self.host,
            self.column_name,
            self.first_bad_position,
            seqs,
            snippet(&String::from_utf8_lossy(&self.raw), MESSAGE_SNIPPET_LEN),
        )
    }
}

/// Details of a payload that was valid text but not a parseable field object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnparseableDiagnostics {
    pub host: HostRef,
    pub column_name: SmolStr,
    pub raw: String,
    /// Description of the underlying parser failure.
    pub parser_error: String,
}

impl UnparseableDiagnostics {
    pub fn message(&self) -> String {
        format!(
            "unparseable payload for {} column `{}`: {}; raw: \"{}\"",
            self.host,
            self.column_name,
            snippet(&self.parser_error, MESSAGE_SNIPPET_LEN),
            snippet(&self.raw, MESSAGE_SNIPPET_LEN),
        )
    }
}

/// Details of an encoded payload that exceeded the column's byte limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OversizeDiagnostics {
    pub host: HostRef,
    pub column_name: SmolStr,
    /// The full encoded payload that was rejected.
    pub encoded: String,
    pub limit: usize,
    pub actual: usize,
}

impl OversizeDiagnostics {
    pub fn message(&self) -> String {
        format!(
            "encoded payload for {} column `{}` is {} bytes, which exceeds \
             the column limit of {}; payload starts with: \"{}\"",
            self.host,
            self.column_name,
            self.actual,
            self.limit,
            snippet(&self.encoded, MESSAGE_SNIPPET_LEN),
        )
    }
}

// ─── Runtime errors ─────────────────────────────────────────────────────────

/// Runtime failures of the packed-column engine. Decode and encode errors are
/// reported to the caller, never retried and never auto-repaired: malformed
/// stored data does not self-heal.
#[derive(Debug, Error)]
pub enum ColumnError {
    #[error("{}", .0.message())]
    IncorrectlyEncodedPayload(Box<EncodingDiagnostics>),

    #[error("{}", .0.message())]
    UnparseablePayload(Box<UnparseableDiagnostics>),

    #[error("{}", .0.message())]
    PayloadTooLong(Box<OversizeDiagnostics>),

    #[error("no field named `{field}` in packed column `{column}`")]
    UnknownField { column: SmolStr, field: SmolStr },

    #[error("no such member `{member}` on host type `{host_type}`")]
    UnknownMember { host_type: SmolStr, member: SmolStr },

    #[error("field `{field}` in packed column `{column}` expects {expected}, got {actual}: {detail}")]
    IncompatibleValue {
        column: SmolStr,
        field: SmolStr,
        expected: &'static str,
        actual: &'static str,
        detail: String,
    },
}

impl ColumnError {
    /// The raw payload the error came from, when the category carries one.
    pub fn raw_payload(&self) -> Option<&[u8]> {
        match self {
            ColumnError::IncorrectlyEncodedPayload(d) => Some(&d.raw),
            ColumnError::UnparseablePayload(d) => Some(d.raw.as_bytes()),
            ColumnError::PayloadTooLong(d) => Some(d.encoded.as_bytes()),
            _ => None,
        }
    }

    /// Identity of the host record the error came from, when known.
    pub fn host(&self) -> Option<&HostRef> {
        match self {
            ColumnError::IncorrectlyEncodedPayload(d) => Some(&d.host),
            ColumnError::UnparseablePayload(d) => Some(&d.host),
            ColumnError::PayloadTooLong(d) => Some(&d.host),
            _ => None,
        }
    }
}
