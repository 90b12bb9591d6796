use rustc_hash::FxHasher;
use smol_str::SmolStr;
use std::hash::BuildHasherDefault;

pub type FastMap<K, V> = std::collections::HashMap<K, V, BuildHasherDefault<FxHasher>>;

/// Key of a persisted row — the host record's identity in storage.
pub type RowKey = SmolStr;

// ─── HostRef ────────────────────────────────────────────────────────────────

/// Identity of the record owning a packed column.
///
/// A lookup relation only: the store never keeps the host alive and never
/// assumes the host outlives it. Carried into events and error messages so a
/// failure names the row it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRef {
    pub type_name: SmolStr,
    /// `None` until the record has been persisted.
    pub id: Option<RowKey>,
}

impl HostRef {
    pub fn new(type_name: impl Into<SmolStr>) -> Self {
        Self {
            type_name: type_name.into(),
            id: None,
        }
    }

    pub fn with_id(type_name: impl Into<SmolStr>, id: impl Into<RowKey>) -> Self {
        Self {
            type_name: type_name.into(),
            id: Some(id.into()),
        }
    }
}

impl std::fmt::Display for HostRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{} id {}", self.type_name, id),
            None => write!(f, "{} (unsaved)", self.type_name),
        }
    }
}

// ─── LoadState ──────────────────────────────────────────────────────────────

/// Explicit decode state of a ContentsStore. Every accessor checks this
/// instead of inferring state from an empty field map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Raw bytes are cached but have not been decoded.
    NotLoaded,
    /// Field values are live; raw bytes (if any) describe the last known
    /// on-disk payload.
    Loaded,
}
