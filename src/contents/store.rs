use smol_str::SmolStr;
use std::sync::Arc;

use crate::deserialization::{decode, encoding_failure, scan_encoding};
use crate::error::ColumnError;
use crate::events::{ContentsObserver, DeserializeEvent, SerializeEvent};
use crate::field_value::{FieldMap, FieldValue};
use crate::schema::{ColumnSpec, NullPolicy};
use crate::serialization::encode_checked;
use crate::types::{HostRef, LoadState};

// ─── ContentsStore ──────────────────────────────────────────────────────────

/// Live contents of one packed column on one host record instance.
///
/// Holds the decoded field values, the dirty flag, and the last known on-disk
/// payload. Decode runs on the first field access after a load, never
/// earlier; encode runs on `to_text`, never earlier. The store is owned by
/// exactly one host instance and is never persisted itself — only the text it
/// produces is.
pub struct ContentsStore {
    spec: Arc<ColumnSpec>,
    host: HostRef,
    observer: Arc<dyn ContentsObserver>,
    state: LoadState,
    /// Last known on-disk payload. `None` until first load or encode.
    raw: Option<Vec<u8>>,
    fields: FieldMap,
    dirty: bool,
}

impl ContentsStore {
    /// Store for a freshly constructed record with no stored row behind it:
    /// immediately Loaded with an empty mapping, nothing to decode.
    pub fn new(spec: Arc<ColumnSpec>, host: HostRef, observer: Arc<dyn ContentsObserver>) -> Self {
        Self {
            spec,
            host,
            observer,
            state: LoadState::Loaded,
            raw: None,
            fields: FieldMap::new(),
            dirty: false,
        }
    }

    pub fn column_name(&self) -> &SmolStr {
        self.spec.column_name()
    }

    pub fn spec(&self) -> &Arc<ColumnSpec> {
        &self.spec
    }

    pub fn host(&self) -> &HostRef {
        &self.host
    }

    /// The host's identity changed (typically: it gained an id on save).
    pub(crate) fn set_host(&mut self, host: HostRef) {
        self.host = host;
    }

    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The cached on-disk payload, if any. Touching it never decodes.
    pub fn raw_payload(&self) -> Option<&[u8]> {
        self.raw.as_deref()
    }

    // ─── Load / decode ──────────────────────────────────────────────────

    /// Accept the raw stored payload. Decode is deferred until a field is
    /// actually needed.
    pub fn load_from(&mut self, raw: Vec<u8>) {
        self.raw = Some(raw);
        self.state = LoadState::NotLoaded;
        self.fields = FieldMap::new();
        self.dirty = false;
    }

    fn ensure_loaded(&mut self) -> Result<(), ColumnError> {
        if self.state == LoadState::Loaded {
            return Ok(());
        }
        let raw = self.raw.clone().unwrap_or_default();
        self.fields = decode(&raw, &self.host, self.spec.column_name())?;
        self.state = LoadState::Loaded;
        self.observer.deserialized(DeserializeEvent {
            host: self.host.clone(),
            column_name: self.spec.column_name().clone(),
            raw_data: raw,
        });
        Ok(())
    }

    // ─── Field access ───────────────────────────────────────────────────

    /// Read a field, decoding first if necessary. An absent field resolves
    /// through the definition's null policy.
    pub fn get(&mut self, name: &str) -> Result<FieldValue, ColumnError> {
        let def = self.lookup(name)?;
        let null_policy = def.null_policy().clone();
        self.ensure_loaded()?;
        match self.fields.get(name) {
            Some(value) => Ok(value.clone()),
            None => Ok(match null_policy {
                NullPolicy::AllowNull => FieldValue::Null,
                NullPolicy::DefaultTo(default) => default,
            }),
        }
    }

    /// Write a field: decode first (a one-field write still re-encodes the
    /// whole mapping later, so the rest of the payload must be intact),
    /// coerce per the field's declared kind, then mark the store dirty.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<(), ColumnError> {
        let def = self.lookup(name)?;
        let kind = def.kind().clone();
        let field = def.name().clone();
        self.ensure_loaded()?;
        let coerced = kind.coerce(self.spec.column_name(), &field, value.into())?;
        self.fields.insert(field, coerced);
        self.dirty = true;
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<&crate::schema::FieldDefinition, ColumnError> {
        self.spec
            .fields()
            .get(name)
            .ok_or_else(|| ColumnError::UnknownField {
                column: self.spec.column_name().clone(),
                field: SmolStr::new(name),
            })
    }

    /// Keys currently present in the payload (schema-known or not). Decodes.
    pub fn keys(&mut self) -> Result<Vec<SmolStr>, ColumnError> {
        self.ensure_loaded()?;
        Ok(self.fields.keys().cloned().collect())
    }

    pub fn len(&mut self) -> Result<usize, ColumnError> {
        self.ensure_loaded()?;
        Ok(self.fields.len())
    }

    pub fn is_empty(&mut self) -> Result<bool, ColumnError> {
        self.ensure_loaded()?;
        Ok(self.fields.is_empty())
    }

    // ─── Validation ─────────────────────────────────────────────────────

    /// Host-level validation pass over this column.
    ///
    /// Decodes if and only if the column's validation trigger demands it;
    /// a schema of plain string fields must stay undecoded here. After a
    /// decode, every coercion-carrying field is checked against its kind.
    pub fn run_validations(&mut self) -> Result<(), ColumnError> {
        if !self.spec.requires_decode_for_validation() {
            return Ok(());
        }
        self.ensure_loaded()?;
        let spec = Arc::clone(&self.spec);
        for def in spec.fields().iter() {
            if !def.kind().validation_relevant() {
                continue;
            }
            if let Some(value) = self.fields.get(def.name()) {
                def.kind()
                    .coerce(spec.column_name(), def.name(), value.clone())?;
            }
        }
        Ok(())
    }

    // ─── Encode ─────────────────────────────────────────────────────────

    /// Produce the text to persist.
    ///
    /// A clean store with a cached payload hands the payload back unchanged
    /// and fires nothing. Otherwise the mapping is encoded, checked against
    /// the column's byte limit (failing before any persistence write), the
    /// cache is refreshed, and exactly one serialize event fires.
    pub fn to_text(&mut self) -> Result<String, ColumnError> {
        if !self.dirty {
            if let Some(raw) = &self.raw {
                return match scan_encoding(raw) {
                    Ok(text) => Ok(text.to_string()),
                    Err(scan) => Err(encoding_failure(
                        raw,
                        scan,
                        &self.host,
                        self.spec.column_name(),
                    )),
                };
            }
        }
        self.ensure_loaded()?;
        let text = encode_checked(
            &self.fields,
            self.spec.byte_limit(),
            &self.host,
            self.spec.column_name(),
        )?;
        self.raw = Some(text.clone().into_bytes());
        self.dirty = false;
        self.observer.serialized(SerializeEvent {
            host: self.host.clone(),
            column_name: self.spec.column_name().clone(),
        });
        Ok(text)
    }
}
