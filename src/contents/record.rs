use smol_str::SmolStr;
use std::sync::Arc;

use super::store::ContentsStore;
use crate::binder::HostModel;
use crate::error::ColumnError;
use crate::field_value::FieldValue;
use crate::types::{FastMap, HostRef, RowKey};

// ─── HostRecord ─────────────────────────────────────────────────────────────

/// Runtime instance of a host record type: intrinsic attribute values plus
/// one lazily created ContentsStore per packed column.
///
/// Member reads and writes route through the model's accessor table, so a
/// delegated field behaves like an ordinary attribute while a non-delegated
/// one is reachable only through `column(..)`.
pub struct HostRecord {
    model: Arc<HostModel>,
    id: Option<RowKey>,
    attributes: FastMap<SmolStr, FieldValue>,
    stores: FastMap<SmolStr, ContentsStore>,
    /// Raw column payloads from the last load, not yet handed to a store.
    pending_raw: FastMap<SmolStr, Vec<u8>>,
}

impl HostRecord {
    /// A new, never-persisted record. Its stores start Loaded and empty.
    pub fn new(model: Arc<HostModel>) -> Self {
        Self {
            model,
            id: None,
            attributes: FastMap::default(),
            stores: FastMap::default(),
            pending_raw: FastMap::default(),
        }
    }

    /// Rehydrate a persisted record. Packed payloads stay raw until a field
    /// of their column is actually read.
    pub fn from_stored(
        model: Arc<HostModel>,
        id: RowKey,
        attributes: FastMap<SmolStr, FieldValue>,
        raw_columns: FastMap<SmolStr, Vec<u8>>,
    ) -> Self {
        Self {
            model,
            id: Some(id),
            attributes,
            stores: FastMap::default(),
            pending_raw: raw_columns,
        }
    }

    pub fn model(&self) -> &Arc<HostModel> {
        &self.model
    }

    pub fn id(&self) -> Option<&RowKey> {
        self.id.as_ref()
    }

    /// Identity of this record for events and error messages.
    pub fn host_ref(&self) -> HostRef {
        HostRef {
            type_name: self.model.type_name().clone(),
            id: self.id.clone(),
        }
    }

    /// Called by the persistence collaborator once a row key exists.
    pub(crate) fn assign_id(&mut self, id: RowKey) {
        self.id = Some(id);
        let host = self.host_ref();
        for store in self.stores.values_mut() {
            store.set_host(host.clone());
        }
    }

    pub(crate) fn attributes(&self) -> &FastMap<SmolStr, FieldValue> {
        &self.attributes
    }

    // ─── Member routing ─────────────────────────────────────────────────

    /// Read a member: a delegated packed field, or an intrinsic attribute.
    pub fn get(&mut self, member: &str) -> Result<FieldValue, ColumnError> {
        if let Some(target) = self.model.accessor(member) {
            let (column, field) = (target.column.clone(), target.field.clone());
            return self.column(&column)?.get(&field);
        }
        if self.model.has_intrinsic_member(member) {
            return Ok(self.attributes.get(member).cloned().unwrap_or_default());
        }
        Err(self.unknown_member(member))
    }

    /// Write a member: a delegated packed field, or an intrinsic attribute.
    pub fn set(
        &mut self,
        member: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), ColumnError> {
        if let Some(target) = self.model.accessor(member) {
            let (column, field) = (target.column.clone(), target.field.clone());
            return self.column(&column)?.set(&field, value);
        }
        if self.model.has_intrinsic_member(member) {
            self.attributes.insert(SmolStr::new(member), value.into());
            return Ok(());
        }
        Err(self.unknown_member(member))
    }

    fn unknown_member(&self, member: &str) -> ColumnError {
        ColumnError::UnknownMember {
            host_type: self.model.type_name().clone(),
            member: SmolStr::new(member),
        }
    }

    // ─── Column access ──────────────────────────────────────────────────

    /// The column-level store, created on first touch. Touching the store
    /// never decodes; only field access does.
    pub fn column(&mut self, column_name: &str) -> Result<&mut ContentsStore, ColumnError> {
        if !self.stores.contains_key(column_name) {
            let spec = self
                .model
                .column_spec(column_name)
                .ok_or_else(|| self.unknown_member(column_name))?;
            let mut store = ContentsStore::new(
                Arc::clone(spec),
                self.host_ref(),
                Arc::clone(self.model.observer()),
            );
            if let Some(raw) = self.pending_raw.remove(column_name) {
                store.load_from(raw);
            }
            self.stores.insert(spec.column_name().clone(), store);
        }
        match self.stores.get_mut(column_name) {
            Some(store) => Ok(store),
            None => Err(ColumnError::UnknownMember {
                host_type: self.model.type_name().clone(),
                member: SmolStr::new(column_name),
            }),
        }
    }

    /// Host-level validation pass across every packed column.
    pub fn validate(&mut self) -> Result<(), ColumnError> {
        let columns: Vec<SmolStr> = self
            .model
            .columns()
            .map(|spec| spec.column_name().clone())
            .collect();
        for column in columns {
            self.column(&column)?.run_validations()?;
        }
        Ok(())
    }

    /// Text to persist for one column. Runs the encode-and-check path for
    /// touched stores and passes untouched payloads through unchanged.
    pub(crate) fn column_text(&mut self, column_name: &str) -> Result<String, ColumnError> {
        self.column(column_name)?.to_text()
    }
}
