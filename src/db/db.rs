use redb::{Database, ReadableDatabase, TableDefinition};
use smol_str::SmolStr;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::RowStoreError;
use crate::binder::HostModel;
use crate::contents::HostRecord;
use crate::field_value::FieldValue;
use crate::types::{FastMap, RowKey};

// One row per host record: a JSON object of intrinsic attributes plus each
// packed column's text under its column name.
const ROWS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("rows");

/// Reference persistence collaborator over redb.
///
/// The engine only requires the contract from its side: `save` must run the
/// packed columns' encode-and-check before anything is written (an oversize
/// payload aborts with no partial write), and `find` must hand raw column
/// payloads over without decoding them.
pub struct RowStore {
    db: Database,
    next_id: AtomicU64,
}

impl RowStore {
    /// Open or create the store at the specified path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, RowStoreError> {
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ROWS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db,
            next_id: AtomicU64::new(0),
        })
    }

    /// Persist a record. Upserts under the record's key, assigning the next
    /// free key to a record that has never been saved.
    ///
    /// Every packed column is encoded and length-checked first; only after
    /// all of them produced valid text does the write transaction open.
    pub fn save(&self, record: &mut HostRecord) -> Result<RowKey, RowStoreError> {
        let model = Arc::clone(record.model());

        let mut column_texts: Vec<(SmolStr, String)> = Vec::new();
        for spec in model.columns() {
            let name = spec.column_name().clone();
            let text = record.column_text(&name)?;
            column_texts.push((name, text));
        }

        let key: RowKey = match record.id() {
            Some(key) => key.clone(),
            None => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
                let key = SmolStr::from(id.to_string());
                record.assign_id(key.clone());
                key
            }
        };

        let mut row = serde_json::Map::new();
        for (name, value) in record.attributes() {
            row.insert(name.to_string(), value.clone().into());
        }
        for (name, text) in column_texts {
            row.insert(name.to_string(), serde_json::Value::String(text));
        }
        let bytes = serde_json::Value::Object(row).to_string().into_bytes();

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ROWS_TABLE)?;
            table.insert(key.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(key)
    }

    /// Rehydrate a record. Packed payloads are carried over as raw bytes;
    /// nothing is decoded here.
    pub fn find(&self, model: &Arc<HostModel>, key: &str) -> Result<HostRecord, RowStoreError> {
        let bytes = self
            .get_row_raw(key)?
            .ok_or_else(|| RowStoreError::NotFound(SmolStr::new(key)))?;

        let corrupt = |reason: String| RowStoreError::CorruptRow {
            key: SmolStr::new(key),
            reason,
        };
        let row = match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(serde_json::Value::Object(obj)) => obj,
            Ok(_) => return Err(corrupt("not a JSON object".to_string())),
            Err(e) => return Err(corrupt(e.to_string())),
        };

        let mut attributes: FastMap<SmolStr, FieldValue> = FastMap::default();
        let mut raw_columns: FastMap<SmolStr, Vec<u8>> = FastMap::default();
        for (name, value) in row {
            if model.column_spec(&name).is_some() {
                match value {
                    serde_json::Value::String(text) => {
                        raw_columns.insert(SmolStr::from(name), text.into_bytes());
                    }
                    serde_json::Value::Null => {}
                    other => {
                        return Err(corrupt(format!(
                            "packed column `{}` holds {} instead of text",
                            name,
                            FieldValue::from(other).kind_label()
                        )));
                    }
                }
            } else {
                attributes.insert(SmolStr::from(name), FieldValue::from(value));
            }
        }

        Ok(HostRecord::from_stored(
            Arc::clone(model),
            SmolStr::new(key),
            attributes,
            raw_columns,
        ))
    }

    /// Remove a row by key. Returns whether it existed.
    pub fn remove(&self, key: &str) -> Result<bool, RowStoreError> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(ROWS_TABLE)?;
            table.remove(key)?.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }

    /// Raw row bytes by key.
    pub fn get_row_raw(&self, key: &str) -> Result<Option<Vec<u8>>, RowStoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ROWS_TABLE)?;

        if let Some(access) = table.get(key)? {
            Ok(Some(access.value().to_vec()))
        } else {
            Ok(None)
        }
    }

    /// Write raw row bytes directly, bypassing the engine. The backdoor used
    /// to plant malformed payloads a well-behaved writer could never produce.
    pub fn put_row_raw(&self, key: &str, bytes: &[u8]) -> Result<(), RowStoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ROWS_TABLE)?;
            table.insert(key, bytes)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
