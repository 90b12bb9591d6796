//! Packed-column contents engine.
//!
//! One bounded-length text column holds many logical, typed sub-fields as a
//! single JSON object. Field access decodes the stored payload lazily and
//! caches it; saving re-encodes only when something changed and enforces the
//! column's byte limit before the text ever reaches storage. Malformed stored
//! payloads surface as forensic errors (bad byte position, parser
//! description, limit vs. actual size) instead of raw parser failures.

pub mod binder;
pub mod contents;
pub mod db;
pub mod deserialization;
pub mod error;
pub mod events;
pub mod field_value;
pub mod schema;
pub mod serialization;
pub mod types;

pub use binder::{AccessorTarget, HostModel, HostModelBuilder};
pub use contents::{ContentsStore, HostRecord};
pub use error::{ColumnError, ConfigError};
pub use events::{
    ContentsObserver, DeserializeEvent, NullObserver, RecordingObserver, SerializeEvent,
};
pub use field_value::{FieldMap, FieldNumber, FieldValue};
pub use schema::{
    ColumnSpec, FieldDefinition, FieldSet, NullPolicy, ValidationTrigger, ValueKind,
};
pub use types::{HostRef, LoadState, RowKey};
