use std::cell::RefCell;

use crate::types::HostRef;

// ─── Event payloads ─────────────────────────────────────────────────────────

/// Fired once per actual encode of a packed column, never for cache hits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializeEvent {
    pub host: HostRef,
    pub column_name: smol_str::SmolStr,
}

/// Fired once per actual decode of a packed column, never for cache hits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeserializeEvent {
    pub host: HostRef,
    pub column_name: smol_str::SmolStr,
    /// The raw stored payload the decode ran over.
    pub raw_data: Vec<u8>,
}

// ─── Observer ───────────────────────────────────────────────────────────────

/// Instrumentation sink, injected at configuration time.
///
/// The engine's contract is only the event shapes and the fires-once
/// guarantee; delivery beyond this synchronous callback is the caller's
/// concern. The engine holds no global or static observer state.
pub trait ContentsObserver {
    fn serialized(&self, event: SerializeEvent);
    fn deserialized(&self, event: DeserializeEvent);
}

/// Default observer: drops every event.
#[derive(Debug, Default)]
pub struct NullObserver;

impl ContentsObserver for NullObserver {
    fn serialized(&self, _event: SerializeEvent) {}
    fn deserialized(&self, _event: DeserializeEvent) {}
}

/// Observer that records every event it sees. Test support: the engine is
/// single-threaded by contract, so interior mutability is enough here.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    serializations: RefCell<Vec<SerializeEvent>>,
    deserializations: RefCell<Vec<DeserializeEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serializations(&self) -> Vec<SerializeEvent> {
        self.serializations.borrow().clone()
    }

    pub fn deserializations(&self) -> Vec<DeserializeEvent> {
        self.deserializations.borrow().clone()
    }

    pub fn serialize_count(&self) -> usize {
        self.serializations.borrow().len()
    }

    pub fn deserialize_count(&self) -> usize {
        self.deserializations.borrow().len()
    }
}

impl ContentsObserver for RecordingObserver {
    fn serialized(&self, event: SerializeEvent) {
        self.serializations.borrow_mut().push(event);
    }

    fn deserialized(&self, event: DeserializeEvent) {
        self.deserializations.borrow_mut().push(event);
    }
}
