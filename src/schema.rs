use smol_str::SmolStr;
use std::sync::Arc;
use xxhash_rust::xxh64::xxh64;

use crate::error::{ColumnError, ConfigError};
use crate::field_value::{FieldNumber, FieldValue};

/// Custom coercion hook: receives the incoming value, returns the value to
/// store or a human-readable rejection reason.
pub type CoerceFn = dyn Fn(FieldValue) -> Result<FieldValue, String> + Send + Sync;

// ─── ValueKind ──────────────────────────────────────────────────────────────

/// Declared type of one sub-field.
#[derive(Clone)]
pub enum ValueKind {
    /// Plain string field. No coercion beyond rejecting non-strings.
    Str,
    /// Integer field. Integral numbers pass through, numeric strings are
    /// coerced, everything else is rejected.
    Integer,
    /// Caller-supplied coercion rule.
    Custom(Arc<CoerceFn>),
}

impl std::fmt::Debug for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Str => write!(f, "Str"),
            ValueKind::Integer => write!(f, "Integer"),
            ValueKind::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl ValueKind {
    pub fn label(&self) -> &'static str {
        match self {
            ValueKind::Str => "a string",
            ValueKind::Integer => "an integer",
            ValueKind::Custom(_) => "a custom-coercible value",
        }
    }

    /// Whether a validation pass has anything to check for this kind.
    /// Plain strings carry no coercion rule, so they are trivial.
    pub fn validation_relevant(&self) -> bool {
        !matches!(self, ValueKind::Str)
    }

    /// Apply this kind's coercion to an incoming value.
    pub fn coerce(
        &self,
        column: &SmolStr,
        field: &SmolStr,
        value: FieldValue,
    ) -> Result<FieldValue, ColumnError> {
        let reject = |actual: &'static str, detail: String| ColumnError::IncompatibleValue {
            column: column.clone(),
            field: field.clone(),
            expected: self.label(),
            actual,
            detail,
        };

        match self {
            ValueKind::Str => match value {
                FieldValue::Null | FieldValue::Str(_) => Ok(value),
                other => Err(reject(
                    other.kind_label(),
                    "only strings can be stored here".to_string(),
                )),
            },
            ValueKind::Integer => match value {
                FieldValue::Null => Ok(FieldValue::Null),
                FieldValue::Number(n) => match n.as_i64() {
                    Some(i) => Ok(FieldValue::Number(FieldNumber::I64(i))),
                    None => Err(reject(
                        "float",
                        format!("{} has a fractional part or overflows i64", n.as_f64()),
                    )),
                },
                FieldValue::Str(s) => match s.trim().parse::<i64>() {
                    Ok(i) => Ok(FieldValue::Number(FieldNumber::I64(i))),
                    Err(e) => Err(reject("string", format!("\"{}\" does not parse: {}", s, e))),
                },
                other => Err(reject(
                    other.kind_label(),
                    "cannot be coerced to an integer".to_string(),
                )),
            },
            ValueKind::Custom(coerce) => (**coerce)(value).map_err(|detail| {
                ColumnError::IncompatibleValue {
                    column: column.clone(),
                    field: field.clone(),
                    expected: self.label(),
                    actual: "value",
                    detail,
                }
            }),
        }
    }
}

// ─── NullPolicy ─────────────────────────────────────────────────────────────

/// What a read of an absent field returns.
#[derive(Debug, Clone)]
pub enum NullPolicy {
    AllowNull,
    DefaultTo(FieldValue),
}

// ─── FieldDefinition ────────────────────────────────────────────────────────

/// Static schema entry for one sub-field. Immutable after construction.
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    name: SmolStr,
    kind: ValueKind,
    delegate: bool,
    null_policy: NullPolicy,
}

impl FieldDefinition {
    pub fn new(name: impl Into<SmolStr>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            delegate: true,
            null_policy: NullPolicy::AllowNull,
        }
    }

    /// Turn host-level delegation off; the field stays reachable through the
    /// column-level store.
    pub fn without_delegation(mut self) -> Self {
        self.delegate = false;
        self
    }

    /// Reads of the absent field return `default` instead of Null.
    pub fn default_to(mut self, default: impl Into<FieldValue>) -> Self {
        self.null_policy = NullPolicy::DefaultTo(default.into());
        self
    }

    pub fn name(&self) -> &SmolStr {
        &self.name
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn delegated(&self) -> bool {
        self.delegate
    }

    pub fn null_policy(&self) -> &NullPolicy {
        &self.null_policy
    }
}

// ─── FieldSet ───────────────────────────────────────────────────────────────

/// Ordered set of FieldDefinitions for one packed column.
///
/// Lookup goes through an index sorted by xxh64 name hash: a linear scan for
/// up to 4 fields, binary search above that. Hash ties fall back to name
/// comparison.
#[derive(Debug, Clone)]
pub struct FieldSet {
    column_name: SmolStr,
    defs: Vec<FieldDefinition>,
    /// (name_hash, position in `defs`), sorted by hash.
    index: Vec<(u64, u32)>,
}

const LINEAR_SCAN_MAX: usize = 4;

impl FieldSet {
    pub fn new(column_name: impl Into<SmolStr>) -> Self {
        Self {
            column_name: column_name.into(),
            defs: Vec::new(),
            index: Vec::new(),
        }
    }

    pub fn column_name(&self) -> &SmolStr {
        &self.column_name
    }

    /// Register a field. Fails on a name already present in this set.
    pub fn define(&mut self, def: FieldDefinition) -> Result<(), ConfigError> {
        if self.get(def.name()).is_some() {
            return Err(ConfigError::DuplicateField {
                column: self.column_name.clone(),
                field: def.name().clone(),
            });
        }
        let hash = xxh64(def.name().as_bytes(), 0);
        let pos = self.defs.len() as u32;
        self.defs.push(def);
        let at = self.index.partition_point(|&(h, _)| h < hash);
        self.index.insert(at, (hash, pos));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FieldDefinition> {
        let hash = xxh64(name.as_bytes(), 0);
        if self.index.len() <= LINEAR_SCAN_MAX {
            return self.linear_search(hash, name);
        }
        self.binary_search(hash, name)
    }

    fn linear_search(&self, hash: u64, name: &str) -> Option<&FieldDefinition> {
        self.index
            .iter()
            .filter(|&&(h, _)| h == hash)
            .map(|&(_, pos)| &self.defs[pos as usize])
            .find(|def| def.name() == name)
    }

    fn binary_search(&self, hash: u64, name: &str) -> Option<&FieldDefinition> {
        let start = self.index.partition_point(|&(h, _)| h < hash);
        self.index[start..]
            .iter()
            .take_while(|&&(h, _)| h == hash)
            .map(|&(_, pos)| &self.defs[pos as usize])
            .find(|def| def.name() == name)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Definitions in the order they were registered.
    pub fn iter(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.defs.iter()
    }

    /// True when at least one field's kind carries a coercion rule a
    /// validation pass would need to check.
    pub fn has_validation_relevant(&self) -> bool {
        self.defs.iter().any(|d| d.kind().validation_relevant())
    }
}

// ─── ValidationTrigger ──────────────────────────────────────────────────────

/// When a host-level validation pass forces a decode of this column.
///
/// `Auto` decodes exactly when some field kind carries a coercion rule; the
/// other two make the rule explicit where that inference is wrong for a
/// schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationTrigger {
    #[default]
    Auto,
    Always,
    Never,
}

// ─── ColumnSpec ─────────────────────────────────────────────────────────────

/// Configuration-time declaration of one packed column: its field schema,
/// the storage column's byte limit, and the validation trigger policy.
/// Built once and shared immutably by every store of that column.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    fields: FieldSet,
    byte_limit: Option<usize>,
    validation: ValidationTrigger,
}

impl ColumnSpec {
    pub fn new(fields: FieldSet) -> Self {
        Self {
            fields,
            byte_limit: None,
            validation: ValidationTrigger::default(),
        }
    }

    pub fn with_byte_limit(mut self, limit: usize) -> Self {
        self.byte_limit = Some(limit);
        self
    }

    pub fn with_validation(mut self, trigger: ValidationTrigger) -> Self {
        self.validation = trigger;
        self
    }

    pub fn column_name(&self) -> &SmolStr {
        self.fields.column_name()
    }

    pub fn byte_limit(&self) -> Option<usize> {
        self.byte_limit
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn requires_decode_for_validation(&self) -> bool {
        match self.validation {
            ValidationTrigger::Always => true,
            ValidationTrigger::Never => false,
            ValidationTrigger::Auto => self.fields.has_validation_relevant(),
        }
    }
}
