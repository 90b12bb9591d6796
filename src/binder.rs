use smol_str::SmolStr;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::events::{ContentsObserver, NullObserver};
use crate::schema::ColumnSpec;
use crate::types::FastMap;

// ─── AccessorTarget ─────────────────────────────────────────────────────────

/// Routing entry for one delegated member: which packed column and field a
/// host-level read or write forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessorTarget {
    pub column: SmolStr,
    pub field: SmolStr,
}

// ─── HostModel ──────────────────────────────────────────────────────────────

/// Configuration-time description of a host record type: its intrinsic
/// members, its packed columns, and the forwarding-accessor table the binder
/// produced for every delegated field.
///
/// Built exactly once per host type, before any instance exists, then shared
/// immutably. Runtime never mutates a model, so instance-level access carries
/// no concurrency concern.
pub struct HostModel {
    type_name: SmolStr,
    intrinsic: Vec<SmolStr>,
    columns: Vec<Arc<ColumnSpec>>,
    accessors: FastMap<SmolStr, AccessorTarget>,
    observer: Arc<dyn ContentsObserver>,
}

impl std::fmt::Debug for HostModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostModel")
            .field("type_name", &self.type_name)
            .field("intrinsic", &self.intrinsic)
            .field("columns", &self.columns)
            .field("accessors", &self.accessors)
            .field("observer", &"<dyn ContentsObserver>")
            .finish()
    }
}

impl HostModel {
    pub fn builder(type_name: impl Into<SmolStr>) -> HostModelBuilder {
        HostModelBuilder {
            type_name: type_name.into(),
            members: Vec::new(),
            columns: Vec::new(),
            observer: Arc::new(NullObserver),
        }
    }

    pub fn type_name(&self) -> &SmolStr {
        &self.type_name
    }

    pub fn intrinsic_members(&self) -> &[SmolStr] {
        &self.intrinsic
    }

    pub fn columns(&self) -> impl Iterator<Item = &Arc<ColumnSpec>> {
        self.columns.iter()
    }

    pub fn column_spec(&self, column_name: &str) -> Option<&Arc<ColumnSpec>> {
        self.columns
            .iter()
            .find(|spec| spec.column_name() == column_name)
    }

    /// Forwarding target for a delegated member, if one was bound.
    pub fn accessor(&self, member: &str) -> Option<&AccessorTarget> {
        self.accessors.get(member)
    }

    pub fn has_intrinsic_member(&self, name: &str) -> bool {
        self.intrinsic.iter().any(|m| m == name)
    }

    pub fn observer(&self) -> &Arc<dyn ContentsObserver> {
        &self.observer
    }
}

// ─── Builder ────────────────────────────────────────────────────────────────

/// Collects the host type's declaration, then runs the one-time binding pass.
///
/// `build` walks every column's delegated fields and registers a forwarding
/// accessor per field, failing fast on any name that collides with an
/// intrinsic member, a column name, or an accessor bound earlier. Fields with
/// delegation turned off register nothing; they stay reachable through the
/// column-level store only.
pub struct HostModelBuilder {
    type_name: SmolStr,
    members: Vec<SmolStr>,
    columns: Vec<ColumnSpec>,
    observer: Arc<dyn ContentsObserver>,
}

impl HostModelBuilder {
    /// Declare an intrinsic member of the host type (an ordinary attribute
    /// that exists independently of any packed column).
    pub fn member(mut self, name: impl Into<SmolStr>) -> Self {
        self.members.push(name.into());
        self
    }

    /// Attach a packed column to the host type.
    pub fn column(mut self, spec: ColumnSpec) -> Self {
        self.columns.push(spec);
        self
    }

    /// Inject the instrumentation sink shared by every store of this type.
    pub fn observer(mut self, observer: Arc<dyn ContentsObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn build(self) -> Result<Arc<HostModel>, ConfigError> {
        let mut taken: Vec<SmolStr> = self.members.clone();
        for spec in &self.columns {
            taken.push(spec.column_name().clone());
        }

        let mut accessors: FastMap<SmolStr, AccessorTarget> = FastMap::default();
        for spec in &self.columns {
            for def in spec.fields().iter() {
                if !def.delegated() {
                    continue;
                }
                let name = def.name().clone();
                if taken.iter().any(|m| *m == name) {
                    return Err(ConfigError::DelegationConflict {
                        host_type: self.type_name.clone(),
                        column: spec.column_name().clone(),
                        field: name.clone(),
                        member: name,
                    });
                }
                taken.push(name.clone());
                accessors.insert(
                    name.clone(),
                    AccessorTarget {
                        column: spec.column_name().clone(),
                        field: name,
                    },
                );
            }
        }

        Ok(Arc::new(HostModel {
            type_name: self.type_name,
            intrinsic: self.members,
            columns: self.columns.into_iter().map(Arc::new).collect(),
            accessors,
            observer: self.observer,
        }))
    }
}
