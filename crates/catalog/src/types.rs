//! Core types for the entity catalog

use crate::value::{Reference, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Whether an entity is managed (has side effects) or a read-only data source.
///
/// The variant order matters: ids sort by kind first, and `data` sorts
/// before `resource`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Read-only data source
    Data,
    /// Managed resource with create/update/destroy semantics
    Resource,
}

impl EntityKind {
    /// Label used in ids and reference expressions
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Data => "data",
            EntityKind::Resource => "resource",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Stable identifier of a declared entity.
///
/// Field order defines the total order used for deterministic planning:
/// kind, then type, then name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    pub kind: EntityKind,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
}

impl EntityId {
    pub fn new(kind: EntityKind, resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// Id of a managed resource
    pub fn resource(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(EntityKind::Resource, resource_type, name)
    }

    /// Id of a data source
    pub fn data(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(EntityKind::Data, resource_type, name)
    }

    pub fn is_data(&self) -> bool {
        self.kind == EntityKind::Data
    }

    pub fn is_managed(&self) -> bool {
        self.kind == EntityKind::Resource
    }
}

/// Renders the same text a reference expression uses to address the entity
impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EntityKind::Data => write!(f, "data.{}.{}", self.resource_type, self.name),
            EntityKind::Resource => write!(f, "{}.{}", self.resource_type, self.name),
        }
    }
}

/// Per-entity lifecycle policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    /// On replacement, create the new instance before destroying the old one
    #[serde(default)]
    pub create_before_destroy: bool,
    /// Refuse any plan that destroys or replaces this entity
    #[serde(default)]
    pub prevent_destroy: bool,
}

impl Lifecycle {
    pub fn create_before_destroy() -> Self {
        Self {
            create_before_destroy: true,
            ..Self::default()
        }
    }
}

/// A declared resource or data source with resolved attribute values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    #[serde(default)]
    pub lifecycle: Lifecycle,
    /// Explicit ordering references that carry no attribute value
    #[serde(default)]
    pub depends_on: Vec<Reference>,
}

impl Entity {
    pub fn is_data(&self) -> bool {
        self.id.is_data()
    }

    pub fn is_managed(&self) -> bool {
        self.id.is_managed()
    }

    pub fn create_before_destroy(&self) -> bool {
        self.lifecycle.create_before_destroy
    }

    /// Every reference held by this entity, paired with the attribute path
    /// it was found at.
    ///
    /// Attributes come first in key order, then `depends_on` entries.
    /// Nested blocks render as `outer.inner`, list items as `list[0]`.
    pub fn references(&self) -> Vec<(String, &Reference)> {
        let mut found = Vec::new();
        for (name, value) in &self.attributes {
            value.collect_references(name, &mut found);
        }
        for (i, reference) in self.depends_on.iter().enumerate() {
            found.push((format!("depends_on[{i}]"), reference));
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_ordering_is_kind_type_name() {
        let mut ids = vec![
            EntityId::resource("aws_instance", "b"),
            EntityId::resource("aws_instance", "a"),
            EntityId::data("zzz", "z"),
            EntityId::resource("aws_ami", "z"),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                EntityId::data("zzz", "z"),
                EntityId::resource("aws_ami", "z"),
                EntityId::resource("aws_instance", "a"),
                EntityId::resource("aws_instance", "b"),
            ]
        );
    }

    #[test]
    fn test_id_display() {
        assert_eq!(
            EntityId::resource("aws_ecs_cluster", "main").to_string(),
            "aws_ecs_cluster.main"
        );
        assert_eq!(
            EntityId::data("aws_ami", "ecs").to_string(),
            "data.aws_ami.ecs"
        );
    }

    #[test]
    fn test_lifecycle_defaults_to_destroy_first() {
        let lifecycle = Lifecycle::default();
        assert!(!lifecycle.create_before_destroy);
        assert!(!lifecycle.prevent_destroy);
    }
}
