//! # Catalog
//!
//! The resolved set of declared resources and data sources that a planning
//! run works over.
//!
//! ## Core Concepts
//!
//! - **Declaration**: an entity as written, with reference expressions still as text
//! - **Entity**: a declaration whose references have been parsed into typed [`Reference`]s
//! - **Catalog**: an immutable, id-sorted snapshot of entities
//!
//! Loading guarantees ids are unique and every reference is well-formed.
//! Whether a referenced entity actually exists is left to the resolver,
//! which can report it with more context.
//!
//! ## Example
//!
//! ```
//! use catalog::{Catalog, Declaration, EntityId, Expr};
//!
//! let catalog = Catalog::load([
//!     Declaration::resource("aws_ecs_cluster", "main").create_before_destroy(),
//!     Declaration::resource("aws_launch_configuration", "ecs")
//!         .attr("user_data", Expr::template("ECS_CLUSTER=${aws_ecs_cluster.main.name}"))
//!         .create_before_destroy(),
//! ])
//! .unwrap();
//!
//! let lc = catalog.get(&EntityId::resource("aws_launch_configuration", "ecs")).unwrap();
//! assert_eq!(lc.references().len(), 1);
//! ```

pub mod error;
pub mod reference;
pub mod types;
pub mod value;

pub use error::{Error, ReferenceSyntaxError, Result};
pub use reference::{Reference, TemplatePart, parse_template};
pub use types::{Entity, EntityId, EntityKind, Lifecycle};
pub use value::{Expr, Value};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// An entity as declared, before references are parsed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub id: EntityId,
    #[serde(default)]
    pub attributes: BTreeMap<String, Expr>,
    #[serde(default)]
    pub lifecycle: Lifecycle,
    /// Reference expressions for explicit ordering
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl Declaration {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            attributes: BTreeMap::new(),
            lifecycle: Lifecycle::default(),
            depends_on: Vec::new(),
        }
    }

    /// Declare a managed resource
    pub fn resource(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(EntityId::resource(resource_type, name))
    }

    /// Declare a data source
    pub fn data(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(EntityId::data(resource_type, name))
    }

    /// Set an attribute
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Add an explicit dependency
    pub fn depends_on(mut self, reference: impl Into<String>) -> Self {
        self.depends_on.push(reference.into());
        self
    }

    pub fn create_before_destroy(mut self) -> Self {
        self.lifecycle.create_before_destroy = true;
        self
    }

    pub fn prevent_destroy(mut self) -> Self {
        self.lifecycle.prevent_destroy = true;
        self
    }

    /// Parse every reference expression, producing a catalog entity
    pub fn into_entity(self) -> Result<Entity> {
        let mut attributes = BTreeMap::new();
        for (name, expr) in &self.attributes {
            attributes.insert(name.clone(), expr.resolve(&self.id, name)?);
        }

        let depends_on = self
            .depends_on
            .iter()
            .enumerate()
            .map(|(i, text)| {
                Reference::parse(text).map_err(|reason| Error::MalformedReference {
                    entity: self.id.clone(),
                    attribute: format!("depends_on[{i}]"),
                    text: text.clone(),
                    reason,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Entity {
            id: self.id,
            attributes,
            lifecycle: self.lifecycle,
            depends_on,
        })
    }
}

/// Immutable snapshot of entities for one planning run.
///
/// Entities are kept sorted by id, so positions double as the planner's
/// tie-breaking order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entities: Vec<Entity>,
    index: HashMap<EntityId, usize>,
}

impl Catalog {
    /// Load declarations, parsing references and rejecting duplicate ids
    pub fn load(declarations: impl IntoIterator<Item = Declaration>) -> Result<Self> {
        let mut entities = Vec::new();
        let mut seen = HashSet::new();

        for declaration in declarations {
            if !seen.insert(declaration.id.clone()) {
                return Err(Error::DuplicateId { id: declaration.id });
            }
            entities.push(declaration.into_entity()?);
        }

        let catalog = Self::from_entities(entities)?;
        log::debug!("Loaded catalog with {} entities", catalog.len());
        Ok(catalog)
    }

    /// Build a catalog from already-resolved entities
    pub fn from_entities(mut entities: Vec<Entity>) -> Result<Self> {
        entities.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(pair) = entities.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(Error::DuplicateId {
                id: pair[0].id.clone(),
            });
        }

        let index = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();

        Ok(Self { entities, index })
    }

    /// Look up an entity by id
    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.index.get(id).map(|&i| &self.entities[i])
    }

    /// Position of an entity in id order
    pub fn position(&self, id: &EntityId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.index.contains_key(id)
    }

    /// Entities in id order
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
