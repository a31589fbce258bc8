//! Action provider traits
//!
//! The planner does not decide whether an entity is created, updated,
//! destroyed or replaced; that comes from the state-diffing layer through
//! an [`ActionSource`].

use crate::types::Action;
use catalog::{Entity, EntityId};
use std::collections::{BTreeMap, HashMap};

/// Supplies the action for each managed entity.
///
/// Data sources are never asked; they are always read.
pub trait ActionSource {
    fn action_for(&self, entity: &Entity) -> Action;
}

impl<F> ActionSource for F
where
    F: Fn(&Entity) -> Action,
{
    fn action_for(&self, entity: &Entity) -> Action {
        self(entity)
    }
}

/// Every managed entity is created (a fresh deployment)
pub struct AllCreate;

impl ActionSource for AllCreate {
    fn action_for(&self, _entity: &Entity) -> Action {
        Action::Create
    }
}

/// Entities missing from the map are created
impl ActionSource for HashMap<EntityId, Action> {
    fn action_for(&self, entity: &Entity) -> Action {
        self.get(&entity.id).copied().unwrap_or(Action::Create)
    }
}

/// Entities missing from the map are created
impl ActionSource for BTreeMap<EntityId, Action> {
    fn action_for(&self, entity: &Entity) -> Action {
        self.get(&entity.id).copied().unwrap_or(Action::Create)
    }
}
