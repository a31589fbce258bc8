//! Reference resolver - turns references into dependency edges
//!
//! Every reference held by an entity (attributes at any depth, templates,
//! `depends_on`) yields an edge from the owner to the referenced entity.
//! Repeated references between the same pair collapse into one edge; the
//! attribute paths that produced it are kept for diagnostics.

use crate::error::{Error, Result};
use catalog::{Catalog, Entity, EntityId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `dependent` cannot reach its target state until `dependency` has
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub dependent: EntityId,
    pub dependency: EntityId,
}

impl Edge {
    pub fn new(dependent: EntityId, dependency: EntityId) -> Self {
        Self {
            dependent,
            dependency,
        }
    }
}

/// Simple (non-multi) edge set with per-edge provenance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyEdges {
    edges: BTreeMap<Edge, Vec<String>>,
}

impl DependencyEdges {
    /// Record an edge and the attribute that caused it
    pub(crate) fn insert(&mut self, edge: Edge, attribute: String) {
        let attributes = self.edges.entry(edge).or_default();
        if !attributes.contains(&attribute) {
            attributes.push(attribute);
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn contains(&self, dependent: &EntityId, dependency: &EntityId) -> bool {
        self.edges
            .contains_key(&Edge::new(dependent.clone(), dependency.clone()))
    }

    /// Edges in (dependent, dependency) order
    pub fn iter(&self) -> impl Iterator<Item = &Edge> {
        self.edges.keys()
    }

    /// Attribute paths on the dependent that reference the dependency
    pub fn attributes(&self, edge: &Edge) -> &[String] {
        self.edges.get(edge).map_or(&[], Vec::as_slice)
    }
}

/// Options for the reference scan
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Scan entities on a rayon pool
    pub parallel: bool,
    /// Minimum catalog size before the parallel scan is used
    pub parallel_threshold: usize,
    /// Worker threads for the parallel scan (0 = rayon default)
    pub jobs: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            parallel_threshold: 64,
            jobs: 0,
        }
    }
}

/// Resolve with default options
pub fn resolve(catalog: &Catalog) -> Result<DependencyEdges> {
    resolve_with(catalog, &ResolveOptions::default())
}

/// Scan every entity for references and collect the edge set.
///
/// The error reported is the first in entity id order, whether or not the
/// scan ran in parallel.
pub fn resolve_with(catalog: &Catalog, opts: &ResolveOptions) -> Result<DependencyEdges> {
    let scans = if opts.parallel && catalog.len() >= opts.parallel_threshold {
        scan_parallel(catalog, opts.jobs)
    } else {
        catalog.iter().map(|e| scan_entity(catalog, e)).collect()
    };

    let mut edges = DependencyEdges::default();
    for scan in scans {
        for (edge, attribute) in scan? {
            log::trace!("{} -> {} via {}", edge.dependent, edge.dependency, attribute);
            edges.insert(edge, attribute);
        }
    }

    log::debug!(
        "Resolved {} dependency edges across {} entities",
        edges.len(),
        catalog.len()
    );
    Ok(edges)
}

/// Edges found on one entity, paired with the attribute that produced each
type EntityScan = Result<Vec<(Edge, String)>>;

/// Scan entities in parallel; results come back in catalog order
fn scan_parallel(catalog: &Catalog, jobs: usize) -> Vec<EntityScan> {
    let scan_all = || -> Vec<EntityScan> {
        catalog
            .entities()
            .par_iter()
            .map(|e| scan_entity(catalog, e))
            .collect()
    };

    match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
        Ok(pool) => pool.install(scan_all),
        Err(e) => {
            log::warn!("Failed to create thread pool ({e}), scanning on the global pool");
            scan_all()
        }
    }
}

/// Read-only scan of a single entity
fn scan_entity(catalog: &Catalog, entity: &Entity) -> EntityScan {
    let mut found = Vec::new();
    for (attribute, reference) in entity.references() {
        if reference.target == entity.id {
            return Err(Error::SelfDependency {
                entity: entity.id.clone(),
                attribute,
                reference: reference.to_string(),
            });
        }
        if !catalog.contains(&reference.target) {
            return Err(Error::UnknownReference {
                entity: entity.id.clone(),
                attribute,
                reference: reference.to_string(),
            });
        }
        found.push((
            Edge::new(entity.id.clone(), reference.target.clone()),
            attribute,
        ));
    }
    Ok(found)
}
