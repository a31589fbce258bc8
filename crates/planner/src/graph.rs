//! Dependency graph over catalog entities.
//!
//! Nodes are added in catalog order, so a node index is the entity's catalog
//! position and sorting neighbours by index sorts them by id. Edges point
//! from dependent to dependency.

use crate::resolver::{DependencyEdges, Edge};
use catalog::{Catalog, Entity, EntityId};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::BTreeSet;

/// Directed graph of "must happen after" relations between entities
#[derive(Debug, Clone)]
pub struct DependencyGraph<'c> {
    catalog: &'c Catalog,
    edges: DependencyEdges,
    graph: DiGraph<&'c Entity, ()>,
}

impl<'c> DependencyGraph<'c> {
    /// Build the graph from a catalog and the edges resolved from it.
    ///
    /// Edges naming an entity the catalog does not hold are skipped with a
    /// warning (and trip a debug assertion).
    pub fn build(catalog: &'c Catalog, edges: DependencyEdges) -> Self {
        let mut graph = DiGraph::with_capacity(catalog.len(), edges.len());
        for entity in catalog.entities() {
            graph.add_node(entity);
        }

        for edge in edges.iter() {
            let ends = (
                catalog.position(&edge.dependent),
                catalog.position(&edge.dependency),
            );
            debug_assert!(
                ends.0.is_some() && ends.1.is_some(),
                "edge {} -> {} was resolved against another catalog",
                edge.dependent,
                edge.dependency
            );
            let (Some(from), Some(to)) = ends else {
                log::warn!(
                    "Skipping edge {} -> {}: not in this catalog",
                    edge.dependent,
                    edge.dependency
                );
                continue;
            };
            graph.update_edge(NodeIndex::new(from), NodeIndex::new(to), ());
        }

        log::debug!(
            "Built dependency graph: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );

        Self {
            catalog,
            edges,
            graph,
        }
    }

    pub fn catalog(&self) -> &'c Catalog {
        self.catalog
    }

    pub fn edges(&self) -> &DependencyEdges {
        &self.edges
    }

    pub(crate) fn digraph(&self) -> &DiGraph<&'c Entity, ()> {
        &self.graph
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn entity(&self, node: usize) -> &'c Entity {
        self.graph[NodeIndex::new(node)]
    }

    pub fn id(&self, node: usize) -> &'c EntityId {
        &self.entity(node).id
    }

    pub fn index_of(&self, id: &EntityId) -> Option<usize> {
        self.catalog.position(id)
    }

    /// Entities `node` depends on, ascending
    pub fn dependencies(&self, node: usize) -> Vec<usize> {
        sorted_neighbors(&self.graph, node, Direction::Outgoing)
    }

    /// Entities depending on `node`, ascending
    pub fn dependents(&self, node: usize) -> Vec<usize> {
        sorted_neighbors(&self.graph, node, Direction::Incoming)
    }

    /// Check if `dependent` directly depends on `dependency`
    pub fn has_edge(&self, dependent: usize, dependency: usize) -> bool {
        self.graph
            .contains_edge(NodeIndex::new(dependent), NodeIndex::new(dependency))
    }

    /// Attribute paths on `dependent` that reference `dependency`
    pub fn references(&self, dependent: usize, dependency: usize) -> &[String] {
        self.edges.attributes(&Edge::new(
            self.id(dependent).clone(),
            self.id(dependency).clone(),
        ))
    }

    /// Entities in dependency order (every entity after all of its
    /// dependencies), or `None` if the graph has a cycle.
    ///
    /// Kahn's algorithm; ties go to the lowest id.
    pub fn dependency_order(&self) -> Option<Vec<usize>> {
        let mut remaining: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| self.graph.neighbors_directed(n, Direction::Outgoing).count())
            .collect();
        let mut ready: BTreeSet<usize> = remaining
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d == 0)
            .map(|(i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(self.len());
        while let Some(node) = ready.pop_first() {
            order.push(node);
            for dependent in self.dependents(node) {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        (order.len() == self.len()).then_some(order)
    }
}

/// Neighbours of `node` in one direction, by ascending index
pub(crate) fn sorted_neighbors<N, E>(
    graph: &DiGraph<N, E>,
    node: usize,
    direction: Direction,
) -> Vec<usize> {
    let mut nodes: Vec<usize> = graph
        .neighbors_directed(NodeIndex::new(node), direction)
        .map(|n| n.index())
        .collect();
    nodes.sort_unstable();
    nodes
}
