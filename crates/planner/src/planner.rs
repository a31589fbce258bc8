//! Execution planner - turns a validated graph into ordered batches
//!
//! Each entity expands into one or two steps:
//!
//! - data source: `read`
//! - create / update: `create` / `update`
//! - destroy: `destroy`
//! - replace: `create_new` and `destroy_old`, ordered by the entity's
//!   `create_before_destroy` flag
//!
//! Steps that bring entities up run dependencies first. Steps that take
//! instances down run dependents first. When a dependency is replaced
//! create-before-destroy, its dependents are brought up against the new
//! instance before the old one goes away. Batches are Kahn layers over the
//! resulting step graph.

use crate::context::ActionSource;
use crate::cycle::{self, find_cycle};
use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::lifecycle::check_propagation;
use crate::types::{Action, Batch, ExecutionPlan, Operation, PlanOptions, PlanStep};
use catalog::EntityId;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, VecDeque};

/// Build the execution plan for a dependency graph.
///
/// Fails on reference cycles, lifecycle policy violations, or a destructive
/// action against a `prevent_destroy` entity. Data sources are always read;
/// `actions` is consulted for managed entities only.
pub fn plan<A>(graph: &DependencyGraph<'_>, actions: &A, opts: &PlanOptions) -> Result<ExecutionPlan>
where
    A: ActionSource + ?Sized,
{
    check_propagation(graph, opts.propagation)?;
    cycle::validate(graph)?;

    let actions = collect_actions(graph, actions)?;
    let steps = StepGraph::expand(graph, &actions);
    log::debug!(
        "Expanded {} entities into {} steps ({} ordering constraints)",
        graph.len(),
        steps.len(),
        steps.constraint_count()
    );

    let plan = steps.into_plan(graph)?;
    log::info!(
        "Planned {} steps in {} batches. {}",
        plan.total_steps(),
        plan.len(),
        plan.summary()
    );
    Ok(plan)
}

/// Action per entity; `None` for data sources
fn collect_actions<A>(graph: &DependencyGraph<'_>, source: &A) -> Result<Vec<Option<Action>>>
where
    A: ActionSource + ?Sized,
{
    let mut actions = Vec::with_capacity(graph.len());
    for node in 0..graph.len() {
        let entity = graph.entity(node);
        if entity.is_data() {
            actions.push(None);
            continue;
        }

        let action = source.action_for(entity);
        if entity.lifecycle.prevent_destroy && action.is_destructive() {
            return Err(Error::PreventDestroy {
                entity: entity.id.clone(),
                action,
            });
        }
        log::trace!("{} -> {}", entity.id, action);
        actions.push(Some(action));
    }
    Ok(actions)
}

#[derive(Debug, Clone, Copy)]
struct Step {
    entity: usize,
    operation: Operation,
}

/// Operations an entity expands into, up-step first
fn operations(action: Option<Action>) -> &'static [Operation] {
    match action {
        None => &[Operation::Read],
        Some(Action::Create) => &[Operation::Create],
        Some(Action::Update) => &[Operation::Update],
        Some(Action::Destroy) => &[Operation::Destroy],
        Some(Action::Replace) => &[Operation::CreateNew, Operation::DestroyOld],
    }
}

/// Plan steps; an edge runs from a step to one that must wait for it
struct StepGraph {
    steps: DiGraph<Step, ()>,
}

impl StepGraph {
    fn expand(graph: &DependencyGraph<'_>, actions: &[Option<Action>]) -> Self {
        let mut steps = Self {
            steps: DiGraph::new(),
        };
        let mut up: Vec<Option<NodeIndex>> = vec![None; graph.len()];
        let mut down: Vec<Option<NodeIndex>> = vec![None; graph.len()];

        for (entity, &action) in actions.iter().enumerate() {
            for &operation in operations(action) {
                let step = steps.add(entity, operation);
                if operation.is_up() {
                    up[entity] = Some(step);
                } else if operation.is_down() {
                    down[entity] = Some(step);
                }
            }
            if let (Some(new), Some(old)) = (up[entity], down[entity]) {
                if graph.entity(entity).create_before_destroy() {
                    steps.order(new, old);
                } else {
                    steps.order(old, new);
                }
            }
        }

        // acyclic once validated
        let order = graph
            .dependency_order()
            .unwrap_or_else(|| (0..graph.len()).collect());
        let up_deps = nearest(graph, &order, |n| up[n].is_some());
        let down_deps = nearest(graph, &order, |n| down[n].is_some());

        for entity in 0..graph.len() {
            if let Some(this) = up[entity] {
                for &dep in &up_deps[entity] {
                    if let Some(dep_up) = up[dep] {
                        steps.order(dep_up, this);
                    }
                }
            }

            if let Some(this) = down[entity] {
                for &dep in &down_deps[entity] {
                    if let Some(dep_down) = down[dep] {
                        steps.order(this, dep_down);
                    }
                }
            }

            // a create-before-destroy old instance goes once its dependents are up
            if let Some(this) = up[entity] {
                for dep in graph.dependencies(entity) {
                    let cbd_replace = actions[dep] == Some(Action::Replace)
                        && graph.entity(dep).create_before_destroy();
                    if let (true, Some(dep_down)) = (cbd_replace, down[dep]) {
                        steps.order(this, dep_down);
                    }
                }
            }
        }

        steps
    }

    fn add(&mut self, entity: usize, operation: Operation) -> NodeIndex {
        self.steps.add_node(Step { entity, operation })
    }

    fn order(&mut self, before: NodeIndex, after: NodeIndex) {
        self.steps.update_edge(before, after, ());
    }

    fn len(&self) -> usize {
        self.steps.node_count()
    }

    fn constraint_count(&self) -> usize {
        self.steps.edge_count()
    }

    fn sort_key(&self, node: NodeIndex) -> (usize, Operation) {
        let step = self.steps[node];
        (step.entity, step.operation)
    }

    /// Kahn layering: each batch is every step whose predecessors are all
    /// in earlier batches, sorted by entity id then operation.
    fn into_plan(self, graph: &DependencyGraph<'_>) -> Result<ExecutionPlan> {
        let mut indegree: Vec<usize> = self
            .steps
            .node_indices()
            .map(|n| self.steps.neighbors_directed(n, Direction::Incoming).count())
            .collect();

        let mut ready: Vec<NodeIndex> = self
            .steps
            .node_indices()
            .filter(|n| indegree[n.index()] == 0)
            .collect();
        let mut batches = Vec::new();
        let mut placed = 0;

        while !ready.is_empty() {
            ready.sort_by_key(|&n| self.sort_key(n));

            let mut next_ready = Vec::new();
            for &node in &ready {
                for next in self.steps.neighbors_directed(node, Direction::Outgoing) {
                    indegree[next.index()] -= 1;
                    if indegree[next.index()] == 0 {
                        next_ready.push(next);
                    }
                }
            }

            placed += ready.len();
            batches.push(Batch {
                steps: ready
                    .iter()
                    .map(|&n| {
                        let step = self.steps[n];
                        PlanStep::new(graph.id(step.entity).clone(), step.operation)
                    })
                    .collect(),
            });
            ready = next_ready;
        }

        if placed < self.len() {
            return Err(self.diagnose(graph));
        }
        Ok(ExecutionPlan::new(batches))
    }

    /// Explain why some steps could never be scheduled.
    ///
    /// The reference graph is acyclic by now, so every step cycle runs
    /// through the `destroy_old` of a create-before-destroy replacement and
    /// the `destroy_old` -> `create_new` of a plain replacement among its
    /// dependencies, reached through data sources the propagation check did
    /// not follow.
    fn diagnose(&self, graph: &DependencyGraph<'_>) -> Error {
        // Kahn left steps unplaced, so a cycle exists
        let cycle = find_cycle(&self.steps).unwrap_or_default();

        let replaced = |cbd: bool| -> BTreeSet<usize> {
            cycle
                .iter()
                .map(|&n| self.steps[NodeIndex::new(n)])
                .filter(|s| matches!(s.operation, Operation::CreateNew | Operation::DestroyOld))
                .map(|s| s.entity)
                .filter(|&e| graph.entity(e).create_before_destroy() == cbd)
                .collect()
        };
        let protected = replaced(true);
        let unprotected = replaced(false);

        let conflict = protected
            .iter()
            .flat_map(|&p| unprotected.iter().map(move |&u| (p, u)))
            .find_map(|(p, u)| dependency_path(graph, p, u).map(|path| (p, u, path)));

        let (dependent, dependency, path) = conflict.unwrap_or_else(|| {
            let dependent = protected.first().copied().unwrap_or_default();
            let dependency = unprotected.first().copied().unwrap_or(dependent);
            let path = vec![graph.id(dependent).clone(), graph.id(dependency).clone()];
            (dependent, dependency, path)
        });

        log::debug!(
            "Unschedulable steps: {} waits on the replacement of {}",
            graph.id(dependent),
            graph.id(dependency)
        );
        Error::LifecyclePolicyViolation {
            dependent: graph.id(dependent).clone(),
            dependency: graph.id(dependency).clone(),
            path,
        }
    }
}

/// For each entity, the closest transitive dependencies satisfying `keep`,
/// looking through those that don't.
fn nearest<F>(graph: &DependencyGraph<'_>, order: &[usize], keep: F) -> Vec<BTreeSet<usize>>
where
    F: Fn(usize) -> bool,
{
    let mut nearest: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); graph.len()];
    for &node in order {
        let mut found = BTreeSet::new();
        for dep in graph.dependencies(node) {
            if keep(dep) {
                found.insert(dep);
            } else {
                found.extend(nearest[dep].iter().copied());
            }
        }
        nearest[node] = found;
    }
    nearest
}

/// Shortest dependency chain from `from` to `to`, if `to` is reachable
fn dependency_path(graph: &DependencyGraph<'_>, from: usize, to: usize) -> Option<Vec<EntityId>> {
    let mut parent: Vec<Option<usize>> = vec![None; graph.len()];
    let mut seen = vec![false; graph.len()];
    let mut queue = VecDeque::from([from]);
    seen[from] = true;

    while let Some(node) = queue.pop_front() {
        if node == to {
            let mut path = vec![graph.id(to).clone()];
            let mut current = to;
            while let Some(p) = parent[current] {
                path.push(graph.id(p).clone());
                current = p;
            }
            path.reverse();
            return Some(path);
        }
        for next in graph.dependencies(node) {
            if !seen[next] {
                seen[next] = true;
                parent[next] = Some(node);
                queue.push_back(next);
            }
        }
    }

    None
}
