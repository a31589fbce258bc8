//! # Planner
//!
//! Lifecycle-aware execution planning over a [`catalog::Catalog`].
//!
//! Planning is a pure transformation: references become dependency edges,
//! the graph is checked for cycles and lifecycle consistency, and the result
//! is an ordered list of batches whose members may run concurrently.
//!
//! ## Core Concepts
//!
//! - **DependencyEdges**: resolved references, one edge per (dependent, dependency) pair
//! - **DependencyGraph**: `petgraph` digraph over catalog entities, nodes in id order
//! - **ActionSource**: supplies create/update/destroy/replace per managed entity
//! - **ExecutionPlan**: batches of steps; a replacement becomes two steps
//!
//! ## Example
//!
//! ```
//! use catalog::{Catalog, Declaration, EntityId, Expr};
//! use planner::{AllCreate, Operation, PlanOptions, plan_catalog};
//!
//! let catalog = Catalog::load([
//!     Declaration::resource("aws_ecs_cluster", "main"),
//!     Declaration::resource("aws_launch_configuration", "ecs")
//!         .attr("user_data", Expr::template("ECS_CLUSTER=${aws_ecs_cluster.main.name}")),
//! ])
//! .unwrap();
//!
//! let plan = plan_catalog(&catalog, &AllCreate, &PlanOptions::default()).unwrap();
//! assert_eq!(plan.len(), 2);
//! assert_eq!(
//!     plan.position(&EntityId::resource("aws_launch_configuration", "ecs"), Operation::Create),
//!     Some(1)
//! );
//! ```

pub mod context;
pub mod cycle;
pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod planner;
pub mod resolver;
pub mod types;

pub use context::{ActionSource, AllCreate};
pub use error::{Error, ErrorCategory, Result};
pub use graph::DependencyGraph;
pub use lifecycle::{PropagationCheck, check_propagation};
pub use planner::plan;
pub use resolver::{DependencyEdges, Edge, ResolveOptions, resolve, resolve_with};
pub use types::{Action, Batch, ExecutionPlan, Operation, PlanOptions, PlanStep, PlanSummary};

use catalog::Catalog;

/// Resolve, validate and plan a catalog in one call with default resolver options
pub fn plan_catalog<A>(catalog: &Catalog, actions: &A, opts: &PlanOptions) -> Result<ExecutionPlan>
where
    A: ActionSource + ?Sized,
{
    let edges = resolve(catalog)?;
    let graph = DependencyGraph::build(catalog, edges);
    plan(&graph, actions, opts)
}
