//! # stackplan
//!
//! Dependency graph builder and lifecycle-aware execution planner for
//! declarative infrastructure.
//!
//! The [`Planner`] runs the whole pipeline: the catalog's references are
//! resolved into dependency edges, lifecycle policies are checked against
//! the graph, cycles are rejected, and the remaining graph is layered into
//! batches of steps that may run concurrently.
//!
//! ## Example
//!
//! ```
//! use stackplan::{AllCreate, Declaration, Expr, Planner};
//!
//! let planner = Planner::default();
//! let plan = planner
//!     .plan_declarations(
//!         [
//!             Declaration::data("aws_iam_policy_document", "assume"),
//!             Declaration::resource("aws_iam_role", "ecs")
//!                 .attr("assume_role_policy", Expr::reference("data.aws_iam_policy_document.assume.json"))
//!                 .create_before_destroy(),
//!         ],
//!         &AllCreate,
//!     )
//!     .unwrap();
//!
//! assert_eq!(plan.len(), 2);
//! println!("{plan}");
//! ```

pub mod config;

pub use catalog::{Catalog, Declaration, Entity, EntityId, EntityKind, Expr, Lifecycle, Value};
pub use config::{LifecycleConfig, PlannerConfig, ResolverConfig};
pub use planner::{
    Action, ActionSource, AllCreate, Batch, DependencyGraph, Error, ErrorCategory,
    ExecutionPlan, Operation, PlanStep, PlanSummary, PropagationCheck, Result,
};

use std::path::Path;

/// Planning pipeline configured by a [`PlannerConfig`]
#[derive(Debug, Clone, Default)]
pub struct Planner {
    config: PlannerConfig,
}

impl Planner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Build a planner from a config file; a missing file means defaults
    pub fn from_config_file(path: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(PlannerConfig::load(path)?))
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Resolve references and check the graph without planning.
    ///
    /// Runs the lifecycle propagation check and cycle validation, so a
    /// returned graph is one [`Planner::plan`] can order.
    pub fn graph<'c>(&self, catalog: &'c Catalog) -> Result<DependencyGraph<'c>> {
        let edges = planner::resolve_with(catalog, &self.config.resolver.to_options())?;
        let graph = DependencyGraph::build(catalog, edges);
        planner::check_propagation(&graph, self.config.lifecycle.propagation)?;
        planner::cycle::validate(&graph)?;
        Ok(graph)
    }

    /// Plan a loaded catalog
    pub fn plan<A>(&self, catalog: &Catalog, actions: &A) -> Result<ExecutionPlan>
    where
        A: ActionSource + ?Sized,
    {
        log::debug!("Planning {} entities", catalog.len());
        let edges = planner::resolve_with(catalog, &self.config.resolver.to_options())?;
        let graph = DependencyGraph::build(catalog, edges);
        planner::plan(&graph, actions, &self.config.plan_options())
    }

    /// Load declarations into a catalog and plan it
    pub fn plan_declarations<A>(
        &self,
        declarations: impl IntoIterator<Item = Declaration>,
        actions: &A,
    ) -> Result<ExecutionPlan>
    where
        A: ActionSource + ?Sized,
    {
        let catalog = Catalog::load(declarations)?;
        self.plan(&catalog, actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn ecs_declarations(role_cbd: bool) -> Vec<Declaration> {
        let mut role = Declaration::resource("aws_iam_role", "ecs").attr(
            "assume_role_policy",
            Expr::reference("data.aws_iam_policy_document.ecs.json"),
        );
        if role_cbd {
            role = role.create_before_destroy();
        }

        vec![
            Declaration::resource("aws_ecs_cluster", "main").create_before_destroy(),
            Declaration::resource("aws_launch_configuration", "ecs")
                .attr("image_id", "ami-0c55b159cbfafe1f0")
                .attr(
                    "user_data",
                    Expr::template("#!/bin/bash\necho ECS_CLUSTER=${aws_ecs_cluster.main.name} >> /etc/ecs/ecs.config"),
                )
                .create_before_destroy(),
            Declaration::resource("aws_iam_instance_profile", "ecs")
                .attr("role", Expr::reference("aws_iam_role.ecs.name"))
                .create_before_destroy(),
            role,
            Declaration::data("aws_iam_policy_document", "ecs").attr(
                "statement",
                Expr::block([("actions", Expr::List(vec!["sts:AssumeRole".into()]))]),
            ),
            Declaration::resource("aws_security_group", "ecs")
                .attr("ingress", Expr::block([("from_port", Expr::Number(443.0))]))
                .create_before_destroy(),
            Declaration::resource("aws_autoscaling_group", "ecs")
                .attr("launch_configuration", Expr::reference("aws_launch_configuration.ecs.name"))
                .attr("min_size", Expr::Number(1.0)),
        ]
    }

    #[test]
    fn test_plans_ecs_stack() {
        init_logging();
        let plan = Planner::default()
            .plan_declarations(ecs_declarations(true), &AllCreate)
            .unwrap();

        let first: Vec<String> = plan.batches[0].steps.iter().map(|s| s.id.to_string()).collect();
        assert_eq!(
            first,
            vec![
                "data.aws_iam_policy_document.ecs",
                "aws_ecs_cluster.main",
                "aws_security_group.ecs",
            ]
        );
        let summary = plan.summary();
        assert_eq!(summary.create, 6);
        assert_eq!(summary.read, 1);
    }

    #[test]
    fn test_rejects_unflagged_role() {
        init_logging();
        let err = Planner::default()
            .plan_declarations(ecs_declarations(false), &AllCreate)
            .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Lifecycle);
        let names: Vec<String> = err.entities().iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["aws_iam_instance_profile.ecs", "aws_iam_role.ecs"]);
    }

    #[test]
    fn test_duplicate_declaration_surfaces_as_plan_error() {
        let err = Planner::default()
            .plan_declarations(
                [
                    Declaration::resource("aws_vpc", "main"),
                    Declaration::resource("aws_vpc", "main"),
                ],
                &AllCreate,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Catalog(catalog::Error::DuplicateId { .. })));
    }

    #[test]
    fn test_config_drives_resolver_and_propagation() {
        init_logging();
        let config = PlannerConfig::from_toml_str(
            "[resolver]\nparallel_threshold = 1\njobs = 2\n\n[lifecycle]\npropagation = \"direct\"\n",
        )
        .unwrap();
        let planner = Planner::new(config);

        // cbd role reads a document that reads a plain bucket: fine only in direct mode
        let catalog = Catalog::load([
            Declaration::resource("aws_s3_bucket", "artifacts"),
            Declaration::data("aws_iam_policy_document", "read")
                .attr("resources", Expr::reference("aws_s3_bucket.artifacts.arn")),
            Declaration::resource("aws_iam_policy", "read")
                .attr("policy", Expr::reference("data.aws_iam_policy_document.read.json"))
                .create_before_destroy(),
        ])
        .unwrap();

        assert!(planner.graph(&catalog).is_ok());
        assert!(planner.plan(&catalog, &AllCreate).is_ok());
        assert!(Planner::default().graph(&catalog).is_err());
    }

    #[test]
    fn test_replacement_through_facade() {
        let catalog = Catalog::load(ecs_declarations(true)).unwrap();
        let lc = EntityId::resource("aws_launch_configuration", "ecs");
        let asg = EntityId::resource("aws_autoscaling_group", "ecs");
        let actions = HashMap::from([
            (EntityId::resource("aws_ecs_cluster", "main"), Action::Update),
            (lc.clone(), Action::Replace),
            (asg.clone(), Action::Update),
            (EntityId::resource("aws_iam_role", "ecs"), Action::Update),
            (EntityId::resource("aws_iam_instance_profile", "ecs"), Action::Update),
            (EntityId::resource("aws_security_group", "ecs"), Action::Update),
        ]);

        let plan = Planner::default().plan(&catalog, &actions).unwrap();
        assert!(plan.position(&lc, Operation::CreateNew) < plan.position(&asg, Operation::Update));
        assert!(plan.position(&asg, Operation::Update) < plan.position(&lc, Operation::DestroyOld));
        assert!(plan.to_string().contains("1 to replace"));
    }

    #[test]
    fn test_from_missing_config_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let planner = Planner::from_config_file(&tmp.path().join("stackplan.toml")).unwrap();
        assert_eq!(planner.config(), &PlannerConfig::default());
    }
}
