//! Lifecycle policy propagation.
//!
//! A `create_before_destroy` entity is recreated while its old instance is
//! still live, so everything it depends on must also still be live at that
//! point. A managed dependency without the flag would be destroyed first and
//! pull the ground out from under it; the planner refuses such a graph rather
//! than silently widening the policy.
//!
//! Data sources hold no lifecycle. [`PropagationCheck::Transitive`] looks
//! through them to the managed entities they read from;
//! [`PropagationCheck::Direct`] stops at them.

use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// How far the create-before-destroy requirement is followed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropagationCheck {
    /// Only managed entities referenced directly
    Direct,
    /// Managed entities reached directly or through data sources
    #[default]
    Transitive,
}

/// Check that every managed dependency of a `create_before_destroy` entity
/// carries the flag too.
///
/// Entities are checked in id order and the first violation is returned;
/// its path runs from the flagged entity to the offending dependency.
pub fn check_propagation(graph: &DependencyGraph<'_>, mode: PropagationCheck) -> Result<()> {
    let mut checked = 0usize;

    for node in 0..graph.len() {
        let entity = graph.entity(node);
        if !entity.is_managed() || !entity.create_before_destroy() {
            continue;
        }
        checked += 1;

        if let Some(path) = find_unprotected(graph, node, mode) {
            let ids: Vec<_> = path.iter().map(|&i| graph.id(i).clone()).collect();
            let dependency = graph.id(*path.last().unwrap_or(&node)).clone();
            log::debug!(
                "Lifecycle violation: {} depends on {}",
                entity.id,
                dependency
            );
            return Err(Error::LifecyclePolicyViolation {
                dependent: entity.id.clone(),
                dependency,
                path: ids,
            });
        }
    }

    log::debug!("Lifecycle propagation ok ({checked} create_before_destroy entities, {mode:?})");
    Ok(())
}

/// Breadth-first search from `start` for a managed dependency without
/// `create_before_destroy`; returns the path to the nearest one.
fn find_unprotected(
    graph: &DependencyGraph<'_>,
    start: usize,
    mode: PropagationCheck,
) -> Option<Vec<usize>> {
    let mut parent: Vec<Option<usize>> = vec![None; graph.len()];
    let mut seen = vec![false; graph.len()];
    let mut queue = VecDeque::from([start]);
    seen[start] = true;

    while let Some(node) = queue.pop_front() {
        for next in graph.dependencies(node) {
            if seen[next] {
                continue;
            }
            seen[next] = true;
            parent[next] = Some(node);

            let entity = graph.entity(next);
            if entity.is_data() {
                if mode == PropagationCheck::Transitive {
                    queue.push_back(next);
                }
            } else if !entity.create_before_destroy() {
                let mut path = vec![next];
                let mut current = next;
                while let Some(p) = parent[current] {
                    path.push(p);
                    current = p;
                }
                path.reverse();
                return Some(path);
            }
            // a protected managed dependency checks its own dependencies
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve;
    use catalog::{Catalog, Declaration, EntityId, Expr};

    fn check(catalog: &Catalog, mode: PropagationCheck) -> Result<()> {
        let graph = DependencyGraph::build(catalog, resolve(catalog).unwrap());
        check_propagation(&graph, mode)
    }

    fn profile_and_role(role_cbd: bool) -> Catalog {
        let mut role = Declaration::resource("aws_iam_role", "ecs");
        if role_cbd {
            role = role.create_before_destroy();
        }
        Catalog::load([
            role,
            Declaration::resource("aws_iam_instance_profile", "ecs")
                .attr("role", Expr::reference("aws_iam_role.ecs.name"))
                .create_before_destroy(),
        ])
        .unwrap()
    }

    #[test]
    fn test_direct_violation_names_both_entities() {
        let err = check(&profile_and_role(false), PropagationCheck::Transitive).unwrap_err();
        match err {
            Error::LifecyclePolicyViolation {
                dependent,
                dependency,
                path,
            } => {
                assert_eq!(dependent, EntityId::resource("aws_iam_instance_profile", "ecs"));
                assert_eq!(dependency, EntityId::resource("aws_iam_role", "ecs"));
                assert_eq!(path, vec![dependent.clone(), dependency.clone()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_propagated_policy_passes() {
        assert!(check(&profile_and_role(true), PropagationCheck::Transitive).is_ok());
        assert!(check(&profile_and_role(true), PropagationCheck::Direct).is_ok());
    }

    #[test]
    fn test_plain_dependent_of_cbd_entity_is_fine() {
        // only the flagged entity's dependencies need the flag, not its dependents
        let catalog = Catalog::load([
            Declaration::resource("aws_launch_configuration", "ecs").create_before_destroy(),
            Declaration::resource("aws_autoscaling_group", "ecs")
                .attr("launch_configuration", Expr::reference("aws_launch_configuration.ecs.name")),
        ])
        .unwrap();
        assert!(check(&catalog, PropagationCheck::Transitive).is_ok());
    }

    #[test]
    fn test_data_sources_are_exempt() {
        let catalog = Catalog::load([
            Declaration::data("aws_iam_policy_document", "assume"),
            Declaration::resource("aws_iam_role", "ecs")
                .attr("assume_role_policy", Expr::reference("data.aws_iam_policy_document.assume.json"))
                .create_before_destroy(),
        ])
        .unwrap();
        assert!(check(&catalog, PropagationCheck::Transitive).is_ok());
    }

    #[test]
    fn test_transitive_mode_looks_through_data_sources() {
        let catalog = Catalog::load([
            Declaration::resource("aws_s3_bucket", "artifacts"),
            Declaration::data("aws_iam_policy_document", "read")
                .attr("resources", Expr::reference("aws_s3_bucket.artifacts.arn")),
            Declaration::resource("aws_iam_policy", "read")
                .attr("policy", Expr::reference("data.aws_iam_policy_document.read.json"))
                .create_before_destroy(),
        ])
        .unwrap();

        let err = check(&catalog, PropagationCheck::Transitive).unwrap_err();
        assert_eq!(
            err.path().unwrap(),
            [
                EntityId::resource("aws_iam_policy", "read"),
                EntityId::data("aws_iam_policy_document", "read"),
                EntityId::resource("aws_s3_bucket", "artifacts"),
            ]
        );

        assert!(check(&catalog, PropagationCheck::Direct).is_ok());
    }

    #[test]
    fn test_checks_whole_chain_of_cbd_entities() {
        let catalog = Catalog::load([
            Declaration::resource("aws_vpc", "main"),
            Declaration::resource("aws_subnet", "a")
                .attr("vpc_id", Expr::reference("aws_vpc.main.id"))
                .create_before_destroy(),
            Declaration::resource("aws_instance", "web")
                .attr("subnet_id", Expr::reference("aws_subnet.a.id"))
                .create_before_destroy(),
        ])
        .unwrap();

        // aws_instance.web is fine; aws_subnet.a is the one missing a protected dependency
        match check(&catalog, PropagationCheck::Transitive).unwrap_err() {
            Error::LifecyclePolicyViolation {
                dependent,
                dependency,
                ..
            } => {
                assert_eq!(dependent, EntityId::resource("aws_subnet", "a"));
                assert_eq!(dependency, EntityId::resource("aws_vpc", "main"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_mode_deserializes_lowercase() {
        let mode: PropagationCheck = serde_json::from_str("\"direct\"").unwrap();
        assert_eq!(mode, PropagationCheck::Direct);
        assert_eq!(PropagationCheck::default(), PropagationCheck::Transitive);
    }
}
