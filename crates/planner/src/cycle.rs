//! Cycle detection and diagnosis

use crate::error::{Error, Result};
use crate::graph::{DependencyGraph, sorted_neighbors};
use petgraph::Direction;
use petgraph::graph::DiGraph;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// A node on the DFS path and the successors still to visit
struct Frame {
    node: usize,
    successors: Vec<usize>,
    next: usize,
}

impl Frame {
    fn new<N, E>(graph: &DiGraph<N, E>, node: usize) -> Self {
        Self {
            node,
            successors: sorted_neighbors(graph, node, Direction::Outgoing),
            next: 0,
        }
    }
}

/// Find a cycle following outgoing edges.
///
/// Depth-first with an explicit path stack. When a successor is already on
/// the path, the cycle is the path from that node to the top, closed by
/// repeating the first node. Starts and successors are visited in ascending
/// index order, so the same graph always yields the same cycle.
pub(crate) fn find_cycle<N, E>(graph: &DiGraph<N, E>) -> Option<Vec<usize>> {
    let mut marks = vec![Mark::Unvisited; graph.node_count()];

    for start in 0..graph.node_count() {
        if marks[start] != Mark::Unvisited {
            continue;
        }

        let mut path = vec![Frame::new(graph, start)];
        marks[start] = Mark::OnPath;

        while let Some(top) = path.last_mut() {
            let Some(&next) = top.successors.get(top.next) else {
                marks[top.node] = Mark::Done;
                path.pop();
                continue;
            };
            top.next += 1;

            match marks[next] {
                Mark::Unvisited => {
                    marks[next] = Mark::OnPath;
                    path.push(Frame::new(graph, next));
                }
                Mark::OnPath => {
                    let from = path.iter().position(|frame| frame.node == next)?;
                    let mut cycle: Vec<usize> = path[from..].iter().map(|frame| frame.node).collect();
                    cycle.push(next);
                    return Some(cycle);
                }
                Mark::Done => {}
            }
        }
    }

    None
}

/// Fail with [`Error::Cycle`] if the graph contains a reference cycle
pub fn validate(graph: &DependencyGraph<'_>) -> Result<()> {
    let Some(cycle) = find_cycle(graph.digraph()) else {
        log::debug!("Dependency graph is acyclic");
        return Ok(());
    };

    let references = cycle
        .windows(2)
        .map(|pair| graph.references(pair[0], pair[1]).join(", "))
        .collect();
    let path = cycle.into_iter().map(|i| graph.id(i).clone()).collect();

    Err(Error::Cycle { path, references })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve;
    use catalog::{Catalog, Declaration, EntityId, Expr};

    fn sg(name: &str) -> Declaration {
        Declaration::resource("aws_security_group", name)
    }

    fn sg_id(name: &str) -> EntityId {
        EntityId::resource("aws_security_group", name)
    }

    #[test]
    fn test_acyclic_graph_validates() {
        let catalog = Catalog::load([
            sg("a").attr("peer", Expr::reference("aws_security_group.b.id")),
            sg("b").attr("peer", Expr::reference("aws_security_group.c.id")),
            sg("c"),
        ])
        .unwrap();
        let graph = DependencyGraph::build(&catalog, resolve(&catalog).unwrap());
        assert!(validate(&graph).is_ok());
    }

    #[test]
    fn test_two_node_cycle() {
        let catalog = Catalog::load([
            sg("a").attr("ingress", Expr::reference("aws_security_group.b.id")),
            sg("b").attr("egress", Expr::reference("aws_security_group.a.id")),
        ])
        .unwrap();
        let graph = DependencyGraph::build(&catalog, resolve(&catalog).unwrap());

        match validate(&graph).unwrap_err() {
            Error::Cycle { path, references } => {
                assert_eq!(path, vec![sg_id("a"), sg_id("b"), sg_id("a")]);
                assert_eq!(references, vec!["ingress".to_string(), "egress".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cycle_reported_without_unrelated_prefix() {
        // a -> b -> c -> d -> b ; the reported cycle starts at b
        let catalog = Catalog::load([
            sg("a").attr("x", Expr::reference("aws_security_group.b.id")),
            sg("b").attr("x", Expr::reference("aws_security_group.c.id")),
            sg("c").attr("x", Expr::reference("aws_security_group.d.id")),
            sg("d").attr("x", Expr::reference("aws_security_group.b.id")),
        ])
        .unwrap();
        let graph = DependencyGraph::build(&catalog, resolve(&catalog).unwrap());

        let err = validate(&graph).unwrap_err();
        assert_eq!(
            err.to_string(),
            "dependency cycle: aws_security_group.b -> aws_security_group.c -> \
             aws_security_group.d -> aws_security_group.b"
        );
    }

    #[test]
    fn test_cycle_through_data_source() {
        let catalog = Catalog::load([
            Declaration::data("aws_iam_policy_document", "doc")
                .attr("resources", Expr::reference("aws_s3_bucket.b.arn")),
            Declaration::resource("aws_s3_bucket", "b")
                .attr("policy", Expr::reference("data.aws_iam_policy_document.doc.json")),
        ])
        .unwrap();
        let graph = DependencyGraph::build(&catalog, resolve(&catalog).unwrap());

        let err = validate(&graph).unwrap_err();
        let path = err.path().unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.first(), path.last());
    }

    #[test]
    fn test_find_cycle_on_plain_digraph() {
        let chain = DiGraph::<(), ()>::from_edges([(0u32, 1u32), (1, 2)]);
        assert_eq!(find_cycle(&chain), None);

        let looped = DiGraph::<(), ()>::from_edges([(0u32, 1u32), (1, 2), (2, 1)]);
        assert_eq!(find_cycle(&looped), Some(vec![1, 2, 1]));
    }
}
