// src/dag/validate.rs

//! Cycle detection.
//!
//! Depth-first search with an explicit stack, so deep graphs cannot overflow
//! the thread stack. Each node is marked `OnStack` while it is on the current
//! path and `Done` once all its descendants are explored; reaching an
//! `OnStack` node is a back edge and therefore a cycle. `Done` nodes are never
//! entered again, so shared descendants are explored once.

use petgraph::Direction;
use petgraph::graph::{DiGraph, Neighbors, NodeIndex};
use tracing::warn;

use crate::context::Context;
use crate::dag::node::CommandNode;
use crate::errors::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Check that `graph` is acyclic and return a topological order of its nodes.
///
/// Traversal starts from every node without predecessors, then from any node
/// still unvisited: a cycle that no start node reaches has no start node of
/// its own either.
pub(crate) fn check_acyclic<C: Context>(
    graph: &DiGraph<CommandNode<C>, ()>,
) -> Result<Vec<NodeIndex>> {
    let mut marks = vec![Mark::Unvisited; graph.node_count()];
    let mut post_order = Vec::with_capacity(graph.node_count());

    let start_nodes = graph
        .node_indices()
        .filter(|&idx| graph.neighbors_directed(idx, Direction::Incoming).next().is_none());
    let roots: Vec<NodeIndex> = start_nodes.chain(graph.node_indices()).collect();

    let mut stack: Vec<(NodeIndex, Neighbors<'_, ()>)> = Vec::new();

    for root in roots {
        if marks[root.index()] != Mark::Unvisited {
            continue;
        }

        marks[root.index()] = Mark::OnStack;
        stack.push((root, graph.neighbors(root)));

        while let Some((node, children)) = stack.last_mut() {
            let node = *node;

            match children.next() {
                Some(child) => match marks[child.index()] {
                    Mark::Unvisited => {
                        marks[child.index()] = Mark::OnStack;
                        stack.push((child, graph.neighbors(child)));
                    }
                    Mark::OnStack => {
                        let upstream = graph[node].name().to_string();
                        let downstream = graph[child].name().to_string();
                        warn!(%upstream, %downstream, "cycle detected in dependency graph");
                        return Err(EngineError::CycleDetected {
                            upstream,
                            downstream,
                        });
                    }
                    Mark::Done => {}
                },
                None => {
                    marks[node.index()] = Mark::Done;
                    post_order.push(node);
                    stack.pop();
                }
            }
        }
    }

    post_order.reverse();
    Ok(post_order)
}
