//! Tree-shortcut planner.
//!
//! On a forest every node is reached through exactly one fact, so a single
//! depth-first walk per start node describes all plans: each node becomes its
//! token followed by an unordered group of its unvisited neighbors' subtrees.
//! A walk that misses a node means the graph is disconnected, and that start
//! yields no plan.

use std::collections::HashSet;

use petgraph::graph::NodeIndex;

use crate::error::PlanResult;
use crate::graph::{FactGraph, readable_relation};
use crate::plan::{Branch, PlanId};

use super::PlanSession;

impl PlanSession {
    /// Plan from every start node. Only meaningful on forest-shaped graphs;
    /// [`direct_plan`](Self::direct_plan) checks this before choosing it.
    pub fn tree_plan(&mut self, graph: &FactGraph) -> PlanResult<PlanId> {
        let mut starts = Vec::with_capacity(graph.node_count());
        for start in graph.node_indices() {
            starts.push(Branch::plain(self.tree_from(graph, start)?));
        }
        self.arena_mut().choice(starts)
    }

    /// Plan starting at the node with the given token. Unknown tokens plan to
    /// a dead branch.
    pub fn tree_plan_from(&mut self, graph: &FactGraph, token: &str) -> PlanResult<PlanId> {
        match graph.node_indices().find(|&idx| graph.token(idx) == token) {
            Some(start) => self.tree_from(graph, start),
            None => Ok(self.arena().dead()),
        }
    }

    fn tree_from(&mut self, graph: &FactGraph, start: NodeIndex) -> PlanResult<PlanId> {
        let mut visited = HashSet::new();
        let plan = self.dfs(graph, start, &mut visited, 0)?;

        // More than one connected component.
        if visited.len() != graph.node_count() {
            return Ok(self.arena().dead());
        }
        Ok(plan)
    }

    fn dfs(
        &mut self,
        graph: &FactGraph,
        node: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        depth: usize,
    ) -> PlanResult<PlanId> {
        self.enter(depth)?;
        visited.insert(node);

        let mut members = Vec::new();
        for (direction, relation, other) in graph.incident(node) {
            if visited.contains(&other) {
                continue;
            }
            let child = self.dfs(graph, other, visited, depth + 1)?;
            let label = format!("{} {}", direction.marker(), readable_relation(relation));
            members.push(Branch::labeled(label, child));
        }

        self.arena_mut()
            .group(Some(graph.token(node).to_string()), members)
    }
}
