//! Size-bounded decomposition planner.
//!
//! A fact set plans either directly as one sentence, or as a small head
//! subset (at most `max_split_size` facts) planned directly followed by the
//! decomposition of everything else. Both the direct plans and the
//! decompositions are memoized by content for the whole session, so a
//! remainder reached through different heads is decomposed once.

use itertools::Itertools;

use crate::error::PlanResult;
use crate::graph::FactGraph;
use crate::plan::{Branch, PlanId};

use super::PlanSession;

impl PlanSession {
    /// Plan a graph as one or more sentences.
    pub fn decompose(&mut self, graph: &FactGraph) -> PlanResult<PlanId> {
        let plan = self.decompose_at(graph, 0)?;
        tracing::debug!(
            facts = graph.fact_count(),
            direct = self.stats.direct_computations,
            decompositions = self.stats.decompositions,
            subsets = self.stats.subsets_examined,
            arena = self.arena.len(),
            "decomposition finished"
        );
        Ok(plan)
    }

    fn decompose_at(&mut self, graph: &FactGraph, depth: usize) -> PlanResult<PlanId> {
        if let Some(&id) = self.cache.decomposed.get(graph.key()) {
            self.stats.decomposition_hits += 1;
            tracing::trace!(key = %graph.key(), "decomposition cache hit");
            return Ok(id);
        }
        self.enter(depth)?;

        let n = graph.fact_count();
        let mut options = vec![Branch::plain(self.direct_plan(graph)?)];

        let largest_head = self.config.max_split_size.min(n.saturating_sub(1));
        for size in 1..=largest_head {
            for head in (0..n).combinations(size) {
                self.charge_subset()?;
                let rest: Vec<usize> = (0..n).filter(|i| !head.contains(i)).collect();

                let head_plan = self.direct_plan(&graph.subgraph(&head))?;
                if self.arena.is_dead(head_plan) {
                    continue;
                }
                let rest_plan = self.decompose_at(&graph.subgraph(&rest), depth + 1)?;
                let split = self
                    .arena
                    .sequence(vec![Branch::plain(head_plan), Branch::plain(rest_plan)])?;
                options.push(Branch::plain(split));
            }
        }

        let plan = self.arena.choice(options)?;
        self.stats.decompositions += 1;
        self.cache.decomposed.insert(graph.key().clone(), plan);
        Ok(plan)
    }
}
