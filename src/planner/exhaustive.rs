//! Exhaustive backtracking planner.
//!
//! Works on any multigraph, including parallel edges and self-loops. The walk
//! keeps a stack of open nodes; from the innermost one it may consume any
//! unused incident fact (`> rel [ other` or `< rel [ other`, pushing `other`)
//! or close the innermost node (`]`, popping it). A walk succeeds once every
//! fact is consumed and every node but the start is closed.
//!
//! Suffix sets depend only on (stack, unused facts), so they are memoized per
//! call and shared in the arena. Each distinct state is charged to the
//! session's walk-state budget. A state from which some unused fact can no
//! longer be reached through unused facts is dead without further search.

use std::collections::HashMap;

use petgraph::graph::NodeIndex;

use crate::error::PlanResult;
use crate::graph::{Direction, FactGraph, readable_relation};
use crate::plan::{Branch, PlanId};

use super::PlanSession;

/// What remains after a walk state.
#[derive(Debug, Clone, Copy)]
enum Tail {
    /// Every fact consumed and nothing left open.
    End,
    /// No way to finish from here.
    Dead,
    /// At least one way to finish.
    Plan(PlanId),
}

/// Fact positions packed into 64-bit words.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FactSet(Box<[u64]>);

impl FactSet {
    fn full(len: usize) -> Self {
        let mut words = vec![u64::MAX; len.div_ceil(64)];
        let tail_bits = len % 64;
        if tail_bits != 0 {
            if let Some(last) = words.last_mut() {
                *last = (1u64 << tail_bits) - 1;
            }
        }
        Self(words.into_boxed_slice())
    }

    fn contains(&self, position: usize) -> bool {
        self.0[position / 64] & (1u64 << (position % 64)) != 0
    }

    fn remove(&mut self, position: usize) {
        self.0[position / 64] &= !(1u64 << (position % 64));
    }

    fn without(&self, position: usize) -> Self {
        let mut rest = self.clone();
        rest.remove(position);
        rest
    }

    fn len(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    fn is_empty(&self) -> bool {
        self.0.iter().all(|&w| w == 0)
    }
}

type WalkState = (Box<[NodeIndex]>, FactSet);

struct Walk<'g> {
    graph: &'g FactGraph,
    readable: Vec<String>,
    /// Fact positions touching each node, by node index.
    incident: Vec<Vec<usize>>,
    memo: HashMap<WalkState, Tail>,
}

impl PlanSession {
    /// Plan every connected fact order, trying each node as the start.
    pub fn exhaustive_plan(&mut self, graph: &FactGraph) -> PlanResult<PlanId> {
        let mut incident = vec![Vec::new(); graph.node_count()];
        for position in 0..graph.fact_count() {
            let (subject, object) = graph.endpoints(position);
            incident[subject.index()].push(position);
            if object != subject {
                incident[object.index()].push(position);
            }
        }
        let mut walk = Walk {
            graph,
            readable: graph
                .facts()
                .iter()
                .map(|f| readable_relation(&f.relation))
                .collect(),
            incident,
            memo: HashMap::new(),
        };
        let unused = FactSet::full(graph.fact_count());

        let mut starts = Vec::new();
        for start in graph.node_indices() {
            let tail = walk.suffixes(self, &mut vec![start], &unused, 0)?;
            if let Some(plan) = self.step(graph.token(start), tail)? {
                starts.push(Branch::plain(plan));
            }
        }
        tracing::trace!(states = walk.memo.len(), "exhaustive walk finished");
        self.arena_mut().choice(starts)
    }

    /// A token followed by the plans of what comes after it.
    fn step(&mut self, token: &str, tail: Tail) -> PlanResult<Option<PlanId>> {
        match tail {
            Tail::End => self.arena_mut().leaf(token).map(Some),
            Tail::Dead => Ok(None),
            Tail::Plan(rest) => self
                .arena_mut()
                .group(Some(token.to_string()), vec![Branch::plain(rest)])
                .map(Some),
        }
    }
}

impl Walk<'_> {
    fn suffixes(
        &mut self,
        session: &mut PlanSession,
        stack: &mut Vec<NodeIndex>,
        unused: &FactSet,
        depth: usize,
    ) -> PlanResult<Tail> {
        let state: WalkState = (stack.as_slice().into(), unused.clone());
        if let Some(&tail) = self.memo.get(&state) {
            return Ok(tail);
        }
        session.enter(depth)?;
        session.charge_walk_state()?;

        let Some(&top) = stack.last() else {
            return Ok(Tail::Dead);
        };
        if !self.reaches_all(stack, unused) {
            self.memo.insert(state, Tail::Dead);
            return Ok(Tail::Dead);
        }

        let mut moves = Vec::new();
        let mut legal = false;
        let candidates = self.incident[top.index()].clone();

        for direction in [Direction::Forward, Direction::Backward] {
            for &fact in &candidates {
                if !unused.contains(fact) {
                    continue;
                }
                let (subject, object) = self.graph.endpoints(fact);
                let far = match direction {
                    Direction::Forward if subject == top => object,
                    Direction::Backward if object == top => subject,
                    _ => continue,
                };
                legal = true;

                let rest = unused.without(fact);
                stack.push(far);
                let tail = self.suffixes(session, stack, &rest, depth + 1);
                stack.pop();

                let token = format!(
                    "{} {} [ {}",
                    direction.marker(),
                    self.readable[fact],
                    self.graph.token(far)
                );
                if let Some(plan) = session.step(&token, tail?)? {
                    moves.push(Branch::plain(plan));
                }
            }
        }

        if stack.len() > 1 {
            legal = true;
            let closed = stack.pop();
            let tail = self.suffixes(session, stack, unused, depth + 1);
            stack.extend(closed);
            if let Some(plan) = session.step("]", tail?)? {
                moves.push(Branch::plain(plan));
            }
        }

        let tail = if !legal {
            if unused.is_empty() { Tail::End } else { Tail::Dead }
        } else {
            let plan = session.arena_mut().choice(moves)?;
            if session.arena().is_dead(plan) {
                Tail::Dead
            } else {
                Tail::Plan(plan)
            }
        };
        self.memo.insert(state, tail);
        Ok(tail)
    }

    /// Whether every unused fact is reachable from the open nodes through
    /// unused facts. Facts outside that region can never be consumed.
    fn reaches_all(&self, stack: &[NodeIndex], unused: &FactSet) -> bool {
        let remaining = unused.len();
        if remaining == 0 {
            return true;
        }

        let mut seen = vec![false; self.incident.len()];
        let mut pending = unused.clone();
        let mut reached = 0;
        let mut frontier = Vec::with_capacity(stack.len());
        for &node in stack {
            if !seen[node.index()] {
                seen[node.index()] = true;
                frontier.push(node);
            }
        }

        while let Some(node) = frontier.pop() {
            for &fact in &self.incident[node.index()] {
                if !pending.contains(fact) {
                    continue;
                }
                pending.remove(fact);
                reached += 1;
                let (subject, object) = self.graph.endpoints(fact);
                let far = if subject == node { object } else { subject };
                if !seen[far.index()] {
                    seen[far.index()] = true;
                    frontier.push(far);
                }
            }
        }
        reached == remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::error::PlanError;
    use crate::graph::Fact;

    fn plans(facts: &[(&str, &str, &str)]) -> Vec<String> {
        let g = FactGraph::new(facts.iter().copied()).unwrap();
        let mut session = PlanSession::default();
        let plan = session.exhaustive_plan(&g).unwrap();
        let mut lins = session.linearize(plan).unwrap().to_vec();
        lins.sort();
        lins
    }

    #[test]
    fn single_fact_from_both_ends() {
        assert_eq!(
            plans(&[("A", "r", "B")]),
            vec!["A > r [ B ]", "B < r [ A ]"]
        );
    }

    #[test]
    fn parallel_edges_are_both_consumed() {
        let lins = plans(&[("A", "p", "B"), ("A", "q", "B")]);
        assert!(lins.contains(&"A > p [ B < q [ A ] ]".to_string()));
        assert!(lins.contains(&"A > p [ B ] > q [ B ]".to_string()));
        for lin in &lins {
            assert_eq!(lin.matches('[').count(), 2, "{lin}");
            assert_eq!(lin.matches(']').count(), 2, "{lin}");
            assert_eq!(lin.matches(" p ").count(), 1, "{lin}");
            assert_eq!(lin.matches(" q ").count(), 1, "{lin}");
        }
    }

    #[test]
    fn self_loop_is_supported() {
        assert_eq!(
            plans(&[("A", "likes", "A")]),
            vec!["A < likes [ A ]", "A > likes [ A ]"]
        );
    }

    #[test]
    fn cycle_consumes_every_fact() {
        let lins = plans(&[("A", "x", "B"), ("B", "y", "C"), ("C", "z", "A")]);
        assert!(lins.contains(&"A > x [ B > y [ C > z [ A ] ] ]".to_string()));
        for lin in &lins {
            assert_eq!(lin.matches('[').count(), 3, "{lin}");
        }
    }

    #[test]
    fn disconnected_graph_has_no_plan() {
        assert!(plans(&[("A", "x", "B"), ("C", "y", "D")]).is_empty());
    }

    #[test]
    fn empty_graph_has_no_plan() {
        assert!(plans(&[]).is_empty());
    }

    /// A chain `N0 -> N1 -> .. -> Nk` plus a second fact between `N0` and `N1`.
    fn doubled_chain(len: usize) -> FactGraph {
        let mut facts: Vec<Fact> = (0..len)
            .map(|i| Fact::new(format!("N{i}"), "next", format!("N{}", i + 1)))
            .collect();
        facts.push(Fact::new("N0", "dup", "N1"));
        FactGraph::new(facts).unwrap()
    }

    #[test]
    fn stranding_closes_are_pruned() {
        let g = doubled_chain(12);
        let mut session = PlanSession::default();
        let plan = session.exhaustive_plan(&g).unwrap();
        let lins = session.linearize(plan).unwrap();
        assert!(!lins.is_empty());
        for lin in lins.iter() {
            assert_eq!(lin.matches('[').count(), 13, "{lin}");
            assert_eq!(lin.matches(']').count(), 13, "{lin}");
            assert_eq!(lin.matches(" dup ").count(), 1, "{lin}");
        }
        assert!(session.stats().walk_states < 10_000);
    }

    #[test]
    fn long_multigraph_chain_fails_fast_under_default_budget() {
        let g = doubled_chain(200);
        let mut session = PlanSession::default();
        assert!(matches!(
            session.exhaustive_plan(&g).unwrap_err(),
            PlanError::BudgetExceeded { .. }
        ));
        assert!(session.stats().walk_states <= session.config().budget.max_walk_states);
    }

    #[test]
    fn walk_state_budget_is_enforced() {
        let g = FactGraph::new([("A", "x", "B"), ("B", "y", "C"), ("C", "z", "A")]).unwrap();
        let mut config = PlannerConfig::default();
        config.budget.max_walk_states = 3;
        let mut session = PlanSession::new(config).unwrap();
        assert!(matches!(
            session.exhaustive_plan(&g).unwrap_err(),
            PlanError::BudgetExceeded {
                resource: "walk states",
                limit: 3,
            }
        ));
    }

    #[test]
    fn fact_set_tracks_positions_across_words() {
        let full = FactSet::full(70);
        assert_eq!(full.len(), 70);
        assert!(full.contains(69));
        let rest = full.without(64).without(0);
        assert_eq!(rest.len(), 68);
        assert!(!rest.contains(64));
        assert!(rest.contains(63));
        assert!(FactSet::full(0).is_empty());
        assert!(FactSet::full(64).contains(63));
    }
}
