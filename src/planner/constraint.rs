//! Constraint decomposition planner.
//!
//! Aligns a plan to a reference text: each [`Component`] describes one target
//! sentence by the nodes it must and must not mention. The search peels off
//! one component at a time, trying every non-empty subset of the remaining
//! facts that satisfies it. An assignment is complete only when the
//! components and the facts run out together.
//!
//! Every level scans a full power set, so this is meant for single examples
//! of a few dozen facts at most.
//!
//! [`PlanSession::aligned_plans`] goes one step further and keeps only the
//! constrained plans that mention the nodes in the reference's order.

use std::collections::{BTreeSet, HashSet};

use itertools::{Either, Itertools};
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};
use crate::graph::{Fact, FactGraph};
use crate::plan::{Branch, PlanId, SENTENCE_SEPARATOR};

use super::PlanSession;

/// Largest fact count whose power set can be indexed by a `u64` mask.
pub const MAX_CONSTRAINED_FACTS: usize = 63;

/// Node constraints for one sentence of the reference text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Nodes the sentence's facts must touch.
    #[serde(default)]
    pub must_include: BTreeSet<String>,
    /// Nodes the sentence's facts must not touch.
    #[serde(default)]
    pub must_exclude: BTreeSet<String>,
}

impl Component {
    /// Create a component from required and forbidden nodes.
    pub fn new<I, E, S, T>(must_include: I, must_exclude: E) -> Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            must_include: must_include.into_iter().map(Into::into).collect(),
            must_exclude: must_exclude.into_iter().map(Into::into).collect(),
        }
    }

    /// Derive the constraints of one reference sentence.
    ///
    /// Nodes whose token occurs in the sentence are required. Every other node
    /// is forbidden, unless it is adjacent to a required node: such a node may
    /// be referred to without being named.
    pub fn from_sentence(graph: &FactGraph, sentence: &str) -> Self {
        let must_include: BTreeSet<String> = graph
            .nodes()
            .filter(|node| sentence.contains(*node))
            .map(str::to_string)
            .collect();
        let must_exclude = graph
            .nodes()
            .filter(|node| !must_include.contains(*node))
            .filter(|node| {
                !graph
                    .neighbors_undirected(node)
                    .iter()
                    .any(|n| must_include.contains(n.other))
            })
            .map(str::to_string)
            .collect();
        Self {
            must_include,
            must_exclude,
        }
    }

    /// Whether a fact subset touching exactly `nodes` satisfies this component.
    pub fn admits(&self, nodes: &BTreeSet<&str>) -> bool {
        self.must_include.iter().all(|n| nodes.contains(n.as_str()))
            && !self.must_exclude.iter().any(|n| nodes.contains(n.as_str()))
    }
}

/// One component per reference sentence.
pub fn components_from_sentences<S: AsRef<str>>(
    graph: &FactGraph,
    sentences: &[S],
) -> Vec<Component> {
    sentences
        .iter()
        .map(|s| Component::from_sentence(graph, s.as_ref()))
        .collect()
}

/// One entry of a text's node mention sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mention<'a> {
    Node(&'a str),
    Break,
}

/// Node mentions of each sentence in text order, sentences separated by
/// [`Mention::Break`].
fn mention_order<'a, 's>(
    nodes: &[&'a str],
    sentences: impl IntoIterator<Item = &'s str>,
) -> Vec<Mention<'a>> {
    let mut order = Vec::new();
    for (i, sentence) in sentences.into_iter().enumerate() {
        if i > 0 {
            order.push(Mention::Break);
        }
        let mut found: Vec<(usize, &'a str)> = nodes
            .iter()
            .flat_map(|&node| sentence.match_indices(node).map(move |(at, _)| (at, node)))
            .collect();
        found.sort_by_key(|&(at, _)| at);
        order.extend(found.into_iter().map(|(_, node)| Mention::Node(node)));
    }
    order
}

/// Whether `plan` replays `reference` in order. A node may reappear in the
/// plan without a counterpart once the reference has already mentioned it;
/// trailing plan mentions are ignored.
fn replays(reference: &[Mention<'_>], plan: &[Mention<'_>]) -> bool {
    let mut mentioned = HashSet::new();
    let (mut r, mut p) = (0, 0);
    while r < reference.len() {
        if plan.len() - p < reference.len() - r {
            return false;
        }
        if reference[r] == plan[p] {
            if let Mention::Node(node) = reference[r] {
                mentioned.insert(node);
            }
            r += 1;
            p += 1;
        } else if matches!(plan[p], Mention::Node(node) if mentioned.contains(node)) {
            p += 1;
        } else {
            return false;
        }
    }
    true
}

/// Whether a linearized plan mentions the graph's nodes in the same order as
/// the reference sentences, sentence by sentence.
pub fn follows_reference_order<S: AsRef<str>>(
    graph: &FactGraph,
    sentences: &[S],
    plan: &str,
) -> bool {
    let nodes: Vec<&str> = graph.nodes().collect();
    let reference = mention_order(&nodes, sentences.iter().map(|s| s.as_ref()));
    let planned = mention_order(&nodes, plan.split(SENTENCE_SEPARATOR));
    replays(&reference, &planned)
}

impl PlanSession {
    /// Constrained plans for a reference text whose node mentions follow the
    /// reference order. Sentences must already be split.
    pub fn aligned_plans<S: AsRef<str>>(
        &mut self,
        graph: &FactGraph,
        sentences: &[S],
    ) -> PlanResult<Vec<String>> {
        let components = components_from_sentences(graph, sentences);
        let root = self.constrained_plan(graph, &components)?;
        let candidates = self.linearize(root)?;

        let nodes: Vec<&str> = graph.nodes().collect();
        let reference = mention_order(&nodes, sentences.iter().map(|s| s.as_ref()));
        let aligned: Vec<String> = candidates
            .iter()
            .filter(|plan| {
                replays(
                    &reference,
                    &mention_order(&nodes, plan.split(SENTENCE_SEPARATOR)),
                )
            })
            .cloned()
            .collect();
        tracing::debug!(
            candidates = candidates.len(),
            aligned = aligned.len(),
            "filtered constrained plans by reference order"
        );
        Ok(aligned)
    }

    /// Every way to split the facts into one non-empty subset per component,
    /// in component order. Positions index [`FactGraph::facts`].
    pub fn constraint_assignments(
        &mut self,
        graph: &FactGraph,
        components: &[Component],
    ) -> PlanResult<Vec<Vec<Vec<usize>>>> {
        let n = graph.fact_count();
        if n > MAX_CONSTRAINED_FACTS {
            return Err(PlanError::TooManyFacts {
                count: n,
                max: MAX_CONSTRAINED_FACTS,
            });
        }

        let unassigned: Vec<usize> = (0..n).collect();
        let mut prefix = Vec::with_capacity(components.len());
        let mut found = Vec::new();
        self.assign(graph, &unassigned, components, &mut prefix, &mut found, 0)?;
        tracing::debug!(
            facts = n,
            components = components.len(),
            assignments = found.len(),
            subsets = self.stats.subsets_examined,
            "constraint search finished"
        );
        Ok(found)
    }

    /// The facts of each part of every valid assignment.
    pub fn constraint_partitions(
        &mut self,
        graph: &FactGraph,
        components: &[Component],
    ) -> PlanResult<Vec<Vec<Vec<Fact>>>> {
        let facts = graph.facts();
        Ok(self
            .constraint_assignments(graph, components)?
            .into_iter()
            .map(|parts| {
                parts
                    .into_iter()
                    .map(|part| part.into_iter().map(|i| facts[i].clone()).collect())
                    .collect()
            })
            .collect())
    }

    /// Plans whose sentences follow the components: a choice over every valid
    /// assignment, each a sentence sequence of directly planned parts.
    pub fn constrained_plan(
        &mut self,
        graph: &FactGraph,
        components: &[Component],
    ) -> PlanResult<PlanId> {
        let assignments = self.constraint_assignments(graph, components)?;

        let mut options = Vec::with_capacity(assignments.len());
        for parts in assignments {
            let mut sentences = Vec::with_capacity(parts.len());
            for part in &parts {
                sentences.push(Branch::plain(self.direct_plan(&graph.subgraph(part))?));
            }
            options.push(Branch::plain(self.arena.sequence(sentences)?));
        }
        self.arena.choice(options)
    }

    fn assign(
        &mut self,
        graph: &FactGraph,
        unassigned: &[usize],
        components: &[Component],
        prefix: &mut Vec<Vec<usize>>,
        found: &mut Vec<Vec<Vec<usize>>>,
        depth: usize,
    ) -> PlanResult<()> {
        let Some((component, rest)) = components.split_first() else {
            if unassigned.is_empty() {
                found.push(prefix.clone());
            }
            return Ok(());
        };
        self.enter(depth)?;

        // Every later component needs at least one fact of its own.
        let n = unassigned.len();
        if n <= rest.len() {
            return Ok(());
        }
        let largest = n - rest.len();

        for mask in 1u64..(1u64 << n) {
            self.charge_subset()?;
            if mask.count_ones() as usize > largest {
                continue;
            }

            let (chosen, remaining): (Vec<usize>, Vec<usize>) =
                unassigned.iter().enumerate().partition_map(|(bit, &fact)| {
                    if mask & (1 << bit) != 0 {
                        Either::Left(fact)
                    } else {
                        Either::Right(fact)
                    }
                });

            let touched: BTreeSet<&str> = chosen
                .iter()
                .flat_map(|&fact| {
                    let (subject, object) = graph.endpoints(fact);
                    [graph.token(subject), graph.token(object)]
                })
                .collect();
            if !component.admits(&touched) {
                continue;
            }

            prefix.push(chosen);
            self.assign(graph, &remaining, rest, prefix, found, depth + 1)?;
            prefix.pop();
        }
        Ok(())
    }
}
