//! Plan trees: the lazy representation of a *set* of content plans.
//!
//! Planners build nodes into a [`PlanArena`] and hand back a [`PlanId`].
//! Nodes are immutable once pushed and may be shared between parents, so the
//! arena is a DAG. Every node owns a write-once slot for its linearization
//! set and another for its linearization count.
//!
//! ## Composition
//!
//! ```text
//! Leaf(t)               {t}
//! Group(anchor, m..)    anchor + every permutation of one pick per member, joined by " "
//! Sequence(p..)         one pick per part, in order, joined by ". "
//! Choice(a..)           union of the alternatives
//! Dead                  {}
//! ```
//!
//! A labeled branch renders as `label [ text ]`, which is how a traversal
//! step (`> birth place`) wraps the nested plan of the neighbor it reaches.

use std::cell::OnceCell;
use std::sync::Arc;

use itertools::Itertools;

use crate::config::MAX_PLAN_NODES;
use crate::error::{PlanError, PlanResult};

/// A materialized linearization set.
pub type Linearizations = Arc<[String]>;

/// Separator between the sentences of a [`PlanNode::Sequence`].
pub const SENTENCE_SEPARATOR: &str = ". ";

/// Handle to a node in a [`PlanArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlanId(u32);

impl PlanId {
    /// Position of the node in its arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A child reference, optionally wrapped by a traversal label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    /// Rendered as `label [ child ]` when present.
    pub label: Option<String>,
    /// The child node.
    pub node: PlanId,
}

impl Branch {
    /// An unlabeled branch.
    pub fn plain(node: PlanId) -> Self {
        Self { label: None, node }
    }

    /// A branch wrapped by a traversal label.
    pub fn labeled(label: impl Into<String>, node: PlanId) -> Self {
        Self {
            label: Some(label.into()),
            node,
        }
    }

    fn render(&self, text: &str) -> String {
        match &self.label {
            Some(label) => format!("{label} [ {text} ]"),
            None => text.to_string(),
        }
    }
}

/// One node of a plan tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanNode {
    /// A literal fragment.
    Leaf(String),
    /// Members in any order, after a fixed anchor token.
    Group {
        anchor: Option<String>,
        members: Vec<Branch>,
    },
    /// Independent sentences in fixed order.
    Sequence(Vec<Branch>),
    /// Alternative plans.
    Choice(Vec<Branch>),
    /// No valid plan.
    Dead,
}

/// Arena of plan nodes with memoized evaluation.
#[derive(Debug)]
pub struct PlanArena {
    nodes: Vec<PlanNode>,
    linearizations: Vec<OnceCell<Linearizations>>,
    counts: Vec<OnceCell<u128>>,
    max_nodes: usize,
    max_linearizations: usize,
    dead: PlanId,
}

impl PlanArena {
    /// Create an arena that refuses to grow past `max_nodes` nodes or to
    /// materialize more than `max_linearizations` strings for one node.
    ///
    /// `max_nodes` is clamped to the range a [`PlanId`] can address.
    pub fn new(max_nodes: usize, max_linearizations: usize) -> Self {
        let mut arena = Self {
            nodes: Vec::new(),
            linearizations: Vec::new(),
            counts: Vec::new(),
            max_nodes: max_nodes.clamp(1, MAX_PLAN_NODES),
            max_linearizations,
            dead: PlanId(0),
        };
        arena.nodes.push(PlanNode::Dead);
        arena.linearizations.push(OnceCell::new());
        arena.counts.push(OnceCell::new());
        arena
    }

    /// Number of nodes, including the shared dead node.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether only the shared dead node exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// The shared dead node.
    pub fn dead(&self) -> PlanId {
        self.dead
    }

    /// Look up a node.
    pub fn node(&self, id: PlanId) -> PlanResult<&PlanNode> {
        self.nodes
            .get(id.index())
            .ok_or(PlanError::UnknownPlan { id: id.index() })
    }

    /// Whether the node is structurally dead.
    pub fn is_dead(&self, id: PlanId) -> bool {
        matches!(self.nodes.get(id.index()), Some(PlanNode::Dead))
    }

    fn push(&mut self, node: PlanNode) -> PlanResult<PlanId> {
        let index = match u32::try_from(self.nodes.len()) {
            Ok(index) if self.nodes.len() < self.max_nodes => index,
            _ => {
                tracing::warn!(limit = self.max_nodes, "plan arena budget exceeded");
                return Err(PlanError::BudgetExceeded {
                    resource: "plan nodes",
                    limit: self.max_nodes,
                });
            }
        };
        let id = PlanId(index);
        self.nodes.push(node);
        self.linearizations.push(OnceCell::new());
        self.counts.push(OnceCell::new());
        Ok(id)
    }

    /// A literal fragment.
    pub fn leaf(&mut self, text: impl Into<String>) -> PlanResult<PlanId> {
        self.push(PlanNode::Leaf(text.into()))
    }

    /// An unordered group. A dead member kills the whole group; an empty group
    /// degrades to its anchor alone.
    pub fn group(&mut self, anchor: Option<String>, members: Vec<Branch>) -> PlanResult<PlanId> {
        if members.iter().any(|b| self.is_dead(b.node)) {
            return Ok(self.dead);
        }
        match (anchor, members.is_empty()) {
            (Some(anchor), true) => self.leaf(anchor),
            (None, true) => Ok(self.dead),
            (anchor, false) => self.push(PlanNode::Group { anchor, members }),
        }
    }

    /// An ordered sentence sequence. A dead part kills the whole sequence.
    pub fn sequence(&mut self, parts: Vec<Branch>) -> PlanResult<PlanId> {
        if parts.is_empty() || parts.iter().any(|b| self.is_dead(b.node)) {
            return Ok(self.dead);
        }
        self.push(PlanNode::Sequence(parts))
    }

    /// A choice. Dead alternatives are dropped; a single unlabeled survivor is
    /// returned as-is.
    pub fn choice(&mut self, alternatives: Vec<Branch>) -> PlanResult<PlanId> {
        let mut alive: Vec<Branch> = alternatives
            .into_iter()
            .filter(|b| !self.is_dead(b.node))
            .collect();
        match alive.len() {
            0 => Ok(self.dead),
            1 if alive[0].label.is_none() => Ok(alive.remove(0).node),
            _ => self.push(PlanNode::Choice(alive)),
        }
    }

    /// Exact number of linearizations of a node, without materializing them.
    pub fn count(&self, id: PlanId) -> PlanResult<u128> {
        self.node(id)?;
        Ok(self.count_of(id))
    }

    fn count_of(&self, id: PlanId) -> u128 {
        let idx = id.index();
        if let Some(&count) = self.counts[idx].get() {
            return count;
        }
        let count = match &self.nodes[idx] {
            PlanNode::Leaf(_) => 1,
            PlanNode::Dead => 0,
            PlanNode::Choice(alternatives) => alternatives
                .iter()
                .fold(0u128, |acc, b| acc.saturating_add(self.count_of(b.node))),
            PlanNode::Sequence(parts) => parts
                .iter()
                .fold(1u128, |acc, b| acc.saturating_mul(self.count_of(b.node))),
            PlanNode::Group { members, .. } => {
                let picks = members
                    .iter()
                    .fold(1u128, |acc, b| acc.saturating_mul(self.count_of(b.node)));
                let orders = (1..=members.len() as u128).fold(1u128, u128::saturating_mul);
                picks.saturating_mul(orders)
            }
        };
        let _ = self.counts[idx].set(count);
        count
    }

    /// All linearizations of a node.
    ///
    /// The result is cached per node, so repeated calls return the same set.
    /// Fails before materializing anything if the set would exceed the
    /// arena's linearization budget.
    pub fn linearize(&self, id: PlanId) -> PlanResult<Linearizations> {
        let count = self.count(id)?;
        if count > self.max_linearizations as u128 {
            tracing::warn!(
                count = %count,
                limit = self.max_linearizations,
                "linearization budget exceeded"
            );
            return Err(PlanError::BudgetExceeded {
                resource: "linearizations",
                limit: self.max_linearizations,
            });
        }
        Ok(self.materialize(id))
    }

    fn materialize(&self, id: PlanId) -> Linearizations {
        let idx = id.index();
        if let Some(cached) = self.linearizations[idx].get() {
            return Arc::clone(cached);
        }

        let texts: Vec<String> = match &self.nodes[idx] {
            PlanNode::Leaf(text) => vec![text.clone()],
            PlanNode::Dead => Vec::new(),
            PlanNode::Choice(alternatives) => alternatives
                .iter()
                .flat_map(|b| self.branch_texts(b))
                .collect(),
            PlanNode::Sequence(parts) => self
                .picks(parts)
                .into_iter()
                .map(|pick| pick.join(SENTENCE_SEPARATOR))
                .collect(),
            PlanNode::Group { anchor, members } => {
                let mut out = Vec::new();
                for pick in self.picks(members) {
                    for order in pick.iter().permutations(pick.len()) {
                        let mut fragments: Vec<&str> = Vec::with_capacity(order.len() + 1);
                        if let Some(anchor) = anchor {
                            fragments.push(anchor);
                        }
                        fragments.extend(order.into_iter().map(String::as_str));
                        out.push(fragments.join(" "));
                    }
                }
                out
            }
        };

        let texts: Linearizations = texts.into();
        let _ = self.linearizations[idx].set(Arc::clone(&texts));
        texts
    }

    fn branch_texts(&self, branch: &Branch) -> Vec<String> {
        self.materialize(branch.node)
            .iter()
            .map(|text| branch.render(text))
            .collect()
    }

    /// Cross product of the branches' rendered linearizations.
    fn picks(&self, branches: &[Branch]) -> Vec<Vec<String>> {
        branches
            .iter()
            .map(|b| self.branch_texts(b))
            .multi_cartesian_product()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> PlanArena {
        PlanArena::new(1_000, 1_000)
    }

    #[test]
    fn leaf_linearizes_to_itself() {
        let mut a = arena();
        let leaf = a.leaf("ENT_A_ENT").unwrap();
        assert_eq!(&*a.linearize(leaf).unwrap(), &["ENT_A_ENT".to_string()]);
    }

    #[test]
    fn dead_is_empty() {
        let a = arena();
        assert!(a.linearize(a.dead()).unwrap().is_empty());
        assert_eq!(a.count(a.dead()).unwrap(), 0);
    }

    #[test]
    fn group_yields_every_permutation() {
        let mut a = arena();
        let b = a.leaf("B").unwrap();
        let c = a.leaf("C").unwrap();
        let g = a
            .group(
                Some("A".into()),
                vec![Branch::labeled("> b", b), Branch::labeled("> c", c)],
            )
            .unwrap();
        let mut lins = a.linearize(g).unwrap().to_vec();
        lins.sort();
        assert_eq!(lins, vec!["A > b [ B ] > c [ C ]", "A > c [ C ] > b [ B ]"]);
        assert_eq!(a.count(g).unwrap(), 2);
    }

    #[test]
    fn sequence_keeps_order() {
        let mut a = arena();
        let x = a.leaf("X").unwrap();
        let y1 = a.leaf("Y1").unwrap();
        let y2 = a.leaf("Y2").unwrap();
        let y = a.choice(vec![Branch::plain(y1), Branch::plain(y2)]).unwrap();
        let s = a.sequence(vec![Branch::plain(x), Branch::plain(y)]).unwrap();
        let lins = a.linearize(s).unwrap();
        assert_eq!(&*lins, &["X. Y1".to_string(), "X. Y2".to_string()]);
    }

    #[test]
    fn dead_poisons_conjunctions_but_not_choices() {
        let mut a = arena();
        let x = a.leaf("X").unwrap();
        let dead = a.dead();
        let s = a.sequence(vec![Branch::plain(x), Branch::plain(dead)]).unwrap();
        assert!(a.is_dead(s));
        let g = a.group(None, vec![Branch::plain(dead)]).unwrap();
        assert!(a.is_dead(g));
        let c = a.choice(vec![Branch::plain(dead), Branch::plain(x)]).unwrap();
        assert_eq!(c, x);
        let none = a.choice(Vec::new()).unwrap();
        assert!(a.is_dead(none));
    }

    #[test]
    fn empty_group_degrades_to_anchor() {
        let mut a = arena();
        let g = a.group(Some("A".into()), Vec::new()).unwrap();
        assert_eq!(a.node(g).unwrap(), &PlanNode::Leaf("A".into()));
    }

    #[test]
    fn linearizations_are_cached() {
        let mut a = arena();
        let x = a.leaf("X").unwrap();
        let g = a.group(Some("A".into()), vec![Branch::labeled("> r", x)]).unwrap();
        let first = a.linearize(g).unwrap();
        let second = a.linearize(g).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn node_budget_is_enforced() {
        let mut a = PlanArena::new(2, 10);
        a.leaf("X").unwrap();
        let err = a.leaf("Y").unwrap_err();
        assert!(matches!(
            err,
            PlanError::BudgetExceeded {
                resource: "plan nodes",
                ..
            }
        ));
    }

    #[test]
    fn oversized_node_budget_is_clamped_to_handle_range() {
        let a = PlanArena::new(usize::MAX, 10);
        assert_eq!(a.max_nodes, MAX_PLAN_NODES);
        assert_eq!(PlanArena::new(0, 10).max_nodes, 1);
    }

    #[test]
    fn linearization_budget_fails_before_materializing() {
        let mut a = PlanArena::new(100, 5);
        let leaves: Vec<_> = ["B", "C", "D"]
            .iter()
            .map(|t| Branch::plain(a.leaf(*t).unwrap()))
            .collect();
        let g = a.group(Some("A".into()), leaves).unwrap();
        assert_eq!(a.count(g).unwrap(), 6);
        assert!(a.linearize(g).is_err());
    }

    #[test]
    fn foreign_handles_are_rejected() {
        let a = arena();
        assert!(matches!(
            a.linearize(PlanId(42)).unwrap_err(),
            PlanError::UnknownPlan { id: 42 }
        ));
    }
}
