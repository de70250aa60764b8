//! In-memory fact multigraph.
//!
//! Uses `petgraph` for the graph structure and a token index for O(1) node
//! lookups. Parallel edges and self-loops are stored as-is.

use std::collections::HashMap;

use petgraph::Direction as EdgeDirection;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::error::{GraphError, GraphResult};

use super::{Direction, Fact, FactKey, Neighbor};

/// An immutable multigraph built from a fact list.
///
/// Nodes are exactly the subjects and objects of the facts. Facts between the
/// same ordered node pair are grouped together; pairs keep first-seen order,
/// so [`facts`](Self::facts) and [`key`](Self::key) are reproducible.
#[derive(Debug, Clone)]
pub struct FactGraph {
    /// Nodes are entity tokens, edges carry relation labels.
    graph: DiGraph<String, String>,
    /// Token → NodeIndex mapping.
    node_index: HashMap<String, NodeIndex>,
    /// Ordered node pairs with the edges attached in that direction.
    pairs: Vec<((NodeIndex, NodeIndex), Vec<EdgeIndex>)>,
    /// Canonical fact order, grouped by pair.
    facts: Vec<Fact>,
    /// Endpoints of `facts[i]`.
    endpoints: Vec<(NodeIndex, NodeIndex)>,
    key: FactKey,
}

impl FactGraph {
    /// Build a graph from a fact list, rejecting facts with blank fields.
    pub fn new<I, F>(facts: I) -> GraphResult<Self>
    where
        I: IntoIterator<Item = F>,
        F: Into<Fact>,
    {
        let facts: Vec<Fact> = facts.into_iter().map(Into::into).collect();
        for (index, fact) in facts.iter().enumerate() {
            for (field, value) in [
                ("subject", &fact.subject),
                ("relation", &fact.relation),
                ("object", &fact.object),
            ] {
                if value.trim().is_empty() {
                    return Err(GraphError::EmptyField { index, field });
                }
            }
        }
        Ok(Self::from_valid(facts))
    }

    /// Build a graph from a JSON array of `[subject, relation, object]` triples.
    pub fn from_json(source: &str) -> GraphResult<Self> {
        let triples: Vec<(String, String, String)> =
            serde_json::from_str(source).map_err(|e| GraphError::Json {
                message: e.to_string(),
            })?;
        Self::new(triples)
    }

    fn from_valid(facts: Vec<Fact>) -> Self {
        let mut graph = DiGraph::new();
        let mut node_index: HashMap<String, NodeIndex> = HashMap::new();
        let mut pairs: Vec<((NodeIndex, NodeIndex), Vec<EdgeIndex>)> = Vec::new();
        let mut pair_slot: HashMap<(NodeIndex, NodeIndex), usize> = HashMap::new();

        for fact in &facts {
            let subj = ensure_node(&mut graph, &mut node_index, &fact.subject);
            let obj = ensure_node(&mut graph, &mut node_index, &fact.object);
            let edge = graph.add_edge(subj, obj, fact.relation.clone());
            let slot = *pair_slot.entry((subj, obj)).or_insert_with(|| {
                pairs.push(((subj, obj), Vec::new()));
                pairs.len() - 1
            });
            pairs[slot].1.push(edge);
        }

        let mut ordered = Vec::with_capacity(facts.len());
        let mut endpoints = Vec::with_capacity(facts.len());
        for ((subj, obj), edges) in &pairs {
            let (subj, obj) = (*subj, *obj);
            for &edge in edges {
                ordered.push(Fact::new(
                    graph[subj].clone(),
                    graph[edge].clone(),
                    graph[obj].clone(),
                ));
                endpoints.push((subj, obj));
            }
        }

        let key = FactKey::of(&ordered);
        Self {
            graph,
            node_index,
            pairs,
            facts: ordered,
            endpoints,
            key,
        }
    }

    /// The graph restricted to the facts at the given positions of [`facts`](Self::facts).
    pub fn subgraph(&self, positions: &[usize]) -> Self {
        let facts = positions
            .iter()
            .filter_map(|&i| self.facts.get(i).cloned())
            .collect();
        Self::from_valid(facts)
    }

    /// Facts in canonical order.
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    /// Canonical content key of this graph.
    pub fn key(&self) -> &FactKey {
        &self.key
    }

    /// Number of facts.
    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    /// Number of distinct entity tokens.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether the graph has no facts (and therefore no nodes).
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Entity tokens in first-seen order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(String::as_str)
    }

    /// Whether the token names a node of this graph.
    pub fn contains_node(&self, token: &str) -> bool {
        self.node_index.contains_key(token)
    }

    /// Directed edges grouped by ordered node pair.
    pub fn edges(&self) -> impl Iterator<Item = ((&str, &str), Vec<&str>)> {
        self.pairs.iter().map(|((subj, obj), edges)| {
            let labels = edges.iter().map(|&e| self.graph[e].as_str()).collect();
            ((self.graph[*subj].as_str(), self.graph[*obj].as_str()), labels)
        })
    }

    /// The undirected adjacency view of a node: forward entries first, then
    /// backward ones, each in insertion order. A self-loop shows up once in
    /// each direction. Unknown tokens have no neighbors.
    pub fn neighbors_undirected(&self, token: &str) -> Vec<Neighbor<'_>> {
        match self.node_index.get(token) {
            Some(&idx) => self
                .incident(idx)
                .into_iter()
                .map(|(direction, relation, other)| Neighbor {
                    direction,
                    relation,
                    other: self.graph[other].as_str(),
                })
                .collect(),
            None => Vec::new(),
        }
    }

    /// Whether the undirected view is a forest: no parallel edges in either
    /// direction, no self-loops and no cycles.
    pub fn is_tree_shaped(&self) -> bool {
        !petgraph::algo::is_cyclic_undirected(&self.graph)
    }

    pub(crate) fn incident(&self, idx: NodeIndex) -> Vec<(Direction, &str, NodeIndex)> {
        let mut forward: Vec<_> = self
            .graph
            .edges_directed(idx, EdgeDirection::Outgoing)
            .map(|e| (e.id(), e.target()))
            .collect();
        forward.sort_by_key(|&(id, _)| id);
        let mut backward: Vec<_> = self
            .graph
            .edges_directed(idx, EdgeDirection::Incoming)
            .map(|e| (e.id(), e.source()))
            .collect();
        backward.sort_by_key(|&(id, _)| id);

        forward
            .into_iter()
            .map(|(e, other)| (Direction::Forward, self.graph[e].as_str(), other))
            .chain(
                backward
                    .into_iter()
                    .map(|(e, other)| (Direction::Backward, self.graph[e].as_str(), other)),
            )
            .collect()
    }

    pub(crate) fn node_indices(&self) -> impl Iterator<Item = NodeIndex> {
        self.graph.node_indices()
    }

    pub(crate) fn token(&self, idx: NodeIndex) -> &str {
        &self.graph[idx]
    }

    pub(crate) fn endpoints(&self, position: usize) -> (NodeIndex, NodeIndex) {
        self.endpoints[position]
    }
}

fn ensure_node(
    graph: &mut DiGraph<String, String>,
    node_index: &mut HashMap<String, NodeIndex>,
    token: &str,
) -> NodeIndex {
    if let Some(&idx) = node_index.get(token) {
        return idx;
    }
    let idx = graph.add_node(token.to_string());
    node_index.insert(token.to_string(), idx);
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_graph() -> FactGraph {
        // A --b--> B --d--> C
        FactGraph::new([("A", "b", "B"), ("B", "d", "C")]).unwrap()
    }

    #[test]
    fn nodes_are_fact_endpoints() {
        let g = path_graph();
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.fact_count(), 2);
        assert_eq!(g.nodes().collect::<Vec<_>>(), vec!["A", "B", "C"]);
        assert!(g.contains_node("C"));
        assert!(!g.contains_node("D"));
    }

    #[test]
    fn empty_fact_list_has_no_nodes() {
        let g = FactGraph::new(Vec::<Fact>::new()).unwrap();
        assert!(g.is_empty());
        assert_eq!(g.node_count(), 0);
        assert_eq!(g.key().as_str(), "[]");
    }

    #[test]
    fn blank_fields_are_rejected() {
        let err = FactGraph::new([("A", "r", "B"), ("C", " ", "D")]).unwrap_err();
        assert!(matches!(
            err,
            GraphError::EmptyField {
                index: 1,
                field: "relation"
            }
        ));
    }

    #[test]
    fn facts_are_grouped_by_pair() {
        let g = FactGraph::new([("A", "r1", "B"), ("B", "s", "C"), ("A", "r2", "B")]).unwrap();
        let facts: Vec<_> = g.facts().iter().map(|f| f.relation.as_str()).collect();
        assert_eq!(facts, vec!["r1", "r2", "s"]);

        let edges: Vec<_> = g.edges().collect();
        assert_eq!(edges[0], (("A", "B"), vec!["r1", "r2"]));
        assert_eq!(edges[1], (("B", "C"), vec!["s"]));
    }

    #[test]
    fn undirected_view_sees_both_directions() {
        let g = path_graph();
        let around_b = g.neighbors_undirected("B");
        assert_eq!(around_b.len(), 2);
        assert_eq!(around_b[0].direction, Direction::Forward);
        assert_eq!(around_b[0].other, "C");
        assert_eq!(around_b[1].direction, Direction::Backward);
        assert_eq!(around_b[1].relation, "b");
        assert!(g.neighbors_undirected("Z").is_empty());
    }

    #[test]
    fn self_loop_is_visible_twice() {
        let g = FactGraph::new([("A", "likes", "A")]).unwrap();
        assert_eq!(g.node_count(), 1);
        let around_a = g.neighbors_undirected("A");
        assert_eq!(around_a.len(), 2);
        assert!(!g.is_tree_shaped());
    }

    #[test]
    fn tree_shape_detection() {
        assert!(path_graph().is_tree_shaped());
        // Parallel edge, opposite directions.
        let g = FactGraph::new([("A", "r", "B"), ("B", "s", "A")]).unwrap();
        assert!(!g.is_tree_shaped());
        // Triangle.
        let g = FactGraph::new([("A", "x", "B"), ("B", "y", "C"), ("C", "z", "A")]).unwrap();
        assert!(!g.is_tree_shaped());
        // Two components, each a tree.
        let g = FactGraph::new([("A", "x", "B"), ("C", "y", "D")]).unwrap();
        assert!(g.is_tree_shaped());
    }

    #[test]
    fn identical_content_gives_identical_key() {
        let g1 = path_graph();
        let g2 = path_graph();
        assert_eq!(g1.key(), g2.key());
        assert_eq!(g1.subgraph(&[1]).key(), FactGraph::new([("B", "d", "C")]).unwrap().key());
    }

    #[test]
    fn json_input() {
        let g = FactGraph::from_json(r#"[["A","birthPlace","B"],["B","country","C"]]"#).unwrap();
        assert_eq!(g.fact_count(), 2);
        assert!(matches!(
            FactGraph::from_json("{}").unwrap_err(),
            GraphError::Json { .. }
        ));
    }
}
