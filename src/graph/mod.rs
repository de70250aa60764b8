//! Fact graph: the relational input of content planning.
//!
//! Facts are (subject, relation, object) triples over opaque entity tokens.
//!
//! - **Storage** ([`FactGraph`]): a petgraph multigraph, one directed edge per fact
//! - **Traversal view** ([`Neighbor`]): every fact is visible from both endpoints,
//!   forward from the subject and backward from the object
//!
//! Planners never mutate a graph; sub-problems are planned on freshly built
//! sub-graphs and memoized by their [`FactKey`].

pub mod index;

use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

pub use index::FactGraph;

/// A single (subject, relation, object) fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fact {
    /// Entity token the fact is about.
    pub subject: String,
    /// Predicate label.
    pub relation: String,
    /// Entity token the fact points to.
    pub object: String,
}

impl Fact {
    /// Create a new fact.
    pub fn new(
        subject: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }

    /// Whether subject and object are the same entity.
    pub fn is_self_loop(&self) -> bool {
        self.subject == self.object
    }
}

impl<S, R, O> From<(S, R, O)> for Fact
where
    S: Into<String>,
    R: Into<String>,
    O: Into<String>,
{
    fn from((subject, relation, object): (S, R, O)) -> Self {
        Self::new(subject, relation, object)
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.subject, self.relation, self.object)
    }
}

/// Canonical content key of an ordered fact list.
///
/// Two graphs with the same key are the same planning problem. The key is the
/// JSON serialization of the triple sequence, never an address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactKey(String);

impl FactKey {
    pub(crate) fn of(facts: &[Fact]) -> Self {
        let triples = facts
            .iter()
            .map(|f| serde_json::json!([f.subject, f.relation, f.object]))
            .collect();
        Self(serde_json::Value::Array(triples).to_string())
    }

    /// The serialized key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which way a fact is traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Subject to object.
    Forward,
    /// Object to subject.
    Backward,
}

impl Direction {
    /// Plan-string marker for this direction.
    pub fn marker(self) -> &'static str {
        match self {
            Direction::Forward => ">",
            Direction::Backward => "<",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// One entry of the undirected adjacency view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor<'a> {
    /// Direction the fact is traversed in when leaving the queried node.
    pub direction: Direction,
    /// Relation label of the fact.
    pub relation: &'a str,
    /// The node on the other end.
    pub other: &'a str,
}

static CAMEL_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Z][a-z]+").unwrap());

/// Readable form of a relation label.
///
/// Underscores become spaces, camel-case words are split, and the result is
/// lowercased: `deathDate` → `death date`, `was_part_of` → `was part of`.
pub fn readable_relation(relation: &str) -> String {
    let spaced = relation.replace('_', " ");
    let split = CAMEL_WORD.replace_all(&spaced, |caps: &Captures<'_>| {
        let word = &caps[0];
        match caps.get(0).map(|m| m.start()) {
            Some(0) => word.to_string(),
            _ => format!(" {word}"),
        }
    });
    split
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readable_relation_splits_camel_case() {
        assert_eq!(readable_relation("deathDate"), "death date");
        assert_eq!(readable_relation("isPartOf"), "is part of");
        assert_eq!(readable_relation("Capital"), "capital");
    }

    #[test]
    fn readable_relation_handles_underscores_and_acronyms() {
        assert_eq!(readable_relation("birth_place"), "birth place");
        assert_eq!(readable_relation("was selected by NASA"), "was selected by nasa");
        assert_eq!(readable_relation("HTMLParser"), "html parser");
        assert_eq!(readable_relation("  leader__Name "), "leader name");
    }

    #[test]
    fn fact_key_is_content_based() {
        let a = vec![Fact::new("A", "r", "B"), Fact::new("B", "s", "C")];
        let b = a.clone();
        assert_eq!(FactKey::of(&a), FactKey::of(&b));
        assert_ne!(FactKey::of(&a), FactKey::of(&a[..1]));
        assert_eq!(FactKey::of(&a[..1]).as_str(), r#"[["A","r","B"]]"#);
    }

    #[test]
    fn direction_markers() {
        assert_eq!(Direction::Forward.to_string(), ">");
        assert_eq!(Direction::Backward.marker(), "<");
    }

    #[test]
    fn fact_from_tuple() {
        let fact: Fact = ("A", "loops", "A").into();
        assert!(fact.is_self_loop());
        assert_eq!(fact.to_string(), "(A, loops, A)");
    }
}
