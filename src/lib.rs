// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # chimera-plan
//!
//! A content-planning engine for data-to-text generation. Given a set of
//! (subject, relation, object) facts, it enumerates every *content plan*: a
//! bracketed linearization that fixes the order and nesting in which the facts
//! are verbalized, possibly split over several sentences.
//!
//! ## Architecture
//!
//! - **Fact graph** (`graph`): petgraph multigraph with an undirected traversal view
//! - **Plan trees** (`plan`): arena of lazily linearized, memoized plan nodes
//! - **Planners** (`planner`): tree shortcut, exhaustive backtracking,
//!   size-bounded decomposition and reference-constrained decomposition
//! - **Shared cache** (`planner::shared`): content-keyed, concurrent, with rayon batches
//!
//! Ranking plans is left to the caller: every planner returns the full
//! candidate set.
//!
//! ## Library usage
//!
//! ```no_run
//! use chimera_plan::graph::FactGraph;
//! use chimera_plan::planner::{PlanMode, PlanSession};
//!
//! let graph = FactGraph::new([
//!     ("ENT_ALAN_BEAN_ENT", "birthPlace", "ENT_WHEELER_ENT"),
//!     ("ENT_ALAN_BEAN_ENT", "occupation", "ENT_TEST_PILOT_ENT"),
//! ])
//! .unwrap();
//! let mut session = PlanSession::default();
//! let root = session.plan(&graph, PlanMode::Full).unwrap();
//! for plan in session.linearize(root).unwrap().iter() {
//!     println!("{plan}");
//! }
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod plan;
pub mod planner;
